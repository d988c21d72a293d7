//! Operations behind the HTTP surface. Each takes the shared
//! [`Environment`] and returns a [`BackendError`] on failure, leaving the
//! response format to the caller.

use std::sync::Arc;

use log::{debug, error, o, Logger};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::environment::Environment;
use crate::errors::{parse_id, BackendError};
use crate::io::{AudioUpload, UploadedFile};
use crate::recording::{required, CreationRequest, Recording, RecordingDetails, RecordingName};

/// Used when the upload names no content type.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/webm";

/// The JSON body of a summary request. Exactly one field is needed; if
/// both are given the stored recording wins.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Summary {
    pub summary: String,
}

pub async fn list(environment: &Environment, user_id: Option<String>) -> Result<Vec<Recording>, BackendError> {
    let user_id = required("userId", user_id)?;

    debug!(environment.logger, "Listing recordings..."; "user_id" => &user_id);

    environment.db.list_by_user(&user_id).await
}

pub async fn create(environment: &Environment, request: CreationRequest) -> Result<Recording, BackendError> {
    let new_recording = request.validate()?;

    debug!(environment.logger, "Writing metadata to database..."; "user_id" => new_recording.details().user_id());

    environment.db.insert(new_recording).await
}

/// Stores the audio, then its metadata. If the metadata cannot be written
/// the audio is deleted again so no orphaned object is left behind.
pub async fn create_with_audio(
    environment: &Environment,
    upload: AudioUpload,
) -> Result<Recording, BackendError> {
    let AudioUpload {
        file,
        user_id,
        email,
        name,
    } = upload;

    let details = RecordingDetails::new(user_id, email, name)?;
    let (raw, content_type, suggested_name) = verify_audio(file, &details)?;

    let logger = Arc::new(environment.logger.new(o!("user_id" => details.user_id().to_owned())));

    debug!(logger, "Saving recording to store..."; "content_type" => &content_type, "size" => raw.len());
    let stored = environment
        .store
        .upload(raw, &content_type, &suggested_name)
        .await?;

    let logger = Arc::new(logger.new(o!("key" => stored.key.clone())));

    debug!(logger, "Writing metadata to database...");
    match environment.db.insert(details.with_audio(stored.url, None)).await {
        Ok(recording) => {
            debug!(logger, "Stored recording"; "id" => %recording.id);
            Ok(recording)
        }
        Err(e) => {
            error!(logger, "Failed to write metadata, removing stored audio"; "error" => %e);
            compensate(logger.clone(), environment, &stored.key).await;

            Err(e)
        }
    }
}

async fn compensate(logger: Arc<Logger>, environment: &Environment, key: &str) {
    if let Err(e) = environment.store.delete(key).await {
        error!(logger, "Failed to remove orphaned audio"; "error" => ?e);
    }
}

/// Checks the uploaded file and picks its content type and the name its
/// key is derived from.
fn verify_audio(
    file: Option<UploadedFile>,
    details: &RecordingDetails,
) -> Result<(Vec<u8>, String, String), BackendError> {
    let file = match file {
        Some(file) if !file.raw.is_empty() => file,
        _ => return Err(BackendError::missing("file")),
    };

    let content_type = match file.content_type.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_CONTENT_TYPE.to_owned(),
        Some(given) => {
            let parsed: mime::Mime = given.parse().map_err(|_| invalid_file(given))?;

            if parsed.type_() != mime::AUDIO && parsed.type_() != mime::VIDEO {
                return Err(invalid_file(given));
            }

            parsed.essence_str().to_owned()
        }
    };

    let suggested_name = file
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| details.name().as_str().to_owned());

    Ok((file.raw, content_type, suggested_name))
}

fn invalid_file(content_type: &str) -> BackendError {
    BackendError::InvalidField {
        field: "file",
        reason: format!("expected audio, got {}", content_type),
    }
}

pub async fn retrieve(environment: &Environment, id: &str) -> Result<Recording, BackendError> {
    let id = parse_id(id)?;

    debug!(environment.logger, "Retrieving recording..."; "id" => %id);

    environment
        .db
        .retrieve(&id)
        .await?
        .ok_or(BackendError::NonExistentId(id))
}

pub async fn rename(
    environment: &Environment,
    id: Option<String>,
    new_name: Option<String>,
) -> Result<Recording, BackendError> {
    let id = parse_id(&required("id", id)?)?;
    let name = RecordingName::new(new_name.unwrap_or_default())?;

    debug!(environment.logger, "Renaming recording..."; "id" => %id, "name" => name.as_str());

    environment.db.rename(&id, name).await
}

/// Deletes the metadata only; the audio object stays where it is.
pub async fn delete(environment: &Environment, id: Option<String>) -> Result<Uuid, BackendError> {
    let id = parse_id(&required("id", id)?)?;

    debug!(environment.logger, "Deleting recording..."; "id" => %id);

    environment.db.delete(&id).await?;

    Ok(id)
}

pub async fn summarize(environment: &Environment, request: SummaryRequest) -> Result<Summary, BackendError> {
    let SummaryRequest { audio_url, audio_id } = request;

    let id = match audio_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => Some(parse_id(&id)?),
        None => None,
    };

    let audio_url = match id {
        Some(id) => {
            environment
                .db
                .retrieve(&id)
                .await?
                .ok_or(BackendError::NonExistentId(id))?
                .audio_url
        }
        None => {
            let url = required("audioUrl", audio_url)?;

            Url::parse(&url).map_err(|e| BackendError::InvalidField {
                field: "audioUrl",
                reason: e.to_string(),
            })?
        }
    };

    debug!(environment.logger, "Summarizing audio..."; "url" => %audio_url);
    let summary = environment.summarizer.summarize(&audio_url).await?;

    if let (Some(id), true) = (id, environment.config.persist_summaries) {
        debug!(environment.logger, "Storing summary..."; "id" => %id);
        environment.db.set_summary(&id, summary.clone()).await?;
    }

    Ok(Summary { summary })
}

#[cfg(test)]
mod test {
    use super::*;

    fn details() -> RecordingDetails {
        RecordingDetails::new(
            Some("u1".to_owned()),
            Some("a@x.com".to_owned()),
            Some("Week 3".to_owned()),
        )
        .unwrap()
    }

    fn file(content_type: Option<&str>, filename: Option<&str>) -> Option<UploadedFile> {
        Some(UploadedFile {
            raw: vec![1, 2, 3],
            content_type: content_type.map(str::to_owned),
            filename: filename.map(str::to_owned),
        })
    }

    #[test]
    fn empty_files_are_missing() {
        assert!(matches!(
            verify_audio(None, &details()),
            Err(BackendError::MissingField { field: "file" })
        ));

        let empty = Some(UploadedFile::default());
        assert!(matches!(
            verify_audio(empty, &details()),
            Err(BackendError::MissingField { field: "file" })
        ));
    }

    #[test]
    fn content_type_defaults_to_webm() {
        let (_, content_type, name) = verify_audio(file(None, None), &details()).unwrap();

        assert_eq!(content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(name, "Week 3");
    }

    #[test]
    fn parameters_are_dropped_from_content_type() {
        let (_, content_type, name) =
            verify_audio(file(Some("audio/ogg; codecs=opus"), Some("rec.ogg")), &details()).unwrap();

        assert_eq!(content_type, "audio/ogg");
        assert_eq!(name, "rec.ogg");
    }

    #[tokio::test]
    async fn summaries_by_id_are_stored_only_when_enabled() {
        use crate::environment::{test_environment, Config};
        use crate::summarize::fixed::Outcome;

        let (mut environment, db, _, summarizer) = test_environment();
        let recording = create(
            &environment,
            CreationRequest {
                user_id: Some("u1".to_owned()),
                email: Some("a@x.com".to_owned()),
                name: Some("Lec1".to_owned()),
                audio_url: Some("https://blob.example.com/1.webm".to_owned()),
                date: None,
            },
        )
        .await
        .unwrap();

        let request = SummaryRequest {
            audio_url: None,
            audio_id: Some(recording.id.to_string()),
        };

        let summary = summarize(&environment, request.clone()).await.unwrap();
        assert_eq!(summary.summary, "A lecture about vectors.");
        assert_eq!(summarizer.requests(), vec![recording.audio_url.clone()]);
        assert_eq!(db.all()[0].summary, None);

        environment.config = Config::new(true, environment.config.max_upload_bytes);

        summarizer.set_outcome(Outcome::GenerationFails);
        assert!(summarize(&environment, request.clone()).await.is_err());
        assert_eq!(db.all()[0].summary, None);

        summarizer.set_outcome(Outcome::Text("Stored.".to_owned()));
        summarize(&environment, request).await.unwrap();
        assert_eq!(db.all()[0].summary.as_deref(), Some("Stored."));
    }

    #[tokio::test]
    async fn summaries_need_a_source() {
        use crate::environment::test_environment;

        let (environment, _, _, summarizer) = test_environment();

        let missing = summarize(&environment, SummaryRequest::default()).await;
        assert!(matches!(
            missing,
            Err(BackendError::MissingField { field: "audioUrl" })
        ));

        let malformed = SummaryRequest {
            audio_url: Some("not a url".to_owned()),
            audio_id: None,
        };
        assert!(matches!(
            summarize(&environment, malformed).await,
            Err(BackendError::InvalidField { field: "audioUrl", .. })
        ));

        let unknown = SummaryRequest {
            audio_url: None,
            audio_id: Some(Uuid::new_v4().to_string()),
        };
        assert!(matches!(
            summarize(&environment, unknown).await,
            Err(BackendError::NonExistentId(_))
        ));

        assert!(summarizer.requests().is_empty());
    }

    #[test]
    fn non_audio_files_are_rejected() {
        for content_type in &["text/plain", "image/png", "not a type"] {
            assert!(matches!(
                verify_audio(file(Some(content_type), None), &details()),
                Err(BackendError::InvalidField { field: "file", .. })
            ));
        }
    }
}
