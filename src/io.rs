use bytes::BufMut;
use futures::stream::TryStreamExt;
use warp::multipart::{FormData, Part};

use crate::errors::BackendError;

/// The audio file part of an upload.
#[derive(Clone, Debug, Default)]
pub struct UploadedFile {
    pub raw: Vec<u8>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// The fields of an upload form, before validation.
#[derive(Clone, Debug, Default)]
pub struct AudioUpload {
    pub file: Option<UploadedFile>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Reads every part of the form. Unknown parts are ignored.
pub async fn parse_upload(form: FormData) -> Result<AudioUpload, BackendError> {
    let parts: Vec<Part> = form
        .try_collect()
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)?;

    let mut upload = AudioUpload::default();

    for part in parts {
        match part.name() {
            "file" => {
                let content_type = part.content_type().map(str::to_owned);
                let filename = part.filename().map(str::to_owned);
                let raw = part_as_vec(part).await?;

                upload.file = Some(UploadedFile {
                    raw,
                    content_type,
                    filename,
                });
            }
            "userId" => upload.user_id = Some(part_as_string(part).await?),
            "email" => upload.email = Some(part_as_string(part).await?),
            "name" => upload.name = Some(part_as_string(part).await?),
            _ => {}
        }
    }

    Ok(upload)
}

/// Collects chunks of [`Part`].
pub async fn part_as_vec(part: Part) -> Result<Vec<u8>, BackendError> {
    part.stream()
        .try_fold(Vec::new(), |mut vec, data| {
            vec.put(data);
            async move { Ok(vec) }
        })
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)
}

async fn part_as_string(part: Part) -> Result<String, BackendError> {
    let raw = part_as_vec(part).await?;

    String::from_utf8(raw).map_err(|_| BackendError::MalformedFormSubmission)
}
