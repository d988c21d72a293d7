use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::errors::BackendError;

/// A single recording in the metadata store.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    /// The ID of the recording. Assigned by the store.
    pub id: Uuid,

    /// The owner, as reported by the authentication provider.
    pub user_id: String,

    /// The owner’s email address at creation time.
    pub email: String,

    /// The display name.
    pub name: String,

    /// The public URL of the audio.
    pub audio_url: Url,

    /// The sort key for listings.
    #[serde(with = "time::serde::timestamp")]
    pub date: OffsetDateTime,

    /// The generated summary, if one was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// The validated, caller-supplied part of a recording.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingDetails {
    user_id: String,
    email: String,
    name: RecordingName,
}

impl RecordingDetails {
    /// Validates the three required text fields.
    pub fn new(
        user_id: Option<String>,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<Self, BackendError> {
        Ok(RecordingDetails {
            user_id: required("userId", user_id)?,
            email: required("email", email)?,
            name: RecordingName::new(name.unwrap_or_default())?,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &RecordingName {
        &self.name
    }

    /// Attaches the location of the uploaded audio.
    pub fn with_audio(self, audio_url: Url, date: Option<OffsetDateTime>) -> NewRecording {
        NewRecording {
            details: self,
            audio_url,
            date,
        }
    }
}

/// A recording that has not been stored yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRecording {
    pub(crate) details: RecordingDetails,
    pub(crate) audio_url: Url,

    /// Defaults to the time of insertion.
    pub(crate) date: Option<OffsetDateTime>,
}

impl NewRecording {
    pub fn details(&self) -> &RecordingDetails {
        &self.details
    }

    pub fn audio_url(&self) -> &Url {
        &self.audio_url
    }

    pub fn date(&self) -> Option<OffsetDateTime> {
        self.date
    }
}

/// A non-blank display name, trimmed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordingName(String);

impl RecordingName {
    pub fn new(name: impl AsRef<str>) -> Result<Self, BackendError> {
        let name = name.as_ref().trim();

        if name.is_empty() {
            Err(BackendError::missing("name"))
        } else {
            Ok(RecordingName(name.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RecordingName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<RecordingName> for String {
    fn from(name: RecordingName) -> Self {
        name.0
    }
}

/// The JSON body of a metadata-only creation request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: Option<OffsetDateTime>,
}

impl CreationRequest {
    pub fn validate(self) -> Result<NewRecording, BackendError> {
        let details = RecordingDetails::new(self.user_id, self.email, self.name)?;
        let audio_url = required("audioUrl", self.audio_url)?;
        let audio_url = Url::parse(&audio_url).map_err(|e| BackendError::InvalidField {
            field: "audioUrl",
            reason: e.to_string(),
        })?;

        Ok(details.with_audio(audio_url, self.date))
    }
}

/// The JSON body of a rename request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
}

/// Returns the trimmed value, or an error naming the field if it is
/// missing or blank.
pub(crate) fn required(field: &'static str, value: Option<String>) -> Result<String, BackendError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(BackendError::missing(field)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateInput {
    Timestamp(i64),
    Text(String),
}

/// The earliest instant a `timestamptz` column holds, 4714-11-24 BC.
const MIN_TIMESTAMP: i64 = -210_866_803_200;

/// The last second of 9999, the latest instant RFC 3339 can express.
const MAX_TIMESTAMP: i64 = 253_402_300_799;

/// Accepts either a Unix timestamp in seconds or an RFC 3339 string.
/// Instants the database cannot store are refused here.
fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let input: Option<DateInput> = Option::deserialize(deserializer)?;

    let date = match input {
        None => return Ok(None),
        Some(DateInput::Timestamp(seconds)) => {
            if !(MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&seconds) {
                return Err(D::Error::custom(format!("date {} out of range", seconds)));
            }

            OffsetDateTime::from_unix_timestamp(seconds)
        }
        Some(DateInput::Text(text)) => OffsetDateTime::parse(&text, time::Format::Rfc3339)
            .map_err(|e| D::Error::custom(format!("invalid date {:?}: {}", text, e)))?,
    };

    if !(MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&date.timestamp()) {
        return Err(D::Error::custom(format!("date {} out of range", date.timestamp())));
    }

    Ok(Some(date))
}

#[cfg(test)]
mod test {
    use super::*;

    fn request() -> CreationRequest {
        CreationRequest {
            user_id: Some("u1".to_owned()),
            email: Some("a@x.com".to_owned()),
            name: Some("Lec1".to_owned()),
            audio_url: Some("https://blob/1.webm".to_owned()),
            date: None,
        }
    }

    #[test]
    fn complete_requests_validate() {
        let new = request().validate().expect("validate complete request");

        assert_eq!(new.details().user_id(), "u1");
        assert_eq!(new.details().name().as_str(), "Lec1");
        assert_eq!(new.audio_url().as_str(), "https://blob/1.webm");
        assert_eq!(new.date(), None);
    }

    #[test]
    fn each_required_field_is_checked() {
        let cases: Vec<(&str, Box<dyn Fn(&mut CreationRequest)>)> = vec![
            ("userId", Box::new(|r: &mut CreationRequest| r.user_id = None)),
            ("email", Box::new(|r: &mut CreationRequest| r.email = Some("".to_owned()))),
            ("name", Box::new(|r: &mut CreationRequest| r.name = Some("   ".to_owned()))),
            ("audioUrl", Box::new(|r: &mut CreationRequest| r.audio_url = None)),
        ];

        for (expected, mutate) in cases {
            let mut r = request();
            mutate(&mut r);

            match r.validate() {
                Err(BackendError::MissingField { field }) => assert_eq!(field, expected),
                other => panic!("expected {} to be reported missing, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn names_are_trimmed_and_must_not_be_blank() {
        assert_eq!(RecordingName::new("  Week 3 ").unwrap().as_str(), "Week 3");
        assert!(RecordingName::new("").is_err());
        assert!(RecordingName::new("\t\n").is_err());
    }

    #[test]
    fn dates_accept_timestamps_and_rfc3339() {
        let from_number: CreationRequest =
            serde_json::from_str(r#"{"date": 1700000000}"#).expect("parse timestamp");
        assert_eq!(from_number.date.unwrap().timestamp(), 1_700_000_000);

        let from_text: CreationRequest =
            serde_json::from_str(r#"{"date": "2023-11-14T22:13:20+00:00"}"#).expect("parse text");
        assert_eq!(from_text.date.unwrap().timestamp(), 1_700_000_000);

        let absent: CreationRequest = serde_json::from_str("{}").expect("parse empty");
        assert!(absent.date.is_none());

        assert!(serde_json::from_str::<CreationRequest>(r#"{"date": "yesterday"}"#).is_err());
    }

    #[test]
    fn dates_outside_the_storable_range_are_refused() {
        for date in &[
            "9000000000000000000",
            "-9000000000000000000",
            "253402300800",
            "-210866803201",
        ] {
            let body = format!(r#"{{"date": {}}}"#, date);
            let error = serde_json::from_str::<CreationRequest>(&body).unwrap_err();

            assert!(error.to_string().contains("out of range"), "{}: {}", date, error);
        }

        let earliest = format!(r#"{{"date": {}}}"#, MIN_TIMESTAMP);
        let parsed: CreationRequest = serde_json::from_str(&earliest).expect("parse earliest");
        assert_eq!(parsed.date.unwrap().timestamp(), MIN_TIMESTAMP);

        let latest: CreationRequest =
            serde_json::from_str(r#"{"date": "9999-12-31T23:59:59+00:00"}"#).expect("parse latest");
        assert_eq!(latest.date.unwrap().timestamp(), MAX_TIMESTAMP);
    }

    #[test]
    fn recordings_serialize_with_camel_case_fields() {
        let recording = Recording {
            id: Uuid::nil(),
            user_id: "u1".to_owned(),
            email: "a@x.com".to_owned(),
            name: "Lec1".to_owned(),
            audio_url: Url::parse("https://blob/1.webm").unwrap(),
            date: OffsetDateTime::from_unix_timestamp(1_700_000_000),
            summary: None,
        };

        let value = serde_json::to_value(&recording).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["audioUrl"], "https://blob/1.webm");
        assert_eq!(value["date"], 1_700_000_000);
        assert!(value.get("summary").is_none());
    }
}
