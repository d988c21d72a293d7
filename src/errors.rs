use rusoto_core::RusotoError;
use rusoto_s3::{DeleteObjectError, PutObjectError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A required field was missing or blank.
    #[error("missing or empty field: {field}")]
    MissingField { field: &'static str },

    /// A field was present but could not be interpreted.
    #[error("invalid value for field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The identifier is not in the store’s format.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The identifier is well formed but nothing carries it.
    #[error("recording not found: {0}")]
    NonExistentId(Uuid),

    /// The multipart form could not be read.
    #[error("malformed form submission")]
    MalformedFormSubmission,

    /// The JSON body could not be deserialized.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Represents an SQL error.
    #[error("metadata store unavailable")]
    Sqlx {
        #[source]
        source: sqlx::Error,
    },

    /// A stored URL could not be parsed back.
    #[error("unable to parse stored URL {url}")]
    UnableToParseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Represents an error returned by the object store when uploading.
    #[error("upload failed")]
    UploadFailed {
        #[source]
        source: RusotoError<PutObjectError>,
    },

    /// Represents an error returned by the object store when deleting.
    #[error("failed to delete stored audio")]
    DeleteFailed {
        #[source]
        source: RusotoError<DeleteObjectError>,
    },

    /// No public URL could be derived for an uploaded object.
    #[error("failed to generate public URL for {key}")]
    FailedToGenerateUrl {
        key: String,
        #[source]
        source: url::ParseError,
    },

    /// The audio to summarize could not be downloaded.
    #[error("failed to fetch audio from {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The model call failed or returned something unusable.
    #[error("failed to generate summary: {0}")]
    GenerationFailed(String),
}

/// The error taxonomy exposed to clients.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    InvalidIdentifier,
    NotFound,
    StoreUnavailable,
    UploadFailed,
    FetchFailed,
    GenerationFailed,
    Internal,
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        use BackendError::*;

        match self {
            MissingField { .. }
            | InvalidField { .. }
            | MalformedFormSubmission
            | MalformedBody(..) => ErrorKind::ValidationError,
            InvalidId(..) => ErrorKind::InvalidIdentifier,
            NonExistentId(..) => ErrorKind::NotFound,
            Sqlx { .. } | UnableToParseUrl { .. } => ErrorKind::StoreUnavailable,
            UploadFailed { .. } | DeleteFailed { .. } | FailedToGenerateUrl { .. } => {
                ErrorKind::UploadFailed
            }
            FetchFailed { .. } => ErrorKind::FetchFailed,
            GenerationFailed(..) => ErrorKind::GenerationFailed,
        }
    }

    pub fn missing(field: &'static str) -> Self {
        BackendError::MissingField { field }
    }
}

impl ErrorKind {
    /// The HTTP status code reported for this kind of failure.
    pub fn status(self) -> u16 {
        use ErrorKind::*;

        match self {
            ValidationError | InvalidIdentifier => 400,
            NotFound => 404,
            StoreUnavailable | UploadFailed | FetchFailed | GenerationFailed | Internal => 500,
        }
    }
}

/// Parses a recording identifier without touching any store.
pub fn parse_id(id: &str) -> Result<Uuid, BackendError> {
    Uuid::parse_str(id.trim()).map_err(|_| BackendError::InvalidId(id.to_owned()))
}
