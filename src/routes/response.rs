use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BackendError, ErrorKind};

/// `{"ok": true, "data": …}`
#[derive(Debug, Deserialize, Serialize)]
pub struct Success<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Success { ok: true, data }
    }
}

/// `{"ok": false, "kind": …, "message": …}`, without any request
/// context.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Failure {
    pub ok: bool,
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Failure {
            ok: false,
            kind,
            message: message.into(),
        }
    }
}

impl From<BackendError> for Failure {
    fn from(error: BackendError) -> Self {
        Failure::new(error.kind(), error.to_string())
    }
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct Healthz<'a> {
    pub name: &'a str,
    pub revision: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub version: &'a str,
}
