use log::{error, warn, Logger};
use serde::Serialize;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::{BackendError, ErrorKind};

/// A handler failure together with what the handler was doing.
#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            ok: false,
            kind: self.error.kind(),
            message: format!("{}", self.error),
            context: self.context.clone(),
        }
    }

    /// Logs the failure and renders it as a failure envelope.
    pub fn into_reply(self, logger: &Logger) -> WithStatus<Json> {
        let status = super::status_code_for(&self.error);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?self.context, "error" => ?self.error, "status" => %status, "message" => %self.error);
        } else {
            warn!(logger, "Request failed"; "context" => ?self.context, "status" => %status, "message" => %self.error);
        }

        with_status(json(&self.flatten()), status)
    }
}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    pub(crate) ok: bool,
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    #[serde(flatten)]
    pub(crate) context: Context,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Context {
    List {
        #[serde(rename = "userId")]
        user_id: Option<String>,
    },
    Create,
    Rename { id: Option<String> },
    Delete { id: Option<String> },
    Retrieve { id: String },
    Upload,
    Summarize {
        #[serde(rename = "audioId")]
        audio_id: Option<String>,
    },
}

impl Context {
    pub fn list(user_id: Option<String>) -> Context {
        Context::List { user_id }
    }

    pub fn create() -> Context {
        Context::Create
    }

    pub fn rename(id: Option<String>) -> Context {
        Context::Rename { id }
    }

    pub fn delete(id: Option<String>) -> Context {
        Context::Delete { id }
    }

    pub fn retrieve(id: String) -> Context {
        Context::Retrieve { id }
    }

    pub fn upload() -> Context {
        Context::Upload
    }

    pub fn summarize(audio_id: Option<String>) -> Context {
        Context::Summarize { audio_id }
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn envelopes_carry_kind_and_context() {
        let id = Uuid::new_v4();
        let rejection = Rejection::new(
            Context::delete(Some(id.to_string())),
            BackendError::NonExistentId(id),
        );

        let value = serde_json::to_value(&rejection.flatten()).unwrap();

        assert_eq!(value["ok"], false);
        assert_eq!(value["kind"], "NotFound");
        assert_eq!(value["operation"], "delete");
        assert_eq!(value["id"], id.to_string());
        assert!(value["message"].as_str().unwrap().contains(&id.to_string()));
    }

    #[test]
    fn unit_contexts_only_name_the_operation() {
        let rejection = Rejection::new(Context::upload(), BackendError::missing("file"));
        let value = serde_json::to_value(&rejection.flatten()).unwrap();

        assert_eq!(value["operation"], "upload");
        assert_eq!(value["kind"], "ValidationError");
    }
}
