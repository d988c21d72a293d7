//! The library driven over HTTP against a running server.

use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::{Identity, PendingAudio, RecordingsApi};
use crate::errors::ErrorKind;
use crate::recording::{Recording, RenameRequest};
use crate::routes::response::{Deleted, Failure};
use crate::service::{Summary, SummaryRequest};
use crate::urls::Urls;

/// Extension used when the audio's content type names no subtype.
const DEFAULT_EXTENSION: &str = "webm";

pub struct HttpApi {
    client: Client,
    urls: Urls,
}

impl HttpApi {
    pub fn new(urls: Urls) -> Self {
        HttpApi::with_client(Client::new(), urls)
    }

    pub fn with_client(client: Client, urls: Urls) -> Self {
        HttpApi { client, urls }
    }
}

impl RecordingsApi for HttpApi {
    fn list<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<Recording>, Failure>> {
        async move {
            let response = self
                .client
                .get(self.urls.recordings())
                .query(&[("userId", user_id)])
                .send()
                .await;

            read_envelope(response).await
        }
        .boxed()
    }

    fn upload<'a>(
        &'a self,
        identity: &'a Identity,
        name: &'a str,
        audio: &'a PendingAudio,
    ) -> BoxFuture<'a, Result<Recording, Failure>> {
        async move {
            let file = Part::bytes(audio.raw.clone())
                .file_name(upload_filename(name, &audio.content_type))
                .mime_str(&audio.content_type)
                .map_err(|e| Failure::new(ErrorKind::ValidationError, e.to_string()))?;

            let form = Form::new()
                .part("file", file)
                .text("userId", identity.user_id.clone())
                .text("email", identity.email.clone())
                .text("name", name.to_owned());

            let response = self
                .client
                .post(self.urls.upload())
                .multipart(form)
                .send()
                .await;

            read_envelope(response).await
        }
        .boxed()
    }

    fn rename<'a>(&'a self, id: &'a Uuid, new_name: &'a str) -> BoxFuture<'a, Result<Recording, Failure>> {
        async move {
            let request = RenameRequest {
                id: Some(id.to_string()),
                new_name: Some(new_name.to_owned()),
            };

            let response = self
                .client
                .put(self.urls.recordings())
                .json(&request)
                .send()
                .await;

            read_envelope(response).await
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a Uuid) -> BoxFuture<'a, Result<(), Failure>> {
        async move {
            let response = self
                .client
                .delete(self.urls.recordings())
                .query(&[("id", id.to_string())])
                .send()
                .await;

            read_envelope::<Deleted>(response).await.map(|_| ())
        }
        .boxed()
    }

    fn summarize<'a>(&'a self, audio_url: &'a Url) -> BoxFuture<'a, Result<String, Failure>> {
        async move {
            let request = SummaryRequest {
                audio_url: Some(audio_url.to_string()),
                audio_id: None,
            };

            let response = self
                .client
                .post(self.urls.summarize())
                .json(&request)
                .send()
                .await;

            read_envelope::<Summary>(response)
                .await
                .map(|s| s.summary)
        }
        .boxed()
    }
}

/// The server keys stored objects by the uploaded file's name, so the
/// recording's name is sent with an extension matching its content type.
fn upload_filename(name: &str, content_type: &str) -> String {
    let extension = content_type
        .parse::<mime::Mime>()
        .map(|m| m.subtype().as_str().to_owned())
        .unwrap_or_else(|_| DEFAULT_EXTENSION.to_owned());

    format!("{}.{}", name, extension)
}

/// Unwraps `{"ok": true, "data": …}`, or turns the failure envelope into
/// a [`Failure`]. Anything that is not an envelope is reported as
/// `Internal`.
async fn read_envelope<T: DeserializeOwned>(
    response: Result<Response, reqwest::Error>,
) -> Result<T, Failure> {
    let internal = |message: String| Failure::new(ErrorKind::Internal, message);

    let response = response.map_err(|e| internal(e.to_string()))?;
    let status = response.status();

    let mut body: Value = response
        .json()
        .await
        .map_err(|e| internal(format!("status {}: {}", status, e)))?;

    if body["ok"] == Value::Bool(true) {
        let data = body.get_mut("data").map(Value::take).unwrap_or(Value::Null);

        serde_json::from_value(data).map_err(|e| internal(e.to_string()))
    } else {
        let failure = serde_json::from_value::<Failure>(body)
            .map_err(|e| internal(format!("status {}: {}", status, e)))?;

        Err(failure)
    }
}
