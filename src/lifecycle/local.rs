//! The library driven straight from an [`Environment`], without HTTP.

use futures::future::{BoxFuture, FutureExt};
use url::Url;
use uuid::Uuid;

use super::{Identity, PendingAudio, RecordingsApi};
use crate::environment::Environment;
use crate::io::{AudioUpload, UploadedFile};
use crate::recording::Recording;
use crate::routes::response::Failure;
use crate::service::{self, SummaryRequest};

impl RecordingsApi for Environment {
    fn list<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<Recording>, Failure>> {
        async move {
            service::list(self, Some(user_id.to_owned()))
                .await
                .map_err(Failure::from)
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
            let upload = AudioUpload {
                file: Some(UploadedFile {
                    raw: audio.raw.clone(),
                    content_type: Some(audio.content_type.clone()),
                    filename: None,
                }),
                user_id: Some(identity.user_id.clone()),
                email: Some(identity.email.clone()),
                name: Some(name.to_owned()),
            };

            service::create_with_audio(self, upload)
                .await
                .map_err(Failure::from)
        }
        .boxed()
    }

    fn rename<'a>(&'a self, id: &'a Uuid, new_name: &'a str) -> BoxFuture<'a, Result<Recording, Failure>> {
        async move {
            service::rename(self, Some(id.to_string()), Some(new_name.to_owned()))
                .await
                .map_err(Failure::from)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a Uuid) -> BoxFuture<'a, Result<(), Failure>> {
        async move {
            service::delete(self, Some(id.to_string()))
                .await
                .map(|_| ())
                .map_err(Failure::from)
        }
        .boxed()
    }

    fn summarize<'a>(&'a self, audio_url: &'a Url) -> BoxFuture<'a, Result<String, Failure>> {
        async move {
            let request = SummaryRequest {
                audio_url: Some(audio_url.to_string()),
                audio_id: None,
            };

            service::summarize(self, request)
                .await
                .map(|s| s.summary)
                .map_err(Failure::from)
        }
        .boxed()
    }
}
