//! Client-side state for a signed-in user’s recordings.
//!
//! [`Library`] holds the cached list, the capture session, the selection
//! and the displayed summary. Renames and deletes are applied to the
//! cache before the server confirms them; when the server refuses, the
//! whole cache is replaced by a fresh listing rather than rolled back
//! field by field.

use futures::future::BoxFuture;
use log::{debug, warn, Logger};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::errors::ErrorKind;
use crate::recording::{Recording, RecordingName};
use crate::routes::response::Failure;

mod capture;
pub mod http;
mod local;

pub use capture::{Capture, PendingAudio};
pub use http::HttpApi;

/// Shown in place of a summary when summarizing fails.
pub const SUMMARY_FAILED_MESSAGE: &str = "Failed to summarize audio.";

/// The signed-in user, as reported by the authentication provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// The server operations the library relies on.
pub trait RecordingsApi: Send + Sync {
    /// The user’s recordings, newest first.
    fn list<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<Recording>, Failure>>;

    /// Stores the audio and its metadata.
    fn upload<'a>(
        &'a self,
        identity: &'a Identity,
        name: &'a str,
        audio: &'a PendingAudio,
    ) -> BoxFuture<'a, Result<Recording, Failure>>;

    fn rename<'a>(&'a self, id: &'a Uuid, new_name: &'a str) -> BoxFuture<'a, Result<Recording, Failure>>;

    fn delete<'a>(&'a self, id: &'a Uuid) -> BoxFuture<'a, Result<(), Failure>>;

    fn summarize<'a>(&'a self, audio_url: &'a Url) -> BoxFuture<'a, Result<String, Failure>>;
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("a capture is already in progress")]
    CaptureBusy,

    #[error("no capture is running")]
    NotCapturing,

    #[error("no captured audio is waiting to be saved")]
    NothingCaptured,

    #[error("name must not be empty")]
    EmptyName,

    #[error("no recording is selected")]
    NotSelected,

    #[error("recording {0} is not in the list")]
    UnknownRecording(Uuid),

    #[error("{kind:?}: {message}")]
    Api { kind: ErrorKind, message: String },
}

impl From<Failure> for LifecycleError {
    fn from(failure: Failure) -> Self {
        LifecycleError::Api {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

pub struct Library<A> {
    api: A,
    identity: Identity,
    logger: Logger,
    capture: Capture,
    recordings: Vec<Recording>,
    selected: Option<Uuid>,
    summary: Option<String>,
}

impl<A: RecordingsApi> Library<A> {
    /// Creates an empty library. Call [`Library::refresh`] to load the
    /// user’s recordings.
    pub fn new(api: A, identity: Identity, logger: Logger) -> Self {
        Library {
            api,
            identity,
            logger,
            capture: Capture::Idle,
            recordings: vec![],
            selected: None,
            summary: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The cached list, newest first.
    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn selected(&self) -> Option<&Recording> {
        let id = self.selected?;

        self.recordings.iter().find(|r| r.id == id)
    }

    /// The text shown in the detail view, if any.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn start_capture(&mut self) -> Result<(), LifecycleError> {
        self.capture.start()
    }

    pub fn stop_capture(&mut self, raw: Vec<u8>, content_type: &str) -> Result<(), LifecycleError> {
        self.capture.stop(PendingAudio::new(raw, content_type))
    }

    pub fn begin_naming(&mut self) -> Result<(), LifecycleError> {
        self.capture.begin_naming()
    }

    pub fn discard_capture(&mut self) -> Result<(), LifecycleError> {
        self.capture.discard()
    }

    /// Uploads the audio being named. A blank name is refused without
    /// contacting the server. If the upload fails the audio is kept so
    /// that saving can be retried.
    pub async fn save(&mut self, name: &str) -> Result<Recording, LifecycleError> {
        if !matches!(self.capture, Capture::Naming(_)) {
            return Err(LifecycleError::NothingCaptured);
        }

        let name = RecordingName::new(name).map_err(|_| LifecycleError::EmptyName)?;
        let audio = self.capture.take_for_upload()?;

        debug!(self.logger, "Uploading recording..."; "name" => name.as_str(), "size" => audio.raw.len());

        let result = self.api.upload(&self.identity, name.as_str(), &audio).await;

        match result {
            Ok(recording) => {
                self.recordings.insert(0, recording.clone());
                self.capture = Capture::Idle;

                Ok(recording)
            }
            Err(failure) => {
                warn!(self.logger, "Upload failed"; "kind" => ?failure.kind, "message" => &failure.message);
                self.capture = Capture::Naming(audio);

                Err(failure.into())
            }
        }
    }

    /// Replaces the cached list with the server’s.
    pub async fn refresh(&mut self) -> Result<(), LifecycleError> {
        let recordings = self.api.list(&self.identity.user_id).await?;

        debug!(self.logger, "Refreshed recordings"; "count" => recordings.len());
        self.recordings = recordings;

        if self.selected().is_none() {
            self.clear_selection();
        }

        Ok(())
    }

    pub async fn rename(&mut self, id: &Uuid, new_name: &str) -> Result<Recording, LifecycleError> {
        let name = RecordingName::new(new_name).map_err(|_| LifecycleError::EmptyName)?;

        if let Some(cached) = self.recordings.iter_mut().find(|r| r.id == *id) {
            cached.name = name.as_str().to_owned();
        }

        let result = self.api.rename(id, name.as_str()).await;

        match result {
            Ok(recording) => {
                if let Some(cached) = self.recordings.iter_mut().find(|r| r.id == *id) {
                    *cached = recording.clone();
                }

                Ok(recording)
            }
            Err(failure) => {
                self.reconcile(&failure).await;
                Err(failure.into())
            }
        }
    }

    pub async fn delete(&mut self, id: &Uuid) -> Result<(), LifecycleError> {
        self.recordings.retain(|r| r.id != *id);

        if self.selected == Some(*id) {
            self.clear_selection();
        }

        let result = self.api.delete(id).await;

        match result {
            Ok(()) => Ok(()),
            Err(failure) => {
                self.reconcile(&failure).await;
                Err(failure.into())
            }
        }
    }

    /// Selects a cached recording, replacing whatever summary was shown
    /// with the one stored on the recording, if any.
    pub fn select(&mut self, id: &Uuid) -> Result<&Recording, LifecycleError> {
        let index = self
            .recordings
            .iter()
            .position(|r| r.id == *id)
            .ok_or(LifecycleError::UnknownRecording(*id))?;

        self.selected = Some(*id);
        self.summary = self.recordings[index].summary.clone();

        Ok(&self.recordings[index])
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.summary = None;
    }

    /// Summarizes the selected recording. Nothing is cached: asking
    /// again fetches and generates again.
    pub async fn summarize(&mut self) -> Result<String, LifecycleError> {
        let audio_url = self
            .selected()
            .map(|r| r.audio_url.clone())
            .ok_or(LifecycleError::NotSelected)?;

        self.summary = None;

        let result = self.api.summarize(&audio_url).await;

        match result {
            Ok(summary) => {
                self.summary = Some(summary.clone());
                Ok(summary)
            }
            Err(failure) => {
                warn!(self.logger, "Summary failed"; "kind" => ?failure.kind, "message" => &failure.message);
                self.summary = Some(SUMMARY_FAILED_MESSAGE.to_owned());

                Err(failure.into())
            }
        }
    }

    /// Throws away optimistic edits by listing again.
    async fn reconcile(&mut self, failure: &Failure) {
        warn!(self.logger, "Server refused change, refreshing"; "kind" => ?failure.kind, "message" => &failure.message);

        if let Err(e) = self.refresh().await {
            warn!(self.logger, "Failed to refresh recordings"; "error" => %e);
        }
    }
}
