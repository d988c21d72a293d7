use std::fmt;
use std::mem;

use super::LifecycleError;

/// Audio that has been captured but not uploaded yet.
#[derive(Clone, PartialEq)]
pub struct PendingAudio {
    pub raw: Vec<u8>,
    pub content_type: String,
}

impl PendingAudio {
    pub fn new(raw: Vec<u8>, content_type: impl Into<String>) -> Self {
        PendingAudio {
            raw,
            content_type: content_type.into(),
        }
    }
}

impl fmt::Debug for PendingAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAudio")
            .field("len", &self.raw.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Where the single capture session of a client stands.
#[derive(Clone, Debug, PartialEq)]
pub enum Capture {
    Idle,
    Capturing,
    Captured(PendingAudio),
    Naming(PendingAudio),
    Uploading,
}

impl Default for Capture {
    fn default() -> Self {
        Capture::Idle
    }
}

impl Capture {
    /// Whether a new capture may start. Mirrors the start control being
    /// enabled.
    pub fn can_start(&self) -> bool {
        matches!(self, Capture::Idle)
    }

    pub(crate) fn start(&mut self) -> Result<(), LifecycleError> {
        if !self.can_start() {
            return Err(LifecycleError::CaptureBusy);
        }

        *self = Capture::Capturing;
        Ok(())
    }

    pub(crate) fn stop(&mut self, audio: PendingAudio) -> Result<(), LifecycleError> {
        match self {
            Capture::Capturing => {
                *self = Capture::Captured(audio);
                Ok(())
            }
            _ => Err(LifecycleError::NotCapturing),
        }
    }

    pub(crate) fn begin_naming(&mut self) -> Result<(), LifecycleError> {
        match mem::take(self) {
            Capture::Captured(audio) | Capture::Naming(audio) => {
                *self = Capture::Naming(audio);
                Ok(())
            }
            other => {
                *self = other;
                Err(LifecycleError::NothingCaptured)
            }
        }
    }

    /// Moves to `Uploading`, handing out the audio being named.
    pub(crate) fn take_for_upload(&mut self) -> Result<PendingAudio, LifecycleError> {
        match mem::replace(self, Capture::Uploading) {
            Capture::Naming(audio) => Ok(audio),
            other => {
                *self = other;
                Err(LifecycleError::NothingCaptured)
            }
        }
    }

    /// Drops any captured audio. Not allowed while an upload is running.
    pub(crate) fn discard(&mut self) -> Result<(), LifecycleError> {
        match self {
            Capture::Uploading => Err(LifecycleError::CaptureBusy),
            _ => {
                *self = Capture::Idle;
                Ok(())
            }
        }
    }
}
