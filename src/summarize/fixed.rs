use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt};
use url::Url;

use super::Summarizer;
use crate::errors::BackendError;

/// What a [`FixedSummarizer`] answers with.
#[derive(Clone, Debug)]
pub enum Outcome {
    Text(String),
    FetchFails,
    GenerationFails,
}

/// A summarizer that never leaves the process. Answers every call the
/// same way and remembers which URLs it was asked about.
pub struct FixedSummarizer {
    outcome: Mutex<Outcome>,
    requests: Mutex<Vec<Url>>,
}

impl FixedSummarizer {
    pub fn new(outcome: Outcome) -> Self {
        FixedSummarizer {
            outcome: Mutex::new(outcome),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn answering(text: impl Into<String>) -> Self {
        FixedSummarizer::new(Outcome::Text(text.into()))
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

impl Summarizer for FixedSummarizer {
    fn summarize<'a>(&'a self, audio_url: &'a Url) -> BoxFuture<'a, Result<String, BackendError>> {
        async move {
            self.requests.lock().unwrap().push(audio_url.clone());

            let outcome = self.outcome.lock().unwrap().clone();

            match outcome {
                Outcome::Text(text) if text.trim().is_empty() => {
                    Ok(super::EMPTY_SUMMARY_PLACEHOLDER.to_owned())
                }
                Outcome::Text(text) => Ok(text),
                Outcome::FetchFails => Err(BackendError::FetchFailed {
                    url: audio_url.to_string(),
                    reason: "status 404 Not Found".to_owned(),
                }),
                Outcome::GenerationFails => {
                    Err(BackendError::GenerationFailed("model unavailable".to_owned()))
                }
            }
        }
        .boxed()
    }
}
