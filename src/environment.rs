use std::sync::Arc;

use log::Logger;

use crate::db::Db;
use crate::store::Store;
use crate::summarize::Summarizer;
use crate::urls::Urls;

pub type SafeDb = dyn Db + Send + Sync;

/// Everything a request needs, shared by all handlers.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<SafeDb>,
    pub urls: Arc<Urls>,
    pub store: Arc<dyn Store>,
    pub summarizer: Arc<dyn Summarizer>,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<SafeDb>,
        urls: Arc<Urls>,
        store: Arc<dyn Store>,
        summarizer: Arc<dyn Summarizer>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            urls,
            store,
            summarizer,
            config,
        }
    }
}

/// Default largest accepted upload, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Whether summaries requested by recording ID are written back.
    pub(crate) persist_summaries: bool,

    /// The largest multipart body accepted by the upload route.
    pub(crate) max_upload_bytes: u64,
}

impl Config {
    pub fn new(persist_summaries: bool, max_upload_bytes: u64) -> Self {
        Self {
            persist_summaries,
            max_upload_bytes,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(false, DEFAULT_MAX_UPLOAD_BYTES)
    }
}

/// An environment on in-memory backends, for unit tests.
#[cfg(test)]
pub(crate) fn test_environment() -> (
    Environment,
    Arc<crate::db::memory::MemoryDb>,
    Arc<crate::store::memory::MemoryStore>,
    Arc<crate::summarize::fixed::FixedSummarizer>,
) {
    use url::Url;

    use crate::db::memory::MemoryDb;
    use crate::store::memory::MemoryStore;
    use crate::summarize::fixed::FixedSummarizer;

    let db = Arc::new(MemoryDb::new());
    let store = Arc::new(MemoryStore::new(
        Url::parse("https://blob.example.com/").unwrap(),
    ));
    let summarizer = Arc::new(FixedSummarizer::answering("A lecture about vectors."));

    let environment = Environment::new(
        Arc::new(log::discard()),
        db.clone(),
        Arc::new(Urls::new("https://api.example.com/", "recordings")),
        store.clone(),
        summarizer.clone(),
        Config::default(),
    );

    (environment, db, store, summarizer)
}
