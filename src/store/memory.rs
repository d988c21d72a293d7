use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};
use rusoto_core::RusotoError;
use url::Url;

use crate::errors::BackendError;
use crate::store::Store;

/// An object kept by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryObject {
    pub content_type: String,
    pub raw: Vec<u8>,
}

/// A store that keeps objects in memory. Used by tests and local runs
/// without object storage.
pub struct MemoryStore {
    map: RwLock<HashMap<String, MemoryObject>>,
    base_url: Url,
    fail_uploads: AtomicBool,
}

impl MemoryStore {
    pub fn new(base_url: Url) -> Self {
        MemoryStore {
            map: RwLock::new(HashMap::new()),
            base_url,
            fail_uploads: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `save` fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<MemoryObject> {
        self.map.read().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.map.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        async move {
            self.map.write().unwrap().remove(key);

            Ok(())
        }
        .boxed()
    }

    fn get_url(&self, key: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(key)
            .map_err(|source| BackendError::FailedToGenerateUrl {
                key: key.to_owned(),
                source,
            })
    }

    fn save<'a>(
        &'a self,
        key: &'a str,
        content_type: &'a str,
        raw: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        async move {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(BackendError::UploadFailed {
                    source: RusotoError::Validation("uploads are disabled".to_owned()),
                });
            }

            let object = MemoryObject {
                content_type: content_type.to_owned(),
                raw,
            };
            self.map.write().unwrap().insert(key.to_owned(), object);

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(Url::parse("https://blob.example.com/recordings/").unwrap())
    }

    #[tokio::test]
    async fn uploads_are_retrievable_by_key() {
        let store = store();

        let stored = store
            .upload(vec![1, 2, 3], "audio/webm", "my lecture.webm")
            .await
            .expect("upload");

        assert!(stored.key.ends_with("-my_lecture.webm"));
        assert_eq!(
            stored.url.as_str(),
            format!("https://blob.example.com/recordings/{}", stored.key)
        );
        assert_eq!(
            store.get(&stored.key),
            Some(MemoryObject {
                content_type: "audio/webm".to_owned(),
                raw: vec![1, 2, 3]
            })
        );

        store.delete(&stored.key).await.expect("delete");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn objects_without_a_url_are_removed() {
        // a `mailto:` URL cannot be joined onto
        let store = MemoryStore::new(Url::parse("mailto:audio@example.com").unwrap());

        let result = store.upload(vec![1], "audio/webm", "x.webm").await;

        assert!(matches!(result, Err(BackendError::FailedToGenerateUrl { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failing_uploads_store_nothing() {
        let store = store();
        store.fail_uploads(true);

        let result = store.upload(vec![1], "audio/webm", "x.webm").await;

        assert!(matches!(result, Err(BackendError::UploadFailed { .. })));
        assert!(store.is_empty());
    }
}
