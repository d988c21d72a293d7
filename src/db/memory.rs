use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Db;
use crate::errors::BackendError;
use crate::recording::{NewRecording, Recording, RecordingName};

/// A metadata store held in memory, in insertion order. Used by tests and
/// local runs without a database.
#[derive(Default)]
pub struct MemoryDb {
    recordings: RwLock<Vec<Recording>>,
    closed: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the connection were lost.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Every stored recording, regardless of owner.
    pub fn all(&self) -> Vec<Recording> {
        self.recordings.read().unwrap().clone()
    }

    fn check_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BackendError::Sqlx {
                source: sqlx::Error::PoolClosed,
            })
        } else {
            Ok(())
        }
    }

    fn update(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut Recording),
    ) -> Result<Recording, BackendError> {
        self.check_open()?;

        let mut recordings = self.recordings.write().unwrap();
        let recording = recordings
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(BackendError::NonExistentId(id))?;

        change(recording);

        Ok(recording.clone())
    }
}

impl Db for MemoryDb {
    fn list_by_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Recording>, BackendError>> {
        async move {
            self.check_open()?;

            // newest insertion first, so that the stable sort breaks date
            // ties the same way
            let mut recordings: Vec<Recording> = self
                .recordings
                .read()
                .unwrap()
                .iter()
                .rev()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            recordings.sort_by(|a, b| b.date.cmp(&a.date));

            Ok(recordings)
        }
        .boxed()
    }

    fn insert(&self, recording: NewRecording) -> BoxFuture<Result<Recording, BackendError>> {
        async move {
            self.check_open()?;

            let NewRecording {
                details,
                audio_url,
                date,
            } = recording;

            let recording = Recording {
                id: Uuid::new_v4(),
                user_id: details.user_id().to_owned(),
                email: details.email().to_owned(),
                name: details.name().as_str().to_owned(),
                audio_url,
                date: date.unwrap_or_else(OffsetDateTime::now_utc),
                summary: None,
            };

            self.recordings.write().unwrap().push(recording.clone());

            Ok(recording)
        }
        .boxed()
    }

    fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Recording>, BackendError>> {
        let id = *id;

        async move {
            self.check_open()?;

            let recordings = self.recordings.read().unwrap();

            Ok(recordings.iter().find(|r| r.id == id).cloned())
        }
        .boxed()
    }

    fn rename(
        &self,
        id: &Uuid,
        name: RecordingName,
    ) -> BoxFuture<Result<Recording, BackendError>> {
        let id = *id;

        async move { self.update(id, |r| r.name = name.into()) }.boxed()
    }

    fn delete(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
        let id = *id;

        async move {
            self.check_open()?;

            let mut recordings = self.recordings.write().unwrap();
            let index = recordings
                .iter()
                .position(|r| r.id == id)
                .ok_or(BackendError::NonExistentId(id))?;
            recordings.remove(index);

            Ok(())
        }
        .boxed()
    }

    fn set_summary(
        &self,
        id: &Uuid,
        summary: String,
    ) -> BoxFuture<Result<Recording, BackendError>> {
        let id = *id;

        async move { self.update(id, |r| r.summary = Some(summary)) }.boxed()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use url::Url;

    use super::*;
    use crate::recording::RecordingDetails;

    fn new_recording(user_id: &str, name: &str, timestamp: Option<i64>) -> NewRecording {
        RecordingDetails::new(
            Some(user_id.to_owned()),
            Some("a@x.com".to_owned()),
            Some(name.to_owned()),
        )
        .expect("valid details")
        .with_audio(
            Url::parse("https://blob.example.com/1.webm").unwrap(),
            timestamp.map(OffsetDateTime::from_unix_timestamp),
        )
    }

    #[tokio::test]
    async fn newest_insert_is_listed_first_with_a_fresh_id() {
        let db = MemoryDb::new();

        let first = db.insert(new_recording("u1", "one", None)).await.unwrap();
        let second = db.insert(new_recording("u1", "two", None)).await.unwrap();
        db.insert(new_recording("u2", "other", None)).await.unwrap();

        assert_ne!(first.id, second.id);

        let listed = db.list_by_user("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
    }

    #[tokio::test]
    async fn rename_changes_only_the_name() {
        let db = MemoryDb::new();
        let original = db.insert(new_recording("u1", "Lec1", None)).await.unwrap();

        let renamed = db
            .rename(&original.id, RecordingName::new("Lec1-renamed").unwrap())
            .await
            .unwrap();

        assert_eq!(renamed.name, "Lec1-renamed");
        assert_eq!(
            Recording {
                name: original.name.clone(),
                ..renamed.clone()
            },
            original
        );
        assert_eq!(db.list_by_user("u1").await.unwrap(), vec![renamed]);
    }

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let db = MemoryDb::new();
        let recording = db.insert(new_recording("u1", "Lec1", None)).await.unwrap();

        db.delete(&recording.id).await.expect("first delete");
        assert!(db.list_by_user("u1").await.unwrap().is_empty());

        match db.delete(&recording.id).await {
            Err(BackendError::NonExistentId(id)) => assert_eq!(id, recording.id),
            other => panic!("expected NonExistentId, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let db = MemoryDb::new();
        let id = Uuid::new_v4();

        assert!(db.retrieve(&id).await.unwrap().is_none());
        assert!(matches!(
            db.rename(&id, RecordingName::new("x").unwrap()).await,
            Err(BackendError::NonExistentId(_))
        ));
        assert!(matches!(
            db.set_summary(&id, "text".to_owned()).await,
            Err(BackendError::NonExistentId(_))
        ));
    }

    #[tokio::test]
    async fn closed_store_is_unavailable() {
        let db = MemoryDb::new();
        db.close();

        let error = db.list_by_user("u1").await.unwrap_err();
        assert_eq!(error.kind(), crate::errors::ErrorKind::StoreUnavailable);
        assert!(db.insert(new_recording("u1", "x", None)).await.is_err());
        assert!(db.all().is_empty());

        db.reopen();
        assert!(db.list_by_user("u1").await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn listing_is_sorted_by_date_descending(timestamps in prop::collection::vec(0i64..2_000_000_000, 0..20)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let listed = runtime.block_on(async {
                let db = MemoryDb::new();

                for (i, timestamp) in timestamps.iter().enumerate() {
                    db.insert(new_recording("u1", &format!("lecture {}", i), Some(*timestamp)))
                        .await
                        .unwrap();
                }

                db.list_by_user("u1").await.unwrap()
            });

            prop_assert_eq!(listed.len(), timestamps.len());
            for pair in listed.windows(2) {
                prop_assert!(pair[0].date >= pair[1].date);
            }
        }
    }
}
