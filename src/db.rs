use futures::future::BoxFuture;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::recording::{NewRecording, Recording, RecordingName};

pub mod memory;

pub trait Db {
    /// Lists a user’s recordings, newest first.
    fn list_by_user<'a>(&'a self, user_id: &'a str)
        -> BoxFuture<'a, Result<Vec<Recording>, BackendError>>;

    fn insert(&self, recording: NewRecording) -> BoxFuture<Result<Recording, BackendError>>;

    fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Recording>, BackendError>>;

    /// Renames a recording and returns it as it is after the update.
    fn rename(&self, id: &Uuid, name: RecordingName)
        -> BoxFuture<Result<Recording, BackendError>>;

    fn delete(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>>;

    fn set_summary(&self, id: &Uuid, summary: String)
        -> BoxFuture<Result<Recording, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::OffsetDateTime;
    use url::Url;
    use uuid::Uuid;

    use crate::errors::BackendError;
    use crate::recording::{NewRecording, Recording, RecordingName};

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }

        /// Waits for in-flight queries and closes every connection.
        pub async fn close(&self) {
            self.pool.close().await;
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn list_by_user<'a>(
            &'a self,
            user_id: &'a str,
        ) -> BoxFuture<'a, Result<Vec<Recording>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/list_by_user.sql"));

                let recordings = query
                    .bind(user_id)
                    .try_map(|row: PgRow| recording_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(recordings)
            }
            .boxed()
        }

        fn insert(&self, recording: NewRecording) -> BoxFuture<Result<Recording, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/create.sql"));
                let details = recording.details();

                let recording = query
                    .bind(details.user_id())
                    .bind(details.email())
                    .bind(details.name().as_str())
                    .bind(recording.audio_url().as_str())
                    .bind(recording.date())
                    .try_map(|row: PgRow| recording_from_row(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(recording)
            }
            .boxed()
        }

        fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Recording>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve.sql"));

                let recording = query
                    .bind(id)
                    .try_map(|row: PgRow| recording_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(recording)
            }
            .boxed()
        }

        fn rename(
            &self,
            id: &Uuid,
            name: RecordingName,
        ) -> BoxFuture<Result<Recording, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/rename.sql"));

                query
                    .bind(id)
                    .bind(name.as_str())
                    .try_map(|row: PgRow| recording_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .ok_or(BackendError::NonExistentId(id))
            }
            .boxed()
        }

        fn delete(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentId(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn set_summary(
            &self,
            id: &Uuid,
            summary: String,
        ) -> BoxFuture<Result<Recording, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/update_summary.sql"));

                query
                    .bind(id)
                    .bind(summary)
                    .try_map(|row: PgRow| recording_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .ok_or(BackendError::NonExistentId(id))
            }
            .boxed()
        }
    }

    fn recording_from_row(row: &PgRow) -> Result<Recording, sqlx::Error> {
        let url: String = try_get(row, "audio_url")?;
        let audio_url = Url::parse(&url).map_err(|source| {
            // only URLs we generated or validated are written, but a
            // hand-edited row should still fail cleanly
            sqlx::Error::Decode(Box::new(BackendError::UnableToParseUrl {
                url: url.clone(),
                source,
            }))
        })?;

        let date: OffsetDateTime = try_get(row, "date")?;

        Ok(Recording {
            id: try_get(row, "id")?,
            user_id: try_get(row, "user_id")?,
            email: try_get(row, "email")?,
            name: try_get(row, "name")?,
            audio_url,
            date,
            summary: try_get(row, "summary")?,
        })
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        BackendError::Sqlx { source: error }
    }
}
