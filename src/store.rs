use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rusoto_s3::{DeleteObjectRequest, PutObjectRequest, S3Client, StreamingBody, S3};
use url::Url;
use uuid::Uuid;

use crate::errors::BackendError;

pub mod memory;

/// The longest sanitized name kept in an object key.
const MAX_NAME_LENGTH: usize = 100;

/// An uploaded object.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    /// The key under which it was saved.
    pub key: String,

    /// Where it can be fetched from.
    pub url: Url,
}

pub trait Store: Send + Sync {
    /// Deletes the given object.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Gets the public URL for the given object.
    fn get_url(&self, key: &str) -> Result<Url, BackendError>;

    /// Saves the given data under the given key.
    fn save<'a>(
        &'a self,
        key: &'a str,
        content_type: &'a str,
        raw: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Saves the given data under a fresh key derived from
    /// `suggested_name` and returns its public URL. If no URL can be
    /// derived the object is deleted again; a failure to delete it is
    /// ignored in favour of the original error.
    fn upload<'a>(
        &'a self,
        raw: Vec<u8>,
        content_type: &'a str,
        suggested_name: &'a str,
    ) -> BoxFuture<'a, Result<StoredObject, BackendError>> {
        async move {
            let key = unique_key(suggested_name);

            self.save(&key, content_type, raw).await?;

            match self.get_url(&key) {
                Ok(url) => Ok(StoredObject { key, url }),
                Err(e) => {
                    let _ = self.delete(&key).await;

                    Err(e)
                }
            }
        }
        .boxed()
    }
}

/// Prefixes a random token to a filesystem- and URL-safe version of
/// `suggested_name`.
pub fn unique_key(suggested_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4().to_simple(), sanitize(suggested_name))
}

fn sanitize(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut last_was_space = false;

    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                sanitized.push('_');
            }
            last_was_space = true;
            continue;
        }

        last_was_space = false;

        if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
            sanitized.push(c);
        } else {
            sanitized.push('_');
        }
    }

    let sanitized: String = sanitized.chars().take(MAX_NAME_LENGTH).collect();

    if sanitized.is_empty() {
        "recording".to_owned()
    } else {
        sanitized
    }
}

/// A store that saves its data to S3.
pub struct S3Store {
    client: Arc<S3Client>,
    acl: String,
    bucket: String,
    cache_control: String,
    base_url: Url,
}

impl S3Store {
    /// Creates a new instance. `base_url` must end with a slash.
    pub fn new(
        client: Arc<S3Client>,
        acl: String,
        bucket: String,
        cache_control: String,
        base_url: Url,
    ) -> Self {
        Self {
            client,
            acl,
            bucket,
            cache_control,
            base_url,
        }
    }

    pub fn from_env() -> Result<Self, rusoto_core::request::TlsError> {
        use rusoto_core::request::HttpClient;
        use rusoto_core::Region;
        use rusoto_credential::StaticProvider;

        use crate::config::{get_variable, get_variable_or};

        let access_key = get_variable("S3_ACCESS_KEY");
        let secret_access_key = get_variable("S3_SECRET_ACCESS_KEY");

        let region = Region::Custom {
            name: get_variable("S3_REGION_NAME"),
            endpoint: get_variable("S3_ENDPOINT"),
        };

        let bucket = get_variable("S3_BUCKET_NAME");
        let acl = get_variable_or("BACKEND_S3_ACL", "public-read");
        let cache_control = get_variable_or("BACKEND_S3_CACHE_CONTROL", "public, max-age=31536000");

        let client = Arc::new(S3Client::new_with(
            HttpClient::new()?,
            StaticProvider::new_minimal(access_key, secret_access_key),
            region,
        ));

        let base_url = Url::parse(&get_variable("S3_BASE_URL")).expect("parse S3_BASE_URL");

        Ok(S3Store::new(client, acl, bucket, cache_control, base_url))
    }
}

impl Store for S3Store {
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        delete(self, key).boxed()
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
        upload(self, key, content_type, raw).boxed()
    }
}

async fn delete(store: &S3Store, key: &str) -> Result<(), BackendError> {
    let request = DeleteObjectRequest {
        bucket: store.bucket.clone(),
        key: key.to_owned(),
        ..Default::default()
    };

    store
        .client
        .delete_object(request)
        .await
        .map(|_| ())
        .map_err(|source| BackendError::DeleteFailed { source })
}

async fn upload(
    store: &S3Store,
    key: &str,
    content_type: &str,
    raw: Vec<u8>,
) -> Result<(), BackendError> {
    let len = raw.len() as i64;

    let request = PutObjectRequest {
        acl: Some(store.acl.clone()),
        body: Some(StreamingBody::from(raw)),
        bucket: store.bucket.clone(),
        cache_control: Some(store.cache_control.clone()),
        content_length: Some(len),
        content_type: Some(content_type.to_owned()),
        key: key.to_owned(),
        ..Default::default()
    };

    match store.client.put_object(request).await {
        Ok(_) => Ok(()),
        Err(source) => Err(BackendError::UploadFailed { source }),
    }
}
