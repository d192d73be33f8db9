// src/store/mod.rs
use anyhow::{Context, Result};
use futures::TryStreamExt;
use indexmap::IndexMap;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path,
    prefix::PrefixStore, ObjectStore, ObjectStoreScheme, PutPayload,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::MergeError;
use crate::keys::extract_timestamp;

pub mod csv_rows;

pub use csv_rows::DATE_COLUMN;

/// One CSV line: column name → value, in header order.
pub type Row = IndexMap<String, String>;

/// CSV-level list/read/write over any `object_store` backend.
#[derive(Clone)]
pub struct CsvStore {
    container: String,
    inner: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for CsvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvStore")
            .field("container", &self.container)
            .field("inner", &self.inner.to_string())
            .finish()
    }
}

impl CsvStore {
    /// Open a container. A bare name is an S3 bucket (`my-bucket` → `s3://my-bucket`);
    /// `s3://`, `file://` and `memory://` URLs select the backend explicitly.
    /// S3 credentials and region come from the usual `AWS_*` environment variables.
    pub fn open(container: &str) -> Result<Self> {
        let url_str = if container.contains("://") {
            container.to_string()
        } else {
            format!("s3://{}", container)
        };
        let invalid = |reason: String| MergeError::InvalidLocation {
            container: container.to_string(),
            reason,
        };

        let url = Url::parse(&url_str).map_err(|e| invalid(e.to_string()))?;
        let (scheme, root) = ObjectStoreScheme::parse(&url).map_err(|e| invalid(e.to_string()))?;

        let inner: Arc<dyn ObjectStore> = match scheme {
            ObjectStoreScheme::AmazonS3 => {
                let s3 = AmazonS3Builder::from_env()
                    .with_url(url.as_str())
                    .build()
                    .map_err(|e| invalid(e.to_string()))?;
                if root.as_ref().is_empty() {
                    Arc::new(s3)
                } else {
                    Arc::new(PrefixStore::new(s3, root))
                }
            }
            ObjectStoreScheme::Local => {
                let dir = url
                    .to_file_path()
                    .map_err(|_| invalid("not a local directory path".to_string()))?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(&dir).map_err(|e| invalid(e.to_string()))?,
                )
            }
            ObjectStoreScheme::Memory => Arc::new(InMemory::new()),
            other => return Err(invalid(format!("unsupported scheme {:?}", other)).into()),
        };

        debug!(container, store = %inner, "opened object store");
        Ok(Self {
            container: container.to_string(),
            inner,
        })
    }

    pub fn from_store(container: impl Into<String>, inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            container: container.into(),
            inner,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// All keys starting with `prefix`, compared as plain strings the way S3
    /// prefixes are (`bricks/2023` matches `bricks/2023-04-13.csv`).
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        // object_store lists by directory, so list the parent and filter
        let prefix = prefix.trim_start_matches('/');
        let dir = prefix.rfind('/').map(|i| &prefix[..i]).unwrap_or("");

        let dir_path = if dir.is_empty() {
            None
        } else {
            Some(
                Path::parse(dir)
                    .with_context(|| format!("invalid prefix '{}' in {}", prefix, self.container))?,
            )
        };
        let metas: Vec<_> = self
            .inner
            .list(dir_path.as_ref())
            .try_collect()
            .await
            .with_context(|| format!("listing {}/{}", self.container, prefix))?;

        let keys: Vec<String> = metas
            .into_iter()
            .map(|m| m.location.to_string())
            .filter(|k| k.starts_with(prefix))
            .collect();
        debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    /// Read an object as rows; with `add_timestamp`, each row gets a `date`
    /// column holding the key's embedded timestamp ("" if it has none).
    pub async fn read_rows(&self, key: &str, add_timestamp: bool) -> Result<Vec<Row>> {
        let path = Path::parse(key)
            .with_context(|| format!("invalid object key '{}' in {}", key, self.container))?;
        let bytes = self
            .inner
            .get(&path)
            .await
            .with_context(|| format!("fetching {}/{}", self.container, key))?
            .bytes()
            .await
            .with_context(|| format!("reading body of {}/{}", self.container, key))?;

        let mut rows = csv_rows::decode_rows(&bytes)
            .with_context(|| format!("decoding CSV {}/{}", self.container, key))?;
        if add_timestamp {
            csv_rows::stamp_rows(&mut rows, extract_timestamp(key).as_deref());
        }
        Ok(rows)
    }

    /// Write rows as a single CSV object, header from the first row.
    /// Returns the number of bytes uploaded.
    pub async fn write_rows(&self, key: &str, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Err(MergeError::NoRows {
                key: key.to_string(),
            }
            .into());
        }
        let path = Path::parse(key)
            .with_context(|| format!("invalid object key '{}' in {}", key, self.container))?;
        let data = csv_rows::encode_rows(rows)
            .with_context(|| format!("encoding CSV for {}/{}", self.container, key))?;
        let len = data.len();

        self.inner
            .put(&path, PutPayload::from(data))
            .await
            .with_context(|| format!("uploading {}/{}", self.container, key))?;

        info!(container = %self.container, key, bytes = len, rows = rows.len(), "uploaded");
        Ok(len)
    }
}
