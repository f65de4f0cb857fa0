//! Artifact storage for boleta PDFs.
//!
//! Keys are relative, `/`-separated paths inside one bucket, e.g.
//! `{member_id}/{numero}.pdf`. Uploads overwrite existing objects.

use crate::error::InvoicingError;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

/// Cache lifetime advertised for stored receipts, in seconds.
pub const CACHE_CONTROL_SECS: u32 = 3600;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), InvoicingError>;
}

/// Reject keys that could escape the bucket.
pub fn validate_key(key: &str) -> Result<(), InvoicingError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(InvoicingError::Storage(format!("Invalid storage key: {}", key)));
    }
    Ok(())
}

/// Filesystem storage: `{base_path}/{bucket}/{key}`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>, bucket: &str) -> Result<Self, InvoicingError> {
        validate_key(bucket)?;
        let root = base_path.into().join(bucket);
        if !root.exists() {
            fs::create_dir_all(&root).await?;
        }
        Ok(Self { root })
    }

    /// Filesystem location of a key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), InvoicingError> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        info!(key = %key, "Artifact stored locally");
        Ok(())
    }
}

/// Hosted object storage reached over HTTP
/// (`POST {base_url}/object/{bucket}/{key}`).
pub struct HttpObjectStorage {
    client: Client,
    base_url: String,
    bucket: String,
    token: Option<Secret<String>>,
}

impl HttpObjectStorage {
    pub fn new(base_url: &str, bucket: &str, token: Option<Secret<String>>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token,
        }
    }
}

#[async_trait]
impl Storage for HttpObjectStorage {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), InvoicingError> {
        validate_key(key)?;
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, key);

        let mut request = self
            .client
            .post(&url)
            .header("content-type", content_type)
            .header("cache-control", format!("max-age={}", CACHE_CONTROL_SECS))
            .header("x-upsert", "true")
            .body(data);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| InvoicingError::Storage(format!("Error al guardar en Storage: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvoicingError::Storage(format!(
                "Error al guardar en Storage: {} {}",
                status.as_u16(),
                body
            )));
        }

        info!(key = %key, bucket = %self.bucket, "Artifact uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn keys_must_stay_inside_the_bucket() {
        assert!(validate_key("42/B001-77.pdf").is_ok());
        for bad in ["", "/etc/passwd", "../x.pdf", "42/../../x", "42//x.pdf", "a\\b"] {
            assert!(validate_key(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[tokio::test]
    async fn local_upload_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "comprobante-de-pago")
            .await
            .unwrap();
        storage
            .upload("42/B001-77.pdf", b"first".to_vec(), "application/pdf")
            .await
            .unwrap();
        storage
            .upload("42/B001-77.pdf", b"second".to_vec(), "application/pdf")
            .await
            .unwrap();
        let stored = std::fs::read(dir.path().join("comprobante-de-pago/42/B001-77.pdf")).unwrap();
        assert_eq!(stored, b"second");
    }

    #[tokio::test]
    async fn http_upload_sends_upsert_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/object/comprobante-de-pago/42/B001-77.pdf"))
            .and(header("x-upsert", "true"))
            .and(header("cache-control", "max-age=3600"))
            .and(header("content-type", "application/pdf"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = HttpObjectStorage::new(
            &server.uri(),
            "comprobante-de-pago",
            Some(Secret::new("service-key".to_string())),
        );
        storage
            .upload("42/B001-77.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_upload_failure_is_a_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let storage = HttpObjectStorage::new(&server.uri(), "comprobante-de-pago", None);
        let err = storage
            .upload("42/B001-77.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Storage(ref m) if m.contains("403")));
    }
}
