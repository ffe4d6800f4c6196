use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::config::S3Config;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum AssetStoreError {
    /// Network-level failure worth another attempt.
    #[error("asset store unreachable: {0}")]
    Transient(String),
    #[error("asset store rejected the request: {0}")]
    Rejected(String),
}

impl AssetStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AssetStoreError::Transient(_))
    }
}

/// Where a stored binary ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub asset_id: String,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `bytes` under `folder`; the returned `asset_id` is what
    /// [`AssetStore::delete`] takes.
    async fn store(&self, bytes: Vec<u8>, folder: &str) -> Result<StoredAsset, AssetStoreError>;
    /// Deleting an absent asset succeeds.
    async fn delete(&self, asset_id: &str) -> Result<(), AssetStoreError>;
}

fn classify<E, R>(e: SdkError<E, R>) -> AssetStoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let transient = matches!(
        e,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    );
    let msg = format!("{}", DisplayErrorContext(&e));
    if transient {
        AssetStoreError::Transient(msg)
    } else {
        AssetStoreError::Rejected(msg)
    }
}

/// S3 / MinIO backed photo storage.
pub struct S3AssetStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    public_url: String,
    retry: RetryPolicy,
}

impl S3AssetStore {
    pub async fn new(cfg: &S3Config, retry: RetryPolicy) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(cfg.region.clone()))
            .endpoint_url(cfg.endpoint.clone());
        if !cfg.access_key.is_empty() && !cfg.secret_key.is_empty() {
            let creds = Credentials::new(cfg.access_key.clone(), cfg.secret_key.clone(), None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // MinIO without wildcard DNS needs path-style addressing
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf).force_path_style(true).build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("initialized S3 asset store (bucket '{}')", cfg.bucket);

        let store = Self {
            bucket: cfg.bucket.clone(),
            client,
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
            retry,
        };
        store.ensure_bucket().await?;
        Ok(store)
    }

    async fn ensure_bucket(&self) -> anyhow::Result<()> {
        let bucket = &self.bucket;
        if let Err(e) = self.client.head_bucket().bucket(bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {}", DisplayErrorContext(&e));
            // boot-time call: every failure is worth retrying
            let client = &self.client;
            RetryPolicy { max_attempts: 8, ..self.retry }
                .run(
                    "s3_create_bucket",
                    move || async move { client.create_bucket().bucket(bucket).send().await.map_err(classify) },
                    |_| true,
                )
                .await
                .map_err(|e| {
                    error!("create_bucket failed for '{bucket}': {e}");
                    anyhow::anyhow!("failed to ensure bucket '{bucket}': {e}")
                })?;
            info!("created bucket '{bucket}'");
        }
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

fn key_for(folder: &str, bytes: &[u8]) -> (String, String) {
    let kind = infer::get(bytes);
    let ext = kind.map(|t| t.extension()).unwrap_or("bin");
    let mime = kind
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let key = format!("{}/{}.{}", folder.trim_matches('/'), uuid::Uuid::new_v4(), ext);
    (key, mime)
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn store(&self, bytes: Vec<u8>, folder: &str) -> Result<StoredAsset, AssetStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let (key, mime) = key_for(folder, &bytes);
        let (client, bucket, key_ref, mime, bytes) = (&self.client, &self.bucket, &key, &mime, &bytes);
        let put = move || async move {
            client
                .put_object()
                .bucket(bucket)
                .key(key_ref)
                .body(ByteStream::from(bytes.clone()))
                .content_type(mime.as_str())
                .send()
                .await
                .map_err(classify)
        };
        if let Err(e) = self.retry.run("s3_put_object", put, AssetStoreError::is_transient).await {
            error!("put_object failed key={key} bucket={} err={e}", self.bucket);
            return Err(e);
        }
        Ok(StoredAsset { url: self.url_for(&key), asset_id: key })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), AssetStoreError> {
        let (client, bucket) = (&self.client, &self.bucket);
        let del = move || async move {
            client
                .delete_object()
                .bucket(bucket)
                .key(asset_id)
                .send()
                .await
                .map_err(classify)
        };
        self.retry
            .run("s3_delete_object", del, AssetStoreError::is_transient)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("delete_object failed key={asset_id} bucket={} err={e}", self.bucket);
                e
            })
    }
}

pub async fn build_asset_store(cfg: &S3Config, retry: RetryPolicy) -> anyhow::Result<Arc<dyn AssetStore>> {
    Ok(Arc::new(S3AssetStore::new(cfg, retry).await?))
}
