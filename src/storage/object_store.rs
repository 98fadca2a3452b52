use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

/// External collaborator that persists attachment bytes and returns a stored URL.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Stores the bytes under the given key and returns the public URL.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the write fails.
    async fn put(&self, key: &str, mime_type: &str, bytes: Bytes) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3ObjectStore {
    #[must_use]
    pub const fn new(client: Client, bucket: String, public_base_url: Option<String>) -> Self {
        Self { client, bucket, public_base_url }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, mime_type: &str, bytes: Bytes) -> Result<String> {
        let content_length = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type)
            .content_length(content_length)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, key = %key, "S3 upload failed");
                AppError::Internal
            })?;

        Ok(stored_url(self.public_base_url.as_deref(), &self.bucket, key))
    }
}

fn stored_url(public_base_url: Option<&str>, bucket: &str, key: &str) -> String {
    public_base_url.map_or_else(
        || format!("https://{bucket}.s3.amazonaws.com/{key}"),
        |base| format!("{}/{key}", base.trim_end_matches('/')),
    )
}

/// Builds an S3 client from the storage configuration.
pub async fn init_s3_client(config: &StorageConfig) -> Client {
    let region = aws_config::Region::new(config.region.clone());
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        loader = loader.credentials_provider(aws_credential_types::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let sdk_config = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    Client::from_conf(builder.build())
}
