use crate::domain::message::AttachmentMeta;
use crate::error::{AppError, Result};
use crate::storage::object_store::ObjectStore;
use bytes::Bytes;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use uuid::Uuid;

/// Mime types a message attachment may declare.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Clone, Debug)]
struct Metrics {
    uploaded_bytes: Counter<u64>,
    upload_size_bytes: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("encore-messaging");
        Self {
            uploaded_bytes: meter
                .u64_counter("encore_attachments_uploaded_bytes")
                .with_description("Total bytes of attachments uploaded")
                .build(),
            upload_size_bytes: meter
                .u64_histogram("encore_attachments_upload_size_bytes")
                .with_description("Distribution of attachment upload sizes")
                .build(),
        }
    }
}

/// An uploaded file as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub bytes: Bytes,
    pub declared_name: String,
    pub declared_mime_type: String,
}

/// Validates file metadata and delegates byte persistence to the object store.
#[derive(Clone, Debug)]
pub struct AttachmentService {
    store: Arc<dyn ObjectStore>,
    max_size_bytes: usize,
    metrics: Metrics,
}

impl AttachmentService {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, max_size_bytes: usize) -> Self {
        Self { store, max_size_bytes, metrics: Metrics::new() }
    }

    /// Validates the file and stores its bytes, returning the metadata to
    /// embed in the message. Validation strictly precedes the storage call,
    /// so a rejected file leaves no partial write behind.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for an empty, oversized, or
    /// disallowed-type file, `AppError::Internal` if storage fails.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, file),
        fields(name = %file.declared_name, size = file.bytes.len())
    )]
    pub async fn accept(&self, file: IncomingFile) -> Result<AttachmentMeta> {
        self.validate(&file)?;

        let key = Uuid::new_v4().to_string();
        let size_bytes = i64::try_from(file.bytes.len()).unwrap_or(i64::MAX);

        self.metrics.uploaded_bytes.add(file.bytes.len() as u64, &[]);
        self.metrics.upload_size_bytes.record(file.bytes.len() as u64, &[]);

        let url = self.store.put(&key, &file.declared_mime_type, file.bytes).await?;

        tracing::debug!(key = %key, "Attachment stored");

        Ok(AttachmentMeta {
            url,
            mime_type: file.declared_mime_type,
            original_name: file.declared_name,
            size_bytes,
        })
    }

    fn validate(&self, file: &IncomingFile) -> Result<()> {
        if file.bytes.is_empty() {
            return Err(AppError::Validation("Attachment is empty".into()));
        }
        if file.bytes.len() > self.max_size_bytes {
            return Err(AppError::Validation(format!(
                "Attachment exceeds the maximum size of {} bytes",
                self.max_size_bytes
            )));
        }
        if !ALLOWED_MIME_TYPES.contains(&file.declared_mime_type.as_str()) {
            return Err(AppError::Validation(format!(
                "Unsupported attachment type: {}",
                file.declared_mime_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const MAX_BYTES: usize = 10 * 1024 * 1024;

    #[derive(Debug, Default)]
    struct RecordingStore {
        puts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(&self, key: &str, _mime_type: &str, _bytes: Bytes) -> Result<String> {
            self.puts.lock().unwrap().push(key.to_string());
            Ok(format!("https://cdn.example/{key}"))
        }
    }

    fn service(store: Arc<RecordingStore>) -> AttachmentService {
        AttachmentService::new(store as Arc<dyn ObjectStore>, MAX_BYTES)
    }

    fn pdf(bytes: Bytes) -> IncomingFile {
        IncomingFile { bytes, declared_name: "rider.pdf".into(), declared_mime_type: "application/pdf".into() }
    }

    #[tokio::test]
    async fn accepts_an_allowed_file_and_returns_metadata() {
        let store = Arc::new(RecordingStore::default());
        let service = service(Arc::clone(&store));

        let meta = service.accept(pdf(Bytes::from_static(b"%PDF-1.7"))).await.unwrap();

        assert_eq!(meta.mime_type, "application/pdf");
        assert_eq!(meta.original_name, "rider.pdf");
        assert_eq!(meta.size_bytes, 8);
        assert!(meta.url.starts_with("https://cdn.example/"));
        assert_eq!(store.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_oversized_files_before_touching_storage() {
        let store = Arc::new(RecordingStore::default());
        let service = AttachmentService::new(Arc::clone(&store) as Arc<dyn ObjectStore>, 16);

        let result = service.accept(pdf(Bytes::from(vec![0u8; 17]))).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.puts.lock().unwrap().is_empty(), "rejected file must leave no storage write");
    }

    #[tokio::test]
    async fn rejects_disallowed_mime_types() {
        let store = Arc::new(RecordingStore::default());
        let service = service(Arc::clone(&store));

        let file = IncomingFile {
            bytes: Bytes::from_static(b"MZ"),
            declared_name: "setup.exe".into(),
            declared_mime_type: "application/x-msdownload".into(),
        };

        assert!(matches!(service.accept(file).await, Err(AppError::Validation(_))));
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_empty_files() {
        let store = Arc::new(RecordingStore::default());
        let service = service(Arc::clone(&store));

        assert!(matches!(service.accept(pdf(Bytes::new())).await, Err(AppError::Validation(_))));
    }
}
