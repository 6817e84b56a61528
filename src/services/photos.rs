//! Direct photo upload for an existing receipt.

use bytes::Bytes;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{photo, PhotoType};
use crate::services::saga::Compensations;
use crate::storage::BlobStore;
use crate::store::{NewPhoto, ReceiptStore};

/// A file part pulled out of the multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Fields of `POST /receipt/upload-photo` as received.
#[derive(Debug, Clone, Default)]
pub struct PhotoUpload {
    pub receipt_id: Option<String>,
    pub photo_type: Option<String>,
    pub file: Option<UploadedFile>,
}

/// Builds `receipts/{receipt_id}/{millis}-{random}.{ext}`.
fn blob_path(receipt_id: Uuid, file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!(
        "receipts/{}/{}-{}.{}",
        receipt_id,
        Utc::now().timestamp_millis(),
        suffix,
        ext
    )
}

#[derive(Clone)]
pub struct PhotoService {
    receipts: Arc<dyn ReceiptStore>,
    blobs: Arc<dyn BlobStore>,
}

impl PhotoService {
    pub fn new(receipts: Arc<dyn ReceiptStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { receipts, blobs }
    }

    /// Stores the file in blob storage and records a photo row for the
    /// receipt. The blob is removed again if the row cannot be written.
    #[instrument(skip(self, upload))]
    pub async fn upload(&self, upload: PhotoUpload) -> Result<photo::Model, ServiceError> {
        let receipt_id = upload
            .receipt_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("Missing required field: receipt_id".to_string())
            })?;
        let receipt_id = Uuid::parse_str(receipt_id)
            .map_err(|_| ServiceError::ValidationError("Invalid receipt_id".to_string()))?;
        let file = upload
            .file
            .ok_or_else(|| ServiceError::ValidationError("No file uploaded".to_string()))?;
        let photo_type = match upload.photo_type.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse::<PhotoType>().map_err(|_| {
                ServiceError::ValidationError(
                    "Invalid photo_type. Must be one of: general, defect, label, package"
                        .to_string(),
                )
            })?,
            _ => PhotoType::General,
        };

        self.receipts
            .find_receipt(receipt_id)
            .await
            .map_err(|e| ServiceError::dependency("Failed to load receipt", e))?
            .ok_or_else(|| ServiceError::NotFound("Receipt not found".to_string()))?;

        let path = blob_path(receipt_id, file.file_name.as_deref());
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_size = i64::try_from(file.bytes.len()).ok();

        let url = self
            .blobs
            .put(&path, file.bytes, &content_type)
            .await
            .map_err(|e| {
                error!(path = %path, error = %e, "blob upload failed");
                ServiceError::dependency("Failed to upload file to storage", e)
            })?;

        let mut compensations = Compensations::new("upload_photo");
        {
            let blobs = self.blobs.clone();
            let path = path.clone();
            compensations.register("delete_blob", move || async move {
                blobs.delete(&path).await
            });
        }

        let inserted = self
            .receipts
            .insert_photos(vec![NewPhoto {
                receipt_id,
                defect_id: None,
                photo_url: url,
                photo_type,
                file_size,
                mime_type: Some(content_type),
                uploaded_at: Utc::now(),
            }])
            .await;

        match inserted.map(|rows| rows.into_iter().next()) {
            Ok(Some(photo)) => {
                compensations.commit();
                info!(receipt_id = %receipt_id, path = %path, "photo uploaded");
                Ok(photo)
            }
            Ok(None) => {
                let report = compensations.compensate().await;
                Err(ServiceError::InternalError(
                    report.annotate("photo insert returned no rows"),
                ))
            }
            Err(err) => {
                error!(receipt_id = %receipt_id, error = %err, "photo row insert failed");
                let report = compensations.compensate().await;
                Err(ServiceError::dependency(
                    "Failed to save photo record",
                    report.annotate(err),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobError, InMemoryBlobStore, MockBlobStore};
    use crate::store::{MockReceiptStore, StoreError};
    use assert_matches::assert_matches;

    fn jpeg() -> UploadedFile {
        UploadedFile {
            file_name: Some("label.JPG".into()),
            content_type: Some("image/jpeg".into()),
            bytes: Bytes::from_static(b"\xff\xd8\xff"),
        }
    }

    fn receipt_exists(store: &mut MockReceiptStore) {
        store.expect_find_receipt().returning(|id| {
            Ok(Some(crate::models::receipt::Model {
                id,
                receipt_no: "RCV-20240101-000001".into(),
                item_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                qr_code: None,
                quantity: 1,
                defect_quantity: 0,
                status: crate::models::ReceiptStatus::Completed,
                location: None,
                notes: None,
                received_at: Utc::now(),
                updated_at: None,
            }))
        });
    }

    #[test]
    fn blob_paths_keep_the_extension() {
        let id = Uuid::new_v4();
        let path = blob_path(id, Some("label.JPG"));
        assert!(path.starts_with(&format!("receipts/{id}/")));
        assert!(path.ends_with(".jpg"));
        assert!(blob_path(id, Some("noext")).ends_with(".bin"));
        assert!(blob_path(id, None).ends_with(".bin"));
    }

    #[tokio::test]
    async fn rejects_missing_fields_before_any_io() {
        let svc = PhotoService::new(
            Arc::new(MockReceiptStore::new()),
            Arc::new(MockBlobStore::new()),
        );
        let err = svc
            .upload(PhotoUpload {
                file: Some(jpeg()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Missing required field: receipt_id");

        let err = svc
            .upload(PhotoUpload {
                receipt_id: Some(Uuid::new_v4().to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "No file uploaded");

        let err = svc
            .upload(PhotoUpload {
                receipt_id: Some(Uuid::new_v4().to_string()),
                photo_type: Some("selfie".into()),
                file: Some(jpeg()),
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn unknown_receipt_is_not_found() {
        let mut store = MockReceiptStore::new();
        store.expect_find_receipt().returning(|_| Ok(None));
        let svc = PhotoService::new(Arc::new(store), Arc::new(MockBlobStore::new()));

        let err = svc
            .upload(PhotoUpload {
                receipt_id: Some(Uuid::new_v4().to_string()),
                photo_type: None,
                file: Some(jpeg()),
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg == "Receipt not found");
    }

    #[tokio::test]
    async fn blob_failure_writes_no_row() {
        let mut store = MockReceiptStore::new();
        receipt_exists(&mut store);
        let mut blobs = MockBlobStore::new();
        blobs.expect_put().returning(|_, _, _| {
            Err(BlobError::Rejected {
                status: 503,
                body: "unavailable".into(),
            })
        });
        let svc = PhotoService::new(Arc::new(store), Arc::new(blobs));

        let err = svc
            .upload(PhotoUpload {
                receipt_id: Some(Uuid::new_v4().to_string()),
                photo_type: Some("label".into()),
                file: Some(jpeg()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.response_message(), "Failed to upload file to storage");
    }

    #[tokio::test]
    async fn failed_row_insert_removes_the_blob() {
        let mut store = MockReceiptStore::new();
        receipt_exists(&mut store);
        store
            .expect_insert_photos()
            .returning(|_| Err(StoreError::Backend("constraint".into())));
        let blobs = Arc::new(InMemoryBlobStore::new());
        let svc = PhotoService::new(Arc::new(store), blobs.clone());

        let err = svc
            .upload(PhotoUpload {
                receipt_id: Some(Uuid::new_v4().to_string()),
                photo_type: None,
                file: Some(jpeg()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.response_message(), "Failed to save photo record");
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn a_blob_left_behind_is_reported_in_details() {
        let mut store = MockReceiptStore::new();
        receipt_exists(&mut store);
        store
            .expect_insert_photos()
            .returning(|_| Err(StoreError::Backend("constraint".into())));
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_put()
            .returning(|path, _, _| Ok(format!("https://cdn.example.com/{path}")));
        blobs.expect_delete().times(1).returning(|_| {
            Err(BlobError::Rejected {
                status: 500,
                body: "busy".into(),
            })
        });
        let svc = PhotoService::new(Arc::new(store), Arc::new(blobs));

        let err = svc
            .upload(PhotoUpload {
                receipt_id: Some(Uuid::new_v4().to_string()),
                photo_type: None,
                file: Some(jpeg()),
            })
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ServiceError::Dependency { ref error, ref details }
                if error == "Failed to save photo record"
                    && details == "constraint; rollback incomplete: delete_blob failed"
        );
    }

    #[tokio::test]
    async fn successful_upload_records_size_and_mime() {
        let receipt_id = Uuid::new_v4();
        let mut store = MockReceiptStore::new();
        receipt_exists(&mut store);
        store
            .expect_insert_photos()
            .withf(move |rows| {
                rows.len() == 1
                    && rows[0].receipt_id == receipt_id
                    && rows[0].photo_type == PhotoType::Label
                    && rows[0].file_size == Some(3)
                    && rows[0].mime_type.as_deref() == Some("image/jpeg")
            })
            .returning(|rows| {
                Ok(rows
                    .into_iter()
                    .map(|row| photo::Model {
                        id: Uuid::new_v4(),
                        receipt_id: row.receipt_id,
                        defect_id: row.defect_id,
                        photo_url: row.photo_url,
                        photo_type: row.photo_type,
                        file_size: row.file_size,
                        mime_type: row.mime_type,
                        uploaded_at: row.uploaded_at,
                    })
                    .collect())
            });
        let blobs = Arc::new(InMemoryBlobStore::new());
        let svc = PhotoService::new(Arc::new(store), blobs.clone());

        let photo = svc
            .upload(PhotoUpload {
                receipt_id: Some(receipt_id.to_string()),
                photo_type: Some("LABEL".into()),
                file: Some(jpeg()),
            })
            .await
            .unwrap();
        assert!(photo.photo_url.starts_with("memory://receipts/"));
        assert_eq!(blobs.len().await, 1);
    }
}
