use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
};
use tracing::debug;

use super::common::created;
use crate::{
    errors::ServiceError,
    models::photo,
    services::photos::{PhotoUpload, UploadedFile},
    services::receipts::{CreateReceiptRequest, CreatedReceipt, ReceiptListEntry, ReceiptListQuery},
    ApiResponse, ApiResult, AppState, CreatedResult,
};

#[utoipa::path(
    post,
    path = "/receipt/create",
    request_body = CreateReceiptRequest,
    responses(
        (status = 201, description = "Receipt recorded", body = ApiResponse<CreatedReceipt>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "receipts"
)]
pub async fn create_receipt(
    State(state): State<AppState>,
    payload: Result<Json<CreateReceiptRequest>, JsonRejection>,
) -> CreatedResult<CreatedReceipt> {
    let Json(request) = payload?;
    let created_receipt = state.services.receipts.create_receipt(request).await?;
    Ok(created(
        ApiResponse::success(created_receipt).with_message("Receipt created successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/receipt/list",
    params(ReceiptListQuery),
    responses(
        (status = 200, description = "Receipts, newest first", body = ApiResponse<Vec<ReceiptListEntry>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "receipts"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    query: Result<Query<ReceiptListQuery>, QueryRejection>,
) -> ApiResult<Vec<ReceiptListEntry>> {
    let Query(query) = query?;
    let page = state.services.receipts.list_receipts(query).await?;
    Ok(Json(
        ApiResponse::success(page.entries).with_pagination(page.pagination),
    ))
}

fn multipart_error(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::ValidationError(format!("Invalid multipart body: {err}"))
}

/// Reads the known fields of the upload form; unknown parts are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<PhotoUpload, ServiceError> {
    let mut upload = PhotoUpload::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("receipt_id") => upload.receipt_id = Some(field.text().await.map_err(multipart_error)?),
            Some("photo_type") => upload.photo_type = Some(field.text().await.map_err(multipart_error)?),
            Some("photo") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }
    Ok(upload)
}

#[utoipa::path(
    post,
    path = "/receipt/upload-photo",
    request_body(content_type = "multipart/form-data", description = "Fields `receipt_id`, optional `photo_type` and the `photo` file"),
    responses(
        (status = 201, description = "Photo stored", body = ApiResponse<photo::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Storage failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "receipts"
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> CreatedResult<photo::Model> {
    let multipart = multipart.map_err(|e| multipart_error(e.body_text()))?;
    let upload = read_upload(multipart).await?;
    let photo = state.services.photos.upload(upload).await?;
    Ok(created(
        ApiResponse::success(photo).with_message("Photo uploaded successfully"),
    ))
}
