use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
};

use super::common::{created, parse_id};
use crate::{
    models::item,
    services::items::{
        CreateItemRequest, ItemListQuery, QrVerification, UpdateItemRequest, VerifyQrRequest,
    },
    ApiResponse, ApiResult, AppState, CreatedResult,
};

#[utoipa::path(
    post,
    path = "/item/verify-qr",
    request_body = VerifyQrRequest,
    responses(
        (status = 200, description = "Scan result; `valid` is false for unknown or inactive items", body = ApiResponse<QrVerification>),
        (status = 400, description = "QR code missing", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn verify_qr(
    State(state): State<AppState>,
    payload: Result<Json<VerifyQrRequest>, JsonRejection>,
) -> ApiResult<QrVerification> {
    let Json(request) = payload?;
    let verification = state.services.items.verify_qr(request.qr_code).await?;
    Ok(Json(ApiResponse::success(verification)))
}

#[utoipa::path(
    get,
    path = "/item",
    params(ItemListQuery),
    responses(
        (status = 200, description = "Items, newest first", body = ApiResponse<Vec<item::Model>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ItemListQuery>, QueryRejection>,
) -> ApiResult<Vec<item::Model>> {
    let Query(query) = query?;
    let page = state.services.items.list_items(query).await?;
    Ok(Json(
        ApiResponse::success(page.items).with_pagination(page.pagination),
    ))
}

#[utoipa::path(
    post,
    path = "/item",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ApiResponse<item::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin access required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item number already exists", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> CreatedResult<item::Model> {
    let Json(request) = payload?;
    let item = state.services.items.create_item(request).await?;
    Ok(created(
        ApiResponse::success(item).with_message("Item created successfully"),
    ))
}

#[utoipa::path(
    put,
    path = "/item/:id",
    params(("id" = String, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<item::Model>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item number already exists", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> ApiResult<item::Model> {
    let id = parse_id(&id, "item")?;
    let Json(request) = payload?;
    let item = state.services.items.update_item(id, request).await?;
    Ok(Json(
        ApiResponse::success(item).with_message("Item updated successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/item/:id",
    params(("id" = String, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item deleted", body = ApiResponse<item::Model>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item is referenced by existing receipts", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<item::Model> {
    let id = parse_id(&id, "item")?;
    let item = state.services.items.delete_item(id).await?;
    Ok(Json(
        ApiResponse::success(item).with_message("Item deleted successfully"),
    ))
}
