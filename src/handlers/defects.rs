use axum::{
    extract::{Path, State},
    response::Json,
};

use super::common::parse_id;
use crate::{services::defects::RestockOutcome, ApiResponse, ApiResult, AppState};

#[utoipa::path(
    post,
    path = "/defect/:id/restock",
    params(("id" = String, Path, description = "Defect ID")),
    responses(
        (status = 200, description = "Defect moved back to stock", body = ApiResponse<RestockOutcome>),
        (status = 404, description = "Defect or receipt not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "defects"
)]
pub async fn restock_defect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RestockOutcome> {
    let id = parse_id(&id, "defect")?;
    let outcome = state.services.defects.restock(id).await?;
    Ok(Json(
        ApiResponse::success(outcome).with_message("Defect restocked successfully"),
    ))
}
