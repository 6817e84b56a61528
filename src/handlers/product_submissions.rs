use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    models::product_submission,
    services::product_submissions::{not_found, ProductSubmissionListQuery},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/product-submission",
    params(ProductSubmissionListQuery),
    responses(
        (status = 200, description = "Submissions, newest first", body = ApiResponse<Vec<product_submission::Model>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Failed to fetch product submissions", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "product-submissions"
)]
pub async fn list_product_submissions(
    State(state): State<AppState>,
    query: Result<Query<ProductSubmissionListQuery>, QueryRejection>,
) -> ApiResult<Vec<product_submission::Model>> {
    let Query(query) = query?;
    let page = state.services.product_submissions.list_submissions(query).await?;
    Ok(Json(
        ApiResponse::success(page.submissions).with_pagination(page.pagination),
    ))
}

#[utoipa::path(
    get,
    path = "/product-submission/:id",
    params(("id" = String, Path, description = "Product submission ID")),
    responses(
        (status = 200, description = "The submission", body = ApiResponse<product_submission::Model>),
        (status = 404, description = "Product submission not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "product-submissions"
)]
pub async fn get_product_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<product_submission::Model> {
    // An id that cannot name a row is answered like a missing one.
    let id = Uuid::parse_str(id.trim()).map_err(|_| not_found())?;
    let submission = state.services.product_submissions.get_submission(id).await?;
    Ok(Json(ApiResponse::success(submission)))
}
