use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};

use crate::{
    auth::{LoginRequest, LoginResponse},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<LoginResponse>),
        (status = 400, description = "No identifier supplied", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unknown, inactive or wrong credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;
    let response = state.auth.login(request).await?;
    Ok(Json(
        ApiResponse::success(response).with_message("Login successful"),
    ))
}
