use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
};

use super::common::{created, parse_id};
use crate::{
    errors::ServiceError,
    models::user,
    services::users::{CreateUserRequest, UpdateUserRequest, UserListQuery},
    ApiResponse, ApiResult, AppState, CreatedResult, MessageResponse,
};

#[utoipa::path(
    get,
    path = "/user",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users, newest first", body = ApiResponse<Vec<user::Model>>),
        (status = 403, description = "Admin access required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> ApiResult<Vec<user::Model>> {
    let Query(query) = query?;
    let users = state.services.users.list_users(query).await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    post,
    path = "/user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<user::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Employee code or username taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> CreatedResult<user::Model> {
    let Json(request) = payload?;
    let user = state.services.users.create_user(request).await?;
    Ok(created(
        ApiResponse::success(user).with_message("User created successfully"),
    ))
}

#[utoipa::path(
    put,
    path = "/user/:id",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<user::Model>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<user::Model> {
    let id = parse_id(&id, "user")?;
    let Json(request) = payload?;
    let user = state.services.users.update_user(id, request).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    delete,
    path = "/user/:id",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "User is referenced by existing receipts", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = []), ("api_key" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let id = parse_id(&id, "user")?;
    state.services.users.delete_user(id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}
