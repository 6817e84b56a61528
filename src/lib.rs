//! Receiving API Library
//!
//! Warehouse receiving backend: staff scan items at the dock, record receipts
//! with defects and photos, and administrators maintain the item and staff
//! master data.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod storage;
pub mod store;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};
use crate::errors::ErrorResponse;

pub use handlers::{AppServices, Gateways};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(config: config::AppConfig, gateways: Gateways) -> Self {
        let services = AppServices::new(&gateways, config.api_max_page_size);
        let auth = Arc::new(AuthService::new(
            config.jwt_secret.clone(),
            config.jwt_expiration(),
            config.legacy_api_key.clone(),
            gateways.users.clone(),
        ));
        Self {
            config: Arc::new(config),
            services,
            auth,
        }
    }
}

/// Offset pagination metadata returned by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: u64, limit: u64, offset: u64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Body of responses that carry only a message.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Result type for endpoints answering `201 Created`.
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), errors::ServiceError>;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Receiving API is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            success: false,
            error: "Endpoint not found".to_string(),
            details: None,
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
        }),
    )
}

/// Route table. Cross-cutting layers (CORS, tracing, access log, request ids)
/// are added by the binary.
pub fn app(state: AppState) -> Router {
    let auth = state.auth.clone();

    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(handlers::auth::login))
        .route("/item/verify-qr", post(handlers::items::verify_qr))
        .route("/item", get(handlers::items::list_items));

    let staff = Router::new()
        .route("/receipt/create", post(handlers::receipts::create_receipt))
        .route("/receipt/list", get(handlers::receipts::list_receipts))
        .route("/receipt/upload-photo", post(handlers::receipts::upload_photo))
        .route("/defect/:id/restock", post(handlers::defects::restock_defect))
        .route(
            "/product-submission",
            get(handlers::product_submissions::list_product_submissions),
        )
        .route(
            "/product-submission/:id",
            get(handlers::product_submissions::get_product_submission),
        )
        .with_auth(auth.clone());

    let admin = Router::new()
        .route("/item", post(handlers::items::create_item))
        .route(
            "/item/:id",
            put(handlers::items::update_item).delete(handlers::items::delete_item),
        )
        .route(
            "/user",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/user/:id",
            put(handlers::users::update_user).delete(handlers::users::delete_user),
        )
        .with_admin(auth);

    let max_body_size = state.config.max_body_size;
    Router::new()
        .merge(public)
        .merge(staff)
        .merge(admin)
        .merge(openapi::swagger_ui())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn has_more_is_false_on_the_last_page() {
        assert!(!Pagination::new(125, 50, 100).has_more);
        assert!(Pagination::new(125, 50, 50).has_more);
        assert!(!Pagination::new(0, 50, 0).has_more);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::success(1).with_message("ok")).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": 1, "message": "ok"}));

        let body = serde_json::to_value(
            ApiResponse::success(Vec::<u8>::new()).with_pagination(Pagination::new(3, 2, 0)),
        )
        .unwrap();
        assert_eq!(body["pagination"]["hasMore"], true);
    }
}
