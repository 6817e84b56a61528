use utoipa::openapi::security::{
    ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme,
};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Receiving API",
        version = "0.3.0",
        description = r#"
# Warehouse Receiving API

Backend for the receiving dock: staff scan an item's QR code, record how many
units arrived, flag defects and attach photos. Administrators maintain the
item catalogue and staff accounts.

## Authentication

Sign in with `POST /auth/login` and send the returned token as

```
Authorization: Bearer <token>
```

Older clients may instead send the shared API key as `X-API-Key`.

## Errors

Failures use a single envelope:

```json
{ "success": false, "error": "Quantity must be greater than 0" }
```

## Pagination

List endpoints accept `limit` and `offset` and answer with
`pagination: {total, limit, offset, hasMore}`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    tags(
        (name = "receipts", description = "Receipt intake and listing"),
        (name = "defects", description = "Defect handling"),
        (name = "items", description = "Item catalogue and QR verification"),
        (name = "users", description = "Staff accounts"),
        (name = "product-submissions", description = "Products reported from the floor"),
        (name = "auth", description = "Sign-in"),
        (name = "health", description = "Health check")
    ),
    paths(
        crate::health,
        crate::handlers::auth::login,
        crate::handlers::receipts::create_receipt,
        crate::handlers::receipts::list_receipts,
        crate::handlers::receipts::upload_photo,
        crate::handlers::defects::restock_defect,
        crate::handlers::items::verify_qr,
        crate::handlers::items::list_items,
        crate::handlers::items::create_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::product_submissions::list_product_submissions,
        crate::handlers::product_submissions::get_product_submission,
    ),
    components(
        schemas(
            crate::Pagination,
            crate::MessageResponse,
            crate::HealthResponse,
            crate::models::receipt::Model,
            crate::models::defect::Model,
            crate::models::photo::Model,
            crate::models::item::Model,
            crate::models::user::Model,
            crate::models::product_submission::Model,
            crate::services::receipts::CreateReceiptRequest,
            crate::services::receipts::DefectInput,
            crate::services::receipts::PhotoUrlInput,
            crate::services::receipts::CreatedReceipt,
            crate::services::receipts::ReceiptListEntry,
            crate::services::defects::RestockOutcome,
            crate::services::items::VerifyQrRequest,
            crate::services::items::QrVerification,
            crate::services::items::CreateItemRequest,
            crate::services::items::UpdateItemRequest,
            crate::services::users::CreateUserRequest,
            crate::services::users::UpdateUserRequest,
            crate::auth::LoginRequest,
            crate::auth::LoginResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_scheme() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        for path in [
            "/receipt/create",
            "/receipt/list",
            "/receipt/upload-photo",
            "/defect/:id/restock",
            "/item/verify-qr",
            "/user/:id",
            "/auth/login",
            "/product-submission/:id",
        ] {
            assert!(json.contains(path), "missing {path}");
        }
        assert!(json.contains("bearer_auth"));
        assert!(json.contains("X-API-Key"));
    }
}
