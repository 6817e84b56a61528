mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;
use uuid::Uuid;

use common::{Auth, TestApp};
use receiving_api::models::UserRole;

#[tokio::test]
async fn health_and_fallback_are_public() {
    let app = TestApp::new();

    let (status, body) = app.get("/health", Auth::None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].is_string());

    let (status, body) = app.get("/no/such/route", Auth::None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
async fn login_by_employee_code_and_by_password() {
    let app = TestApp::new();
    let staff = app.seed_user("E200", UserRole::Staff).await;

    let (status, body) = app
        .post("/auth/login", json!({"employee_code": "E200"}), Auth::None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["user"]["id"], json!(staff.id));
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = app.get("/receipt/list", Auth::Bearer(token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/auth/login", json!({"employee_code": "NOPE"}), Auth::None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid employee code or account inactive");

    let (status, _) = app.post("/auth/login", json!({}), Auth::None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let admin = app.admin_auth().await;
    let (status, _) = app
        .post(
            "/user",
            json!({
                "employee_code": "E201",
                "name": "Dana",
                "username": "dana",
                "password": "correct horse battery"
            }),
            admin,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            "/auth/login",
            json!({"username": "dana", "password": "correct horse battery"}),
            Auth::None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/auth/login",
            json!({"employee_code": "E201", "password": "wrong"}),
            Auth::None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn item_lifecycle_and_qr_verification() {
    let app = TestApp::new();
    let admin = app.admin_auth().await;

    let (status, body) = app
        .post(
            "/item",
            json!({"item_no": "SKU-9", "product_name": "Pallet wrap", "category": "packaging"}),
            admin.clone(),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "active");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/item",
            json!({"item_no": "SKU-9", "product_name": "Duplicate"}),
            admin.clone(),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Item number already exists");

    let (status, body) = app
        .post("/item/verify-qr", json!({"qr_code": "SKU-9"}), Auth::None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["message"], "Item verified successfully");

    let (status, body) = app
        .put(&format!("/item/{id}"), json!({"status": "inactive"}), admin.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "inactive");

    let (_, body) = app
        .post("/item/verify-qr", json!({"qr_code": "SKU-9"}), Auth::None)
        .await;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["message"], "Item not found or inactive");

    let (status, body) = app
        .post("/item/verify-qr", json!({}), Auth::None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "QR Code is required");

    let (_, body) = app.get("/item?status=inactive", Auth::None).await;
    assert_eq!(body["pagination"]["total"], 1);

    let (status, _) = app.delete(&format!("/item/{id}"), admin.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.delete(&format!("/item/{id}"), admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Item not found");
}

#[tokio::test]
async fn items_and_users_with_receipts_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.admin_auth().await;
    let item = app.seed_item("SKU-R").await;
    let user = app.seed_user("E-R", UserRole::Staff).await;

    let (status, _) = app
        .post(
            "/receipt/create",
            json!({"item_id": item.id, "user_id": user.id, "quantity": 4}),
            Auth::Bearer(app.token_for(&user)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.delete(&format!("/item/{}", item.id), admin.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Item is referenced by existing receipts");
    assert!(body["details"].as_str().unwrap().contains(&item.id.to_string()));

    let (status, body) = app.delete(&format!("/user/{}", user.id), admin).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User is referenced by existing receipts");

    let (_, body) = app.get("/item", Auth::None).await;
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn user_management_requires_admin() {
    let app = TestApp::new();
    let staff = app.staff_auth().await;

    let (status, body) = app.get("/user", staff.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");

    let (status, _) = app
        .post("/item", json!({"item_no": "X", "product_name": "Y"}), staff)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/user", Auth::None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The legacy key is treated as an administrator.
    let (status, body) = app
        .post(
            "/user",
            json!({"employee_code": "E300", "name": "Lee", "role": "admin"}),
            Auth::Legacy,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"].get("password_hash").is_none());
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/user", json!({"employee_code": "E300", "name": "Again"}), Auth::Legacy)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Employee code already exists");

    let (status, body) = app
        .put(
            &format!("/user/{id}"),
            json!({"phone": "555-0100", "status": "inactive"}),
            Auth::Legacy,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "555-0100");
    assert_eq!(body["data"]["status"], "inactive");

    let (_, body) = app.get("/user?role=admin", Auth::Legacy).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.delete(&format!("/user/{id}"), Auth::Legacy).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted");

    let (status, _) = app
        .delete(&format!("/user/{}", Uuid::new_v4()), Auth::Legacy)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn multipart_request(receipt_id: &str, photo_type: &str, auth: Auth) -> Request<Body> {
    let boundary = "receiving-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"receipt_id\"\r\n\r\n{receipt_id}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"photo_type\"\r\n\r\n{photo_type}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"label.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
        b = boundary
    );
    common::with_auth(
        Request::builder()
            .method(Method::POST)
            .uri("/receipt/upload-photo")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            ),
        auth,
    )
    .body(Body::from(body))
    .unwrap()
}

#[tokio::test]
async fn photo_upload_stores_blob_and_row() {
    let app = TestApp::new();
    let item = app.seed_item("ITM-P").await;
    let user = app.seed_user("EP1", UserRole::Staff).await;
    let auth = Auth::Bearer(app.token_for(&user));
    let (_, created) = app
        .post(
            "/receipt/create",
            json!({"item_id": item.id, "user_id": user.id, "quantity": 1}),
            auth.clone(),
        )
        .await;
    let receipt_id = created["data"]["receipt"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(multipart_request(&receipt_id, "label", auth.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["photo_type"], "label");
    assert_eq!(body["data"]["mime_type"], "image/png");
    assert_eq!(body["data"]["file_size"], 7);
    let url = body["data"]["photo_url"].as_str().unwrap();
    assert!(url.contains(&format!("receipts/{receipt_id}/")));
    assert!(url.ends_with(".png"));
    assert_eq!(app.blobs.len().await, 1);

    let (status, body) = app
        .send(multipart_request(&receipt_id, "selfie", auth.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid photo_type. Must be one of: general, defect, label, package"
    );

    let (status, body) = app
        .send(multipart_request(&Uuid::new_v4().to_string(), "general", auth))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Receipt not found");
    assert_eq!(app.blobs.len().await, 1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();

    let (status, body) = app.get("/api-docs/openapi.json", Auth::None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/receipt/create"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}
