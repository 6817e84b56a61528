#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use receiving_api::{
    auth::AuthService,
    config::AppConfig,
    models::{defect, item, photo, receipt, user, ItemStatus, UserRole},
    notifications::{NotificationError, ReceiptNotification, ReceiptNotifier},
    storage::InMemoryBlobStore,
    store::{
        InMemoryStore, ItemStore, NewDefect, NewItem, NewPhoto, NewReceipt, NewUser, Page,
        PageRequest, ReceiptFilter, ReceiptGraph, ReceiptStore, StoreError, UserStore,
    },
    AppState, Gateways,
};

pub const JWT_SECRET: &str = "integration-test-secret-with-plenty-of-entropy-42";
pub const LEGACY_KEY: &str = "legacy-scanner-key";

/// Credentials attached to a test request.
#[derive(Clone, Debug)]
pub enum Auth {
    None,
    Legacy,
    Bearer(String),
}

/// Receipt store that can be told to reject defect or photo inserts.
pub struct FlakyStore {
    inner: Arc<InMemoryStore>,
    pub fail_defects: AtomicBool,
    pub fail_photos: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            fail_defects: AtomicBool::new(false),
            fail_photos: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ReceiptStore for FlakyStore {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<receipt::Model, StoreError> {
        self.inner.insert_receipt(receipt).await
    }

    async fn find_receipt(&self, id: Uuid) -> Result<Option<receipt::Model>, StoreError> {
        self.inner.find_receipt(id).await
    }

    async fn update_defect_quantity(
        &self,
        id: Uuid,
        defect_quantity: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner
            .update_defect_quantity(id, defect_quantity, updated_at)
            .await
    }

    async fn delete_receipt(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete_receipt(id).await
    }

    async fn insert_defects(
        &self,
        defects: Vec<NewDefect>,
    ) -> Result<Vec<defect::Model>, StoreError> {
        if self.fail_defects.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("receipt_defects is read-only".into()));
        }
        self.inner.insert_defects(defects).await
    }

    async fn find_defect(&self, id: Uuid) -> Result<Option<defect::Model>, StoreError> {
        self.inner.find_defect(id).await
    }

    async fn delete_defect(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete_defect(id).await
    }

    async fn insert_photos(&self, photos: Vec<NewPhoto>) -> Result<Vec<photo::Model>, StoreError> {
        if self.fail_photos.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("receipt_photos is read-only".into()));
        }
        self.inner.insert_photos(photos).await
    }

    async fn list_receipts(
        &self,
        filter: &ReceiptFilter,
        page: PageRequest,
    ) -> Result<Page<ReceiptGraph>, StoreError> {
        self.inner.list_receipts(filter, page).await
    }
}

/// Notifier that records receipt numbers and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiptNotifier for RecordingNotifier {
    async fn send(&self, notification: &ReceiptNotification) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Rejected {
                status: 502,
                body: "mail relay down".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push(notification.receipt.receipt_no.clone());
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        3000,
        "test".to_string(),
    );
    cfg.store_backend = "memory".to_string();
    cfg.legacy_api_key = Some(LEGACY_KEY.to_string());
    cfg
}

/// Router wired to in-memory gateways, plus handles on those gateways.
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryStore>,
    pub receipts: Arc<FlakyStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    tokens: AuthService,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let receipts = Arc::new(FlakyStore::new(store.clone()));
        let blobs = Arc::new(InMemoryBlobStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let gateways = Gateways {
            receipts: receipts.clone(),
            items: store.clone(),
            users: store.clone(),
            numbers: store.clone(),
            submissions: store.clone(),
            blobs: blobs.clone(),
            notifier: notifier.clone(),
        };
        let router = receiving_api::app(AppState::new(test_config(), gateways));
        let tokens = AuthService::new(JWT_SECRET, Duration::from_secs(3600), None, store.clone());

        Self {
            router,
            store,
            receipts,
            blobs,
            notifier,
            tokens,
        }
    }

    pub async fn seed_item(&self, item_no: &str) -> item::Model {
        self.store
            .insert_item(NewItem {
                item_no: item_no.to_string(),
                product_name: format!("Product {item_no}"),
                description: None,
                category: Some("general".into()),
                status: ItemStatus::Active,
            })
            .await
            .unwrap()
    }

    pub async fn seed_user(&self, employee_code: &str, role: UserRole) -> user::Model {
        self.store
            .insert_user(NewUser {
                employee_code: employee_code.to_string(),
                name: format!("Employee {employee_code}"),
                phone: String::new(),
                role,
                username: None,
                password_hash: None,
            })
            .await
            .unwrap()
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.tokens.issue_token(user).unwrap()
    }

    pub async fn staff_auth(&self) -> Auth {
        let user = self
            .seed_user(&format!("S{}", &Uuid::new_v4().simple().to_string()[..8]), UserRole::Staff)
            .await;
        Auth::Bearer(self.token_for(&user))
    }

    pub async fn admin_auth(&self) -> Auth {
        let user = self
            .seed_user(&format!("A{}", &Uuid::new_v4().simple().to_string()[..8]), UserRole::Admin)
            .await;
        Auth::Bearer(self.token_for(&user))
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        auth: Auth,
    ) -> (StatusCode, Value) {
        let builder = with_auth(Request::builder().method(method).uri(uri), auth);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, auth: Auth) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, auth).await
    }

    pub async fn post(&self, uri: &str, body: Value, auth: Auth) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), auth).await
    }

    pub async fn put(&self, uri: &str, body: Value, auth: Auth) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body), auth).await
    }

    pub async fn delete(&self, uri: &str, auth: Auth) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None, auth).await
    }
}

pub fn with_auth(builder: axum::http::request::Builder, auth: Auth) -> axum::http::request::Builder {
    match auth {
        Auth::None => builder,
        Auth::Legacy => builder.header("x-api-key", LEGACY_KEY),
        Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
    }
}
