//! HTTP handlers. Each handler decodes the request, calls one service
//! operation and wraps the result in the response envelope.

pub mod auth;
pub mod common;
pub mod defects;
pub mod items;
pub mod product_submissions;
pub mod receipts;
pub mod users;

use std::sync::Arc;

use crate::notifications::ReceiptNotifier;
use crate::services::{
    DefectService, ItemService, PhotoService, ProductSubmissionService, ReceiptService,
    UserService,
};
use crate::storage::BlobStore;
use crate::store::{
    ItemStore, ProductSubmissionStore, ReceiptNumberGenerator, ReceiptStore, UserStore,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// The backends a running instance is wired to.
#[derive(Clone)]
pub struct Gateways {
    pub receipts: Arc<dyn ReceiptStore>,
    pub items: Arc<dyn ItemStore>,
    pub users: Arc<dyn UserStore>,
    pub numbers: Arc<dyn ReceiptNumberGenerator>,
    pub submissions: Arc<dyn ProductSubmissionStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn ReceiptNotifier>,
}

impl Gateways {
    /// Uses one store for every persistence port.
    pub fn with_store<S>(
        store: Arc<S>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn ReceiptNotifier>,
    ) -> Self
    where
        S: ReceiptStore
            + ItemStore
            + UserStore
            + ReceiptNumberGenerator
            + ProductSubmissionStore
            + 'static,
    {
        Self {
            receipts: store.clone(),
            items: store.clone(),
            users: store.clone(),
            numbers: store.clone(),
            submissions: store,
            blobs,
            notifier,
        }
    }
}

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub receipts: Arc<ReceiptService>,
    pub defects: Arc<DefectService>,
    pub items: Arc<ItemService>,
    pub users: Arc<UserService>,
    pub photos: Arc<PhotoService>,
    pub product_submissions: Arc<ProductSubmissionService>,
}

impl AppServices {
    pub fn new(gateways: &Gateways, max_page_size: u64) -> Self {
        Self {
            receipts: Arc::new(ReceiptService::new(
                gateways.receipts.clone(),
                gateways.items.clone(),
                gateways.users.clone(),
                gateways.numbers.clone(),
                gateways.notifier.clone(),
                max_page_size,
            )),
            defects: Arc::new(DefectService::new(gateways.receipts.clone())),
            items: Arc::new(ItemService::new(gateways.items.clone(), max_page_size)),
            users: Arc::new(UserService::new(gateways.users.clone())),
            photos: Arc::new(PhotoService::new(
                gateways.receipts.clone(),
                gateways.blobs.clone(),
            )),
            product_submissions: Arc::new(ProductSubmissionService::new(
                gateways.submissions.clone(),
                max_page_size,
            )),
        }
    }
}
