//! Persistence ports for the receiving domain.
//!
//! Services only see the traits in this module. `RelationalStore` backs them
//! with sea-orm (Postgres in production, SQLite locally) and `InMemoryStore`
//! keeps everything in process for tests and throwaway environments.

pub mod memory;
pub mod relational;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    defect, item, photo, product_submission, receipt, user, ItemStatus, PhotoType, ReceiptStatus,
    Severity, UserRole, UserStatus,
};

pub use memory::InMemoryStore;
pub use relational::RelationalStore;

/// Failures reported by a store implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate key: {0}")]
    Conflict(String),
    /// A foreign key rejected the write: the referenced row is missing, or a
    /// delete would orphan rows that still point at it.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
    /// The row targeted by an update or delete does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Backend(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => {
                return StoreError::Conflict(message)
            }
            Some(SqlErr::ForeignKeyConstraintViolation(message)) => {
                return StoreError::ForeignKey(message)
            }
            _ => {}
        }
        match err {
            DbErr::RecordNotFound(message) => StoreError::NotFound(message),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Offset pagination request. `limit` is already clamped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// One page of rows plus the number of rows matching the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReceipt {
    pub receipt_no: String,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub qr_code: Option<String>,
    pub quantity: i32,
    pub defect_quantity: i32,
    pub status: ReceiptStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDefect {
    pub receipt_id: Uuid,
    pub defect_type: String,
    pub defect_description: String,
    pub quantity: i32,
    pub severity: Severity,
    pub checklist_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub receipt_id: Uuid,
    pub defect_id: Option<Uuid>,
    pub photo_url: String,
    pub photo_type: PhotoType,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Filters for the receipt listing. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptFilter {
    pub status: Option<ReceiptStatus>,
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub received_from: Option<DateTime<Utc>>,
    pub received_to: Option<DateTime<Utc>>,
}

impl ReceiptFilter {
    pub fn matches(&self, receipt: &receipt::Model) -> bool {
        self.status.map_or(true, |s| receipt.status == s)
            && self.item_id.map_or(true, |id| receipt.item_id == id)
            && self.user_id.map_or(true, |id| receipt.user_id == id)
            && self.received_from.map_or(true, |from| receipt.received_at >= from)
            && self.received_to.map_or(true, |to| receipt.received_at <= to)
    }
}

/// A receipt together with the rows it references and owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptGraph {
    pub receipt: receipt::Model,
    pub item: Option<item::Model>,
    pub user: Option<user::Model>,
    pub defects: Vec<defect::Model>,
    pub photos: Vec<photo::Model>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub item_no: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: ItemStatus,
}

/// Partial update of an item; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub item_no: Option<String>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub category: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &item::Model) -> bool {
        self.status.map_or(true, |s| item.status == s)
            && self
                .category
                .as_deref()
                .map_or(true, |c| item.category.as_deref() == Some(c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub employee_code: String,
    pub name: String,
    pub phone: String,
    pub role: UserRole,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

/// Partial update of a user. For `username`, `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub username: Option<Option<String>>,
    pub password_hash: Option<String>,
}

/// Receipt, defect and photo persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<receipt::Model, StoreError>;

    async fn find_receipt(&self, id: Uuid) -> Result<Option<receipt::Model>, StoreError>;

    /// Overwrites `defect_quantity` and `updated_at`. `NotFound` if the receipt is gone.
    async fn update_defect_quantity(
        &self,
        id: Uuid,
        defect_quantity: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn delete_receipt(&self, id: Uuid) -> Result<(), StoreError>;

    /// Bulk insert; either every row is written or none is.
    async fn insert_defects(&self, defects: Vec<NewDefect>)
        -> Result<Vec<defect::Model>, StoreError>;

    async fn find_defect(&self, id: Uuid) -> Result<Option<defect::Model>, StoreError>;

    async fn delete_defect(&self, id: Uuid) -> Result<(), StoreError>;

    /// Bulk insert; either every row is written or none is.
    async fn insert_photos(&self, photos: Vec<NewPhoto>) -> Result<Vec<photo::Model>, StoreError>;

    /// Receipts matching `filter`, newest `received_at` first.
    async fn list_receipts(
        &self,
        filter: &ReceiptFilter,
        page: PageRequest,
    ) -> Result<Page<ReceiptGraph>, StoreError>;
}

/// Item master data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn find_item(&self, id: Uuid) -> Result<Option<item::Model>, StoreError>;

    async fn find_item_by_no(&self, item_no: &str) -> Result<Option<item::Model>, StoreError>;

    /// Items matching `filter`, newest first.
    async fn list_items(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<Page<item::Model>, StoreError>;

    async fn insert_item(&self, item: NewItem) -> Result<item::Model, StoreError>;

    /// Returns `None` when no item has the given id.
    async fn update_item(&self, id: Uuid, patch: ItemPatch)
        -> Result<Option<item::Model>, StoreError>;

    /// Returns the deleted row, or `None` when no item has the given id.
    async fn delete_item(&self, id: Uuid) -> Result<Option<item::Model>, StoreError>;
}

/// Staff accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, StoreError>;

    async fn find_user_by_employee_code(
        &self,
        employee_code: &str,
    ) -> Result<Option<user::Model>, StoreError>;

    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<user::Model>, StoreError>;

    /// Users with the given role (all roles when `None`), newest first.
    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<user::Model>, StoreError>;

    async fn insert_user(&self, user: NewUser) -> Result<user::Model, StoreError>;

    async fn update_user(&self, id: Uuid, patch: UserPatch)
        -> Result<Option<user::Model>, StoreError>;

    /// Returns `false` when no user has the given id.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProductSubmission {
    pub employee_id: Uuid,
    pub item_no: Option<String>,
    pub product_name: String,
    pub quantity: i32,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filters for the product submission listing. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSubmissionFilter {
    pub employee_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl ProductSubmissionFilter {
    pub fn matches(&self, submission: &product_submission::Model) -> bool {
        self.employee_id.map_or(true, |id| submission.employee_id == id)
            && self.created_from.map_or(true, |from| submission.created_at >= from)
            && self.created_to.map_or(true, |to| submission.created_at <= to)
    }
}

/// Products reported from the floor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductSubmissionStore: Send + Sync {
    async fn insert_product_submission(
        &self,
        submission: NewProductSubmission,
    ) -> Result<product_submission::Model, StoreError>;

    async fn find_product_submission(
        &self,
        id: Uuid,
    ) -> Result<Option<product_submission::Model>, StoreError>;

    /// Submissions matching `filter`, newest `created_at` first.
    async fn list_product_submissions(
        &self,
        filter: &ProductSubmissionFilter,
        page: PageRequest,
    ) -> Result<Page<product_submission::Model>, StoreError>;
}

/// Hands out receipt numbers that are never reused.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptNumberGenerator: Send + Sync {
    async fn next_receipt_no(&self) -> Result<String, StoreError>;
}

/// Formats a receipt number as `RCV-YYYYMMDD-NNNNNN`.
///
/// The sequence is global, so the numeric suffix keeps growing across days;
/// it widens past six digits instead of wrapping.
pub fn format_receipt_no(date: NaiveDate, sequence: u64) -> String {
    format!("RCV-{}-{:06}", date.format("%Y%m%d"), sequence)
}
