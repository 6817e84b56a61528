//! Business operations. Each service holds its gateways as `Arc<dyn Trait>`
//! so handlers and tests can wire any backend.

pub mod defects;
pub mod items;
pub mod photos;
pub mod product_submissions;
pub mod receipts;
pub mod saga;
pub mod users;

pub use defects::DefectService;
pub use items::ItemService;
pub use photos::PhotoService;
pub use product_submissions::ProductSubmissionService;
pub use receipts::ReceiptService;
pub use users::UserService;

use crate::errors::ServiceError;

/// Largest offset the SQL backends can bind; they store it as a signed
/// 64-bit integer.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Defaults a missing offset to zero and rejects one no backend can page to.
pub(crate) fn checked_offset(offset: Option<u64>) -> Result<u64, ServiceError> {
    match offset.unwrap_or(0) {
        offset if offset > MAX_OFFSET => Err(ServiceError::ValidationError(format!(
            "offset must not exceed {MAX_OFFSET}"
        ))),
        offset => Ok(offset),
    }
}
