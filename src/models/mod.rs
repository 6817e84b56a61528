//! sea-orm entities for the receiving domain.

pub mod defect;
pub mod item;
pub mod photo;
pub mod product_submission;
pub mod receipt;
pub mod receipt_sequence;
pub mod user;

pub use defect::Severity;
pub use item::ItemStatus;
pub use photo::PhotoType;
pub use receipt::ReceiptStatus;
pub use user::{UserRole, UserStatus};
