//! Receipt notifications. Delivery is best effort: callers log failures and
//! carry on.

pub mod mail;

use async_trait::async_trait;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::info;

use crate::models::{defect, item, photo, receipt, user};

pub use mail::HttpMailNotifier;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail API rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("notification error: {0}")]
    Internal(String),
}

/// Everything the admin mail describes about a completed receipt.
#[derive(Debug, Clone)]
pub struct ReceiptNotification {
    pub receipt: receipt::Model,
    pub item: item::Model,
    pub user: user::Model,
    pub defects: Vec<defect::Model>,
    pub photos: Vec<photo::Model>,
}

impl ReceiptNotification {
    pub fn subject(&self) -> String {
        format!(
            "[Receiving Alert] Receipt #{} - {}",
            self.receipt.receipt_no, self.item.product_name
        )
    }

    pub fn html(&self) -> String {
        let mut html = String::new();
        html.push_str("<h2>Receiving Notification</h2>\n");
        html.push_str("<p>A new receipt has been recorded:</p>\n");
        html.push_str("<table style=\"border-collapse: collapse; width: 100%; max-width: 600px;\">\n");

        let rows = [
            ("Receipt No", escape(&self.receipt.receipt_no)),
            (
                "Received by",
                format!(
                    "{} ({})",
                    escape(&self.user.name),
                    escape(&self.user.employee_code)
                ),
            ),
            (
                "Product",
                format!(
                    "{} ({})",
                    escape(&self.item.product_name),
                    escape(&self.item.item_no)
                ),
            ),
            ("Quantity", self.receipt.quantity.to_string()),
            (
                "Location",
                escape(self.receipt.location.as_deref().unwrap_or("-")),
            ),
        ];
        for (label, value) in rows {
            let _ = writeln!(
                html,
                "<tr><td style=\"padding: 8px; border: 1px solid #ddd;\"><strong>{label}:</strong></td>\
                 <td style=\"padding: 8px; border: 1px solid #ddd;\">{value}</td></tr>"
            );
        }
        html.push_str("</table>\n");

        if self.defects.is_empty() {
            html.push_str("<p><strong>Condition:</strong> No Defects</p>\n");
        } else {
            html.push_str("<h3>Defects</h3>\n<ul>\n");
            for d in &self.defects {
                let _ = writeln!(
                    html,
                    "<li><strong>{}:</strong> {} ({}, qty {})</li>",
                    escape(&d.defect_type),
                    escape(&d.defect_description),
                    d.severity,
                    d.quantity
                );
            }
            html.push_str("</ul>\n");
        }

        if !self.photos.is_empty() {
            let _ = writeln!(
                html,
                "<h3>Photos</h3>\n<p>{} photo(s) attached; view them in the back office.</p>",
                self.photos.len()
            );
        }

        html.push_str("<p><small>This is an automated message from the Receiving System.</small></p>\n");
        html
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptNotifier: Send + Sync {
    async fn send(&self, notification: &ReceiptNotification) -> Result<(), NotificationError>;
}

/// Writes the notification to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl ReceiptNotifier for LogNotifier {
    async fn send(&self, notification: &ReceiptNotification) -> Result<(), NotificationError> {
        info!(
            receipt_no = %notification.receipt.receipt_no,
            subject = %notification.subject(),
            defects = notification.defects.len(),
            photos = notification.photos.len(),
            "receipt notification (mail disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{ItemStatus, ReceiptStatus, UserRole, UserStatus};
    use chrono::Utc;
    use uuid::Uuid;

    pub fn notification() -> ReceiptNotification {
        let now = Utc::now();
        let item = item::Model {
            id: Uuid::new_v4(),
            item_no: "SKU-001".into(),
            product_name: "Pallet <Blue>".into(),
            description: None,
            category: Some("pallets".into()),
            status: ItemStatus::Active,
            created_at: now,
            updated_at: None,
        };
        let user = user::Model {
            id: Uuid::new_v4(),
            employee_code: "EMP-7".into(),
            name: "Dana".into(),
            phone: String::new(),
            role: UserRole::Staff,
            status: UserStatus::Active,
            username: None,
            password_hash: None,
            created_at: now,
            updated_at: None,
        };
        let receipt = receipt::Model {
            id: Uuid::new_v4(),
            receipt_no: "RCV-20240101-000001".into(),
            item_id: item.id,
            user_id: user.id,
            qr_code: Some("SKU-001".into()),
            quantity: 12,
            defect_quantity: 0,
            status: ReceiptStatus::Completed,
            location: None,
            notes: None,
            received_at: now,
            updated_at: None,
        };
        ReceiptNotification {
            receipt,
            item,
            user,
            defects: Vec::new(),
            photos: Vec::new(),
        }
    }
}
