//! Receipt intake and the receipt listing.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    defect, item, photo, receipt, user, PhotoType, ReceiptStatus, Severity,
};
use crate::notifications::{ReceiptNotification, ReceiptNotifier};
use crate::services::checked_offset;
use crate::services::saga::Compensations;
use crate::store::{
    ItemStore, NewDefect, NewPhoto, NewReceipt, PageRequest, ReceiptFilter, ReceiptGraph,
    ReceiptNumberGenerator, ReceiptStore, StoreError, UserStore,
};
use crate::Pagination;

pub const DEFAULT_RECEIPT_PAGE_SIZE: u64 = 50;

/// Body of `POST /receipt/create`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateReceiptRequest {
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub qr_code: Option<String>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub defects: Option<Vec<DefectInput>>,
    pub photo_urls: Option<Vec<PhotoUrlInput>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DefectInput {
    #[serde(rename = "type", default)]
    pub defect_type: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to 1.
    pub quantity: Option<i64>,
    /// `low`, `medium` (default), `high` or `critical`.
    pub severity: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub checklist: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PhotoUrlInput {
    #[serde(default)]
    pub url: String,
    /// `general` (default), `defect`, `label` or `package`.
    #[serde(rename = "type")]
    pub photo_type: Option<String>,
    /// Position of the related defect in `defects`. Accepted but not linked.
    pub defect_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct DefectDraft {
    defect_type: String,
    description: String,
    quantity: i32,
    severity: Severity,
    checklist: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
struct PhotoDraft {
    url: String,
    photo_type: PhotoType,
}

/// A request that passed validation; nothing after this point rejects input.
#[derive(Debug, Clone, PartialEq)]
struct ReceiptDraft {
    item_id: Uuid,
    user_id: Uuid,
    qr_code: Option<String>,
    quantity: i32,
    location: Option<String>,
    notes: Option<String>,
    defects: Vec<DefectDraft>,
    photos: Vec<PhotoDraft>,
}

impl ReceiptDraft {
    fn defect_quantity(&self) -> i32 {
        self.defects.iter().map(|d| d.quantity).sum()
    }
}

fn parse_enum<T: FromStr>(raw: &str, what: &str) -> Result<T, ServiceError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid {what}: {raw}")))
}

impl CreateReceiptRequest {
    fn validate(self) -> Result<ReceiptDraft, ServiceError> {
        let (Some(item_id), Some(user_id), Some(quantity)) =
            (self.item_id, self.user_id, self.quantity)
        else {
            return Err(ServiceError::ValidationError(
                "Missing required fields: item_id, user_id, quantity".to_string(),
            ));
        };
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than 0".to_string(),
            ));
        }
        let quantity = i32::try_from(quantity)
            .map_err(|_| ServiceError::ValidationError("Quantity is too large".to_string()))?;

        let mut defects = Vec::new();
        let mut defect_total: i64 = 0;
        for input in self.defects.unwrap_or_default() {
            if input.defect_type.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Each defect requires a type".to_string(),
                ));
            }
            let quantity = input.quantity.unwrap_or(1);
            if quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "Defect quantity cannot be negative".to_string(),
                ));
            }
            defect_total += quantity;
            let quantity = i32::try_from(quantity).map_err(|_| {
                ServiceError::ValidationError("Defect quantity is too large".to_string())
            })?;
            let severity = match input.severity.as_deref() {
                Some(raw) => parse_enum::<Severity>(raw, "defect severity")?,
                None => Severity::default(),
            };
            defects.push(DefectDraft {
                defect_type: input.defect_type,
                description: input.description,
                quantity,
                severity,
                checklist: input.checklist,
            });
        }
        if i32::try_from(defect_total).is_err() {
            return Err(ServiceError::ValidationError(
                "Defect quantity is too large".to_string(),
            ));
        }

        let mut photos = Vec::new();
        for input in self.photo_urls.unwrap_or_default() {
            if input.url.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Photo URL cannot be empty".to_string(),
                ));
            }
            let photo_type = match input.photo_type.as_deref() {
                Some(raw) => parse_enum::<PhotoType>(raw, "photo type")?,
                None => PhotoType::default(),
            };
            photos.push(PhotoDraft {
                url: input.url,
                photo_type,
            });
        }

        Ok(ReceiptDraft {
            item_id,
            user_id,
            qr_code: self.qr_code,
            quantity,
            location: self.location,
            notes: self.notes,
            defects,
            photos,
        })
    }
}

/// What the intake workflow actually persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedReceipt {
    pub receipt: receipt::Model,
    pub defects: Vec<defect::Model>,
    pub photos: Vec<photo::Model>,
}

/// Query string of `GET /receipt/list`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReceiptListQuery {
    /// `pending`, `completed` or `cancelled`
    pub status: Option<String>,
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive)
    pub start_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive, whole day)
    pub end_date: Option<String>,
    /// Page size, default 50
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ItemSummary {
    pub id: Uuid,
    pub item_no: String,
    pub product_name: String,
    pub category: Option<String>,
}

impl From<item::Model> for ItemSummary {
    fn from(item: item::Model) -> Self {
        Self {
            id: item.id,
            item_no: item.item_no,
            product_name: item.product_name,
            category: item.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub employee_code: String,
    pub name: String,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            employee_code: user.employee_code,
            name: user.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PhotoSummary {
    pub id: Uuid,
    pub photo_url: String,
    pub photo_type: PhotoType,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DefectSummary {
    pub id: Uuid,
    pub defect_type: String,
    pub quantity: i32,
    pub severity: Severity,
}

/// A receipt row with the joined summaries the list screen shows.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReceiptListEntry {
    #[serde(flatten)]
    pub receipt: receipt::Model,
    pub items: Option<ItemSummary>,
    pub users: Option<UserSummary>,
    pub photos: Vec<PhotoSummary>,
    pub defects: Vec<DefectSummary>,
}

impl From<ReceiptGraph> for ReceiptListEntry {
    fn from(graph: ReceiptGraph) -> Self {
        Self {
            receipt: graph.receipt,
            items: graph.item.map(ItemSummary::from),
            users: graph.user.map(UserSummary::from),
            photos: graph
                .photos
                .into_iter()
                .map(|p| PhotoSummary {
                    id: p.id,
                    photo_url: p.photo_url,
                    photo_type: p.photo_type,
                })
                .collect(),
            defects: graph
                .defects
                .into_iter()
                .map(|d| DefectSummary {
                    id: d.id,
                    defect_type: d.defect_type,
                    quantity: d.quantity,
                    severity: d.severity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceiptPage {
    pub entries: Vec<ReceiptListEntry>,
    pub pagination: Pagination,
}

/// Parses a date bound. A bare date means start of day for the lower bound
/// and end of day for the upper bound.
pub(crate) fn parse_date_bound(
    raw: &str,
    field: &str,
    upper: bool,
) -> Result<DateTime<Utc>, ServiceError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ServiceError::ValidationError(format!(
            "Invalid {field}: expected RFC 3339 timestamp or YYYY-MM-DD"
        ))
    })?;
    let time = if upper {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        Some(NaiveTime::MIN)
    };
    let time = time.ok_or_else(|| ServiceError::InternalError("invalid time of day".into()))?;
    Ok(date.and_time(time).and_utc())
}

/// Orchestrates receipt intake over the store, the receipt number generator
/// and the notifier.
#[derive(Clone)]
pub struct ReceiptService {
    receipts: Arc<dyn ReceiptStore>,
    items: Arc<dyn ItemStore>,
    users: Arc<dyn UserStore>,
    numbers: Arc<dyn ReceiptNumberGenerator>,
    notifier: Arc<dyn ReceiptNotifier>,
    max_page_size: u64,
}

impl ReceiptService {
    pub fn new(
        receipts: Arc<dyn ReceiptStore>,
        items: Arc<dyn ItemStore>,
        users: Arc<dyn UserStore>,
        numbers: Arc<dyn ReceiptNumberGenerator>,
        notifier: Arc<dyn ReceiptNotifier>,
        max_page_size: u64,
    ) -> Self {
        Self {
            receipts,
            items,
            users,
            numbers,
            notifier,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Records a receipt with its defects and photos.
    ///
    /// The receipt and its defects become visible together or not at all: if
    /// the defect insert fails the receipt is deleted again. Photo rows and
    /// the notification are best effort.
    #[instrument(skip(self, request))]
    pub async fn create_receipt(
        &self,
        request: CreateReceiptRequest,
    ) -> Result<CreatedReceipt, ServiceError> {
        let draft = request.validate()?;

        let receipt_no = self.numbers.next_receipt_no().await.map_err(|e| {
            error!(error = %e, "receipt number allocation failed");
            ServiceError::dependency("Failed to generate receipt number", e)
        })?;

        let defect_quantity = draft.defect_quantity();
        if defect_quantity > draft.quantity {
            warn!(
                receipt_no = %receipt_no,
                quantity = draft.quantity,
                defect_quantity,
                "defect quantity exceeds received quantity"
            );
        }

        let now = Utc::now();
        let receipt = self
            .receipts
            .insert_receipt(NewReceipt {
                receipt_no,
                item_id: draft.item_id,
                user_id: draft.user_id,
                qr_code: draft.qr_code,
                quantity: draft.quantity,
                defect_quantity,
                status: ReceiptStatus::Completed,
                location: draft.location,
                notes: draft.notes,
                received_at: now,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "receipt insert failed");
                match e {
                    StoreError::ForeignKey(details) => ServiceError::NotFound(format!(
                        "Item or user not found: {details}"
                    )),
                    other => ServiceError::from_store(
                        "Failed to create receipt",
                        "Receipt number already exists",
                        other,
                    ),
                }
            })?;

        let mut compensations = Compensations::new("create_receipt");
        {
            let store = self.receipts.clone();
            let receipt_id = receipt.id;
            compensations.register("delete_receipt", move || async move {
                store.delete_receipt(receipt_id).await
            });
        }

        let defects = if draft.defects.is_empty() {
            Vec::new()
        } else {
            let rows = draft
                .defects
                .into_iter()
                .map(|d| NewDefect {
                    receipt_id: receipt.id,
                    defect_type: d.defect_type,
                    defect_description: d.description,
                    quantity: d.quantity,
                    severity: d.severity,
                    checklist_data: d.checklist,
                    created_at: now,
                })
                .collect();
            match self.receipts.insert_defects(rows).await {
                Ok(defects) => defects,
                Err(err) => {
                    error!(
                        receipt_no = %receipt.receipt_no,
                        error = %err,
                        "defect insert failed; rolling back receipt"
                    );
                    let report = compensations.compensate().await;
                    return Err(ServiceError::dependency(
                        "Failed to create defects",
                        report.annotate(err),
                    ));
                }
            }
        };
        compensations.commit();

        let photos = if draft.photos.is_empty() {
            Vec::new()
        } else {
            let rows = draft
                .photos
                .into_iter()
                .map(|p| NewPhoto {
                    receipt_id: receipt.id,
                    defect_id: None,
                    photo_url: p.url,
                    photo_type: p.photo_type,
                    file_size: None,
                    mime_type: None,
                    uploaded_at: now,
                })
                .collect();
            match self.receipts.insert_photos(rows).await {
                Ok(photos) => photos,
                Err(err) => {
                    counter!("receiving_photo_insert_failures_total", 1);
                    warn!(
                        receipt_no = %receipt.receipt_no,
                        error = %err,
                        "photo insert failed; continuing without photos"
                    );
                    Vec::new()
                }
            }
        };

        self.notify(&receipt, &defects, &photos).await;

        counter!("receiving_receipts_created_total", 1);
        info!(
            receipt_no = %receipt.receipt_no,
            defects = defects.len(),
            photos = photos.len(),
            "receipt created"
        );
        Ok(CreatedReceipt {
            receipt,
            defects,
            photos,
        })
    }

    async fn notify(
        &self,
        receipt: &receipt::Model,
        defects: &[defect::Model],
        photos: &[photo::Model],
    ) {
        let item = match self.items.find_item(receipt.item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!(item_id = %receipt.item_id, "skipping notification: item not found");
                return;
            }
            Err(err) => {
                warn!(error = %err, "skipping notification: item lookup failed");
                return;
            }
        };
        let user = match self.users.find_user(receipt.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = %receipt.user_id, "skipping notification: user not found");
                return;
            }
            Err(err) => {
                warn!(error = %err, "skipping notification: user lookup failed");
                return;
            }
        };

        let notification = ReceiptNotification {
            receipt: receipt.clone(),
            item,
            user,
            defects: defects.to_vec(),
            photos: photos.to_vec(),
        };
        if let Err(err) = self.notifier.send(&notification).await {
            counter!("receiving_notification_failures_total", 1);
            warn!(
                receipt_no = %receipt.receipt_no,
                error = %err,
                "receipt notification failed"
            );
        }
    }

    /// Lists receipts newest first with joined item, user, defect and photo
    /// summaries.
    #[instrument(skip(self))]
    pub async fn list_receipts(&self, query: ReceiptListQuery) -> Result<ReceiptPage, ServiceError> {
        let status = query
            .status
            .as_deref()
            .map(|raw| parse_enum::<ReceiptStatus>(raw, "status"))
            .transpose()?;
        let received_from = query
            .start_date
            .as_deref()
            .map(|raw| parse_date_bound(raw, "start_date", false))
            .transpose()?;
        let received_to = query
            .end_date
            .as_deref()
            .map(|raw| parse_date_bound(raw, "end_date", true))
            .transpose()?;

        let filter = ReceiptFilter {
            status,
            item_id: query.item_id,
            user_id: query.user_id,
            received_from,
            received_to,
        };
        let limit = query
            .limit
            .unwrap_or(DEFAULT_RECEIPT_PAGE_SIZE)
            .clamp(1, self.max_page_size);
        let offset = checked_offset(query.offset)?;

        let page = self
            .receipts
            .list_receipts(&filter, PageRequest::new(limit, offset))
            .await
            .map_err(|e| ServiceError::dependency("Failed to fetch receipts", e))?;

        Ok(ReceiptPage {
            pagination: Pagination::new(page.total, limit, offset),
            entries: page.rows.into_iter().map(ReceiptListEntry::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::MockReceiptNotifier;
    use crate::store::{
        MockItemStore, MockReceiptNumberGenerator, MockReceiptStore, MockUserStore, Page,
        StoreError,
    };
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn service(
        receipts: MockReceiptStore,
        numbers: MockReceiptNumberGenerator,
        notifier: MockReceiptNotifier,
    ) -> ReceiptService {
        let mut items = MockItemStore::new();
        items.expect_find_item().returning(|_| Ok(None));
        let users = MockUserStore::new();
        ReceiptService::new(
            Arc::new(receipts),
            Arc::new(items),
            Arc::new(users),
            Arc::new(numbers),
            Arc::new(notifier),
            500,
        )
    }

    fn request(quantity: Option<i64>) -> CreateReceiptRequest {
        CreateReceiptRequest {
            item_id: Some(Uuid::new_v4()),
            user_id: Some(Uuid::new_v4()),
            quantity,
            ..Default::default()
        }
    }

    fn stored(new: NewReceipt) -> receipt::Model {
        receipt::Model {
            id: Uuid::new_v4(),
            receipt_no: new.receipt_no,
            item_id: new.item_id,
            user_id: new.user_id,
            qr_code: new.qr_code,
            quantity: new.quantity,
            defect_quantity: new.defect_quantity,
            status: new.status,
            location: new.location,
            notes: new.notes,
            received_at: new.received_at,
            updated_at: None,
        }
    }

    #[rstest]
    #[case(Some(0))]
    #[case(Some(-3))]
    #[tokio::test]
    async fn non_positive_quantity_never_touches_the_store(#[case] quantity: Option<i64>) {
        // Mocks without expectations panic on any call.
        let svc = service(
            MockReceiptStore::new(),
            MockReceiptNumberGenerator::new(),
            MockReceiptNotifier::new(),
        );
        let err = svc.create_receipt(request(quantity)).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Quantity must be greater than 0");
    }

    #[tokio::test]
    async fn missing_fields_are_reported_together() {
        let svc = service(
            MockReceiptStore::new(),
            MockReceiptNumberGenerator::new(),
            MockReceiptNotifier::new(),
        );
        let err = svc.create_receipt(request(None)).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Missing required fields: item_id, user_id, quantity");
    }

    #[rstest]
    #[case::severity(
        DefectInput { defect_type: "dent".into(), severity: Some("catastrophic".into()), ..Default::default() },
        "Invalid defect severity: catastrophic"
    )]
    #[case::negative(
        DefectInput { defect_type: "dent".into(), quantity: Some(-1), ..Default::default() },
        "Defect quantity cannot be negative"
    )]
    #[case::untyped(DefectInput::default(), "Each defect requires a type")]
    fn invalid_defects_are_rejected(#[case] defect: DefectInput, #[case] message: &str) {
        let mut req = request(Some(5));
        req.defects = Some(vec![defect]);
        assert_matches!(req.validate(), Err(ServiceError::ValidationError(msg)) if msg == message);
    }

    #[test]
    fn invalid_photo_entries_are_rejected() {
        let mut req = request(Some(5));
        req.photo_urls = Some(vec![PhotoUrlInput {
            url: "https://cdn/x.jpg".into(),
            photo_type: Some("selfie".into()),
            defect_index: None,
        }]);
        assert_matches!(req.validate(), Err(ServiceError::ValidationError(msg)) if msg == "Invalid photo type: selfie");

        let mut req = request(Some(5));
        req.photo_urls = Some(vec![PhotoUrlInput::default()]);
        assert_matches!(req.validate(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn defect_quantities_default_to_one_and_are_summed() {
        let mut req = request(Some(10));
        req.defects = Some(vec![
            DefectInput {
                defect_type: "dent".into(),
                ..Default::default()
            },
            DefectInput {
                defect_type: "tear".into(),
                quantity: Some(4),
                severity: Some("HIGH".into()),
                ..Default::default()
            },
        ]);
        let draft = req.validate().unwrap();
        assert_eq!(draft.defect_quantity(), 5);
        assert_eq!(draft.defects[0].severity, Severity::Medium);
        assert_eq!(draft.defects[1].severity, Severity::High);
    }

    #[tokio::test]
    async fn number_allocation_failure_writes_nothing() {
        let mut numbers = MockReceiptNumberGenerator::new();
        numbers
            .expect_next_receipt_no()
            .returning(|| Err(StoreError::Backend("sequence unavailable".into())));
        let svc = service(MockReceiptStore::new(), numbers, MockReceiptNotifier::new());

        let err = svc.create_receipt(request(Some(1))).await.unwrap_err();
        assert_eq!(err.response_message(), "Failed to generate receipt number");
    }

    #[tokio::test]
    async fn failed_defect_insert_deletes_the_receipt() {
        let mut numbers = MockReceiptNumberGenerator::new();
        numbers
            .expect_next_receipt_no()
            .returning(|| Ok("RCV-20240101-000001".into()));

        let mut receipts = MockReceiptStore::new();
        receipts
            .expect_insert_receipt()
            .times(1)
            .returning(|new| Ok(stored(new)));
        receipts
            .expect_insert_defects()
            .times(1)
            .returning(|_| Err(StoreError::Backend("disk full".into())));
        receipts
            .expect_delete_receipt()
            .times(1)
            .returning(|_| Ok(()));

        let svc = service(receipts, numbers, MockReceiptNotifier::new());
        let mut req = request(Some(3));
        req.defects = Some(vec![DefectInput {
            defect_type: "dent".into(),
            ..Default::default()
        }]);

        let err = svc.create_receipt(req).await.unwrap_err();
        assert_matches!(err, ServiceError::Dependency { error, details } => {
            assert_eq!(error, "Failed to create defects");
            assert!(details.contains("disk full"));
        });
    }

    #[tokio::test]
    async fn receipt_conflicts_surface_as_conflicts() {
        let mut numbers = MockReceiptNumberGenerator::new();
        numbers
            .expect_next_receipt_no()
            .returning(|| Ok("RCV-20240101-000001".into()));
        let mut receipts = MockReceiptStore::new();
        receipts
            .expect_insert_receipt()
            .returning(|_| Err(StoreError::Conflict("receipts_receipt_no_key".into())));

        let svc = service(receipts, numbers, MockReceiptNotifier::new());
        let err = svc.create_receipt(request(Some(1))).await.unwrap_err();
        assert_matches!(err, ServiceError::Conflict { error, details } => {
            assert_eq!(error, "Receipt number already exists");
            assert_eq!(details.as_deref(), Some("receipts_receipt_no_key"));
        });
    }

    #[tokio::test]
    async fn unknown_item_or_user_is_not_found() {
        let mut numbers = MockReceiptNumberGenerator::new();
        numbers
            .expect_next_receipt_no()
            .returning(|| Ok("RCV-20240101-000001".into()));
        let mut receipts = MockReceiptStore::new();
        receipts
            .expect_insert_receipt()
            .returning(|new| {
                Err(StoreError::ForeignKey(format!(
                    "item {} does not exist",
                    new.item_id
                )))
            });
        receipts.expect_insert_defects().never();

        let svc = service(receipts, numbers, MockReceiptNotifier::new());
        let err = svc.create_receipt(request(Some(1))).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        assert!(err.response_message().starts_with("Item or user not found"));
    }

    #[tokio::test]
    async fn a_failed_rollback_is_reported_in_details() {
        let mut numbers = MockReceiptNumberGenerator::new();
        numbers
            .expect_next_receipt_no()
            .returning(|| Ok("RCV-20240101-000001".into()));
        let mut receipts = MockReceiptStore::new();
        receipts.expect_insert_receipt().returning(|new| Ok(stored(new)));
        receipts
            .expect_insert_defects()
            .returning(|_| Err(StoreError::Backend("disk full".into())));
        receipts
            .expect_delete_receipt()
            .times(1)
            .returning(|_| Err(StoreError::Backend("connection reset".into())));

        let svc = service(receipts, numbers, MockReceiptNotifier::new());
        let mut req = request(Some(3));
        req.defects = Some(vec![DefectInput {
            defect_type: "dent".into(),
            ..Default::default()
        }]);

        let err = svc.create_receipt(req).await.unwrap_err();
        assert_matches!(err, ServiceError::Dependency { error, details } => {
            assert_eq!(error, "Failed to create defects");
            assert_eq!(details, "disk full; rollback incomplete: delete_receipt failed");
        });
    }

    #[tokio::test]
    async fn offsets_past_the_signed_range_are_rejected() {
        let mut receipts = MockReceiptStore::new();
        receipts.expect_list_receipts().never();
        let svc = service(
            receipts,
            MockReceiptNumberGenerator::new(),
            MockReceiptNotifier::new(),
        );

        let err = svc
            .list_receipts(ReceiptListQuery {
                offset: Some(i64::MAX as u64 + 1),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[rstest]
    #[case(Some(0), 1)]
    #[case(Some(10_000), 500)]
    #[case(None, DEFAULT_RECEIPT_PAGE_SIZE)]
    #[tokio::test]
    async fn list_limit_is_clamped(#[case] requested: Option<u64>, #[case] expected: u64) {
        let mut receipts = MockReceiptStore::new();
        receipts
            .expect_list_receipts()
            .withf(move |_, page| page.limit == expected && page.offset == 0)
            .returning(|_, _| Ok(Page { rows: Vec::new(), total: 0 }));
        let svc = service(
            receipts,
            MockReceiptNumberGenerator::new(),
            MockReceiptNotifier::new(),
        );

        let page = svc
            .list_receipts(ReceiptListQuery {
                limit: requested,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.limit, expected);
        assert!(!page.pagination.has_more);
    }

    #[tokio::test]
    async fn list_store_failures_are_dependency_errors() {
        let mut receipts = MockReceiptStore::new();
        receipts
            .expect_list_receipts()
            .returning(|_, _| Err(StoreError::Backend("timeout".into())));
        let svc = service(
            receipts,
            MockReceiptNumberGenerator::new(),
            MockReceiptNotifier::new(),
        );

        let err = svc.list_receipts(ReceiptListQuery::default()).await.unwrap_err();
        assert_eq!(err.response_message(), "Failed to fetch receipts");
    }

    #[test]
    fn date_bounds_accept_dates_and_timestamps() {
        let from = parse_date_bound("2024-05-01", "start_date", false).unwrap();
        assert_eq!(from.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        let to = parse_date_bound("2024-05-01", "end_date", true).unwrap();
        assert_eq!(to.date_naive(), from.date_naive());
        assert!(to > from);
        let ts = parse_date_bound("2024-05-01T10:00:00+02:00", "start_date", false).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_date_bound("May 1st", "start_date", false).is_err());
    }
}
