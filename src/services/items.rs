//! Item master data and QR verification at the dock.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{item, ItemStatus};
use crate::services::checked_offset;
use crate::store::{ItemFilter, ItemPatch, ItemStore, NewItem, PageRequest, StoreError};
use crate::Pagination;

pub const DEFAULT_ITEM_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VerifyQrRequest {
    pub qr_code: Option<String>,
}

/// The item fields shown after a successful scan.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScannedItem {
    pub item_id: Uuid,
    pub item_no: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QrVerification {
    pub valid: bool,
    pub item: Option<ScannedItem>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ItemListQuery {
    /// `active` or `inactive`
    pub status: Option<String>,
    pub category: Option<String>,
    /// Page size, default 100
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(max = 64))]
    pub item_no: Option<String>,
    #[validate(length(max = 255))]
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub item_no: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// `active` or `inactive`
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ItemPage {
    pub items: Vec<item::Model>,
    pub pagination: Pagination,
}

fn parse_status(raw: &str) -> Result<ItemStatus, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid status: {raw}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn ItemStore>,
    max_page_size: u64,
}

impl ItemService {
    pub fn new(store: Arc<dyn ItemStore>, max_page_size: u64) -> Self {
        Self {
            store,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Resolves a scanned QR payload to an active item. An unknown or
    /// inactive code is a normal answer, not an error.
    #[instrument(skip(self))]
    pub async fn verify_qr(&self, qr_code: Option<String>) -> Result<QrVerification, ServiceError> {
        let code = non_blank(qr_code)
            .ok_or_else(|| ServiceError::ValidationError("QR Code is required".to_string()))?;

        let found = self
            .store
            .find_item_by_no(&code)
            .await
            .map_err(|e| ServiceError::dependency("Failed to verify QR code", e))?
            .filter(|item| item.status == ItemStatus::Active);

        Ok(match found {
            Some(item) => QrVerification {
                valid: true,
                item: Some(ScannedItem {
                    item_id: item.id,
                    item_no: item.item_no,
                    product_name: item.product_name,
                    description: item.description,
                    category: item.category,
                }),
                message: "Item verified successfully".to_string(),
            },
            None => QrVerification {
                valid: false,
                item: None,
                message: "Item not found or inactive".to_string(),
            },
        })
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self, query: ItemListQuery) -> Result<ItemPage, ServiceError> {
        let filter = ItemFilter {
            status: query.status.as_deref().map(parse_status).transpose()?,
            category: non_blank(query.category),
        };
        let limit = query
            .limit
            .unwrap_or(DEFAULT_ITEM_PAGE_SIZE)
            .clamp(1, self.max_page_size);
        let offset = checked_offset(query.offset)?;

        let page = self
            .store
            .list_items(&filter, PageRequest::new(limit, offset))
            .await
            .map_err(|e| ServiceError::dependency("Failed to fetch items", e))?;
        Ok(ItemPage {
            items: page.rows,
            pagination: Pagination::new(page.total, limit, offset),
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create_item(&self, request: CreateItemRequest) -> Result<item::Model, ServiceError> {
        request.validate()?;
        let (Some(item_no), Some(product_name)) =
            (non_blank(request.item_no), non_blank(request.product_name))
        else {
            return Err(ServiceError::ValidationError(
                "item_no and product_name are required".to_string(),
            ));
        };

        self.ensure_item_no_free(&item_no, None).await?;

        let item = self
            .store
            .insert_item(NewItem {
                item_no,
                product_name,
                description: request.description,
                category: request.category,
                status: ItemStatus::Active,
            })
            .await
            .map_err(|e| ServiceError::from_store("Failed to create item", DUPLICATE_ITEM_NO, e))?;
        info!(item_no = %item.item_no, "item created");
        Ok(item)
    }

    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        id: Uuid,
        request: UpdateItemRequest,
    ) -> Result<item::Model, ServiceError> {
        request.validate()?;
        let status = request.status.as_deref().map(parse_status).transpose()?;
        if let Some(item_no) = request.item_no.as_deref() {
            self.ensure_item_no_free(item_no, Some(id)).await?;
        }

        let patch = ItemPatch {
            item_no: request.item_no,
            product_name: request.product_name,
            description: request.description,
            category: request.category,
            status,
        };
        self.store
            .update_item(id, patch)
            .await
            .map_err(|e| ServiceError::from_store("Failed to update item", DUPLICATE_ITEM_NO, e))?
            .ok_or_else(|| ServiceError::NotFound("Item not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<item::Model, ServiceError> {
        let deleted = self
            .store
            .delete_item(id)
            .await
            .map_err(|e| match e {
                StoreError::ForeignKey(details) => ServiceError::Conflict {
                    error: "Item is referenced by existing receipts".to_string(),
                    details: Some(details),
                },
                other => ServiceError::dependency("Failed to delete item", other),
            })?
            .ok_or_else(|| ServiceError::NotFound("Item not found".to_string()))?;
        info!(item_no = %deleted.item_no, "item deleted");
        Ok(deleted)
    }

    /// Fast path only; the unique index on `item_no` is what actually
    /// prevents duplicates.
    async fn ensure_item_no_free(&self, item_no: &str, owner: Option<Uuid>) -> Result<(), ServiceError> {
        let existing = self
            .store
            .find_item_by_no(item_no)
            .await
            .map_err(|e| ServiceError::dependency("Failed to check item number", e))?;
        match existing {
            Some(item) if Some(item.id) != owner => Err(ServiceError::conflict(DUPLICATE_ITEM_NO)),
            _ => Ok(()),
        }
    }
}

const DUPLICATE_ITEM_NO: &str = "Item number already exists";
