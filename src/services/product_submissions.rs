//! Read side of the product submissions staff send in from the floor.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::product_submission;
use crate::services::checked_offset;
use crate::services::receipts::parse_date_bound;
use crate::store::{PageRequest, ProductSubmissionFilter, ProductSubmissionStore};
use crate::Pagination;

pub const DEFAULT_SUBMISSION_PAGE_SIZE: u64 = 50;

/// Query string of `GET /product-submission`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProductSubmissionListQuery {
    pub employee_id: Option<Uuid>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive)
    pub start_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive, whole day)
    pub end_date: Option<String>,
    /// Page size, default 50
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProductSubmissionPage {
    pub submissions: Vec<product_submission::Model>,
    pub pagination: Pagination,
}

#[derive(Clone)]
pub struct ProductSubmissionService {
    store: Arc<dyn ProductSubmissionStore>,
    max_page_size: u64,
}

impl ProductSubmissionService {
    pub fn new(store: Arc<dyn ProductSubmissionStore>, max_page_size: u64) -> Self {
        Self {
            store,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Lists submissions newest first.
    #[instrument(skip(self))]
    pub async fn list_submissions(
        &self,
        query: ProductSubmissionListQuery,
    ) -> Result<ProductSubmissionPage, ServiceError> {
        let filter = ProductSubmissionFilter {
            employee_id: query.employee_id,
            created_from: query
                .start_date
                .as_deref()
                .map(|raw| parse_date_bound(raw, "start_date", false))
                .transpose()?,
            created_to: query
                .end_date
                .as_deref()
                .map(|raw| parse_date_bound(raw, "end_date", true))
                .transpose()?,
        };
        let limit = query
            .limit
            .unwrap_or(DEFAULT_SUBMISSION_PAGE_SIZE)
            .clamp(1, self.max_page_size);
        let offset = checked_offset(query.offset)?;

        let page = self
            .store
            .list_product_submissions(&filter, PageRequest::new(limit, offset))
            .await
            .map_err(|e| ServiceError::dependency("Failed to fetch product submissions", e))?;
        debug!(total = page.total, returned = page.rows.len(), "product submissions listed");

        Ok(ProductSubmissionPage {
            submissions: page.rows,
            pagination: Pagination::new(page.total, limit, offset),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_submission(
        &self,
        id: Uuid,
    ) -> Result<product_submission::Model, ServiceError> {
        self.store
            .find_product_submission(id)
            .await
            .map_err(|e| ServiceError::dependency("Failed to fetch product submission", e))?
            .ok_or_else(not_found)
    }
}

pub(crate) fn not_found() -> ServiceError {
    ServiceError::NotFound("Product submission not found".to_string())
}
