use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::store::{ReceiptStore, StoreError};

/// Result of moving a defect back into usable stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestockOutcome {
    pub defect_id: Uuid,
    pub receipt_id: Uuid,
    /// Quantity of the removed defect.
    pub defect_reduced_by: i32,
    /// The receipt's defect quantity after the restock.
    pub defect_quantity: i32,
}

#[derive(Clone)]
pub struct DefectService {
    store: Arc<dyn ReceiptStore>,
}

impl DefectService {
    pub fn new(store: Arc<dyn ReceiptStore>) -> Self {
        Self { store }
    }

    /// Deletes a defect and lowers its receipt's defect quantity, never below
    /// zero. The two writes are not atomic: if the delete fails the receipt
    /// already carries the reduced quantity.
    #[instrument(skip(self))]
    pub async fn restock(&self, defect_id: Uuid) -> Result<RestockOutcome, ServiceError> {
        let defect = self
            .store
            .find_defect(defect_id)
            .await
            .map_err(|e| ServiceError::dependency("Failed to load defect", e))?
            .ok_or_else(|| ServiceError::NotFound("Defect not found".to_string()))?;

        let receipt = self
            .store
            .find_receipt(defect.receipt_id)
            .await
            .map_err(|e| ServiceError::dependency("Failed to load receipt", e))?
            .ok_or_else(|| ServiceError::NotFound("Related receipt not found".to_string()))?;

        let defect_quantity = (receipt.defect_quantity - defect.quantity).max(0);

        match self
            .store
            .update_defect_quantity(receipt.id, defect_quantity, Utc::now())
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                return Err(ServiceError::NotFound(
                    "Related receipt not found".to_string(),
                ))
            }
            Err(err) => {
                return Err(ServiceError::dependency(
                    "Failed to update receipt defect quantity",
                    err,
                ))
            }
        }

        self.store.delete_defect(defect.id).await.map_err(|e| {
            error!(
                defect_id = %defect.id,
                receipt_id = %receipt.id,
                error = %e,
                "defect delete failed after receipt update"
            );
            ServiceError::dependency("Failed to remove defect record", e)
        })?;

        counter!("receiving_defects_restocked_total", 1);
        info!(
            defect_id = %defect.id,
            receipt_no = %receipt.receipt_no,
            defect_quantity,
            "defect restocked"
        );
        Ok(RestockOutcome {
            defect_id: defect.id,
            receipt_id: receipt.id,
            defect_reduced_by: defect.quantity,
            defect_quantity,
        })
    }
}
