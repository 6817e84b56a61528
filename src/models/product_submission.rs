use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The `product_submissions` table: products staff reported from the floor
/// that are not yet in the item catalogue.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "product_submissions")]
#[schema(as = ProductSubmission)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The submitting employee. Not a foreign key, so a submission outlives
    /// the account that made it.
    pub employee_id: Uuid,
    pub item_no: Option<String>,
    pub product_name: String,
    pub quantity: i32,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
