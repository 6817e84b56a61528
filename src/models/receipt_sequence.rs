use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Backing table for receipt numbers. Every insert hands out a fresh id that
/// is never reused, even when the receipt it was issued for is rolled back.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "receipt_sequences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub issued_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
