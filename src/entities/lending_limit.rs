//! Lending limit entity - Maximum principal a collector may disburse per credit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lending limit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lending_limits")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Collector the limit applies to, one limit per collector
    #[sea_orm(unique)]
    pub collector_id: i64,
    /// Who set the limit
    pub set_by_id: i64,
    /// Maximum principal per credit
    pub max_amount: f64,
    /// When the limit was last changed
    pub updated_at: DateTimeUtc,
}

/// Lending limits reference `users` only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The limited collector
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CollectorId",
        to = "super::user::Column::Id"
    )]
    Collector,
}

impl ActiveModelBehavior for ActiveModel {}
