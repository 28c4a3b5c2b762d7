//! Cash box entity - The per-user "caja".
//!
//! Holds the base balance and the independent insurance sub-balance. Balances
//! only change through [`crate::core::cash_box`], which records a movement for
//! every delta.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cash box database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_boxes")]
pub struct Model {
    /// Unique identifier for the box
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner, one box per user
    #[sea_orm(unique)]
    pub user_id: i64,
    /// Working cash
    pub base_balance: f64,
    /// Collected insurance premiums
    pub insurance_balance: f64,
    /// When a balance last changed
    pub last_updated: DateTimeUtc,
}

impl Model {
    /// Balance of the selected sub-ledger.
    #[must_use]
    pub const fn balance(&self, is_insurance: bool) -> f64 {
        if is_insurance {
            self.insurance_balance
        } else {
            self.base_balance
        }
    }
}

/// Defines relationships between `CashBox` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The owning user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Audit trail
    #[sea_orm(has_many = "super::box_movement::Entity")]
    Movements,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::box_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
