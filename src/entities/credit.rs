//! Credit entity - A loan issued to a client.
//!
//! `total_amount` and `daily_payment` are fixed at creation; `remaining_amount`
//! moves as payments post and stays within `[0, total_amount]`.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Lifecycle of a credit. `Completed` and `Defaulted` are terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditStatus {
    /// Being repaid
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Fully repaid
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Written off by an admin or supervisor
    #[sea_orm(string_value = "DEFAULTED")]
    Defaulted,
}

impl CreditStatus {
    /// Terminal statuses never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Defaulted)
    }
}

/// Credit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credits")]
pub struct Model {
    /// Unique identifier for the credit
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Borrowing client
    pub client_id: i64,
    /// Principal disbursed
    pub amount: f64,
    /// Interest in percent over the whole term
    pub interest_rate: f64,
    /// Term length in days
    pub term_days: i32,
    /// Flat insurance add-on
    pub insurance_amount: f64,
    /// `amount * (1 + interest_rate / 100) + insurance_amount`
    pub total_amount: f64,
    /// `total_amount / term_days`
    pub daily_payment: f64,
    /// Outstanding balance
    pub remaining_amount: f64,
    /// Lifecycle status
    pub status: CreditStatus,
    /// Disbursement date
    pub start_date: DateTimeUtc,
    /// `start_date + term_days`
    pub end_date: DateTimeUtc,
    /// When the credit was created
    pub created_at: DateTimeUtc,
    /// When the credit was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Credit and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each credit belongs to one client
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
    /// Payments and other transactions posted against the credit
    #[sea_orm(has_many = "super::cash_transaction::Entity")]
    Transactions,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::cash_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
