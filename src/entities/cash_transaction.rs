//! Cash transaction entity - Append-only log of money moved by a user.
//!
//! A `PAYMENT` always carries a `credit_id`; the other types may.
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Kind of cash transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Installment collected from a client
    #[sea_orm(string_value = "PAYMENT")]
    Payment,
    /// Principal paid out to a client
    #[sea_orm(string_value = "DISBURSEMENT")]
    Disbursement,
    /// Money put into a box
    #[sea_orm(string_value = "DEPOSIT")]
    Deposit,
    /// Money taken out of a box
    #[sea_orm(string_value = "WITHDRAWAL")]
    Withdrawal,
}

/// Cash transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who registered the transaction
    pub user_id: i64,
    /// Credit the transaction applies to
    pub credit_id: Option<i64>,
    /// Always positive; the type gives the direction
    pub amount: f64,
    /// Kind of transaction
    pub transaction_type: TransactionType,
    /// Free-text note
    pub description: Option<String>,
    /// When the transaction was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `CashTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The acting user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// The credit, if any
    #[sea_orm(
        belongs_to = "super::credit::Entity",
        from = "Column::CreditId",
        to = "super::credit::Column::Id"
    )]
    Credit,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::credit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Credit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
