//! Box movement entity - One signed change to a cash box, append-only.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Tag describing why a box balance changed
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Base received from another box
    #[sea_orm(string_value = "TRANSFER_IN")]
    TransferIn,
    /// Base sent to another box
    #[sea_orm(string_value = "TRANSFER_OUT")]
    TransferOut,
    /// Operating expense
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
    /// Cash taken out of the box
    #[sea_orm(string_value = "WITHDRAWAL")]
    Withdrawal,
    /// Credit principal paid out
    #[sea_orm(string_value = "DISBURSEMENT")]
    Disbursement,
    /// Insurance premium collected
    #[sea_orm(string_value = "INSURANCE")]
    Insurance,
    /// Funds added to the box
    #[sea_orm(string_value = "DEPOSIT")]
    Deposit,
    /// End-of-day count; `amount` is the counted balance, not a delta
    #[sea_orm(string_value = "CLOSE")]
    Close,
}

/// Box movement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "box_movements")]
pub struct Model {
    /// Unique identifier for the movement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Box whose balance changed
    pub box_id: i64,
    /// Signed delta (negative for debits)
    pub amount: f64,
    /// Why the balance changed
    pub movement_type: MovementType,
    /// Free-text note
    pub description: Option<String>,
    /// Whether the insurance sub-balance was touched
    pub is_insurance: bool,
    /// Acting user
    pub performed_by_id: Option<i64>,
    /// Client tied to the movement (insurance premiums)
    pub client_id: Option<i64>,
    /// Credit tied to the movement (disbursements)
    pub credit_id: Option<i64>,
    /// When the movement was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BoxMovement` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each movement belongs to one box
    #[sea_orm(
        belongs_to = "super::cash_box::Entity",
        from = "Column::BoxId",
        to = "super::cash_box::Column::Id"
    )]
    CashBox,
}

impl Related<super::cash_box::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashBox.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
