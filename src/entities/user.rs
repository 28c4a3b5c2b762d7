//! User entity - Accounts in the admin / supervisor / collector hierarchy.
//!
//! `supervisor_id` is a self reference; delegated visibility outside the
//! hierarchy lives in [`super::route_grant`].

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// The three roles of the back-office. Stored as uppercase strings.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Unrestricted access
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    /// Manages collectors and their clients
    #[sea_orm(string_value = "SUPERVISOR")]
    Supervisor,
    /// Field agent owning clients
    #[sea_orm(string_value = "COLLECTOR")]
    Collector,
}

impl Role {
    /// Whether this role may issue credits and manage clients of others.
    #[must_use]
    pub const fn is_manager(self) -> bool {
        matches!(self, Self::Admin | Self::Supervisor)
    }
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login name, unique across all users
    #[sea_orm(unique)]
    pub username: String,
    /// Contact email
    pub email: Option<String>,
    /// Display name
    pub full_name: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Operating zone (free text)
    pub zone: Option<String>,
    /// Argon2 PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    /// Role in the hierarchy
    pub role: Role,
    /// Inactive users cannot act
    pub is_active: bool,
    /// Direct supervisor, always `None` for admins
    pub supervisor_id: Option<i64>,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each user may report to one supervisor
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::SupervisorId",
        to = "Column::Id"
    )]
    Supervisor,
    /// A collector owns many clients
    #[sea_orm(has_many = "super::client::Entity")]
    Clients,
    /// Each user has at most one cash box
    #[sea_orm(has_one = "super::cash_box::Entity")]
    CashBox,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::cash_box::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashBox.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
