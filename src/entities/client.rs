//! Client entity - Borrowers, each owned by exactly one collector.
//!
//! Clients are never hard-deleted; `is_active = false` hides them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    /// Unique identifier for the client
    #[sea_orm(primary_key)]
    pub id: i64,
    /// National ID, unique across active and inactive clients
    #[sea_orm(unique)]
    pub dni: String,
    /// Full legal name
    pub full_name: String,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// Primary phone
    pub phone: Option<String>,
    /// Secondary phone
    pub phone2: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Geolocation latitude
    pub latitude: Option<f64>,
    /// Geolocation longitude
    pub longitude: Option<f64>,
    /// URL returned by the photo storage service
    pub photo_url: Option<String>,
    /// Soft delete flag
    pub is_active: bool,
    /// Owning collector (or supervisor)
    pub collector_id: i64,
    /// When the client was registered
    pub created_at: DateTimeUtc,
    /// When the client was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Client and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each client belongs to one collector
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CollectorId",
        to = "super::user::Column::Id"
    )]
    Collector,
    /// One client has many credits
    #[sea_orm(has_many = "super::credit::Entity")]
    Credits,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collector.def()
    }
}

impl Related<super::credit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Credits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
