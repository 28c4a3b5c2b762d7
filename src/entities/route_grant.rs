//! Route grant entity - Delegated visibility of a supervisor over an account
//! that does not report to it through `supervisor_id`. At most one row exists
//! per `(supervisor_id, granted_user_id)` pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Route grant database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "route_grants")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Supervisor receiving visibility
    pub supervisor_id: i64,
    /// Account the supervisor may see
    pub granted_user_id: i64,
    /// When the grant was issued
    pub created_at: DateTimeUtc,
}

/// Both columns reference `users`
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The supervisor holding the grant
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SupervisorId",
        to = "super::user::Column::Id"
    )]
    Supervisor,
    /// The account made visible
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::GrantedUserId",
        to = "super::user::Column::Id"
    )]
    GrantedUser,
}

impl ActiveModelBehavior for ActiveModel {}
