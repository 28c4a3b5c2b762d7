//! Visibility engine - decides which users' rows an actor may see or act on.
//!
//! * ADMIN sees everything.
//! * SUPERVISOR sees itself, its direct subordinates, and every account it
//!   holds a route grant for.
//! * COLLECTOR sees only itself.
//!
//! The resulting [`Scope`] gates users by id, clients by `collector_id`,
//! credits by their client's `collector_id` and cash transactions by
//! `user_id`. Targeting a specific row outside the scope is a
//! [`Error::PermissionDenied`], never a silent filter.

use crate::{
    entities::{Role, RouteGrant, User, route_grant, user},
    errors::{Error, Result},
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use std::collections::BTreeSet;
use tracing::trace;

/// Set of user ids an actor may reach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// No restriction
    All,
    /// Only rows owned by these users
    Users(BTreeSet<i64>),
}

impl Scope {
    /// Whether rows owned by `user_id` are reachable.
    #[must_use]
    pub fn contains(&self, user_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Users(ids) => ids.contains(&user_id),
        }
    }

    /// Narrows this scope to the ids also present in `other`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::All, scope) | (scope, Self::All) => scope.clone(),
            (Self::Users(a), Self::Users(b)) => Self::Users(a.intersection(b).copied().collect()),
        }
    }

    /// Adds an `id IN (...)` filter on `column`.
    ///
    /// Returns `None` when the scope is an empty id set: the caller must return
    /// an empty result instead of running an unfiltered query.
    pub fn restrict<Q, C>(&self, query: Q, column: C) -> Option<Q>
    where
        Q: QueryFilter,
        C: ColumnTrait,
    {
        match self {
            Self::All => Some(query),
            Self::Users(ids) if ids.is_empty() => None,
            Self::Users(ids) => Some(query.filter(column.is_in(ids.iter().copied()))),
        }
    }

    /// Fails with [`Error::PermissionDenied`] unless `user_id` is reachable.
    pub fn ensure(&self, user_id: i64, what: &str) -> Result<()> {
        if self.contains(user_id) {
            Ok(())
        } else {
            Err(Error::denied(format!("{what} is outside your scope")))
        }
    }
}

/// Loads the acting user. Missing or inactive accounts are unauthorized.
pub async fn load_actor<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    match User::find_by_id(user_id).one(db).await? {
        Some(actor) if actor.is_active => Ok(actor),
        _ => Err(Error::Unauthorized),
    }
}

/// `{user} ∪ direct subordinates ∪ route grants` for any user.
pub async fn downstream_ids<C>(db: &C, user_id: i64) -> Result<BTreeSet<i64>>
where
    C: ConnectionTrait,
{
    let mut ids = BTreeSet::from([user_id]);

    let subordinates: Vec<i64> = User::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::SupervisorId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;
    ids.extend(subordinates);

    let granted: Vec<i64> = RouteGrant::find()
        .select_only()
        .column(route_grant::Column::GrantedUserId)
        .filter(route_grant::Column::SupervisorId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;
    ids.extend(granted);

    trace!(user_id, ?ids, "Computed downstream ids");
    Ok(ids)
}

/// Computes the scope of `actor`.
pub async fn scope_for<C>(db: &C, actor: &user::Model) -> Result<Scope>
where
    C: ConnectionTrait,
{
    match actor.role {
        Role::Admin => Ok(Scope::All),
        Role::Supervisor => Ok(Scope::Users(downstream_ids(db, actor.id).await?)),
        Role::Collector => Ok(Scope::Users(BTreeSet::from([actor.id]))),
    }
}

/// Fails unless the actor is an ADMIN.
pub fn require_admin(actor: &user::Model) -> Result<()> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(Error::denied("only an admin may do this"))
    }
}

/// Fails unless the actor is an ADMIN or SUPERVISOR.
pub fn require_manager(actor: &user::Model) -> Result<()> {
    if actor.role.is_manager() {
        Ok(())
    } else {
        Err(Error::denied("only an admin or supervisor may do this"))
    }
}
