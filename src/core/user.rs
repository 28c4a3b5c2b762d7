//! User directory - account creation, updates, and route grants.
//!
//! Only an ADMIN creates accounts. Every new account gets its cash box in the
//! same transaction. Supervisor links are validated here: admins never have a
//! supervisor, a supervisor must be an ADMIN or SUPERVISOR, and no user may end
//! up as its own transitive supervisor.

use crate::{
    core::{Page, cash_box, clean, visibility},
    entities::{Role, RouteGrant, User, route_grant, user},
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use sea_orm::{
    PaginatorTrait, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, prelude::*,
};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, instrument};

/// Input for creating an account.
#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    /// Login name
    pub username: String,
    /// Plain-text password, hashed before storage
    pub password: String,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Operating zone
    #[serde(default)]
    pub zone: Option<String>,
    /// Role of the new account
    pub role: Role,
    /// Direct supervisor
    #[serde(default)]
    pub supervisor_id: Option<i64>,
}

/// Partial update of an account. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdate {
    /// New email
    pub email: Option<String>,
    /// New display name
    pub full_name: Option<String>,
    /// New phone
    pub phone: Option<String>,
    /// New zone
    pub zone: Option<String>,
    /// New password
    pub password: Option<String>,
    /// New role (admin only)
    pub role: Option<Role>,
    /// New supervisor (admin only)
    pub supervisor_id: Option<i64>,
    /// Remove the supervisor link (admin only)
    pub clear_supervisor: bool,
    /// Activate or deactivate the account (admin only)
    pub is_active: Option<bool>,
}

impl UserUpdate {
    const fn touches_hierarchy(&self) -> bool {
        self.role.is_some()
            || self.supervisor_id.is_some()
            || self.clear_supervisor
            || self.is_active.is_some()
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Hashing {
            message: e.to_string(),
        })
}

/// Checks a password against the stored hash.
#[must_use]
pub fn verify_password(user: &user::Model, password: &str) -> bool {
    PasswordHash::new(&user.hashed_password)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Validates a prospective supervisor link for `user_id` (if it exists yet).
async fn validate_supervisor<C>(
    db: &C,
    user_id: Option<i64>,
    role: Role,
    supervisor_id: Option<i64>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(supervisor_id) = supervisor_id else {
        return Ok(());
    };

    if role == Role::Admin {
        return Err(Error::validation("an admin cannot have a supervisor"));
    }

    let supervisor = User::find_by_id(supervisor_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::validation(format!("invalid supervisor_id {supervisor_id}")))?;
    if !supervisor.role.is_manager() {
        return Err(Error::validation(format!(
            "user {supervisor_id} is not an admin or supervisor"
        )));
    }

    let Some(user_id) = user_id else {
        return Ok(());
    };

    // Walk up from the proposed supervisor; reaching the user again is a cycle.
    let mut seen = HashSet::new();
    let mut current = Some(supervisor);
    while let Some(node) = current {
        if node.id == user_id {
            return Err(Error::validation("supervisor chain would form a cycle"));
        }
        if !seen.insert(node.id) {
            break;
        }
        current = match node.supervisor_id {
            Some(next) => User::find_by_id(next).one(db).await?,
            None => None,
        };
    }
    Ok(())
}

/// Inserts an account and its cash box. Caller owns the transaction.
async fn insert_user<C>(db: &C, new_user: NewUser) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let username = new_user.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::validation("username cannot be empty"));
    }
    if new_user.password.is_empty() {
        return Err(Error::validation("password cannot be empty"));
    }

    let taken = User::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::conflict(format!("username {username} already exists")));
    }

    validate_supervisor(db, None, new_user.role, new_user.supervisor_id).await?;

    let now = chrono::Utc::now();
    let model = user::ActiveModel {
        username: Set(username),
        email: Set(clean(new_user.email)),
        full_name: Set(clean(new_user.full_name)),
        phone: Set(clean(new_user.phone)),
        zone: Set(clean(new_user.zone)),
        hashed_password: Set(hash_password(&new_user.password)?),
        role: Set(new_user.role),
        is_active: Set(true),
        supervisor_id: Set(new_user.supervisor_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = model.insert(db).await?;

    cash_box::insert_box(db, created.id).await?;

    info!(user_id = created.id, username = %created.username, role = ?created.role, "Created user");
    Ok(created)
}

/// Creates an account. ADMIN only.
#[instrument(skip(db, actor, new_user), fields(actor = actor.id, username = %new_user.username))]
pub async fn create_user(
    db: &DatabaseConnection,
    actor: &user::Model,
    new_user: NewUser,
) -> Result<user::Model> {
    visibility::require_admin(actor)?;

    let txn = db.begin().await?;
    let created = insert_user(&txn, new_user).await?;
    txn.commit().await?;
    Ok(created)
}

/// Public self-registration. Disabled unless `allowed` is set by configuration;
/// when enabled it only ever creates unsupervised collectors.
pub async fn register_public(
    db: &DatabaseConnection,
    allowed: bool,
    mut new_user: NewUser,
) -> Result<user::Model> {
    if !allowed {
        return Err(Error::denied("self-registration is disabled"));
    }
    new_user.role = Role::Collector;
    new_user.supervisor_id = None;

    let txn = db.begin().await?;
    let created = insert_user(&txn, new_user).await?;
    txn.commit().await?;
    Ok(created)
}

/// Creates the first admin when the directory has none.
///
/// Returns `None` if an admin already exists.
pub async fn bootstrap_admin(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<user::Model>> {
    let txn = db.begin().await?;
    let existing = User::find()
        .filter(user::Column::Role.eq(Role::Admin))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let created = insert_user(
        &txn,
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            email: None,
            full_name: None,
            phone: None,
            zone: None,
            role: Role::Admin,
            supervisor_id: None,
        },
    )
    .await?;
    txn.commit().await?;
    Ok(Some(created))
}

/// Fetches a user the actor is allowed to see.
pub async fn get_user(
    db: &DatabaseConnection,
    actor: &user::Model,
    user_id: i64,
) -> Result<user::Model> {
    let target = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: user_id,
        })?;

    visibility::scope_for(db, actor)
        .await?
        .ensure(target.id, "user")?;
    Ok(target)
}

/// Lists the users within the actor's scope, ordered by id.
pub async fn list_users(
    db: &DatabaseConnection,
    actor: &user::Model,
    page: Page,
) -> Result<Vec<user::Model>> {
    let scope = visibility::scope_for(db, actor).await?;
    let Some(query) = scope.restrict(User::find(), user::Column::Id) else {
        return Ok(Vec::new());
    };

    query
        .order_by_asc(user::Column::Id)
        .offset(page.skip)
        .limit(page.limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates an account.
///
/// Profile fields and password may be changed by the user itself or an admin.
/// Role, supervisor and active flag are admin-only.
#[instrument(skip(db, actor, update), fields(actor = actor.id))]
pub async fn update_user(
    db: &DatabaseConnection,
    actor: &user::Model,
    user_id: i64,
    update: UserUpdate,
) -> Result<user::Model> {
    let is_admin = actor.role == Role::Admin;
    if !is_admin && actor.id != user_id {
        return Err(Error::denied("you may only edit your own account"));
    }
    if !is_admin && update.touches_hierarchy() {
        visibility::require_admin(actor)?;
    }

    let txn = db.begin().await?;
    let target = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: user_id,
        })?;

    let role = update.role.unwrap_or(target.role);
    let supervisor_id = if update.clear_supervisor {
        None
    } else {
        update.supervisor_id.or(target.supervisor_id)
    };
    if role == Role::Admin && supervisor_id.is_some() {
        return Err(Error::validation("an admin cannot have a supervisor"));
    }
    if supervisor_id != target.supervisor_id || role != target.role {
        validate_supervisor(&txn, Some(target.id), role, supervisor_id).await?;
    }
    if role == Role::Collector && target.role != Role::Collector {
        let reports = User::find()
            .filter(user::Column::SupervisorId.eq(target.id))
            .count(&txn)
            .await?;
        if reports > 0 {
            return Err(Error::conflict(format!(
                "user {user_id} still supervises {reports} account(s)"
            )));
        }
    }
    if target.role == Role::Supervisor && role != Role::Supervisor {
        RouteGrant::delete_many()
            .filter(route_grant::Column::SupervisorId.eq(target.id))
            .exec(&txn)
            .await?;
    }

    let mut model: user::ActiveModel = target.into();
    if let Some(email) = update.email {
        model.email = Set(clean(Some(email)));
    }
    if let Some(full_name) = update.full_name {
        model.full_name = Set(clean(Some(full_name)));
    }
    if let Some(phone) = update.phone {
        model.phone = Set(clean(Some(phone)));
    }
    if let Some(zone) = update.zone {
        model.zone = Set(clean(Some(zone)));
    }
    if let Some(password) = update.password {
        if password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }
        model.hashed_password = Set(hash_password(&password)?);
    }
    if let Some(is_active) = update.is_active {
        model.is_active = Set(is_active);
    }
    model.role = Set(role);
    model.supervisor_id = Set(supervisor_id);
    model.updated_at = Set(chrono::Utc::now());

    let updated = model.update(&txn).await?;
    txn.commit().await?;
    info!(user_id, "Updated user");
    Ok(updated)
}

/// Grants `supervisor_id` visibility over `granted_user_id`. ADMIN only.
pub async fn grant_route(
    db: &DatabaseConnection,
    actor: &user::Model,
    supervisor_id: i64,
    granted_user_id: i64,
) -> Result<route_grant::Model> {
    visibility::require_admin(actor)?;
    if supervisor_id == granted_user_id {
        return Err(Error::validation("a supervisor always sees itself"));
    }

    let txn = db.begin().await?;
    let supervisor = User::find_by_id(supervisor_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: supervisor_id,
        })?;
    if supervisor.role != Role::Supervisor {
        return Err(Error::validation(format!(
            "user {supervisor_id} is not a supervisor"
        )));
    }
    User::find_by_id(granted_user_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: granted_user_id,
        })?;

    let existing = RouteGrant::find()
        .filter(route_grant::Column::SupervisorId.eq(supervisor_id))
        .filter(route_grant::Column::GrantedUserId.eq(granted_user_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict("route already granted"));
    }

    let grant = route_grant::ActiveModel {
        supervisor_id: Set(supervisor_id),
        granted_user_id: Set(granted_user_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => Error::conflict("route already granted"),
        _ => err.into(),
    })?;
    txn.commit().await?;

    info!(supervisor_id, granted_user_id, "Granted route");
    Ok(grant)
}

/// Removes a route grant. ADMIN only.
pub async fn revoke_route(
    db: &DatabaseConnection,
    actor: &user::Model,
    supervisor_id: i64,
    granted_user_id: i64,
) -> Result<()> {
    visibility::require_admin(actor)?;

    let result = RouteGrant::delete_many()
        .filter(route_grant::Column::SupervisorId.eq(supervisor_id))
        .filter(route_grant::Column::GrantedUserId.eq(granted_user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "route grant",
            id: granted_user_id,
        });
    }
    Ok(())
}

/// Lists the grants held by a supervisor. Visible to admins and the supervisor itself.
pub async fn list_route_grants(
    db: &DatabaseConnection,
    actor: &user::Model,
    supervisor_id: i64,
) -> Result<Vec<route_grant::Model>> {
    if actor.role != Role::Admin && actor.id != supervisor_id {
        return Err(Error::denied("route grants are visible to admins and their holder"));
    }

    RouteGrant::find()
        .filter(route_grant::Column::SupervisorId.eq(supervisor_id))
        .order_by_asc(route_grant::Column::GrantedUserId)
        .all(db)
        .await
        .map_err(Into::into)
}
