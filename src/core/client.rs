//! Client registry - borrowers and their owning collector.
//!
//! Any role may register clients; a COLLECTOR only for itself. The owner must
//! be an active, non-admin account inside the actor's scope. DNIs are unique
//! across active and inactive clients. Removal is a soft delete.

use crate::{
    core::{Page, clean, visibility},
    entities::{Client, Role, User, client, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::{info, instrument};

/// Input for registering a client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewClient {
    /// National ID
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
    /// Photo URL from the storage service
    pub photo_url: Option<String>,
    /// Owner; defaults to the actor
    pub collector_id: Option<i64>,
}

/// Partial update of a client. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientUpdate {
    /// New national ID
    pub dni: Option<String>,
    /// New name
    pub full_name: Option<String>,
    /// New address
    pub address: Option<String>,
    /// New city
    pub city: Option<String>,
    /// New primary phone
    pub phone: Option<String>,
    /// New secondary phone
    pub phone2: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New latitude
    pub latitude: Option<f64>,
    /// New longitude
    pub longitude: Option<f64>,
    /// New photo URL
    pub photo_url: Option<String>,
    /// Reassign to another owner (admin/supervisor)
    pub collector_id: Option<i64>,
    /// Reactivate or deactivate (admin/supervisor)
    pub is_active: Option<bool>,
}

/// Filters for [`list_clients`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientFilter {
    /// Only clients of this owner
    pub collector_id: Option<i64>,
    /// Include soft-deleted clients
    pub include_inactive: bool,
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(Error::validation("latitude must be between -90 and 90"));
    }
    if longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        return Err(Error::validation("longitude must be between -180 and 180"));
    }
    Ok(())
}

/// Checks that `owner_id` can own clients on behalf of `actor`.
async fn validate_owner<C>(db: &C, actor: &user::Model, owner_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if actor.role == Role::Collector && owner_id != actor.id {
        return Err(Error::denied("collectors may only register their own clients"));
    }
    visibility::scope_for(db, actor)
        .await?
        .ensure(owner_id, "collector")?;

    let owner = User::find_by_id(owner_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: owner_id,
        })?;
    if !owner.is_active {
        return Err(Error::validation(format!("user {owner_id} is inactive")));
    }
    if owner.role == Role::Admin {
        return Err(Error::validation("an admin cannot own clients"));
    }
    Ok(owner)
}

async fn ensure_dni_free<C>(db: &C, dni: &str, except: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut query = Client::find().filter(client::Column::Dni.eq(dni));
    if let Some(id) = except {
        query = query.filter(client::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!("a client with DNI {dni} already exists")));
    }
    Ok(())
}

/// Loads a client and checks its owner against the actor's scope.
pub(crate) async fn load_visible_client<C>(
    db: &C,
    actor: &user::Model,
    client_id: i64,
) -> Result<client::Model>
where
    C: ConnectionTrait,
{
    let found = Client::find_by_id(client_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "client",
            id: client_id,
        })?;
    visibility::scope_for(db, actor)
        .await?
        .ensure(found.collector_id, "client")?;
    Ok(found)
}

/// Registers a client.
#[instrument(skip(db, actor, new_client), fields(actor = actor.id, dni = %new_client.dni))]
pub async fn create_client(
    db: &DatabaseConnection,
    actor: &user::Model,
    new_client: NewClient,
) -> Result<client::Model> {
    let dni = new_client.dni.trim().to_string();
    let full_name = new_client.full_name.trim().to_string();
    if dni.is_empty() {
        return Err(Error::validation("DNI cannot be empty"));
    }
    if full_name.is_empty() {
        return Err(Error::validation("client name cannot be empty"));
    }
    validate_coordinates(new_client.latitude, new_client.longitude)?;

    let txn = db.begin().await?;
    let owner_id = new_client.collector_id.unwrap_or(actor.id);
    validate_owner(&txn, actor, owner_id).await?;
    ensure_dni_free(&txn, &dni, None).await?;

    let now = chrono::Utc::now();
    let created = client::ActiveModel {
        dni: Set(dni),
        full_name: Set(full_name),
        address: Set(clean(new_client.address)),
        city: Set(clean(new_client.city)),
        phone: Set(clean(new_client.phone)),
        phone2: Set(clean(new_client.phone2)),
        email: Set(clean(new_client.email)),
        latitude: Set(new_client.latitude),
        longitude: Set(new_client.longitude),
        photo_url: Set(clean(new_client.photo_url)),
        is_active: Set(true),
        collector_id: Set(owner_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(client_id = created.id, collector_id = owner_id, "Registered client");
    Ok(created)
}

/// Fetches a client the actor may see.
pub async fn get_client(
    db: &DatabaseConnection,
    actor: &user::Model,
    client_id: i64,
) -> Result<client::Model> {
    load_visible_client(db, actor, client_id).await
}

/// Lists clients within the actor's scope, ordered by name.
pub async fn list_clients(
    db: &DatabaseConnection,
    actor: &user::Model,
    filter: ClientFilter,
    page: Page,
) -> Result<Vec<client::Model>> {
    let scope = visibility::scope_for(db, actor).await?;
    if let Some(collector_id) = filter.collector_id {
        scope.ensure(collector_id, "collector")?;
    }

    let Some(mut query) = scope.restrict(Client::find(), client::Column::CollectorId) else {
        return Ok(Vec::new());
    };
    if let Some(collector_id) = filter.collector_id {
        query = query.filter(client::Column::CollectorId.eq(collector_id));
    }
    if !filter.include_inactive {
        query = query.filter(client::Column::IsActive.eq(true));
    }

    query
        .order_by_asc(client::Column::FullName)
        .order_by_asc(client::Column::Id)
        .offset(page.skip)
        .limit(page.limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a client within the actor's scope.
#[instrument(skip(db, actor, update), fields(actor = actor.id))]
pub async fn update_client(
    db: &DatabaseConnection,
    actor: &user::Model,
    client_id: i64,
    update: ClientUpdate,
) -> Result<client::Model> {
    if (update.collector_id.is_some() || update.is_active.is_some()) && !actor.role.is_manager() {
        return Err(Error::denied(
            "only an admin or supervisor may reassign or (de)activate clients",
        ));
    }
    validate_coordinates(update.latitude, update.longitude)?;

    let txn = db.begin().await?;
    let current = load_visible_client(&txn, actor, client_id).await?;
    let mut model: client::ActiveModel = current.into();

    if let Some(dni) = update.dni {
        let dni = dni.trim().to_string();
        if dni.is_empty() {
            return Err(Error::validation("DNI cannot be empty"));
        }
        ensure_dni_free(&txn, &dni, Some(client_id)).await?;
        model.dni = Set(dni);
    }
    if let Some(full_name) = update.full_name {
        let full_name = full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(Error::validation("client name cannot be empty"));
        }
        model.full_name = Set(full_name);
    }
    if let Some(address) = update.address {
        model.address = Set(clean(Some(address)));
    }
    if let Some(city) = update.city {
        model.city = Set(clean(Some(city)));
    }
    if let Some(phone) = update.phone {
        model.phone = Set(clean(Some(phone)));
    }
    if let Some(phone2) = update.phone2 {
        model.phone2 = Set(clean(Some(phone2)));
    }
    if let Some(email) = update.email {
        model.email = Set(clean(Some(email)));
    }
    if update.latitude.is_some() {
        model.latitude = Set(update.latitude);
    }
    if update.longitude.is_some() {
        model.longitude = Set(update.longitude);
    }
    if let Some(photo_url) = update.photo_url {
        model.photo_url = Set(clean(Some(photo_url)));
    }
    if let Some(collector_id) = update.collector_id {
        validate_owner(&txn, actor, collector_id).await?;
        model.collector_id = Set(collector_id);
    }
    if let Some(is_active) = update.is_active {
        model.is_active = Set(is_active);
    }
    model.updated_at = Set(chrono::Utc::now());

    let updated = model.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Soft-deletes a client. ADMIN or SUPERVISOR within scope.
pub async fn deactivate_client(
    db: &DatabaseConnection,
    actor: &user::Model,
    client_id: i64,
) -> Result<client::Model> {
    visibility::require_manager(actor)?;
    update_client(
        db,
        actor,
        client_id,
        ClientUpdate {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .inspect(|c| info!(client_id = c.id, "Deactivated client"))
}
