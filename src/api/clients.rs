//! `/clients` handlers.

use crate::{
    api::{AppState, auth::CurrentUser, error::ApiResult},
    core::client::{self, ClientFilter, ClientUpdate, NewClient},
    entities::client as client_entity,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Query string of `GET /clients`.
#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    /// Only clients of this collector
    pub collector_id: Option<i64>,
    /// Include soft-deleted clients
    #[serde(default)]
    pub include_inactive: bool,
    /// Rows to skip
    pub skip: Option<u64>,
    /// Maximum rows to return
    pub limit: Option<u64>,
}

/// `GET /clients`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Json<Vec<client_entity::Model>>> {
    let page = state.page(query.skip, query.limit);
    let filter = ClientFilter {
        collector_id: query.collector_id,
        include_inactive: query.include_inactive,
    };
    Ok(Json(client::list_clients(&state.db, &actor, filter, page).await?))
}

/// `POST /clients`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<NewClient>,
) -> ApiResult<(StatusCode, Json<client_entity::Model>)> {
    let created = client::create_client(&state.db, &actor, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /clients/:id`
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<client_entity::Model>> {
    Ok(Json(client::get_client(&state.db, &actor, id).await?))
}

/// `PATCH /clients/:id`
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ClientUpdate>,
) -> ApiResult<Json<client_entity::Model>> {
    Ok(Json(client::update_client(&state.db, &actor, id, body).await?))
}

/// `DELETE /clients/:id` - soft delete, returns the deactivated client.
pub async fn deactivate(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<client_entity::Model>> {
    Ok(Json(client::deactivate_client(&state.db, &actor, id).await?))
}
