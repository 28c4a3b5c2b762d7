//! `/credits` handlers.

use crate::{
    api::{AppState, auth::CurrentUser, error::ApiResult},
    core::credit::{self, CreditFilter, CreditUpdate, NewCredit},
    entities::{CreditStatus, credit as credit_entity},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Query string of `GET /credits`.
#[derive(Debug, Default, Deserialize)]
pub struct CreditQuery {
    /// Only credits of this client
    pub client_id: Option<i64>,
    /// Only credits in this status
    pub status: Option<CreditStatus>,
    /// Rows to skip
    pub skip: Option<u64>,
    /// Maximum rows to return
    pub limit: Option<u64>,
}

/// `GET /credits`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<CreditQuery>,
) -> ApiResult<Json<Vec<credit_entity::Model>>> {
    let page = state.page(query.skip, query.limit);
    let filter = CreditFilter {
        client_id: query.client_id,
        status: query.status,
    };
    Ok(Json(credit::list_credits(&state.db, &actor, filter, page).await?))
}

/// `POST /credits`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<NewCredit>,
) -> ApiResult<(StatusCode, Json<credit_entity::Model>)> {
    let created = credit::create_credit(&state.db, &actor, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /credits/:id`
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<credit_entity::Model>> {
    Ok(Json(credit::get_credit(&state.db, &actor, id).await?))
}

/// `PATCH /credits/:id`
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<CreditUpdate>,
) -> ApiResult<Json<credit_entity::Model>> {
    Ok(Json(credit::update_credit(&state.db, &actor, id, body).await?))
}

/// `DELETE /credits/:id`
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    credit::delete_credit(&state.db, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
