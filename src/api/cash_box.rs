//! `/box` handlers.

use crate::{
    api::{AppState, PageQuery, auth::CurrentUser, error::ApiResult},
    core::cash_box::{self, BoxClosing},
    entities::{box_movement, cash_box as cash_box_entity},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

/// A box after a balance change, with the movement that caused it.
#[derive(Debug, Serialize)]
pub struct BoxChange {
    /// Box state after the change
    #[serde(rename = "box")]
    pub cash_box: cash_box_entity::Model,
    /// The recorded movement
    pub movement: box_movement::Model,
}

impl From<(cash_box_entity::Model, box_movement::Model)> for BoxChange {
    fn from((cash_box, movement): (cash_box_entity::Model, box_movement::Model)) -> Self {
        Self { cash_box, movement }
    }
}

/// Both boxes after a transfer.
#[derive(Debug, Serialize)]
pub struct TransferResult {
    /// Source box
    pub from: cash_box_entity::Model,
    /// Destination box
    pub to: cash_box_entity::Model,
}

/// Body of `POST /box/transfer`.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Owner of the source box
    pub from_user_id: i64,
    /// Owner of the destination box
    pub to_user_id: i64,
    /// Amount to move
    pub amount: f64,
}

/// Body of `POST /box/:user_id/expense`.
#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    /// Amount spent
    pub amount: f64,
    /// What the money was spent on
    pub description: String,
}

/// Body of `POST /box/:user_id/insurance`.
#[derive(Debug, Deserialize)]
pub struct InsuranceRequest {
    /// Premium collected
    pub amount: f64,
    /// Client who paid it
    pub client_id: i64,
}

/// Body of `POST /box/:user_id/deposit`.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    /// Amount added
    pub amount: f64,
    /// Optional note
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `POST /box/:user_id/withdrawal`.
#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    /// Amount taken out
    pub amount: f64,
    /// Hand the cash to the owner's supervisor
    #[serde(default)]
    pub to_supervisor: bool,
}

/// Body of `POST /box/:user_id/close`.
#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    /// Physically counted cash
    pub counted_balance: f64,
    /// Optional note
    #[serde(default)]
    pub notes: Option<String>,
}

/// `GET /box/:user_id`
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<cash_box_entity::Model>> {
    Ok(Json(cash_box::get_box(&state.db, &actor, user_id).await?))
}

/// `POST /box/:user_id` - opens a box for a user that has none.
pub async fn open(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<cash_box_entity::Model>)> {
    let created = cash_box::create_box_for_user(&state.db, &actor, user_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /box/:user_id/movements`
pub async fn movements(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<box_movement::Model>>> {
    let page = state.page(query.skip, query.limit);
    Ok(Json(
        cash_box::list_movements(&state.db, &actor, user_id, page).await?,
    ))
}

/// `POST /box/transfer`
pub async fn transfer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<TransferRequest>,
) -> ApiResult<Json<TransferResult>> {
    let (from, to) = cash_box::transfer_base(
        &state.db,
        &actor,
        body.from_user_id,
        body.to_user_id,
        body.amount,
    )
    .await?;
    Ok(Json(TransferResult { from, to }))
}

/// `POST /box/:user_id/expense`
pub async fn expense(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    Json(body): Json<ExpenseRequest>,
) -> ApiResult<Json<BoxChange>> {
    cash_box::register_expense(&state.db, &actor, user_id, body.amount, body.description)
        .await
        .map(|change| Json(BoxChange::from(change)))
        .map_err(Into::into)
}

/// `POST /box/:user_id/insurance`
pub async fn insurance(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    Json(body): Json<InsuranceRequest>,
) -> ApiResult<Json<BoxChange>> {
    cash_box::register_insurance_premium(&state.db, &actor, user_id, body.amount, body.client_id)
        .await
        .map(|change| Json(BoxChange::from(change)))
        .map_err(Into::into)
}

/// `POST /box/:user_id/deposit`
pub async fn deposit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    Json(body): Json<DepositRequest>,
) -> ApiResult<Json<BoxChange>> {
    cash_box::register_deposit(&state.db, &actor, user_id, body.amount, body.description)
        .await
        .map(|change| Json(BoxChange::from(change)))
        .map_err(Into::into)
}

/// `POST /box/:user_id/withdrawal`
pub async fn withdrawal(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    Json(body): Json<WithdrawalRequest>,
) -> ApiResult<Json<BoxChange>> {
    cash_box::register_withdrawal(&state.db, &actor, user_id, body.amount, body.to_supervisor)
        .await
        .map(|change| Json(BoxChange::from(change)))
        .map_err(Into::into)
}

/// `POST /box/:user_id/close`
pub async fn close(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    Json(body): Json<CloseRequest>,
) -> ApiResult<Json<BoxClosing>> {
    Ok(Json(
        cash_box::close_box(&state.db, &actor, user_id, body.counted_balance, body.notes).await?,
    ))
}
