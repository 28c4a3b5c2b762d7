//! `/transactions` handlers.

use crate::{
    api::{AppState, auth::CurrentUser, error::ApiResult},
    core::transaction::{self, NewTransaction, TransactionFilter},
    entities::cash_transaction,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Query string of `GET /transactions`.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    /// Only rows recorded by this user
    pub user_id: Option<i64>,
    /// Only rows linked to this credit
    pub credit_id: Option<i64>,
    /// Inclusive lower bound on `created_at` (RFC 3339)
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at` (RFC 3339)
    pub to: Option<DateTime<Utc>>,
    /// Rows to skip
    pub skip: Option<u64>,
    /// Maximum rows to return
    pub limit: Option<u64>,
}

/// `GET /transactions`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Vec<cash_transaction::Model>>> {
    let page = state.page(query.skip, query.limit);
    let filter = TransactionFilter {
        user_ids: query.user_id.map(|id| vec![id]),
        credit_id: query.credit_id,
        from: query.from,
        to: query.to,
    };
    Ok(Json(
        transaction::list_transactions(&state.db, &actor, filter, page).await?,
    ))
}

/// `POST /transactions`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<NewTransaction>,
) -> ApiResult<(StatusCode, Json<cash_transaction::Model>)> {
    let recorded = transaction::create_transaction(&state.db, &actor, body).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// `GET /transactions/:id`
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<cash_transaction::Model>> {
    Ok(Json(transaction::get_transaction(&state.db, &actor, id).await?))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::{api::test_support::send, errors::Result, test_utils::*};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_payments_over_http() -> Result<()> {
        let h = setup_hierarchy().await?;
        let db = Arc::new(h.db);
        let borrower = create_test_client(&db, &h.collector, "1", h.collector.id).await?;
        fund_box(&db, &h.admin, h.collector.id, 1000.0).await?;
        let issued = create_test_credit(&db, &h.admin, borrower.id, 100.0, 10.0, 10).await?;

        let (status, body) = send(
            &db,
            "POST",
            "/transactions",
            Some(h.collector.id),
            Some(json!({ "transaction_type": "PAYMENT", "amount": 10.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "A payment must reference a credit");

        let (status, recorded) = send(
            &db,
            "POST",
            "/transactions",
            Some(h.collector.id),
            Some(json!({ "transaction_type": "PAYMENT", "amount": 10.0, "credit_id": issued.id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(recorded["user_id"], h.collector.id);

        let (status, _) = send(
            &db,
            "POST",
            "/transactions",
            Some(h.collector.id),
            Some(json!({ "transaction_type": "PAYMENT", "amount": 500.0, "credit_id": issued.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/transactions/{}", recorded["id"]);
        let (status, _) = send(&db, "GET", &uri, Some(h.outsider.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let list_uri = format!("/transactions?credit_id={}", issued.id);
        let (status, listed) = send(&db, "GET", &list_uri, Some(h.supervisor.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let foreign_uri = format!("/transactions?user_id={}", h.outsider.id);
        let (status, _) = send(&db, "GET", &foreign_uri, Some(h.collector.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
