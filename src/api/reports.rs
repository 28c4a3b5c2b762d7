//! `/stats`, `/limits` and `/health` handlers.

use crate::{
    api::{AppState, auth::CurrentUser, error::ApiResult},
    core::{
        limit,
        stats::{self, CollectionStats, StatsFilter},
        visibility,
    },
    entities::lending_limit,
    errors::Error,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use sea_orm::ConnectionTrait;
use serde::Deserialize;
use serde_json::{Value, json};

/// Body of `PUT /limits/:collector_id`.
#[derive(Debug, Deserialize)]
pub struct LimitRequest {
    /// Maximum principal per credit
    pub max_amount: f64,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .db
        .execute_unprepared("SELECT 1")
        .await
        .map_err(Error::from)?;
    Ok(Json(json!({ "status": "ok" })))
}

/// `GET /stats`
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<StatsFilter>,
) -> ApiResult<Json<CollectionStats>> {
    Ok(Json(stats::collection_stats(&state.db, &actor, filter).await?))
}

/// `PUT /limits/:collector_id`
pub async fn set_limit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(collector_id): Path<i64>,
    Json(body): Json<LimitRequest>,
) -> ApiResult<Json<lending_limit::Model>> {
    Ok(Json(
        limit::set_lending_limit(&state.db, &actor, collector_id, body.max_amount).await?,
    ))
}

/// `GET /limits/:collector_id`
pub async fn get_limit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(collector_id): Path<i64>,
) -> ApiResult<Json<lending_limit::Model>> {
    visibility::scope_for(&*state.db, &actor)
        .await?
        .ensure(collector_id, "collector")?;
    let found = limit::get_lending_limit(&*state.db, collector_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "lending limit",
            id: collector_id,
        })?;
    Ok(Json(found))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use crate::{api::test_support::send, errors::Result, test_utils::*};
    use axum::http::StatusCode;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let db = Arc::new(setup_test_db().await?);
        let (status, body) = send(&db, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_health_reports_database_failure() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let (status, body) = send(&db, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_limits_over_http() -> Result<()> {
        let h = setup_hierarchy().await?;
        let db = Arc::new(h.db);
        let uri = format!("/limits/{}", h.collector.id);

        let (status, _) = send(&db, "GET", &uri, Some(h.collector.id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, saved) = send(
            &db,
            "PUT",
            &uri,
            Some(h.supervisor.id),
            Some(json!({ "max_amount": 750.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["max_amount"], 750.0);

        let (status, found) = send(&db, "GET", &uri, Some(h.collector.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["set_by_id"], h.supervisor.id);

        let (status, _) = send(&db, "GET", &uri, Some(h.outsider.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_over_http() -> Result<()> {
        let h = setup_hierarchy().await?;
        let db = Arc::new(h.db);
        create_test_client(&db, &h.collector, "1", h.collector.id).await?;

        let (status, stats) = send(&db, "GET", "/stats", Some(h.supervisor.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["active_clients"], 1);
        assert_eq!(stats["payments_count"], 0);

        let uri = format!("/stats?user_id={}", h.outsider.id);
        let (status, _) = send(&db, "GET", &uri, Some(h.supervisor.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
