//! HTTP surface - JSON handlers over the core ledger.

pub mod auth;
pub mod cash_box;
pub mod clients;
pub mod credits;
pub mod error;
pub mod reports;
pub mod transactions;
pub mod users;

use crate::{config::AppConfig, core::Page};
use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub db: Arc<DatabaseConnection>,
    /// Loaded settings
    pub config: Arc<AppConfig>,
}

/// `skip`/`limit` query parameters.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Rows to skip
    pub skip: Option<u64>,
    /// Maximum rows to return
    pub limit: Option<u64>,
}

impl AppState {
    /// Turns request pagination into a bounded [`Page`].
    #[must_use]
    pub fn page(&self, skip: Option<u64>, limit: Option<u64>) -> Page {
        Page {
            skip: skip.unwrap_or(0),
            limit: self.config.page_size(limit),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(reports::health))
        .route("/stats", get(reports::stats))
        .route("/limits/:collector_id", put(reports::set_limit).get(reports::get_limit))
        .route("/register", post(users::register))
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::get).patch(users::update))
        .route("/users/:id/routes", get(users::list_routes).post(users::grant_route))
        .route(
            "/users/:id/routes/:granted",
            axum::routing::delete(users::revoke_route),
        )
        .route("/clients", get(clients::list).post(clients::create))
        .route(
            "/clients/:id",
            get(clients::get)
                .patch(clients::update)
                .delete(clients::deactivate),
        )
        .route("/credits", get(credits::list).post(credits::create))
        .route(
            "/credits/:id",
            get(credits::get).patch(credits::update).delete(credits::delete),
        )
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route("/transactions/:id", get(transactions::get))
        .route("/box/transfer", post(cash_box::transfer))
        .route("/box/:user_id", get(cash_box::get).post(cash_box::open))
        .route("/box/:user_id/movements", get(cash_box::movements))
        .route("/box/:user_id/expense", post(cash_box::expense))
        .route("/box/:user_id/insurance", post(cash_box::insurance))
        .route("/box/:user_id/deposit", post(cash_box::deposit))
        .route("/box/:user_id/withdrawal", post(cash_box::withdrawal))
        .route("/box/:user_id/close", post(cash_box::close))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]
    use super::{AppState, router};
    use crate::{api::auth::USER_ID_HEADER, config::AppConfig};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use sea_orm::DatabaseConnection;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Sends one request through a fresh router and decodes the JSON body.
    pub async fn send(
        db: &Arc<DatabaseConnection>,
        method: &str,
        uri: &str,
        actor: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send_with_config(db, AppConfig::default(), method, uri, actor, body).await
    }

    /// Like [`send`] with explicit settings.
    pub async fn send_with_config(
        db: &Arc<DatabaseConnection>,
        config: AppConfig,
        method: &str,
        uri: &str,
        actor: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = router(AppState {
            db: Arc::clone(db),
            config: Arc::new(config),
        });

        let mut request = Request::builder().method(method).uri(uri);
        if let Some(id) = actor {
            request = request.header(USER_ID_HEADER, id.to_string());
        }
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
