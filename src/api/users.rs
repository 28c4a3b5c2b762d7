//! `/users`, `/register` and route grant handlers.

use crate::{
    api::{AppState, PageQuery, auth::CurrentUser, error::ApiResult},
    core::user::{self, NewUser, UserUpdate},
    entities::{route_grant, user as user_entity},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Body of `POST /users/:id/routes`.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// Account the supervisor gains visibility over
    pub granted_user_id: i64,
}

/// `GET /users`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<user_entity::Model>>> {
    let page = state.page(query.skip, query.limit);
    Ok(Json(user::list_users(&state.db, &actor, page).await?))
}

/// `POST /users`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<user_entity::Model>)> {
    let created = user::create_user(&state.db, &actor, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<user_entity::Model>)> {
    let created =
        user::register_public(&state.db, state.config.allow_self_registration, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /users/:id`
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<user_entity::Model>> {
    Ok(Json(user::get_user(&state.db, &actor, id).await?))
}

/// `PATCH /users/:id`
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UserUpdate>,
) -> ApiResult<Json<user_entity::Model>> {
    Ok(Json(user::update_user(&state.db, &actor, id, body).await?))
}

/// `GET /users/:id/routes`
pub async fn list_routes(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<route_grant::Model>>> {
    Ok(Json(user::list_route_grants(&state.db, &actor, id).await?))
}

/// `POST /users/:id/routes`
pub async fn grant_route(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<GrantRequest>,
) -> ApiResult<(StatusCode, Json<route_grant::Model>)> {
    let grant = user::grant_route(&state.db, &actor, id, body.granted_user_id).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// `DELETE /users/:id/routes/:granted`
pub async fn revoke_route(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((id, granted)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    user::revoke_route(&state.db, &actor, id, granted).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::{
        api::test_support::{send, send_with_config},
        config::AppConfig,
        entities::Role,
        errors::Result,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_or_unknown_actor_is_unauthorized() -> Result<()> {
        let (db, _admin) = setup_with_admin().await?;
        let db = Arc::new(db);

        let (status, body) = send(&db, "GET", "/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = send(&db, "GET", "/users", Some(999), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_creates_user_without_leaking_hash() -> Result<()> {
        let (db, admin) = setup_with_admin().await?;
        let db = Arc::new(db);

        let (status, body) = send(
            &db,
            "POST",
            "/users",
            Some(admin.id),
            Some(json!({
                "username": "ana",
                "password": "pw",
                "role": "SUPERVISOR",
                "zone": "Norte"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "SUPERVISOR");
        assert_eq!(body["zone"], "Norte");
        assert!(body.get("hashed_password").is_none());

        let (status, _) = send(
            &db,
            "POST",
            "/users",
            Some(admin.id),
            Some(json!({ "username": "ana", "password": "pw", "role": "COLLECTOR" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn test_collector_sees_only_itself() -> Result<()> {
        let h = setup_hierarchy().await?;
        let db = Arc::new(h.db);

        let (status, body) = send(&db, "GET", "/users", Some(h.collector.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/users/{}", h.outsider.id);
        let (status, _) = send(&db, "GET", &uri, Some(h.collector.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_route_grants_over_http() -> Result<()> {
        let h = setup_hierarchy().await?;
        let db = Arc::new(h.db);
        let uri = format!("/users/{}/routes", h.supervisor.id);

        let (status, _) = send(
            &db,
            "POST",
            &uri,
            Some(h.admin.id),
            Some(json!({ "granted_user_id": h.outsider.id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&db, "GET", &uri, Some(h.supervisor.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let outsider_uri = format!("/users/{}", h.outsider.id);
        let (status, _) = send(&db, "GET", &outsider_uri, Some(h.supervisor.id), None).await;
        assert_eq!(status, StatusCode::OK);

        let revoke = format!("/users/{}/routes/{}", h.supervisor.id, h.outsider.id);
        let (status, _) = send(&db, "DELETE", &revoke, Some(h.admin.id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&db, "GET", &outsider_uri, Some(h.supervisor.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_self_registration_follows_config() -> Result<()> {
        let (db, _admin) = setup_with_admin().await?;
        let db = Arc::new(db);
        let body = json!({ "username": "walkin", "password": "pw", "role": "ADMIN" });

        let (status, _) = send(&db, "POST", "/register", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let config = AppConfig {
            allow_self_registration: true,
            ..AppConfig::default()
        };
        let (status, created) =
            send_with_config(&db, config, "POST", "/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["role"], "COLLECTOR");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_user_over_http() -> Result<()> {
        let h = setup_hierarchy().await?;
        let db = Arc::new(h.db);
        let uri = format!("/users/{}", h.collector.id);

        let (status, body) = send(
            &db,
            "PATCH",
            &uri,
            Some(h.collector.id),
            Some(json!({ "phone": "555-0101" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "555-0101");

        let (status, _) = send(
            &db,
            "PATCH",
            &uri,
            Some(h.collector.id),
            Some(json!({ "role": Role::Admin })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
