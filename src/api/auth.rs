//! Resolves the acting user of a request.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! account id in the `x-user-id` header.

use crate::{
    api::{AppState, error::ApiError},
    core::visibility,
    entities::user,
    errors::Error,
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The active account making the request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or(Error::Unauthorized)?;

        let actor = visibility::load_actor(&*state.db, user_id).await?;
        Ok(Self(actor))
    }
}
