//! Bearer-token authentication for user-facing routes.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    adapters::http::app_state::AppState, app_error::AppError, application::jwt::AuthenticatedUser,
};

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::NotAuthenticated("Missing bearer token".into()))?;

        state.token_verifier.verify(bearer.token()).await
    }
}
