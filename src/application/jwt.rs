use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};

use crate::app_error::{AppError, AppResult};

pub type Claims = Map<String, Value>;

/// Identity extracted from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait AccessTokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> AppResult<AuthenticatedUser>;
}

pub fn validation(algorithm: Algorithm, issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation
}

pub fn decode_claims(token: &str, key: &DecodingKey, validation: &Validation) -> AppResult<Claims> {
    decode::<Claims>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::NotAuthenticated(e.to_string()))
}

pub fn user_from_claims(claims: &Claims, email_claim: &str) -> AppResult<AuthenticatedUser> {
    let subject = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::NotAuthenticated("No valid user found in token".into()))?;

    let email = claims
        .get(email_claim)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(AuthenticatedUser {
        subject: subject.to_string(),
        email,
    })
}
