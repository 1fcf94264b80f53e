use crate::api::models::AppState;
use crate::storage::ObjectId;
use axum::extract::OptionalFromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Key material for verifying HS256 bearer tokens
pub struct JwtKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Caller id carried by a token's `sub` claim
    pub fn verify(&self, token: &str) -> Result<ObjectId, String> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| e.to_string())?
            .claims;
        ObjectId::parse(&claims.sub).map_err(|e| e.to_string())
    }
}

/// Identity of the caller, taken from `Authorization: Bearer <jwt>`.
///
/// Only available as `Option<CurrentUser>`: a missing or bad token means no identity,
/// and handlers decide whether that is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: ObjectId,
}

impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(token) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return Ok(None);
        };

        match state.jwt.verify(token.trim()) {
            Ok(id) => Ok(Some(CurrentUser { id })),
            Err(reason) => {
                debug!(%reason, "Rejected bearer token");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, sub: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: sub.to_string(),
            exp,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
