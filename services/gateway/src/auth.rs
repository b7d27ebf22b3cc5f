use crate::error::AppError;
use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Validation};
use serde::{Deserialize, Serialize};
use types::errors::CoreError;
use types::ids::{DriverId, PassengerId};
use uuid::Uuid;

/// Principal kind carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

/// Authenticated passenger identity, verified before any handler runs.
pub struct AuthPassenger(pub PassengerId);

/// Authenticated driver identity.
pub struct AuthDriver(pub DriverId);

fn bearer_claims(parts: &Parts, state: &AppState) -> Result<Claims, CoreError> {
    let header = parts
        .headers
        .get("Authorization")
        .ok_or_else(|| CoreError::unauthorized("missing credentials"))?;
    let value = header
        .to_str()
        .map_err(|_| CoreError::unauthorized("invalid header string"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| CoreError::unauthorized("bearer token required"))?;
    let data = decode::<Claims>(token, &state.decoding_key, &Validation::default())
        .map_err(|err| CoreError::unauthorized(format!("invalid token: {}", err)))?;
    Ok(data.claims)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthPassenger {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if claims.role != Role::Passenger {
            return Err(CoreError::unauthorized("passenger credentials required").into());
        }
        Ok(AuthPassenger(PassengerId::from_uuid(claims.sub)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthDriver {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if claims.role != Role::Driver {
            return Err(CoreError::unauthorized("driver credentials required").into());
        }
        Ok(AuthDriver(DriverId::from_uuid(claims.sub)))
    }
}
