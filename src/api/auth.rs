//! Caller identity from headers set by the upstream identity provider.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;
use crate::identity::{Actor, Role};
use crate::SettlementError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Rejects with 401 when either header is missing or unparseable.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = SettlementError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let id = header(USER_ID_HEADER)
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(SettlementError::Unauthenticated)?;
        let role: Role = header(USER_ROLE_HEADER).ok_or(SettlementError::Unauthenticated)?.parse()?;
        Ok(Self(Actor { id, role }))
    }
}
