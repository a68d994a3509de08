//! Principal extraction.
//!
//! Authentication happens upstream; by the time a request reaches this
//! process the gateway has verified the token and attached the principal
//! id (and optionally the plan) as headers. The core never validates
//! tokens itself.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use clipforge_models::{PlanTier, PrincipalId};

use crate::error::ApiError;

/// Header carrying the verified principal id.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Header carrying the principal's subscription plan.
pub const PLAN_HEADER: &str = "x-principal-plan";

/// Verified caller identity.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: PrincipalId,
    pub plan: PlanTier,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthenticated("missing principal header"))?;

        let plan = parts
            .headers
            .get(PLAN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Ok(Principal {
            id: PrincipalId::from_string(id),
            plan,
        })
    }
}
