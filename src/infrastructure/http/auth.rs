//! Bearer-token auth (spec §4.G "Auth"): `/auth` issues an opaque token that
//! carries `(uid, teamName, agentType)` server-side; every other mutating
//! route resolves the token back to this context via an axum extractor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::AgentType;
use crate::services::role_matrix::Permission;

use super::error::ApiError;
use super::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub uid: String,
    pub team_name: String,
    pub agent_type: AgentType,
}

/// In-memory token registry. Tokens are opaque to the client and never
/// persisted: restarting the process invalidates every outstanding token,
/// which is acceptable since workers re-authenticate on reconnect.
#[derive(Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<String, AuthContext>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, context: AuthContext) -> String {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.tokens.write().await.insert(token.clone(), context);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<AuthContext> {
        self.tokens.read().await.get(token).cloned()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".into()))?;
        state
            .tokens
            .resolve(token)
            .await
            .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".into()))
    }
}

impl AuthContext {
    /// Rejects if the token's team differs from the route's team (spec
    /// §4.G "the server rejects tokens whose team differs from the route's
    /// team").
    pub fn require_team(&self, team_name: &str) -> Result<(), ApiError> {
        if self.team_name != team_name {
            return Err(ApiError::Forbidden(format!("token is scoped to team {}, not {team_name}", self.team_name)));
        }
        Ok(())
    }

    /// Rejects if the token's `agentType` lacks the named permission (spec
    /// §4.G, §9 "Role/permission matrix").
    pub fn require_permission(&self, permission: Permission) -> Result<(), ApiError> {
        if !crate::services::role_matrix::agent_type_allows(self.agent_type, permission) {
            return Err(ApiError::Forbidden(format!("{} may not perform this operation", self.agent_type.as_str())));
        }
        Ok(())
    }
}

/// Convenience extractor bundling `State<Arc<AppState>>` with the resolved
/// auth context, for handlers that need both.
pub struct Authed {
    pub state: Arc<AppState>,
    pub ctx: AuthContext,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authed {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let ctx = AuthContext::from_request_parts(parts, state).await?;
        let State(state) = State::<Arc<AppState>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation("invalid state".into()))?;
        Ok(Self { state, ctx })
    }
}

pub fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}
