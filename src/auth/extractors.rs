use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::jwt::TokenKind;
use crate::{error::AppError, state::AppState};

pub const SESSION_COOKIE: &str = "macrotrack_session";

/// Who the request acts for. `owner` is `None` when scoping is disabled and
/// the service runs as a single global user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub owner: Option<String>,
}

impl RequestContext {
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(keys) = state.auth.as_ref() else {
            return Ok(RequestContext::default());
        };

        let token = bearer_token(parts)
            .or_else(|| {
                CookieJar::from_headers(&parts.headers)
                    .get(SESSION_COOKIE)
                    .map(|c| c.value().to_string())
            })
            .ok_or_else(|| AppError::Unauthorized("Missing session".into()))?;

        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(RequestContext {
            owner: Some(claims.sub),
        })
    }
}
