use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, RefreshRequest},
        extractors::RequestContext,
        services::{issue_pair, session_cookie},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, jar, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RefreshRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let keys = state
        .auth
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("Sessions are disabled".into()))?;

    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid or expired refresh token".into())
    })?;

    let pair = issue_pair(keys, &claims.sub).map_err(|e| {
        error!(error = %e, "issuing token pair failed");
        AppError::Internal(e)
    })?;

    info!(owner = %claims.sub, "session refreshed");
    Ok((jar.add(session_cookie(&pair.access_token)), Json(pair)))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, ctx: RequestContext) -> Json<PublicUser> {
    Json(PublicUser {
        email: ctx.owner,
        scoped: state.auth.is_some(),
    })
}
