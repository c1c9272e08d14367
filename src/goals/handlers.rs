use axum::{extract::State, routing::get, Json, Router};
use tracing::{instrument, warn};

use crate::{
    auth::RequestContext,
    error::AppError,
    nutrition::{
        validate::{validate_goals, MacroInputs},
        GoalProfile,
    },
    state::AppState,
};

use super::services;

pub fn routes() -> Router<AppState> {
    Router::new().route("/goals", get(get_goals).put(put_goals))
}

#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<GoalProfile>, AppError> {
    Ok(Json(services::current_goals(&state, &ctx).await?))
}

#[instrument(skip(state, body))]
pub async fn put_goals(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<MacroInputs>,
) -> Result<Json<GoalProfile>, AppError> {
    let targets = validate_goals(&body, &state.config.stored_macros()).map_err(|errors| {
        warn!(count = errors.len(), "goals rejected");
        AppError::Validation(errors)
    })?;
    Ok(Json(services::replace_goals(&state, &ctx, targets).await?))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn read_json(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn put(body: Value) -> Request<Body> {
        Request::put("/api/v1/goals")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn get_returns_defaults() {
        let res = build_app(AppState::fake())
            .oneshot(Request::get("/api/v1/goals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = read_json(res).await;
        assert_eq!(body["targets"]["calories"], 1700.0);
        assert_eq!(body["targets"]["cholesterol_mg"], 300.0);
    }

    #[tokio::test]
    async fn put_replaces_targets() {
        let app = build_app(AppState::fake());
        let res = app
            .clone()
            .oneshot(put(json!({
                "calories": "2000", "protein_g": 150, "fat_g": 70,
                "cholesterol_mg": 0, "carbs_g": 200
            })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .oneshot(Request::get("/api/v1/goals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(res).await;
        assert_eq!(body["targets"]["calories"], 2000.0);
        assert_eq!(body["targets"]["cholesterol_mg"], 0.0);
    }

    #[tokio::test]
    async fn put_requires_every_target() {
        let res = build_app(AppState::fake())
            .oneshot(put(json!({"calories": 2000})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(read_json(res).await["fields"].as_array().unwrap().len(), 4);
    }
}
