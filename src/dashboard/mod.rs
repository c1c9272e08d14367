//! Daily view: the day's meals, their totals and progress against goals.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::Date;
use tracing::instrument;

use crate::{
    auth::RequestContext,
    error::AppError,
    goals::services::current_goals,
    meals::{dto::DateQuery, services::list_meals},
    nutrition::{
        progress::{daily_totals, progress_report, MacroProgress},
        Macro, MacroValues, MealRecord,
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub date: Date,
    pub meals: Vec<MealRecord>,
    pub totals: MacroValues,
    pub goals: MacroValues,
    pub progress: Vec<MacroProgress>,
    /// Macros whose total is above a set goal.
    pub exceeded: Vec<Macro>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(q): Query<DateQuery>,
) -> Result<Json<Dashboard>, AppError> {
    let date = q.parse()?.unwrap_or_else(|| state.today());

    let meals = list_meals(&state, &ctx, Some(date)).await?;
    let goals = current_goals(&state, &ctx).await?.targets;
    let totals = daily_totals(&meals);
    let progress = progress_report(&totals, &goals);
    let exceeded = progress
        .iter()
        .filter(|p| p.is_exceeded())
        .map(|p| p.nutrient)
        .collect();

    Ok(Json(Dashboard {
        date,
        meals,
        totals,
        goals,
        progress,
        exceeded,
    }))
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

    fn post_meal(body: Value) -> Request<Body> {
        Request::post("/api/v1/meals")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_day_has_zero_totals() {
        let res = build_app(AppState::fake())
            .oneshot(Request::get("/api/v1/dashboard?date=2024-06-01").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = read_json(res).await;
        assert_eq!(body["date"], "2024-06-01");
        assert_eq!(body["meals"], json!([]));
        assert_eq!(body["totals"]["calories"], 0.0);
        assert_eq!(body["progress"][0]["percentage_display"], "0.0%");
        assert_eq!(body["progress"][0]["remaining_display"], "1700 kcal left");
    }

    #[tokio::test]
    async fn totals_and_exceeded_macros() {
        let app = build_app(AppState::fake());
        for (name, calories, chol) in [("Breakfast", 900, 250), ("Dinner", 900, 100)] {
            app.clone()
                .oneshot(post_meal(json!({
                    "name": name, "date": "2024-06-01",
                    "calories": calories, "cholesterol_mg": chol
                })))
                .await
                .unwrap();
        }
        app.clone()
            .oneshot(post_meal(json!({"name": "Other day", "date": "2024-06-02", "calories": 5000})))
            .await
            .unwrap();

        let res = app
            .oneshot(Request::get("/api/v1/dashboard?date=2024-06-01").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(res).await;
        assert_eq!(body["meals"].as_array().unwrap().len(), 2);
        assert_eq!(body["totals"]["calories"], 1800.0);
        assert_eq!(body["progress"][0]["remaining_display"], "+100 kcal over");
        assert_eq!(body["progress"][0]["percentage_display"], "105.9%");
        assert_eq!(body["exceeded"], json!(["calories", "cholesterol"]));
    }

    #[tokio::test]
    async fn bad_date_is_422() {
        let res = build_app(AppState::fake())
            .oneshot(Request::get("/api/v1/dashboard?date=June").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
