use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::RequestContext,
    error::AppError,
    nutrition::{
        export::CSV_FILE_NAME,
        model::{presets, MealPreset},
        validate::{validate_new_meal, validate_patch},
        MealRecord,
    },
    state::AppState,
};

use super::dto::{CreateMealRequest, DateQuery, ExtractRequest, ExtractResponse, UpdateMealRequest};
use super::services;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/export.csv", get(export_csv))
        .route("/meals/presets", get(list_presets))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/:id", patch(update_meal))
        .route("/meals/extract", post(extract_macros))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(q): Query<DateQuery>,
) -> Result<Json<Vec<MealRecord>>, AppError> {
    let date = q.parse()?;
    Ok(Json(services::list_meals(&state, &ctx, date).await?))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<CreateMealRequest>,
) -> Result<(StatusCode, HeaderMap, Json<MealRecord>), AppError> {
    let date = DateQuery {
        date: body.date.clone(),
    }
    .parse()?
    .unwrap_or_else(|| state.today());
    let meal = validate_new_meal(&body.name, date, &body.macros).map_err(|errors| {
        warn!(count = errors.len(), "meal rejected");
        AppError::Validation(errors)
    })?;

    let record = services::create_meal(&state, &ctx, meal).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/v1/meals/{}", record.id))
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, headers, Json(record)))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateMealRequest>,
) -> Result<Json<MealRecord>, AppError> {
    let patch = validate_patch(&id, body.name.as_deref(), &body.macros).map_err(|errors| {
        warn!(%id, count = errors.len(), "meal update rejected");
        AppError::Validation(errors)
    })?;
    Ok(Json(services::update_meal(&state, &ctx, id.trim(), patch).await?))
}

#[instrument(skip(state, body))]
pub async fn extract_macros(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Json(body): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let (raw, parsed) = services::extract_macros(&state, &body.description).await?;
    Ok(Json(ExtractResponse { raw, parsed }))
}

#[instrument(skip(state))]
pub async fn export_csv(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let body = services::export_csv(&state, &ctx).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{CSV_FILE_NAME}\""),
            ),
        ],
        body,
    ))
}

pub async fn list_presets() -> Json<&'static [MealPreset]> {
    Json(presets())
}
