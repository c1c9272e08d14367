use time::Date;
use tracing::{debug, info};

use crate::{
    auth::RequestContext,
    error::AppError,
    llm::{user_prompt, SYSTEM_PROMPT},
    nutrition::{
        export::meals_to_csv,
        extract::{parse_completion, ExtractedMacros},
        MealPatch, MealRecord, NewMeal,
    },
    state::{AppState, MealsKey},
};

/// Meals of the caller, optionally for one day, newest first. Served from
/// the cache when a fresh entry exists.
pub async fn list_meals(
    state: &AppState,
    ctx: &RequestContext,
    date: Option<Date>,
) -> Result<Vec<MealRecord>, AppError> {
    let key = MealsKey {
        owner: ctx.owner.clone(),
        date,
    };
    if let Some(hit) = state.meal_cache.get(&key) {
        debug!(?date, "meal list cache hit");
        return Ok(hit);
    }
    let meals = state.store.list_meals(ctx.owner(), date).await?;
    state.meal_cache.insert(key, meals.clone());
    Ok(meals)
}

pub async fn create_meal(
    state: &AppState,
    ctx: &RequestContext,
    meal: NewMeal,
) -> Result<MealRecord, AppError> {
    let record = state.store.create_meal(ctx.owner(), &meal).await?;
    state.invalidate_meals();
    info!(meal_id = %record.id, owner = ?ctx.owner, "meal logged");
    Ok(record)
}

pub async fn update_meal(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    patch: MealPatch,
) -> Result<MealRecord, AppError> {
    let record = state.store.update_meal(ctx.owner(), id, &patch).await?;
    state.invalidate_meals();
    info!(meal_id = %record.id, owner = ?ctx.owner, "meal updated");
    Ok(record)
}

/// One model call; the reply is parsed leniently and never retried.
pub async fn extract_macros(
    state: &AppState,
    description: &str,
) -> Result<(String, ExtractedMacros), AppError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(AppError::field("description", "Meal description is required."));
    }
    let raw = state
        .llm
        .complete(SYSTEM_PROMPT, &user_prompt(description))
        .await?;
    info!(response = %raw, "macro estimate received");
    let parsed = parse_completion(&raw);
    Ok((raw, parsed))
}

pub async fn export_csv(state: &AppState, ctx: &RequestContext) -> Result<Vec<u8>, AppError> {
    let meals = list_meals(state, ctx, None).await?;
    meals_to_csv(&meals).map_err(|e| AppError::Internal(e.into()))
}
