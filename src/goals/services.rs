use tracing::{debug, info};

use crate::{
    auth::RequestContext,
    error::AppError,
    nutrition::{model::DEFAULT_GOALS, GoalProfile, MacroValues},
    state::AppState,
};

/// The caller's goal profile, created with the default targets on first use.
pub async fn current_goals(state: &AppState, ctx: &RequestContext) -> Result<GoalProfile, AppError> {
    if let Some(hit) = state.goal_cache.get(&ctx.owner) {
        debug!("goal cache hit");
        return Ok(hit);
    }
    let _guard = state.goal_init.lock().await;
    if let Some(hit) = state.goal_cache.get(&ctx.owner) {
        return Ok(hit);
    }
    let profile = match state.store.find_goals(ctx.owner()).await? {
        Some(profile) => profile,
        None => {
            let created = state.store.create_goals(ctx.owner(), &DEFAULT_GOALS).await?;
            info!(goal_id = %created.id, owner = ?ctx.owner, "default goals created");
            created
        }
    };
    state.goal_cache.insert(ctx.owner.clone(), profile.clone());
    Ok(profile)
}

pub async fn replace_goals(
    state: &AppState,
    ctx: &RequestContext,
    targets: MacroValues,
) -> Result<GoalProfile, AppError> {
    let existing = current_goals(state, ctx).await?;
    let updated = state.store.update_goals(&existing.id, &targets).await?;
    state.invalidate_goals(&ctx.owner);
    info!(goal_id = %updated.id, owner = ?ctx.owner, "goals updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{AirtableConfig, AppConfig};
    use crate::store::{airtable::AirtableStore, schema::SchemaVersion};

    #[tokio::test]
    async fn first_read_creates_defaults_once() {
        let state = AppState::fake();
        let ctx = RequestContext::default();
        let first = current_goals(&state, &ctx).await.unwrap();
        assert_eq!(first.targets, DEFAULT_GOALS);

        state.invalidate_goals(&ctx.owner);
        let second = current_goals(&state, &ctx).await.unwrap();
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn replace_overwrites_every_target() {
        let state = AppState::fake();
        let ctx = RequestContext {
            owner: Some("ana@example.com".into()),
        };
        let targets = MacroValues {
            calories: 2000.0,
            protein_g: 150.0,
            fat_g: 70.0,
            cholesterol_mg: 0.0,
            carbs_g: 200.0,
        };
        replace_goals(&state, &ctx, targets).await.unwrap();
        assert_eq!(current_goals(&state, &ctx).await.unwrap().targets, targets);

        let other = RequestContext {
            owner: Some("bo@example.com".into()),
        };
        assert_eq!(current_goals(&state, &other).await.unwrap().targets, DEFAULT_GOALS);
    }

    #[tokio::test]
    async fn concurrent_first_reads_create_one_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Goals"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"records": []}))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v0/appBase/Goals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "recGoal1",
                "fields": {"user_email": "ana@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = AirtableStore::new(AirtableConfig {
            api_url: server.uri(),
            api_key: "key-test".into(),
            base_id: "appBase".into(),
            meals_table: "Meals".into(),
            goals_table: "Goals".into(),
            schema: SchemaVersion::V2,
        });
        let fake = AppState::fake();
        let state = AppState::from_parts(Arc::new(AppConfig::for_tests()), Arc::new(store), fake.llm);
        let ctx = RequestContext {
            owner: Some("ana@example.com".into()),
        };

        let (a, b) = tokio::join!(current_goals(&state, &ctx), current_goals(&state, &ctx));
        assert_eq!(a.unwrap().id, "recGoal1");
        assert_eq!(b.unwrap().id, "recGoal1");
    }
}
