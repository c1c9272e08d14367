use std::sync::Arc;

use anyhow::Context;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::info;

use crate::auth::jwt::JwtKeys;
use crate::cache::TtlCache;
use crate::config::{AppConfig, StoreConfig};
use crate::llm::{CompletionClient, OpenAiClient};
use crate::nutrition::{GoalProfile, MealRecord};
use crate::store::{airtable::AirtableStore, memory::MemoryStore, postgres::PgStore, Store};

/// Cache key for a meal listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MealsKey {
    pub owner: Option<String>,
    pub date: Option<Date>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn CompletionClient>,
    pub auth: Option<Arc<JwtKeys>>,
    pub meal_cache: Arc<TtlCache<MealsKey, Vec<MealRecord>>>,
    pub goal_cache: Arc<TtlCache<Option<String>, GoalProfile>>,
    /// Held while a missing goal profile is looked up and created.
    pub goal_init: Arc<Mutex<()>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let store = connect_store(&config.store).await?;

        store
            .health_check()
            .await
            .context("store health check failed")?;
        info!("store reachable");

        let llm = Arc::new(OpenAiClient::new(config.openai.clone())) as Arc<dyn CompletionClient>;
        Ok(Self::from_parts(Arc::new(config), store, llm))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        llm: Arc<dyn CompletionClient>,
    ) -> Self {
        let auth = config.jwt.as_ref().map(|jwt| Arc::new(JwtKeys::from(jwt)));
        Self {
            meal_cache: Arc::new(TtlCache::new(config.cache_ttl)),
            goal_cache: Arc::new(TtlCache::new(config.cache_ttl)),
            goal_init: Arc::new(Mutex::new(())),
            config,
            store,
            llm,
            auth,
        }
    }

    /// Calendar day in the configured offset.
    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc()
            .to_offset(self.config.utc_offset)
            .date()
    }

    pub fn invalidate_meals(&self) {
        self.meal_cache.clear();
    }

    pub fn invalidate_goals(&self, owner: &Option<String>) {
        self.goal_cache.invalidate(owner);
    }

    /// Memory store, canned completions, auth off.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::llm::testing::CannedCompletion;

        let llm = CannedCompletion::replying(
            "Meal: Oatmeal, Calories: 150kcal, Protein: 5g, Fat: 3g, Cholesterol: 0mg, Carbs: 27g",
        );
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryStore::default()),
            Arc::new(llm),
        )
    }

    #[cfg(test)]
    pub fn with_auth(self) -> Self {
        let mut config = (*self.config).clone();
        config.jwt = Some(crate::config::JwtConfig {
            secret: "test".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        });
        Self::from_parts(Arc::new(config), self.store, self.llm)
    }

    #[cfg(test)]
    pub fn with_llm(self, llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm, ..self }
    }
}

pub async fn connect_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config {
        StoreConfig::Airtable(cfg) => {
            info!(base = %cfg.base_id, schema = ?cfg.schema, "using airtable store");
            Arc::new(AirtableStore::new(cfg.clone()))
        }
        StoreConfig::Postgres { database_url } => {
            info!("using postgres store");
            Arc::new(PgStore::connect(database_url).await?)
        }
        StoreConfig::Memory => {
            info!("using in-memory store");
            Arc::new(MemoryStore::default())
        }
    };
    Ok(store)
}
