pub mod airtable;
pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use serde::Serialize;
use time::Date;

use crate::nutrition::{GoalProfile, MacroValues, MealPatch, MealRecord, NewMeal};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(String),
    #[error("persistence service error: {0}")]
    Connectivity(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("unexpected record shape: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Connectivity(e.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
}

/// Meals and goal profiles. `owner` is the scoping email, or `None` when the
/// service runs single-user (every row is visible).
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Meals of `owner`, optionally only those on `date`, newest first.
    async fn list_meals(
        &self,
        owner: Option<&str>,
        date: Option<Date>,
    ) -> Result<Vec<MealRecord>, StoreError>;

    async fn get_meal(&self, owner: Option<&str>, id: &str) -> Result<MealRecord, StoreError>;

    async fn create_meal(
        &self,
        owner: Option<&str>,
        meal: &NewMeal,
    ) -> Result<MealRecord, StoreError>;

    async fn update_meal(
        &self,
        owner: Option<&str>,
        id: &str,
        patch: &MealPatch,
    ) -> Result<MealRecord, StoreError>;

    async fn find_goals(&self, owner: Option<&str>) -> Result<Option<GoalProfile>, StoreError>;

    async fn create_goals(
        &self,
        owner: Option<&str>,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError>;

    async fn update_goals(
        &self,
        id: &str,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError>;

    /// Brings stored rows up to the current schema version.
    async fn migrate_schema(&self) -> Result<MigrationReport, StoreError>;
}
