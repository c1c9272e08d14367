use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use super::{MigrationReport, Store, StoreError};
use crate::nutrition::{GoalProfile, MacroValues, MealPatch, MealRecord, NewMeal};

#[derive(Debug, Clone, FromRow)]
struct MealRow {
    id: Uuid,
    owner: Option<String>,
    date: Option<Date>,
    name: String,
    calories: f64,
    protein_g: f64,
    fat_g: f64,
    cholesterol_mg: f64,
    carbs_g: f64,
}

impl From<MealRow> for MealRecord {
    fn from(r: MealRow) -> Self {
        Self {
            id: r.id.to_string(),
            date: r.date,
            name: r.name,
            macros: MacroValues {
                calories: r.calories,
                protein_g: r.protein_g,
                fat_g: r.fat_g,
                cholesterol_mg: r.cholesterol_mg,
                carbs_g: r.carbs_g,
            },
            owner: r.owner,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct GoalRow {
    id: Uuid,
    owner: Option<String>,
    calories: f64,
    protein_g: f64,
    fat_g: f64,
    cholesterol_mg: f64,
    carbs_g: f64,
}

impl From<GoalRow> for GoalProfile {
    fn from(r: GoalRow) -> Self {
        Self {
            id: r.id.to_string(),
            owner: r.owner,
            targets: MacroValues {
                calories: r.calories,
                protein_g: r.protein_g,
                fat_g: r.fat_g,
                cholesterol_mg: r.cholesterol_mg,
                carbs_g: r.carbs_g,
            },
        }
    }
}

const MEAL_COLUMNS: &str =
    "id, owner, date, name, calories, protein_g, fat_g, cholesterol_mg, carbs_g";
const GOAL_COLUMNS: &str = "id, owner, calories, protein_g, fat_g, cholesterol_mg, carbs_g";

/// Ids come from clients as strings; anything that is not a UUID cannot exist.
fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id.trim()).map_err(|_| StoreError::NotFound(id.to_string()))
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        let store = Self { db };

        if let Err(e) = store.run_migrations().await {
            warn!(error = %e, "migration failed; continuing");
        }
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn list_meals(
        &self,
        owner: Option<&str>,
        date: Option<Date>,
    ) -> Result<Vec<MealRecord>, StoreError> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meals
            WHERE ($1::text IS NULL OR owner = $1)
              AND ($2::date IS NULL OR date = $2)
            ORDER BY date DESC NULLS LAST, created_at DESC
            "#
        ))
        .bind(owner)
        .bind(date)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(MealRecord::from).collect())
    }

    async fn get_meal(&self, owner: Option<&str>, id: &str) -> Result<MealRecord, StoreError> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meals
            WHERE id = $1 AND ($2::text IS NULL OR owner = $2)
            "#
        ))
        .bind(parse_id(id)?)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        row.map(MealRecord::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create_meal(
        &self,
        owner: Option<&str>,
        meal: &NewMeal,
    ) -> Result<MealRecord, StoreError> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            INSERT INTO meals (id, owner, date, name, calories, protein_g, fat_g, cholesterol_mg, carbs_g)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(meal.date)
        .bind(&meal.name)
        .bind(meal.macros.calories)
        .bind(meal.macros.protein_g)
        .bind(meal.macros.fat_g)
        .bind(meal.macros.cholesterol_mg)
        .bind(meal.macros.carbs_g)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn update_meal(
        &self,
        owner: Option<&str>,
        id: &str,
        patch: &MealPatch,
    ) -> Result<MealRecord, StoreError> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            UPDATE meals SET
                name = COALESCE($3, name),
                calories = COALESCE($4, calories),
                protein_g = COALESCE($5, protein_g),
                fat_g = COALESCE($6, fat_g),
                cholesterol_mg = COALESCE($7, cholesterol_mg),
                carbs_g = COALESCE($8, carbs_g)
            WHERE id = $1 AND ($2::text IS NULL OR owner = $2)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(parse_id(id)?)
        .bind(owner)
        .bind(patch.name.as_deref())
        .bind(patch.calories)
        .bind(patch.protein_g)
        .bind(patch.fat_g)
        .bind(patch.cholesterol_mg)
        .bind(patch.carbs_g)
        .fetch_optional(&self.db)
        .await?;
        row.map(MealRecord::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_goals(&self, owner: Option<&str>) -> Result<Option<GoalProfile>, StoreError> {
        let row = sqlx::query_as::<_, GoalRow>(&format!(
            r#"
            SELECT {GOAL_COLUMNS}
            FROM goals
            WHERE ($1::text IS NULL OR owner = $1)
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(GoalProfile::from))
    }

    async fn create_goals(
        &self,
        owner: Option<&str>,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError> {
        let row = sqlx::query_as::<_, GoalRow>(&format!(
            r#"
            INSERT INTO goals (id, owner, calories, protein_g, fat_g, cholesterol_mg, carbs_g)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (owner) DO NOTHING
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(targets.calories)
        .bind(targets.protein_g)
        .bind(targets.fat_g)
        .bind(targets.cholesterol_mg)
        .bind(targets.carbs_g)
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(row) => Ok(row.into()),
            // Lost the race to a concurrent insert for the same owner.
            None => self
                .find_goals(owner)
                .await?
                .ok_or_else(|| StoreError::NotFound(owner.unwrap_or_default().to_string())),
        }
    }

    async fn update_goals(
        &self,
        id: &str,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError> {
        let row = sqlx::query_as::<_, GoalRow>(&format!(
            r#"
            UPDATE goals SET
                calories = $2, protein_g = $3, fat_g = $4, cholesterol_mg = $5, carbs_g = $6
            WHERE id = $1
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(parse_id(id)?)
        .bind(targets.calories)
        .bind(targets.protein_g)
        .bind(targets.fat_g)
        .bind(targets.cholesterol_mg)
        .bind(targets.carbs_g)
        .fetch_optional(&self.db)
        .await?;
        row.map(GoalProfile::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn migrate_schema(&self) -> Result<MigrationReport, StoreError> {
        self.run_migrations().await?;
        info!("database migrations applied");
        Ok(MigrationReport::default())
    }
}
