use std::cmp::Reverse;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use super::{MigrationReport, Store, StoreError};
use crate::nutrition::{GoalProfile, MacroValues, MealPatch, MealRecord, NewMeal};

#[derive(Default)]
struct Tables {
    meals: Vec<MealRecord>,
    goals: Vec<GoalProfile>,
}

/// Process-local store for development runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn new_id() -> String {
    format!("rec{}", Uuid::new_v4().simple())
}

fn visible(owner: Option<&str>, row_owner: Option<&str>) -> bool {
    owner.is_none() || owner == row_owner
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_meals(
        &self,
        owner: Option<&str>,
        date: Option<Date>,
    ) -> Result<Vec<MealRecord>, StoreError> {
        let mut meals: Vec<MealRecord> = self
            .tables()
            .meals
            .iter()
            .filter(|m| visible(owner, m.owner.as_deref()))
            .filter(|m| date.is_none() || m.date == date)
            .cloned()
            .collect();
        meals.sort_by_key(|m| Reverse(m.date));
        Ok(meals)
    }

    async fn get_meal(&self, owner: Option<&str>, id: &str) -> Result<MealRecord, StoreError> {
        self.tables()
            .meals
            .iter()
            .find(|m| m.id == id && visible(owner, m.owner.as_deref()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create_meal(
        &self,
        owner: Option<&str>,
        meal: &NewMeal,
    ) -> Result<MealRecord, StoreError> {
        let record = MealRecord {
            id: new_id(),
            date: Some(meal.date),
            name: meal.name.clone(),
            macros: meal.macros,
            owner: owner.map(str::to_string),
        };
        self.tables().meals.push(record.clone());
        Ok(record)
    }

    async fn update_meal(
        &self,
        owner: Option<&str>,
        id: &str,
        patch: &MealPatch,
    ) -> Result<MealRecord, StoreError> {
        let mut tables = self.tables();
        let record = tables
            .meals
            .iter_mut()
            .find(|m| m.id == id && visible(owner, m.owner.as_deref()))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn find_goals(&self, owner: Option<&str>) -> Result<Option<GoalProfile>, StoreError> {
        Ok(self
            .tables()
            .goals
            .iter()
            .find(|g| visible(owner, g.owner.as_deref()))
            .cloned())
    }

    async fn create_goals(
        &self,
        owner: Option<&str>,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError> {
        let profile = GoalProfile {
            id: new_id(),
            owner: owner.map(str::to_string),
            targets: *targets,
        };
        self.tables().goals.push(profile.clone());
        Ok(profile)
    }

    async fn update_goals(
        &self,
        id: &str,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError> {
        let mut tables = self.tables();
        let profile = tables
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        profile.targets = *targets;
        Ok(profile.clone())
    }

    async fn migrate_schema(&self) -> Result<MigrationReport, StoreError> {
        Ok(MigrationReport::default())
    }
}
