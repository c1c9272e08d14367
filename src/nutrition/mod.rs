pub mod export;
pub mod extract;
pub mod model;
pub mod progress;
pub mod validate;

pub use model::{GoalProfile, Macro, MacroValues, MealPatch, MealRecord, NewMeal};
