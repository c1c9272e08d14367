//! Field vocabularies of the hosted "Meals" and "Goals" tables.
//!
//! v1 is the legacy single-user layout (`Date`, `Calories`, `Carbs (g)`,
//! no cholesterol, no owner). v2 uses snake_case names, adds cholesterol and
//! the `user_email` owner column.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::nutrition::model::{parse_date, DEFAULT_GOALS};
use crate::nutrition::{GoalProfile, Macro, MacroValues, MealPatch, MealRecord, NewMeal};

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V1,
    #[default]
    V2,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V2;

    pub fn date(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "Date",
            SchemaVersion::V2 => "date",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "Meal",
            SchemaVersion::V2 => "meal",
        }
    }

    pub fn owner(self) -> Option<&'static str> {
        match self {
            SchemaVersion::V1 => None,
            SchemaVersion::V2 => Some("user_email"),
        }
    }

    /// Column holding `nutrient`, if this version stores it at all.
    pub fn macro_field(self, nutrient: Macro) -> Option<&'static str> {
        match (self, nutrient) {
            (SchemaVersion::V1, Macro::Calories) => Some("Calories"),
            (SchemaVersion::V1, Macro::Protein) => Some("Protein (g)"),
            (SchemaVersion::V1, Macro::Fat) => Some("Fat (g)"),
            (SchemaVersion::V1, Macro::Cholesterol) => None,
            (SchemaVersion::V1, Macro::Carbs) => Some("Carbs (g)"),
            (SchemaVersion::V2, Macro::Calories) => Some("calories_kcal"),
            (SchemaVersion::V2, Macro::Protein) => Some("protein_g"),
            (SchemaVersion::V2, Macro::Fat) => Some("fat_g"),
            (SchemaVersion::V2, Macro::Cholesterol) => Some("cholesterol_mg"),
            (SchemaVersion::V2, Macro::Carbs) => Some("carbs_g"),
        }
    }

    /// (old, new) pairs for every column both versions share.
    fn renames(self, to: SchemaVersion) -> Vec<(&'static str, &'static str)> {
        let mut pairs = vec![(self.date(), to.date()), (self.name(), to.name())];
        for nutrient in Macro::ALL {
            if let (Some(from), Some(into)) = (self.macro_field(nutrient), to.macro_field(nutrient)) {
                pairs.push((from, into));
            }
        }
        pairs.retain(|(from, into)| from != into);
        pairs
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(SchemaVersion::V1),
            "2" | "v2" => Ok(SchemaVersion::V2),
            other => Err(format!("unknown schema version {other:?}")),
        }
    }
}

fn number(fields: &Fields, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(fields: &Fields, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn meal_from_fields(version: SchemaVersion, id: String, fields: &Fields) -> MealRecord {
    let mut macros = MacroValues::default();
    for nutrient in Macro::ALL {
        if let Some(value) = version.macro_field(nutrient).and_then(|key| number(fields, key)) {
            macros.set(nutrient, value);
        }
    }
    MealRecord {
        id,
        date: text(fields, version.date()).as_deref().and_then(parse_date),
        name: text(fields, version.name()).unwrap_or_default(),
        macros,
        owner: version.owner().and_then(|key| text(fields, key)),
    }
}

pub fn meal_to_fields(version: SchemaVersion, owner: Option<&str>, meal: &NewMeal) -> Fields {
    let mut fields = Fields::new();
    fields.insert(version.date().into(), Value::from(meal.date.to_string()));
    fields.insert(version.name().into(), Value::from(meal.name.clone()));
    for nutrient in Macro::ALL {
        if let Some(key) = version.macro_field(nutrient) {
            fields.insert(key.into(), Value::from(meal.macros.get(nutrient)));
        }
    }
    if let (Some(key), Some(owner)) = (version.owner(), owner) {
        fields.insert(key.into(), Value::from(owner));
    }
    fields
}

pub fn patch_to_fields(version: SchemaVersion, patch: &MealPatch) -> Fields {
    let mut fields = Fields::new();
    if let Some(name) = &patch.name {
        fields.insert(version.name().into(), Value::from(name.clone()));
    }
    for nutrient in Macro::ALL {
        if let (Some(key), Some(value)) = (version.macro_field(nutrient), patch.macro_value(nutrient)) {
            fields.insert(key.into(), Value::from(value));
        }
    }
    fields
}

/// Absent targets fall back to the defaults; a target the version has no
/// column for is zero ("goal not set").
pub fn goals_from_fields(version: SchemaVersion, id: String, fields: &Fields) -> GoalProfile {
    let mut targets = MacroValues::default();
    for nutrient in Macro::ALL {
        if let Some(key) = version.macro_field(nutrient) {
            targets.set(
                nutrient,
                number(fields, key).unwrap_or_else(|| DEFAULT_GOALS.get(nutrient)),
            );
        }
    }
    GoalProfile {
        id,
        owner: version.owner().and_then(|key| text(fields, key)),
        targets,
    }
}

pub fn goals_to_fields(version: SchemaVersion, owner: Option<&str>, targets: &MacroValues) -> Fields {
    let mut fields = Fields::new();
    for nutrient in Macro::ALL {
        if let Some(key) = version.macro_field(nutrient) {
            fields.insert(key.into(), Value::from(targets.get(nutrient)));
        }
    }
    if let (Some(key), Some(owner)) = (version.owner(), owner) {
        fields.insert(key.into(), Value::from(owner));
    }
    fields
}

/// Fields to write so a record stored under `from` also carries the `to`
/// names. Values already present under the new name win. Empty when
/// nothing needs copying.
pub fn migrate_fields(from: SchemaVersion, to: SchemaVersion, fields: &Fields) -> Fields {
    let mut additions = Fields::new();
    for (old, new) in from.renames(to) {
        if fields.contains_key(new) {
            continue;
        }
        if let Some(value) = fields.get(old) {
            additions.insert(new.into(), value.clone());
        }
    }
    additions
}
