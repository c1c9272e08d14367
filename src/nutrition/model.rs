use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};

/// A tracked nutrient quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Macro {
    Calories,
    Protein,
    Fat,
    Cholesterol,
    Carbs,
}

impl Macro {
    /// Display order used by the dashboard and the CSV export.
    pub const ALL: [Macro; 5] = [
        Macro::Calories,
        Macro::Protein,
        Macro::Fat,
        Macro::Cholesterol,
        Macro::Carbs,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Macro::Calories => "Calories",
            Macro::Protein => "Protein",
            Macro::Fat => "Fat",
            Macro::Cholesterol => "Cholesterol",
            Macro::Carbs => "Carbohydrates",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Macro::Calories => "kcal",
            Macro::Cholesterol => "mg",
            Macro::Protein | Macro::Fat | Macro::Carbs => "g",
        }
    }

    /// JSON field name used in request and response bodies.
    pub fn field(self) -> &'static str {
        match self {
            Macro::Calories => "calories",
            Macro::Protein => "protein_g",
            Macro::Fat => "fat_g",
            Macro::Cholesterol => "cholesterol_mg",
            Macro::Carbs => "carbs_g",
        }
    }

    /// "Calories (kcal)", "Protein (g)", ...
    pub fn heading(self) -> String {
        format!("{} ({})", self.label(), self.unit())
    }
}

/// One value per macro. Absent values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroValues {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default)]
    pub cholesterol_mg: f64,
    #[serde(default)]
    pub carbs_g: f64,
}

impl MacroValues {
    pub fn get(&self, nutrient: Macro) -> f64 {
        match nutrient {
            Macro::Calories => self.calories,
            Macro::Protein => self.protein_g,
            Macro::Fat => self.fat_g,
            Macro::Cholesterol => self.cholesterol_mg,
            Macro::Carbs => self.carbs_g,
        }
    }

    pub fn set(&mut self, nutrient: Macro, value: f64) {
        let slot = match nutrient {
            Macro::Calories => &mut self.calories,
            Macro::Protein => &mut self.protein_g,
            Macro::Fat => &mut self.fat_g,
            Macro::Cholesterol => &mut self.cholesterol_mg,
            Macro::Carbs => &mut self.carbs_g,
        };
        *slot = value;
    }
}

impl std::ops::AddAssign for MacroValues {
    fn add_assign(&mut self, rhs: Self) {
        for nutrient in Macro::ALL {
            self.set(nutrient, self.get(nutrient) + rhs.get(nutrient));
        }
    }
}

/// Goal profile used when none has been stored yet.
pub const DEFAULT_GOALS: MacroValues = MacroValues {
    calories: 1700.0,
    protein_g: 100.0,
    fat_g: 55.0,
    cholesterol_mg: 300.0,
    carbs_g: 220.0,
};

/// A logged meal as returned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: String,
    pub date: Option<Date>,
    pub name: String,
    #[serde(flatten)]
    pub macros: MacroValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A validated meal ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub date: Date,
    pub name: String,
    pub macros: MacroValues,
}

/// Partial update of a meal. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MealPatch {
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub cholesterol_mg: Option<f64>,
    pub carbs_g: Option<f64>,
}

impl MealPatch {
    pub fn macro_value(&self, nutrient: Macro) -> Option<f64> {
        match nutrient {
            Macro::Calories => self.calories,
            Macro::Protein => self.protein_g,
            Macro::Fat => self.fat_g,
            Macro::Cholesterol => self.cholesterol_mg,
            Macro::Carbs => self.carbs_g,
        }
    }

    pub fn set_macro(&mut self, nutrient: Macro, value: f64) {
        let slot = match nutrient {
            Macro::Calories => &mut self.calories,
            Macro::Protein => &mut self.protein_g,
            Macro::Fat => &mut self.fat_g,
            Macro::Cholesterol => &mut self.cholesterol_mg,
            Macro::Carbs => &mut self.carbs_g,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && Macro::ALL.iter().all(|m| self.macro_value(*m).is_none())
    }

    pub fn apply(&self, record: &mut MealRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        for nutrient in Macro::ALL {
            if let Some(value) = self.macro_value(nutrient) {
                record.macros.set(nutrient, value);
            }
        }
    }
}

/// The stored goal profile of one owner (or the global one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub targets: MacroValues,
}

/// Quick-add meal template.
#[derive(Debug, Clone, Serialize)]
pub struct MealPreset {
    pub name: &'static str,
    #[serde(flatten)]
    pub macros: MacroValues,
}

static PRESETS: [MealPreset; 1] = [MealPreset {
    name: "Protein shake (1 scoop)",
    macros: MacroValues {
        calories: 120.0,
        protein_g: 24.0,
        fat_g: 1.5,
        cholesterol_mg: 55.0,
        carbs_g: 3.0,
    },
}];

pub fn presets() -> &'static [MealPreset] {
    &PRESETS
}

/// Parses `YYYY-MM-DD`, ignoring anything after the date (timestamps).
pub fn parse_date(raw: &str) -> Option<Date> {
    let head = raw.trim().get(..10)?;
    Date::parse(head, format_description!("[year]-[month]-[day]")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn macro_values_get_set_roundtrip_every_field() {
        let mut values = MacroValues::default();
        for (i, nutrient) in Macro::ALL.into_iter().enumerate() {
            values.set(nutrient, i as f64 + 1.0);
        }
        assert_eq!(values.calories, 1.0);
        assert_eq!(values.carbs_g, 5.0);
        assert_eq!(values.get(Macro::Cholesterol), 4.0);
    }

    #[test]
    fn patch_applies_only_supplied_fields() {
        let mut record = MealRecord {
            id: "rec1".into(),
            date: Some(date!(2024 - 05 - 01)),
            name: "Lunch".into(),
            macros: MacroValues {
                calories: 500.0,
                protein_g: 30.0,
                ..Default::default()
            },
            owner: None,
        };
        let mut patch = MealPatch::default();
        assert!(patch.is_empty());
        patch.set_macro(Macro::Protein, 45.0);
        assert!(!patch.is_empty());
        patch.apply(&mut record);
        assert_eq!(record.name, "Lunch");
        assert_eq!(record.macros.calories, 500.0);
        assert_eq!(record.macros.protein_g, 45.0);
    }

    #[test]
    fn parse_date_accepts_timestamps() {
        assert_eq!(parse_date("2024-02-29"), Some(date!(2024 - 02 - 29)));
        assert_eq!(
            parse_date("2024-02-29T00:00:00.000Z"),
            Some(date!(2024 - 02 - 29))
        );
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn meal_record_serializes_flat() {
        let record = MealRecord {
            id: "rec1".into(),
            date: Some(date!(2024 - 05 - 01)),
            name: "Oats".into(),
            macros: MacroValues {
                calories: 300.0,
                ..Default::default()
            },
            owner: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-05-01");
        assert_eq!(json["calories"], 300.0);
        assert!(json.get("owner").is_none());
    }
}
