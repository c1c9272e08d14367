//! Turns user-supplied macro input into stored values.
//!
//! Blank input means "nothing entered": zero on create, unchanged on patch.
//! Anything that is not a finite, non-negative number is rejected, and every
//! offending field is reported at once.

use serde::{Deserialize, Serialize};
use time::Date;

use super::model::{Macro, MacroValues, MealPatch, NewMeal};

/// A macro value as it arrives from a client: a JSON number or the raw text
/// of a form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MacroInput {
    Number(f64),
    Text(String),
}

impl From<f64> for MacroInput {
    fn from(value: f64) -> Self {
        MacroInput::Number(value)
    }
}

impl From<&str> for MacroInput {
    fn from(value: &str) -> Self {
        MacroInput::Text(value.to_string())
    }
}

/// The five macro fields of a create/update/goal request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroInputs {
    #[serde(default)]
    pub calories: Option<MacroInput>,
    #[serde(default)]
    pub protein_g: Option<MacroInput>,
    #[serde(default)]
    pub fat_g: Option<MacroInput>,
    #[serde(default)]
    pub cholesterol_mg: Option<MacroInput>,
    #[serde(default)]
    pub carbs_g: Option<MacroInput>,
}

impl MacroInputs {
    pub fn get(&self, nutrient: Macro) -> Option<&MacroInput> {
        match nutrient {
            Macro::Calories => self.calories.as_ref(),
            Macro::Protein => self.protein_g.as_ref(),
            Macro::Fat => self.fat_g.as_ref(),
            Macro::Cholesterol => self.cholesterol_mg.as_ref(),
            Macro::Carbs => self.carbs_g.as_ref(),
        }
    }

    #[cfg(test)]
    pub fn with(mut self, nutrient: Macro, input: impl Into<MacroInput>) -> Self {
        let slot = match nutrient {
            Macro::Calories => &mut self.calories,
            Macro::Protein => &mut self.protein_g,
            Macro::Fat => &mut self.fat_g,
            Macro::Cholesterol => &mut self.cholesterol_mg,
            Macro::Carbs => &mut self.carbs_g,
        };
        *slot = Some(input.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn not_a_number(nutrient: Macro) -> Self {
        Self::new(
            nutrient.field(),
            format!("{} must be a non-negative number.", nutrient.heading()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNumber;

/// `Ok(None)` for blank input, `Ok(Some(v))` for a finite `v >= 0`.
pub fn parse_non_negative(input: &MacroInput) -> Result<Option<f64>, InvalidNumber> {
    let value = match input {
        MacroInput::Number(n) => *n,
        MacroInput::Text(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>().map_err(|_| InvalidNumber)?
        }
    };
    if value.is_finite() && value >= 0.0 {
        Ok(Some(value))
    } else {
        Err(InvalidNumber)
    }
}

pub fn validate_new_meal(
    name: &str,
    date: Date,
    inputs: &MacroInputs,
) -> Result<NewMeal, Vec<FieldError>> {
    let mut errors = Vec::new();
    let name = name.trim();
    if name.is_empty() {
        errors.push(FieldError::new("name", "Meal name is required."));
    }

    let mut macros = MacroValues::default();
    for nutrient in Macro::ALL {
        let Some(input) = inputs.get(nutrient) else {
            continue;
        };
        match parse_non_negative(input) {
            Ok(value) => macros.set(nutrient, value.unwrap_or(0.0)),
            Err(InvalidNumber) => errors.push(FieldError::not_a_number(nutrient)),
        }
    }

    if errors.is_empty() {
        Ok(NewMeal {
            date,
            name: name.to_string(),
            macros,
        })
    } else {
        Err(errors)
    }
}

pub fn validate_patch(
    id: &str,
    name: Option<&str>,
    inputs: &MacroInputs,
) -> Result<MealPatch, Vec<FieldError>> {
    if id.trim().is_empty() {
        return Err(vec![FieldError::new("id", "Meal ID is required.")]);
    }

    let mut errors = Vec::new();
    let mut patch = MealPatch {
        name: name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        ..Default::default()
    };

    for nutrient in Macro::ALL {
        let Some(input) = inputs.get(nutrient) else {
            continue;
        };
        match parse_non_negative(input) {
            Ok(Some(value)) => patch.set_macro(nutrient, value),
            Ok(None) => {}
            Err(InvalidNumber) => errors.push(FieldError::not_a_number(nutrient)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    if patch.is_empty() {
        return Err(vec![FieldError::new(
            "fields",
            "No fields to update. Fill in at least one field other than Meal ID.",
        )]);
    }
    Ok(patch)
}

/// Goals are replaced wholesale, so every stored target must be present.
/// Nutrients outside `stored` are ignored and stay 0 ("goal not set").
pub fn validate_goals(
    inputs: &MacroInputs,
    stored: &[Macro],
) -> Result<MacroValues, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut targets = MacroValues::default();
    for &nutrient in stored {
        match inputs.get(nutrient).map(parse_non_negative) {
            Some(Ok(Some(value))) => targets.set(nutrient, value),
            Some(Ok(None)) | None => errors.push(FieldError::new(
                nutrient.field(),
                format!("{} goal is required.", nutrient.heading()),
            )),
            Some(Err(InvalidNumber)) => errors.push(FieldError::not_a_number(nutrient)),
        }
    }
    if errors.is_empty() {
        Ok(targets)
    } else {
        Err(errors)
    }
}
