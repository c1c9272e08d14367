use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::AppError;
use crate::nutrition::{extract::ExtractedMacros, model::parse_date, validate::MacroInputs};

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

impl DateQuery {
    /// `None` when absent or blank; 422 when present but not `YYYY-MM-DD`.
    pub fn parse(&self) -> Result<Option<Date>, AppError> {
        match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => Ok(None),
            Some(raw) => parse_date(raw)
                .map(Some)
                .ok_or_else(|| AppError::field("date", "Date must be formatted as YYYY-MM-DD.")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    #[serde(default)]
    pub name: String,
    /// Defaults to today in the configured offset.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub macros: MacroInputs,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMealRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub macros: MacroInputs,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    /// Model text, trimmed.
    pub raw: String,
    pub parsed: ExtractedMacros,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::validate::MacroInput;
    use time::macros::date;

    #[test]
    fn date_query_accepts_blank_and_iso_dates() {
        assert_eq!(DateQuery { date: None }.parse().unwrap(), None);
        assert_eq!(DateQuery { date: Some("  ".into()) }.parse().unwrap(), None);
        assert_eq!(
            DateQuery { date: Some("2024-02-29".into()) }.parse().unwrap(),
            Some(date!(2024 - 02 - 29))
        );
        assert!(DateQuery { date: Some("29/02/2024".into()) }.parse().is_err());
    }

    #[test]
    fn create_request_accepts_numbers_and_strings() {
        let req: CreateMealRequest = serde_json::from_value(serde_json::json!({
            "name": "Eggs",
            "calories": 210,
            "protein_g": "14",
            "fat_g": ""
        }))
        .unwrap();
        assert_eq!(req.name, "Eggs");
        assert!(req.date.is_none());
        assert_eq!(req.macros.calories, Some(MacroInput::Number(210.0)));
        assert_eq!(req.macros.protein_g, Some(MacroInput::Text("14".into())));
        assert_eq!(req.macros.carbs_g, None);
    }
}
