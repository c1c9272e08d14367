use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

#[cfg(test)]
use super::model::Macro;

/// Fields scraped from a model completion. A field the text did not
/// contain stays `None` (or empty for the name).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedMacros {
    pub name: String,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub cholesterol_mg: Option<f64>,
    pub carbs_g: Option<f64>,
}

#[cfg(test)]
impl ExtractedMacros {
    pub fn get(&self, nutrient: Macro) -> Option<f64> {
        match nutrient {
            Macro::Calories => self.calories,
            Macro::Protein => self.protein_g,
            Macro::Fat => self.fat_g,
            Macro::Cholesterol => self.cholesterol_mg,
            Macro::Carbs => self.carbs_g,
        }
    }
}

lazy_static! {
    static ref MEAL_RE: Regex = Regex::new(r"(?i)Meal:\s*(.*?)(?:,|$)").unwrap();
    static ref CALORIES_RE: Regex = labelled_number("Calories");
    static ref PROTEIN_RE: Regex = labelled_number("Protein");
    static ref FAT_RE: Regex = labelled_number("Fat");
    static ref CHOLESTEROL_RE: Regex = labelled_number("Cholesterol");
    static ref CARBS_RE: Regex = labelled_number("Carbs");
}

fn labelled_number(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}:\s*(\d+(?:\.\d+)?)\s*(?:kcal|mg|g)?")).unwrap()
}

fn capture_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Scrapes `Meal: <name>, Calories: <n>kcal, Protein: <n>g, ...` out of free
/// text. Every field is searched independently; nothing here fails.
pub fn parse_completion(text: &str) -> ExtractedMacros {
    let name = MEAL_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    ExtractedMacros {
        name,
        calories: capture_number(&CALORIES_RE, text),
        protein_g: capture_number(&PROTEIN_RE, text),
        fat_g: capture_number(&FAT_RE, text),
        cholesterol_mg: capture_number(&CHOLESTEROL_RE, text),
        carbs_g: capture_number(&CARBS_RE, text),
    }
}
