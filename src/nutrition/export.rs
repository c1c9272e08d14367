use std::cmp::Reverse;

use super::model::{Macro, MealRecord};

pub const CSV_FILE_NAME: &str = "macro_tracker_data.csv";

/// Renders meals as CSV, newest first (ties broken by id, descending).
pub fn meals_to_csv(records: &[MealRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut sorted: Vec<&MealRecord> = records.iter().collect();
    sorted.sort_by_key(|r| (Reverse(r.date), Reverse(r.id.clone())));

    let mut wtr = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Meal ID".to_string(), "Date".to_string(), "Meal".to_string()];
    header.extend(Macro::ALL.iter().map(|m| m.heading()));
    wtr.write_record(&header)?;

    for record in sorted {
        let mut row = vec![
            record.id.clone(),
            record.date.map(|d| d.to_string()).unwrap_or_default(),
            record.name.clone(),
        ];
        row.extend(Macro::ALL.iter().map(|m| record.macros.get(*m).to_string()));
        wtr.write_record(&row)?;
    }

    wtr.into_inner().map_err(|e| e.into_error().into())
}
