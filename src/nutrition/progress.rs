use serde::Serialize;

use super::model::{Macro, MacroValues, MealRecord};

/// Sums every macro across the given meals. Order does not matter and an
/// empty iterator gives all zeros.
pub fn daily_totals<'a, I>(records: I) -> MacroValues
where
    I: IntoIterator<Item = &'a MealRecord>,
{
    records
        .into_iter()
        .fold(MacroValues::default(), |mut acc, record| {
            acc += record.macros;
            acc
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Goal is zero or missing; no percentage is computed.
    GoalNotSet,
    /// `remaining` goes negative once the goal is exceeded.
    Tracked { percentage: f64, remaining: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroProgress {
    #[serde(rename = "macro")]
    pub nutrient: Macro,
    pub label: &'static str,
    pub unit: &'static str,
    pub total: f64,
    pub goal: f64,
    pub status: ProgressStatus,
    /// Fill of a progress bar, clamped to `0.0..=1.0`.
    pub bar_fraction: f64,
    pub percentage_display: String,
    pub remaining_display: Option<String>,
}

impl MacroProgress {
    pub fn new(nutrient: Macro, total: f64, goal: f64) -> Self {
        let unit = nutrient.unit();
        let status = if goal > 0.0 {
            ProgressStatus::Tracked {
                percentage: total / goal * 100.0,
                remaining: goal - total,
            }
        } else {
            ProgressStatus::GoalNotSet
        };

        let (bar_fraction, percentage_display, remaining_display) = match status {
            ProgressStatus::GoalNotSet => (0.0, "Goal not set".to_string(), None),
            ProgressStatus::Tracked {
                percentage,
                remaining,
            } => {
                let remaining_display = if remaining < 0.0 {
                    format!("+{:.0} {unit} over", remaining.abs())
                } else {
                    format!("{remaining:.0} {unit} left")
                };
                (
                    (percentage / 100.0).clamp(0.0, 1.0),
                    format!("{percentage:.1}%"),
                    Some(remaining_display),
                )
            }
        };

        Self {
            nutrient,
            label: nutrient.label(),
            unit,
            total,
            goal,
            status,
            bar_fraction,
            percentage_display,
            remaining_display,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        matches!(self.status, ProgressStatus::Tracked { remaining, .. } if remaining < 0.0)
    }
}

/// One entry per macro, in display order.
pub fn progress_report(totals: &MacroValues, goals: &MacroValues) -> Vec<MacroProgress> {
    Macro::ALL
        .into_iter()
        .map(|nutrient| MacroProgress::new(nutrient, totals.get(nutrient), goals.get(nutrient)))
        .collect()
}
