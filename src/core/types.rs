use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub date: NaiveDate,
    pub price: f64,
}

impl PriceSample {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ContributionPlan {
    /// One contribution per calendar year, on the first sample of the anchor month.
    #[default]
    Annual,
    /// A single contribution on the first sample in the window.
    LumpSum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub contribution_amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub plan: ContributionPlan,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.contribution_amount.is_finite() || self.contribution_amount <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "contribution amount must be > 0, got {}",
                self.contribution_amount
            )));
        }
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidConfiguration(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRow {
    pub date: NaiveDate,
    pub price: f64,
    pub contribution: f64,
    pub units_held: f64,
    pub invested: f64,
    pub wealth: f64,
    pub previous_peak: f64,
    pub drawdown: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub wealth: f64,
}

impl RowPoint {
    pub(crate) fn of(rows: &[SimulationRow], index: usize) -> Self {
        let row = &rows[index];
        Self {
            index,
            date: row.date,
            wealth: row.wealth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownSummary {
    pub max_drawdown: f64,
    pub peak: RowPoint,
    pub trough: RowPoint,
    pub recovery: Option<RowPoint>,
    pub peak_to_trough_days: i64,
    pub trough_to_recovery_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DrawdownOutcome {
    Drawdown(DrawdownSummary),
    /// Wealth never fell below its running peak; `peak` is the all-time high row.
    NoDrawdown { peak: RowPoint },
}

impl DrawdownOutcome {
    pub fn max_drawdown(&self) -> f64 {
        match self {
            DrawdownOutcome::Drawdown(summary) => summary.max_drawdown,
            DrawdownOutcome::NoDrawdown { .. } => 0.0,
        }
    }

    pub fn summary(&self) -> Option<&DrawdownSummary> {
        match self {
            DrawdownOutcome::Drawdown(summary) => Some(summary),
            DrawdownOutcome::NoDrawdown { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub contributions: usize,
    pub total_invested: f64,
    pub final_units: f64,
    pub final_wealth: f64,
    pub total_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub anchor_month: u32,
    pub rows: Vec<SimulationRow>,
    pub outcome: DrawdownOutcome,
    pub totals: Totals,
}
