use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::error::EngineError;
use super::types::{
    ContributionPlan, DrawdownOutcome, DrawdownSummary, PriceSample, RowPoint, SimulationConfig,
    SimulationResult, SimulationRow, Totals,
};

/// Runs the contribution schedule over `prices` and derives the drawdown profile.
///
/// `prices` must be non-empty, strictly ascending by date and carry positive
/// prices. Out-of-order input is rejected rather than sorted. Samples outside
/// `config.start_date..=config.end_date` are ignored, and the anchor month is
/// the month of the first sample left in the window.
pub fn simulate(
    prices: &[PriceSample],
    config: &SimulationConfig,
) -> Result<SimulationResult, EngineError> {
    config.validate()?;
    validate_series(prices)?;

    let window = select_window(prices, config.start_date, config.end_date);
    let Some(first) = window.first() else {
        return Err(EngineError::EmptyInput);
    };
    let anchor_month = first.date.month();

    let rows = build_rows(window, config, anchor_month)?;
    let outcome = summarize(&rows)?;
    let totals = compute_totals(&rows);

    debug!(
        rows = rows.len(),
        anchor_month,
        contributions = totals.contributions,
        max_drawdown = outcome.max_drawdown(),
        "simulation complete"
    );

    Ok(SimulationResult {
        anchor_month,
        rows,
        outcome,
        totals,
    })
}

/// Extracts the deepest drawdown from an enriched series.
///
/// Ties on the minimum drawdown resolve to the earliest row. The peak is the
/// latest row at or before the trough whose wealth equals the trough's running
/// peak, and recovery is the first later row whose wealth gets back to it.
pub fn summarize(rows: &[SimulationRow]) -> Result<DrawdownOutcome, EngineError> {
    let Some(last) = rows.last() else {
        return Err(EngineError::EmptyInput);
    };

    let mut trough = 0;
    for (index, row) in rows.iter().enumerate().skip(1) {
        if row.drawdown < rows[trough].drawdown {
            trough = index;
        }
    }

    if rows[trough].drawdown >= 0.0 {
        let all_time_high = last.previous_peak;
        let peak = last_index_reaching(&rows[..], all_time_high);
        return Ok(DrawdownOutcome::NoDrawdown {
            peak: RowPoint::of(rows, peak),
        });
    }

    let peak_value = rows[trough].previous_peak;
    let peak = last_index_reaching(&rows[..=trough], peak_value);
    let recovery = rows[trough + 1..]
        .iter()
        .position(|row| row.wealth >= peak_value)
        .map(|offset| trough + 1 + offset);

    let peak = RowPoint::of(rows, peak);
    let trough = RowPoint::of(rows, trough);
    let recovery = recovery.map(|index| RowPoint::of(rows, index));

    Ok(DrawdownOutcome::Drawdown(DrawdownSummary {
        max_drawdown: rows[trough.index].drawdown,
        peak_to_trough_days: (trough.date - peak.date).num_days(),
        trough_to_recovery_days: recovery.map(|point| (point.date - trough.date).num_days()),
        peak,
        trough,
        recovery,
    }))
}

fn validate_series(prices: &[PriceSample]) -> Result<(), EngineError> {
    if prices.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    for sample in prices {
        if !sample.price.is_finite() || sample.price <= 0.0 {
            return Err(EngineError::InvalidPrice {
                date: sample.date,
                price: sample.price,
            });
        }
    }

    for (index, pair) in prices.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(EngineError::UnsortedInput {
                index: index + 1,
                previous: pair[0].date,
                current: pair[1].date,
            });
        }
    }

    Ok(())
}

fn select_window(prices: &[PriceSample], start: NaiveDate, end: NaiveDate) -> &[PriceSample] {
    let lower = prices.partition_point(|sample| sample.date < start);
    let upper = prices.partition_point(|sample| sample.date <= end);
    &prices[lower..upper.max(lower)]
}

#[derive(Debug)]
struct ContributionSchedule {
    plan: ContributionPlan,
    anchor_month: u32,
    last_funded_year: Option<i32>,
}

impl ContributionSchedule {
    fn new(plan: ContributionPlan, anchor_month: u32) -> Self {
        Self {
            plan,
            anchor_month,
            last_funded_year: None,
        }
    }

    // Weekly or daily sampling puts several rows in the anchor month, so the
    // funded year has to be remembered rather than re-derived from the month.
    fn is_due(&mut self, date: NaiveDate) -> bool {
        let due = match self.plan {
            ContributionPlan::Annual => {
                date.month() == self.anchor_month && self.last_funded_year != Some(date.year())
            }
            ContributionPlan::LumpSum => self.last_funded_year.is_none(),
        };
        if due {
            self.last_funded_year = Some(date.year());
        }
        due
    }
}

fn build_rows(
    window: &[PriceSample],
    config: &SimulationConfig,
    anchor_month: u32,
) -> Result<Vec<SimulationRow>, EngineError> {
    let mut schedule = ContributionSchedule::new(config.plan, anchor_month);
    let mut rows = Vec::with_capacity(window.len());
    let mut units_held = 0.0;
    let mut invested = 0.0;
    let mut previous_peak: f64 = 0.0;

    for sample in window {
        let contribution = if schedule.is_due(sample.date) {
            config.contribution_amount
        } else {
            0.0
        };
        units_held += contribution / sample.price;
        invested += contribution;

        let wealth = units_held * sample.price;
        if !units_held.is_finite() || !wealth.is_finite() {
            return Err(EngineError::NonFiniteValue {
                date: sample.date,
                units_held,
                wealth,
            });
        }
        previous_peak = previous_peak.max(wealth);
        let drawdown = if previous_peak > 0.0 {
            (wealth - previous_peak) / previous_peak
        } else {
            0.0
        };

        rows.push(SimulationRow {
            date: sample.date,
            price: sample.price,
            contribution,
            units_held,
            invested,
            wealth,
            previous_peak,
            drawdown,
        });
    }

    Ok(rows)
}

fn last_index_reaching(rows: &[SimulationRow], value: f64) -> usize {
    rows.iter().rposition(|row| row.wealth >= value).unwrap_or(0)
}

fn compute_totals(rows: &[SimulationRow]) -> Totals {
    let contributions = rows.iter().filter(|row| row.contribution > 0.0).count();
    let (total_invested, final_units, final_wealth) = rows
        .last()
        .map(|row| (row.invested, row.units_held, row.wealth))
        .unwrap_or((0.0, 0.0, 0.0));
    let total_return = if total_invested > 0.0 {
        final_wealth / total_invested - 1.0
    } else {
        0.0
    };

    Totals {
        contributions,
        total_invested,
        final_units,
        final_wealth,
        total_return,
    }
}
