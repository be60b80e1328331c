use std::fmt::Write;

use chrono::Month;

use super::types::{ContributionPlan, DrawdownOutcome, SimulationConfig, SimulationResult};

/// Plain-text summary of a simulation, one fact per line.
pub fn render_report(
    instrument: &str,
    config: &SimulationConfig,
    result: &SimulationResult,
) -> String {
    let mut out = String::new();
    let first = result.rows.first().map(|row| row.date);
    let last = result.rows.last().map(|row| row.date);

    let _ = writeln!(out, "Instrument:        {instrument}");
    let _ = writeln!(
        out,
        "Window:            {} to {}",
        first.unwrap_or(config.start_date),
        last.unwrap_or(config.end_date)
    );
    let _ = writeln!(
        out,
        "Schedule:          {}",
        describe_plan(config, result.anchor_month)
    );
    let _ = writeln!(
        out,
        "Contributions:     {} totalling {:.2}",
        result.totals.contributions, result.totals.total_invested
    );
    let _ = writeln!(
        out,
        "Final wealth:      {:.2} ({})",
        result.totals.final_wealth,
        format_percent(result.totals.total_return)
    );

    match &result.outcome {
        DrawdownOutcome::NoDrawdown { peak } => {
            let _ = writeln!(out, "Max drawdown:      none in window");
            let _ = writeln!(
                out,
                "Peak:              {} at {:.2}",
                peak.date, peak.wealth
            );
        }
        DrawdownOutcome::Drawdown(summary) => {
            let _ = writeln!(
                out,
                "Max drawdown:      {}",
                format_percent(summary.max_drawdown)
            );
            let _ = writeln!(
                out,
                "Peak:              {} at {:.2}",
                summary.peak.date, summary.peak.wealth
            );
            let _ = writeln!(
                out,
                "Trough:            {} at {:.2} ({} days after peak)",
                summary.trough.date, summary.trough.wealth, summary.peak_to_trough_days
            );
            match (summary.recovery, summary.trough_to_recovery_days) {
                (Some(recovery), Some(days)) => {
                    let _ = writeln!(
                        out,
                        "Recovery:          {} at {:.2} ({days} days after trough)",
                        recovery.date, recovery.wealth
                    );
                }
                _ => {
                    let _ = writeln!(out, "Recovery:          not yet recovered");
                }
            }
        }
    }

    out
}

fn describe_plan(config: &SimulationConfig, anchor_month: u32) -> String {
    match config.plan {
        ContributionPlan::Annual => format!(
            "{:.2} every {}",
            config.contribution_amount,
            month_name(anchor_month)
        ),
        ContributionPlan::LumpSum => format!("{:.2} once", config.contribution_amount),
    }
}

fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("?")
}

fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
