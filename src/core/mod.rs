mod engine;
mod error;
mod report;
mod types;

pub use engine::{simulate, summarize};
pub use error::EngineError;
pub use report::render_report;
pub use types::{
    ContributionPlan, DrawdownOutcome, DrawdownSummary, PriceSample, RowPoint, SimulationConfig,
    SimulationResult, SimulationRow, Totals,
};
