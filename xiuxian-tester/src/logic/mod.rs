pub mod flaky;
pub mod invariants;
pub mod plan;
pub mod reports;
pub mod runner;
pub mod tester;

pub use plan::{NarrativeMode, PlayerPreset, RequestMix, RunSummary, SimulationPlan, StepCounts};
pub use runner::PlanRunner;
pub use tester::*;
