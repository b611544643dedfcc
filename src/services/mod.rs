pub mod orchestrator;
pub mod stats;
pub mod streak;

pub use orchestrator::AggregationOrchestrator;
