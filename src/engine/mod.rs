mod scheduler;
mod state;

pub use scheduler::{sort_by_recency, AggregationScheduler, CycleOutcome};
pub use state::{DetailView, EngineState};
