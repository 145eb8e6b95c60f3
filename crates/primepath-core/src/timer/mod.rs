mod engine;
mod warnings;

pub use engine::{TimerEngine, TimerEngineBuilder, TimerState, TimerStats};
pub use warnings::WarningPolicy;
