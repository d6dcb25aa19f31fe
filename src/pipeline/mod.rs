pub mod accumulator;
pub mod controller;
pub mod events;
pub mod state;
pub mod worker;

pub use accumulator::{OverflowStore, RunAccumulator};
pub use controller::{MergeController, MergeOptions, MergeOutcome, RunState, RunStats};
pub use events::WorkerEvent;
pub use state::ProgressState;
pub use worker::{MergeWorker, RunHandle};
