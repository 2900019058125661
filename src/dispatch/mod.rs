pub mod batch;
pub mod progress;

pub use batch::{BatchDispatcher, BatchFailure, BatchTask, DispatchReport};
pub use progress::{format_eta, ProgressCallback, ProgressSnapshot, ProgressTracker};
