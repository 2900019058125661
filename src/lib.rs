// src/lib.rs
pub mod config;
pub mod dispatch;
pub mod enrichment;
pub mod errors;
pub mod matching;
pub mod models;
pub mod timeline;
pub mod utils;

pub use errors::ReconcileError;
pub use models::record::Record;
pub use models::stats::{CleanStats, DispatchStats, MergeStats};
pub use models::timeline::{EventRecord, Timeline};
