pub mod clean;
pub mod columns;
pub mod dedup;
pub mod merge;
pub mod phone;

pub use clean::{apply_clean_action, clean_records, CleanAction, CleanOutcome};
pub use columns::{resolve_column, MERGE_MOBILE_ALIASES, MOBILE_HINT, UPLOAD_MOBILE_ALIASES};
pub use dedup::{dedup_records, KeepPolicy, RandomSource, SeededRandom, ThreadRandom};
pub use merge::{merge_records, MergeDebugInfo, MergeOutcome};
pub use phone::{lookup_search_value, normalize_phone_key};
