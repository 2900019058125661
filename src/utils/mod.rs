pub mod env;
pub mod json_io;
pub mod progress_bars;
