pub mod record;
pub mod stats;
pub mod timeline;
