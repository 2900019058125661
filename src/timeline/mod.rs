pub mod clock;
pub mod extract;
pub mod window;

pub use clock::{parse_timestamp, LocalTimeConverter};
pub use extract::{extract_timeline, TimelineExtractor};
pub use window::{delivered_events_in_window, is_delivered_in_window, within_margin, DeliveryWindow};
