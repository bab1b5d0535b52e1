pub mod format_utils;
pub mod time_utils;

pub use format_utils::format_bytes;
pub use time_utils::{day_key, Clock, ManualClock, SystemClock};
