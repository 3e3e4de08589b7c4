#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;
pub mod timer;

pub use error::Error;
pub use time::{Clock, ManualClock};
pub use timer::{CountdownTimer, TimerTick, format_clock};
