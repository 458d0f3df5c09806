#![forbid(unsafe_code)]

pub mod model;
pub mod progression;
pub mod time;

pub use progression::{Action, Cursor, ProgressionEngine, ProgressionLimits};
pub use time::Clock;
