//! Time management and shared constants

pub mod time;

pub use time::{WorldClock, WorldStatus};
