//! Rolling conversation summary.

pub mod rolling;

pub use rolling::{RollingSummary, compact};
