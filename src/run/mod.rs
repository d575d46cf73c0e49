//! Run Tracking Module
//!
//! - [`record`]: The persisted run record and its status state machine
//! - [`log`]: Timestamped per-run log
//! - [`tracker`]: Drives a run through its lifecycle and persists it

pub mod log;
pub mod record;
pub mod tracker;

pub use self::log::RunLog;
pub use record::{Run, RunStatus};
pub use tracker::RunTracker;
