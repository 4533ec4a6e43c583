//! housekeeper - publish automated code changes as merge requests
//!
//! Keeps propose changes; the [`runner::Runner`] commits each one on a
//! deterministic branch, pushes it to a dedicated remote and opens or
//! updates its merge request, without overwriting fields a human has
//! edited since housekeeper last wrote them.

pub mod auth;
pub mod change;
pub mod config;
pub mod error;
pub mod git;
pub mod hosting;
pub mod keep;
pub mod logging;
pub mod runner;
pub mod types;

pub use change::Change;
pub use error::{Error, Result};
