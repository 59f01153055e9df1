//! Core data models for the step battle.

mod prefecture;
mod report;
mod stats;
mod user;

pub use prefecture::*;
pub use report::*;
pub use stats::*;
pub use user::*;
