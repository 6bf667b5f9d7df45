//! CLI command implementations.

pub mod clear;
pub mod conflicts;
pub mod dedup;
pub mod detect;
pub mod pending;
pub mod queue;
pub mod resolve;
pub mod status;
