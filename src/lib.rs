//! Companion tool for coding-time tracking extensions. Reads their JSON logs,
//! merges them into one per-day usage series, and publishes a widget-ready
//! contribution series for a trailing window of days.
//!

pub mod cli;
pub mod config;
pub mod sync;
pub mod utils;
