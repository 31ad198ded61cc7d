//! Process-wide `tracing` subscriber setup for the tally exporter.
mod logger;
pub use logger::*;
