//! Lifecycle of the tally exporter process: wiring, signals, shutdown.
mod cli;
pub use cli::{Args, normalize_args};

mod error;
pub use error::ExporterError;

mod lifecycle;
pub use lifecycle::Exporter;

mod signal;
pub use signal::{cancel_on_signal, wait_for_signal};
