use std::io::IsTerminal;

use time::UtcOffset;

use crate::logger::format::LoggerFormat;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `info` or `info,sqlx=warn`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Offset stamped on every event.
    ///
    /// The local offset is only readable while the process is single-threaded,
    /// so build this before starting the async runtime.
    pub utc_offset: UtcOffset,
}

impl LoggerConfig {
    pub fn new(format: LoggerFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
            utc_offset: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }
}
