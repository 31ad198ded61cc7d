use std::fmt;

/// String value that must never reach logs.
///
/// `Debug` and `Display` both render a fixed placeholder; the raw value is only
/// reachable through [`Secret::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw value, for handing to the database driver.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Database endpoint and credentials shared by every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
}

impl ConnectionParameters {
    /// `host:port`, for log fields.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
