use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool sizing and the per-statement deadline.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: Duration,
    pub query_timeout: Duration,
}

impl DbConfig {
    #[must_use]
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            ..Self::default()
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 30,
            min_connections: 0,
            idle_timeout: Duration::from_secs(15 * 60),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl Debug for DbConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &"[redacted]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}
