use crate::ReplanError;
use std::fs;

/// Connection settings for the target database.
///
/// Replaces free-form keyword arguments with named, typed fields so a bad
/// setting fails at deserialization time instead of at connect time.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// Database server hostname or IP.
    #[serde(default = "default_host")]
    pub host: String,
    /// Database server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name to connect to.
    #[serde(default = "default_dbname")]
    pub dbname: String,
    /// Role to authenticate as.
    #[serde(default = "default_user")]
    pub user: String,
    /// Password for the role. Empty means trust/peer auth.
    #[serde(default)]
    pub password: String,
    /// Per-connection statement timeout in milliseconds. This is the only
    /// bound on a query that never returns; the worker pool itself has no
    /// task timeout.
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
}

fn default_host() -> String {
    String::from("localhost")
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    String::from("replan_test")
}

fn default_user() -> String {
    String::from("postgres")
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: String::new(),
            statement_timeout_ms: None,
        }
    }
}

impl DbConfig {
    /// Load the configuration from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON config file.
    pub fn from_file(path: &str) -> Result<Self, ReplanError> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ReplanError::ConfigError(format!("invalid config file {}: {}", path, e)))
    }
}
