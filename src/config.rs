use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "EXAMSTATD_WORKSPACE";
pub const ENV_LOG: &str = "EXAMSTATD_LOG";
pub const ENV_LOG_JSON: &str = "EXAMSTATD_LOG_JSON";

const DEFAULT_LOG_LEVEL: &str = "info";

/// Process-level settings read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Workspace opened before the first request, as if `workspace.select` had been sent.
    pub workspace: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let log_json = non_empty(ENV_LOG_JSON)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self {
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
            log_level: non_empty(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_json,
        }
    }
}
