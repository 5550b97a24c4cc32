use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub compile_timeout_ms: u64,
    /// Parent directory for per-request workspaces
    pub temp_root: PathBuf,
    pub max_code_bytes: usize,
    pub max_output_bytes: usize,
    /// Admission ceiling: executions allowed to run at once
    pub max_concurrent: usize,
    /// How long a request may wait for an execution slot
    pub queue_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; missing or unparsable keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: u64| -> u64 {
            lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        Self {
            port: lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(3000),
            default_timeout_ms: get("DEFAULT_TIMEOUT_MS", 5000),
            max_timeout_ms: get("MAX_TIMEOUT_MS", 30000),
            compile_timeout_ms: get("COMPILE_TIMEOUT_MS", 15000),
            temp_root: lookup("CODERUN_TEMP_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            max_code_bytes: get("MAX_CODE_BYTES", 64 * 1024) as usize,
            max_output_bytes: get("MAX_OUTPUT_BYTES", 1024 * 1024) as usize,
            max_concurrent: (get("MAX_CONCURRENT", 8) as usize).max(1),
            queue_timeout_ms: get("QUEUE_TIMEOUT_MS", 10000),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }

    /// Same defaults, but workspaces go under `temp_root`
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    /// Resolve the run timeout for a request, clamped to `max_timeout_ms`.
    /// A zero override falls back to the default.
    pub fn run_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ms = match requested_ms {
            Some(0) | None => self.default_timeout_ms,
            Some(ms) => ms,
        };
        Duration::from_millis(ms.min(self.max_timeout_ms))
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

/// Built-in defaults, independent of the process environment
impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.default_timeout_ms, 5000);
        assert_eq!(config.max_timeout_ms, 30000);
        assert_eq!(config.max_code_bytes, 65536);
        assert!(config.max_concurrent >= 1);
    }

    #[test]
    fn test_config_defaults_ignore_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.compile_timeout_ms, 15000);
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.queue_timeout_ms, 10000);
        assert_eq!(config.temp_root, env::temp_dir());
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(|key| match key {
            "PORT" => Some("8080".to_string()),
            "DEFAULT_TIMEOUT_MS" => Some("1500".to_string()),
            "MAX_CODE_BYTES" => Some("not-a-number".to_string()),
            "MAX_CONCURRENT" => Some("0".to_string()),
            "CODERUN_TEMP_ROOT" => Some("/srv/coderun".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_timeout_ms, 1500);
        assert_eq!(config.max_code_bytes, 65536);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.temp_root, PathBuf::from("/srv/coderun"));
    }

    #[test]
    fn test_run_timeout_clamped() {
        let config = Config::default();
        assert_eq!(config.run_timeout(None), Duration::from_millis(5000));
        assert_eq!(config.run_timeout(Some(0)), Duration::from_millis(5000));
        assert_eq!(config.run_timeout(Some(250)), Duration::from_millis(250));
        assert_eq!(
            config.run_timeout(Some(10_000_000)),
            Duration::from_millis(30000)
        );
    }

    #[test]
    fn test_with_temp_root() {
        let config = Config::default().with_temp_root("/var/tmp/coderun");
        assert_eq!(config.temp_root, PathBuf::from("/var/tmp/coderun"));
    }
}
