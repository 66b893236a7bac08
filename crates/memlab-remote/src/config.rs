//! Client configuration and backend factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use memlab_core::driver::DriverConfig;
use memlab_core::session::DEFAULT_TOTAL_ROUNDS;

use crate::http::{HttpBackend, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Top-level memlab configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemlabConfig {
    /// Base URL of the backend serving `/api/*`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Rounds per session.
    #[serde(default = "default_total_rounds")]
    pub total_rounds: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Extra attempts for a failed session save (0 = no retry).
    #[serde(default)]
    pub save_retries: u32,
    /// Initial delay between save attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_total_rounds() -> u32 {
    DEFAULT_TOTAL_ROUNDS
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_retry_delay() -> u64 {
    500
}

impl Default for MemlabConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            total_rounds: default_total_rounds(),
            request_timeout_secs: default_timeout(),
            save_retries: 0,
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl MemlabConfig {
    /// Settings for the session driver.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            total_rounds: self.total_rounds,
            save_retries: self.save_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Build the HTTP backend this configuration points at.
    pub fn create_backend(&self) -> HttpBackend {
        HttpBackend::new(&self.base_url, self.request_timeout_secs)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..start],
            value,
            &result[start + end + 1..]
        );
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `memlab.toml` in the current directory
/// 2. `~/.config/memlab/config.toml`
///
/// `MEMLAB_BASE_URL` overrides `base_url` from any file.
pub fn load_config() -> Result<MemlabConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<MemlabConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("memlab.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<MemlabConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MemlabConfig::default(),
    };

    if let Ok(url) = std::env::var("MEMLAB_BASE_URL") {
        config.base_url = url;
    }
    config.base_url = resolve_env_vars(&config.base_url);

    anyhow::ensure!(
        config.total_rounds >= 1,
        "total_rounds must be at least 1"
    );
    anyhow::ensure!(
        config.request_timeout_secs >= 1,
        "request_timeout_secs must be at least 1"
    );

    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("memlab"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_MEMLAB_TEST_HOST", "quiz.local");
        assert_eq!(resolve_env_vars("${_MEMLAB_TEST_HOST}"), "quiz.local");
        assert_eq!(
            resolve_env_vars("http://${_MEMLAB_TEST_HOST}:8000"),
            "http://quiz.local:8000"
        );
        assert_eq!(resolve_env_vars("http://${unterminated"), "http://${unterminated");
        std::env::remove_var("_MEMLAB_TEST_HOST");
    }

    #[test]
    fn default_config() {
        let config = MemlabConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.total_rounds, 10);
        assert_eq!(config.save_retries, 0);

        let driver = config.driver_config();
        assert_eq!(driver.total_rounds, 10);
        assert_eq!(driver.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn parse_partial_config() {
        let config: MemlabConfig = toml::from_str(
            r#"
base_url = "http://quiz.example:9000"
total_rounds = 5
"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://quiz.example:9000");
        assert_eq!(config.total_rounds, 5);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memlab.toml");
        std::fs::write(&path, "total_rounds = 3\nsave_retries = 2\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.total_rounds, 3);
        assert_eq!(config.save_retries, 2);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config_from(Some(Path::new("/no/such/memlab.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn zero_rounds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memlab.toml");
        std::fs::write(&path, "total_rounds = 0\n").unwrap();

        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("total_rounds"));
    }
}
