//! Dispatcher configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable for [`DispatcherConfig::exec_threads`].
pub const ENV_EXEC_THREADS: &str = "WORKER_EXEC_THREADS";
/// Environment variable for [`DispatcherConfig::backoff_interval_ms`].
pub const ENV_BACKOFF_INTERVAL_MS: &str = "WORKER_BACKOFF_INTERVAL_MS";
/// Environment variable for [`DispatcherConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "WORKER_POLL_INTERVAL_MS";

const DEFAULT_BACKOFF_INTERVAL_MS: u64 = 1_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Configuration of a [`crate::core::Dispatcher`], read once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Concurrency level: number of execution slots, and the soft capacity of
    /// both the admission queue and the pool's internal queue.
    pub exec_threads: usize,
    /// Grace wait in `offer` and the dispatch loop's back-off when saturated.
    pub backoff_interval_ms: u64,
    /// How long an idle dispatch loop waits for a ready task before
    /// re-checking the shutdown signal.
    pub poll_interval_ms: u64,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            exec_threads: num_cpus::get(),
            backoff_interval_ms: DEFAULT_BACKOFF_INTERVAL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl DispatcherConfig {
    /// Defaults: one slot per CPU, 1s back-off, 100ms poll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency level.
    #[must_use]
    pub const fn with_exec_threads(mut self, exec_threads: usize) -> Self {
        self.exec_threads = exec_threads;
        self
    }

    /// Set the back-off interval.
    #[must_use]
    pub const fn with_backoff_interval_ms(mut self, backoff_interval_ms: u64) -> Self {
        self.backoff_interval_ms = backoff_interval_ms;
        self
    }

    /// Set the idle poll interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Back-off interval as a duration.
    #[must_use]
    pub const fn backoff_interval(&self) -> Duration {
        Duration::from_millis(self.backoff_interval_ms)
    }

    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.exec_threads == 0 {
            return Err("exec_threads must be greater than 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the environment, loading `.env` first if one
    /// exists. Unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// A variable that does not parse, or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_var(ENV_EXEC_THREADS)? {
            cfg.exec_threads = v;
        }
        if let Some(v) = env_var(ENV_BACKOFF_INTERVAL_MS)? {
            cfg.backoff_interval_ms = v;
        }
        if let Some(v) = env_var(ENV_POLL_INTERVAL_MS)? {
            cfg.poll_interval_ms = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = DispatcherConfig::new();
        assert!(cfg.exec_threads >= 1);
        assert_eq!(cfg.backoff_interval(), Duration::from_secs(1));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_env_var_parse_error_names_key() {
        std::env::set_var("WORKER_DISPATCHER_TEST_BAD", "many");
        let err = env_var::<usize>("WORKER_DISPATCHER_TEST_BAD").unwrap_err();
        assert!(err.starts_with("WORKER_DISPATCHER_TEST_BAD"));
        assert_eq!(env_var::<usize>("WORKER_DISPATCHER_TEST_UNSET").unwrap(), None);
    }
}
