// Queue Configuration (environment surface)

use crate::application::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_FILE, DEFAULT_TIMEOUT};
use crate::domain::WaitPolicy;
use crate::error::{AppError, Result};
use std::path::PathBuf;

/// Backing file path
pub const ENV_QUEUE_FILE: &str = "QUEUE_FILE";
/// Seconds between polls
pub const ENV_QUEUE_INTERVAL: &str = "QUEUE_INTERVAL";
/// Seconds before a waiter gives up
pub const ENV_QUEUE_TIMEOUT: &str = "QUEUE_TIMEOUT";

/// Where the queue lives and how long callers wait on it
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub queue_file: PathBuf,
    pub wait: WaitPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_file: expand(DEFAULT_QUEUE_FILE),
            wait: WaitPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT)
                .expect("default poll interval is non-zero"),
        }
    }
}

impl QueueConfig {
    /// Read `QUEUE_FILE`, `QUEUE_INTERVAL`, `QUEUE_TIMEOUT`, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let queue_file = lookup(ENV_QUEUE_FILE)
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand(&s))
            .unwrap_or(defaults.queue_file);

        let interval = parse_secs(&lookup, ENV_QUEUE_INTERVAL)?
            .unwrap_or(defaults.wait.poll_interval().as_secs_f64());
        let timeout = parse_secs(&lookup, ENV_QUEUE_TIMEOUT)?
            .unwrap_or(defaults.wait.timeout().as_secs_f64());

        Self::build(queue_file, interval, timeout)
    }

    /// Build from explicit values (CLI flags)
    pub fn build(queue_file: PathBuf, interval_secs: f64, timeout_secs: f64) -> Result<Self> {
        if interval_secs.is_nan() || interval_secs <= 0.0 {
            return Err(AppError::Config(format!(
                "{} must be a positive number of seconds, got {}",
                ENV_QUEUE_INTERVAL, interval_secs
            )));
        }
        if timeout_secs.is_nan() || timeout_secs < 0.0 {
            return Err(AppError::Config(format!(
                "{} must be a non-negative number of seconds, got {}",
                ENV_QUEUE_TIMEOUT, timeout_secs
            )));
        }
        let wait = WaitPolicy::from_secs_f64(interval_secs, timeout_secs)
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(Self { queue_file, wait })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<f64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} is not a number: {:?}", key, raw))),
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
