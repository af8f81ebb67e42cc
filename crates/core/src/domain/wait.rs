// Wait Domain Model

use super::error::{DomainError, Result};
use std::fmt;
use std::time::Duration;

/// Poll cadence and patience for a session waiting its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    poll_interval: Duration,
    timeout: Duration,
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(DomainError::InvalidWaitPolicy(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            poll_interval,
            timeout,
        })
    }

    /// Build from fractional seconds (the QUEUE_INTERVAL / QUEUE_TIMEOUT form)
    pub fn from_secs_f64(poll_interval: f64, timeout: f64) -> Result<Self> {
        let interval = Duration::try_from_secs_f64(poll_interval).map_err(|_| {
            DomainError::InvalidWaitPolicy(format!("invalid poll interval: {poll_interval}"))
        })?;
        let timeout = Duration::try_from_secs_f64(timeout)
            .map_err(|_| DomainError::InvalidWaitPolicy(format!("invalid timeout: {timeout}")))?;
        Self::new(interval, timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// floor(timeout / poll_interval)
    ///
    /// The budget is counted in polls, not wall-clock time.
    pub fn max_attempts(&self) -> u64 {
        let attempts = self.timeout.as_nanos() / self.poll_interval.as_nanos();
        u64::try_from(attempts).unwrap_or(u64::MAX)
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Session is at position 0
    ReachedFront,
    /// Session is no longer in the queue (removed externally or queue reset)
    Absent,
    /// Poll budget exhausted while still behind someone
    TimedOut,
    /// Cancel token fired
    Cancelled,
}

impl WaitOutcome {
    /// Whether the caller may go ahead and use the resource
    pub fn proceed(self) -> bool {
        matches!(self, WaitOutcome::ReachedFront | WaitOutcome::Absent)
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitOutcome::ReachedFront => write!(f, "REACHED_FRONT"),
            WaitOutcome::Absent => write!(f, "ABSENT"),
            WaitOutcome::TimedOut => write!(f, "TIMED_OUT"),
            WaitOutcome::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One step of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    /// Still waiting at this position (always >= 1)
    Position(usize),
    Finished(WaitOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_truncates() {
        let p = WaitPolicy::from_secs_f64(0.01, 0.05).unwrap();
        assert_eq!(p.max_attempts(), 5);

        let p = WaitPolicy::new(Duration::from_secs(10), Duration::from_secs(185)).unwrap();
        assert_eq!(p.max_attempts(), 18);

        let p = WaitPolicy::new(Duration::from_secs(10), Duration::from_secs(5)).unwrap();
        assert_eq!(p.max_attempts(), 0);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = WaitPolicy::new(Duration::ZERO, Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_negative_seconds_rejected() {
        assert!(WaitPolicy::from_secs_f64(-1.0, 10.0).is_err());
        assert!(WaitPolicy::from_secs_f64(1.0, -10.0).is_err());
        assert!(WaitPolicy::from_secs_f64(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn test_proceed() {
        assert!(WaitOutcome::ReachedFront.proceed());
        assert!(WaitOutcome::Absent.proceed());
        assert!(!WaitOutcome::TimedOut.proceed());
        assert!(!WaitOutcome::Cancelled.proceed());
    }
}
