//! Runtime configuration for tag sessions

use std::time::Duration;

/// Default pause before polling again after several tags were seen at once
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default time allowed for discovery before the session times out
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Tuning knobs for a tag session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay before re-polling when more than one tag is in range
    pub retry_delay: Duration,
    /// Total discovery budget, retries included
    pub session_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = session_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert_eq!(config.session_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::default()
            .with_retry_delay(Duration::from_millis(10))
            .with_session_timeout(Duration::from_secs(1));
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.session_timeout, Duration::from_secs(1));
    }
}
