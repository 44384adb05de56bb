//! Transport timeout configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Per-call timeouts honoured by the HTTP transport.
///
/// A timeout counts as a transport failure, so it is retried like any other.
///
/// # Examples
///
/// ```toml
/// [timeouts]
/// connect_secs = 10
/// read_secs = 30
/// overall_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Timeout between reads of the response in seconds.
    pub read_secs: u64,

    /// Whole-request timeout in seconds.
    pub overall_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 10, read_secs: 30, overall_secs: 60 }
    }
}

impl TimeoutConfig {
    /// Validates that every timeout is set.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] for a zero timeout, or a read or
    /// connect timeout longer than the overall one.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect_secs", self.connect_secs),
            ("read_secs", self.read_secs),
            ("overall_secs", self.overall_secs),
        ] {
            if value == 0 {
                return Err(BridgeError::ConfigurationError(format!(
                    "timeouts.{name} must be greater than zero"
                )));
            }
        }
        if self.connect_secs > self.overall_secs || self.read_secs > self.overall_secs {
            return Err(BridgeError::ConfigurationError(
                "timeouts.overall_secs must not be shorter than connect_secs or read_secs"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    /// Read timeout as a [`Duration`].
    #[must_use]
    pub const fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    /// Overall timeout as a [`Duration`].
    #[must_use]
    pub const fn overall(&self) -> Duration {
        Duration::from_secs(self.overall_secs)
    }
}
