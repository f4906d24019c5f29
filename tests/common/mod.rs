//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Generous upper bound for anything that waits on pipeline threads
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Short sampling period so whole waveforms run in milliseconds
pub fn fast_period() -> Duration {
    Duration::from_micros(200)
}
