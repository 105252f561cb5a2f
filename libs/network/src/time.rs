//! Wall-clock helpers for deadlines and bundle timestamps

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the UNIX epoch, `0` if the clock is before the epoch
pub fn unix_timestamp_secs() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs(),
        Err(e) => {
            tracing::error!("System time before UNIX epoch: {}", e);
            0
        }
    }
}
