//! Exponential backoff for retried filesystem operations.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use std::time::Duration;

/// Delay before retry number `attempt` (0-based): 10ms, 20ms, 40ms...
/// capped at 500ms.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = STARTING_BACKOFF_DELAY_MS.saturating_mul(factor).min(MAX_BACKOFF_DELAY_MS);
    Duration::from_millis(delay)
}

/// Run `op` up to `attempts` times, sleeping the backoff delay between
/// failures. Returns the last error if every attempt fails.
///
/// Blocking; meant for the blocking thread pool. Renames on Windows can fail
/// transiently while another process holds a handle in the tree.
pub fn retry_blocking<T, E, F>(attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts => {
                tracing::debug!("attempt {} failed: {e}; retrying", attempt + 1);
                std::thread::sleep(backoff_delay(attempt));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
