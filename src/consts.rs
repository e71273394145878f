//! Project-wide constants.

use std::time::Duration;

/// Latency of the simulated checker when none is configured.
pub const DEFAULT_CHECK_DELAY: Duration = Duration::from_millis(20);

/// Approval probability of the simulated checker when none is configured.
pub const DEFAULT_APPROVAL_RATE: f64 = 0.5;

/// Upper bound on a single check before it counts as failed.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the controller's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Format a number with comma separators (e.g. 1,234,567).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
