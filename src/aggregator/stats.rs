//! Follower statistics.
//!
//! Summation and averaging over an accumulated follower listing.

use crate::models::{FollowerRecord, NetworkStats};

/// Compute total and average follower counts over `records`.
pub fn compute_stats(records: &[FollowerRecord]) -> NetworkStats {
    let total = records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.follower_count()));
    let processed = records.len();

    NetworkStats {
        total,
        average: rounded_average(total, processed),
        processed,
    }
}

/// `total / count` rounded half-up, or 0 when `count` is 0.
pub fn rounded_average(total: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    let total = total as u128;
    let count = count as u128;
    ((2 * total + count) / (2 * count)) as u64
}

/// Format an integer with thousands separators (e.g. `1,234,567`).
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}
