//! Human-readable rendering of byte counts, durations and expiry instants.

use std::time::Duration;

use chrono::{Local, TimeZone};

use crate::domain::LoadAverage;

const TRAFFIC_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Binary-scaled traffic with two decimals: `1536` -> `1.50KB`.
pub fn format_traffic(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < TRAFFIC_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", TRAFFIC_UNITS[unit])
}

/// `59s`, `1m 0s`, `2h 3m 4s`, `1d 0h 0m 5s`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if days > 0 {
        return format!("{days}d {hours}h {mins}m {secs}s");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

pub const UNLIMITED_EXPIRY: &str = "unlimited";

/// `0` is "no expiry"; anything else is rendered in local time.
pub fn format_expiry(expiry_ms: i64) -> String {
    if expiry_ms == 0 {
        return UNLIMITED_EXPIRY.to_string();
    }
    match Local.timestamp_millis_opt(expiry_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => expiry_ms.to_string(),
    }
}

pub fn format_load(load: &LoadAverage) -> String {
    format!("{:.2}, {:.2}, {:.2}", load.one, load.five, load.fifteen)
}
