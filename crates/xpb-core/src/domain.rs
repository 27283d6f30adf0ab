use serde::{Deserialize, Serialize};

/// Chat id on the messaging backend (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A configured traffic entry point, identified by its listening port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub remark: String,
    pub port: u16,
    #[serde(default = "default_enable")]
    pub enable: bool,
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
    /// Expiry instant in epoch milliseconds; `0` means no expiry.
    #[serde(default)]
    pub expiry_time: i64,
}

fn default_enable() -> bool {
    true
}

impl Inbound {
    pub fn total(&self) -> u64 {
        self.up.saturating_add(self.down)
    }
}

/// 1, 5 and 15 minute load averages.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}
