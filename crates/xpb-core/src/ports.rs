//! Collaborator ports.
//!
//! The core never manages inbounds, the proxy process or host metrics itself;
//! it drives them through these traits.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{Inbound, LoadAverage},
    Result,
};

/// Inbound/traffic management subsystem.
#[async_trait]
pub trait InboundService: Send + Sync {
    /// All inbounds in storage order.
    async fn list_inbounds(&self) -> Result<Vec<Inbound>>;

    async fn delete_by_port(&self, port: u16) -> Result<()>;
    async fn disable_by_port(&self, port: u16) -> Result<()>;
    async fn enable_by_port(&self, port: u16) -> Result<()>;

    /// Reset upload/download counters of the inbound bound to `port`.
    async fn clear_traffic_by_port(&self, port: u16) -> Result<()>;
    async fn clear_all_traffic(&self) -> Result<()>;
}

/// Proxy kernel process controller.
#[async_trait]
pub trait ProxyController: Send + Sync {
    /// Restart the proxy kernel. Any retry policy lives in the implementation.
    async fn restart(&self) -> Result<()>;

    /// Kernel version string; implementations return `Unknown` rather than fail.
    async fn version(&self) -> String;
}

/// Host metrics probes.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn hostname(&self) -> Result<String>;
    fn os(&self) -> String;
    fn arch(&self) -> String;
    async fn load_average(&self) -> Result<LoadAverage>;
    async fn uptime(&self) -> Result<Duration>;

    /// Best-effort public address; empty when it cannot be determined.
    async fn public_ip(&self) -> String;
}

/// Persisted bot settings, read at session start and at every notification.
pub trait SettingsSource: Send + Sync {
    fn bot_token(&self) -> Result<String>;
    fn notify_chat_id(&self) -> Result<i64>;
}
