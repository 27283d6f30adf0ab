//! System and traffic report for the `/status` command and the stats job.

use std::sync::Arc;

use tracing::warn;

use crate::{
    domain::Inbound,
    formatting::{format_expiry, format_load, format_traffic, format_uptime},
    ports::{InboundService, ProxyController, SystemProbe},
    Result,
};

/// Best-effort report builder.
///
/// Only the hostname is a hard dependency; load average, uptime and the inbound
/// listing are dropped from the report (with a warning) when their probe fails.
pub struct StatusReporter {
    probe: Arc<dyn SystemProbe>,
    proxy: Arc<dyn ProxyController>,
    inbounds: Arc<dyn InboundService>,
}

impl StatusReporter {
    pub fn new(
        probe: Arc<dyn SystemProbe>,
        proxy: Arc<dyn ProxyController>,
        inbounds: Arc<dyn InboundService>,
    ) -> Self {
        Self {
            probe,
            proxy,
            inbounds,
        }
    }

    pub async fn build(&self) -> Result<String> {
        let hostname = self.probe.hostname().await?;

        let mut lines: Vec<String> = vec![
            format!("😊 Hostname: {hostname}"),
            format!("🔗 OS: {}", self.probe.os()),
            format!("⬛ Arch: {}", self.probe.arch()),
        ];

        match self.probe.load_average().await {
            Ok(load) => lines.push(format!("⭕ Load average: {}", format_load(&load))),
            Err(e) => warn!(error = %e, "load average probe failed"),
        }

        match self.probe.uptime().await {
            Ok(up) => lines.push(format!("⏳ Uptime: {}", format_uptime(up))),
            Err(e) => warn!(error = %e, "uptime probe failed"),
        }

        lines.push(format!("🟡 Xray version: {}", self.proxy.version().await));
        lines.push(format!("🆔 IP address: {}", self.probe.public_ip().await));

        match self.inbounds.list_inbounds().await {
            Ok(inbounds) => {
                for ib in &inbounds {
                    lines.push(String::new());
                    lines.push(inbound_block(ib));
                }
            }
            Err(e) => warn!(error = %e, "listing inbounds for status report failed"),
        }

        Ok(lines.join("\n"))
    }
}

fn inbound_block(ib: &Inbound) -> String {
    let expiry = if ib.expiry_time == 0 {
        format!("⌚ Expiry: {}", format_expiry(0))
    } else {
        format!("❗ Expires at: {}", format_expiry(ib.expiry_time))
    };

    format!(
        "😎 Inbound: {}\nPort: {}\nUpload ↑: {}\nDownload ↓: {}\nTotal: {}\n{expiry}",
        ib.remark,
        ib.port,
        format_traffic(ib.up),
        format_traffic(ib.down),
        format_traffic(ib.total()),
    )
}
