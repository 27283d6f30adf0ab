//! Host metrics from procfs, plus a best-effort public address lookup.

use std::{
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, warn};

use xpb_core::{domain::LoadAverage, errors::Error, ports::SystemProbe, Result};

pub struct HostProbe {
    http: reqwest::Client,
    ip_endpoints: Vec<String>,
    hostname_files: Vec<PathBuf>,
    proc_root: PathBuf,
}

impl HostProbe {
    pub fn new(ip_endpoints: Vec<String>, http_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            ip_endpoints,
            hostname_files: vec![
                PathBuf::from("/proc/sys/kernel/hostname"),
                PathBuf::from("/etc/hostname"),
            ],
            proc_root: PathBuf::from("/proc"),
        })
    }

    /// Read procfs-style files from `proc_root` instead of `/proc`.
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        let root = proc_root.into();
        self.hostname_files = vec![root.join("sys/kernel/hostname")];
        self.proc_root = root;
        self
    }

    async fn read_proc(&self, rel: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.proc_root.join(rel)).await?)
    }
}

#[async_trait]
impl SystemProbe for HostProbe {
    async fn hostname(&self) -> Result<String> {
        for path in &self.hostname_files {
            match read_trimmed(path).await {
                Ok(name) if !name.is_empty() => return Ok(name),
                Ok(_) => debug!(path = %path.display(), "hostname file is empty"),
                Err(e) => debug!(path = %path.display(), "hostname read failed: {e}"),
            }
        }
        Err(Error::External("hostname is unavailable".to_string()))
    }

    fn os(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    async fn load_average(&self) -> Result<LoadAverage> {
        parse_loadavg(&self.read_proc("loadavg").await?)
    }

    async fn uptime(&self) -> Result<Duration> {
        parse_uptime(&self.read_proc("uptime").await?)
    }

    async fn public_ip(&self) -> String {
        for endpoint in &self.ip_endpoints {
            match fetch_ip(&self.http, endpoint).await {
                Ok(ip) => return ip.to_string(),
                Err(e) => warn!(endpoint = %endpoint, "public ip lookup failed: {e}"),
            }
        }
        String::new()
    }
}

async fn fetch_ip(http: &reqwest::Client, endpoint: &str) -> Result<IpAddr> {
    let resp = http
        .get(endpoint)
        .send()
        .await
        .map_err(|e| Error::External(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::External(format!("status {status}")));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| Error::External(e.to_string()))?;
    parse_ip(&body)
}

fn parse_ip(body: &str) -> Result<IpAddr> {
    let s = body.trim();
    s.parse()
        .map_err(|_| Error::External(format!("not an ip address: {s:?}")))
}

async fn read_trimmed(path: &Path) -> Result<String> {
    Ok(tokio::fs::read_to_string(path).await?.trim().to_string())
}

/// `/proc/loadavg`: `0.52 0.58 0.59 1/389 12345`
fn parse_loadavg(s: &str) -> Result<LoadAverage> {
    let mut it = s.split_whitespace().map(|f| f.parse::<f64>());
    let mut next = || -> Result<f64> {
        it.next()
            .and_then(|r| r.ok())
            .ok_or_else(|| Error::External(format!("malformed loadavg: {s:?}")))
    };
    Ok(LoadAverage {
        one: next()?,
        five: next()?,
        fifteen: next()?,
    })
}

/// `/proc/uptime`: `350735.47 234388.90` (seconds up, seconds idle)
fn parse_uptime(s: &str) -> Result<Duration> {
    s.split_whitespace()
        .next()
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| Error::External(format!("malformed uptime: {s:?}")))
}
