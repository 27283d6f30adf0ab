//! Inbounds persisted as a JSON array on disk.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use xpb_core::{domain::Inbound, errors::Error, ports::InboundService, Result};

/// File-backed inbound store.
///
/// Every mutation is a read-modify-write under one async mutex, and the file
/// is replaced atomically (temp file + rename). A missing file is an empty store.
pub struct JsonInboundStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonInboundStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Inbound>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, inbounds: &[Inbound]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(inbounds)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update(&self, f: impl FnOnce(&mut Vec<Inbound>) -> Result<()> + Send) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await?;
        f(&mut all)?;
        self.save(&all).await
    }

    async fn update_port(&self, port: u16, f: impl FnOnce(&mut Inbound) + Send) -> Result<()> {
        self.update(|all| {
            let ib = all
                .iter_mut()
                .find(|ib| ib.port == port)
                .ok_or_else(|| no_inbound(port))?;
            f(ib);
            Ok(())
        })
        .await
    }
}

fn no_inbound(port: u16) -> Error {
    Error::NotFound(format!("no inbound on port {port}"))
}

#[async_trait]
impl InboundService for JsonInboundStore {
    async fn list_inbounds(&self) -> Result<Vec<Inbound>> {
        self.load().await
    }

    async fn delete_by_port(&self, port: u16) -> Result<()> {
        self.update(|all| {
            let before = all.len();
            all.retain(|ib| ib.port != port);
            if all.len() == before {
                return Err(no_inbound(port));
            }
            Ok(())
        })
        .await?;
        info!(port, "inbound deleted");
        Ok(())
    }

    async fn disable_by_port(&self, port: u16) -> Result<()> {
        self.update_port(port, |ib| ib.enable = false).await
    }

    async fn enable_by_port(&self, port: u16) -> Result<()> {
        self.update_port(port, |ib| ib.enable = true).await
    }

    async fn clear_traffic_by_port(&self, port: u16) -> Result<()> {
        self.update_port(port, |ib| {
            ib.up = 0;
            ib.down = 0;
        })
        .await
    }

    async fn clear_all_traffic(&self) -> Result<()> {
        self.update(|all| {
            for ib in all.iter_mut() {
                ib.up = 0;
                ib.down = 0;
            }
            Ok(())
        })
        .await
    }
}
