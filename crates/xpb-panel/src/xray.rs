//! Xray kernel control through its binary and the host's service manager.

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use xpb_core::{errors::Error, ports::ProxyController, Result};

const UNKNOWN_VERSION: &str = "Unknown";
const STDERR_TAIL_CHARS: usize = 400;

pub struct XrayController {
    bin: PathBuf,
    restart_cmd: Vec<String>,
}

impl XrayController {
    /// `restart_cmd` is a program followed by its arguments.
    pub fn new(bin: impl Into<PathBuf>, restart_cmd: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            restart_cmd,
        }
    }
}

#[async_trait]
impl ProxyController for XrayController {
    async fn restart(&self) -> Result<()> {
        let Some((program, args)) = self.restart_cmd.split_first() else {
            return Err(Error::Config("xray restart command is empty".to_string()));
        };

        let out = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::External(format!("failed to run {program}: {e}")))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let mut msg = format!("{program} exited with {}", out.status);
            let tail = tail_chars(stderr.trim(), STDERR_TAIL_CHARS);
            if !tail.is_empty() {
                msg.push_str(": ");
                msg.push_str(&tail);
            }
            return Err(Error::External(msg));
        }

        info!("xray restarted");
        Ok(())
    }

    async fn version(&self) -> String {
        let out = Command::new(&self.bin)
            .arg("version")
            .stdin(Stdio::null())
            .output()
            .await;
        match out {
            Ok(out) if out.status.success() => {
                parse_version(&String::from_utf8_lossy(&out.stdout))
                    .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
            }
            Ok(out) => {
                warn!(status = %out.status, "xray version exited unsuccessfully");
                UNKNOWN_VERSION.to_string()
            }
            Err(e) => {
                warn!(bin = %self.bin.display(), "xray version failed: {e}");
                UNKNOWN_VERSION.to_string()
            }
        }
    }
}

/// `Xray 1.8.4 (Xray, Penetrates Everything.) ...` -> `1.8.4`
fn parse_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

fn tail_chars(s: &str, max: usize) -> String {
    let n = s.chars().count();
    if n <= max {
        return s.to_string();
    }
    let mut out = "...".to_string();
    out.extend(s.chars().skip(n - max));
    out
}
