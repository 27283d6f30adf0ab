use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, ports::SettingsSource, Result};

/// Typed configuration, read from the environment (plus an optional `.env`).
///
/// A missing bot token or chat id is not a load error: the session refuses to
/// start and notifications are skipped, each with a log line.
#[derive(Clone, Debug)]
pub struct Config {
    // Bot
    pub bot_token: String,
    pub notify_chat_id: i64,
    pub poll_timeout: Duration,
    pub stats_interval: Option<Duration>,

    // Panel collaborators
    pub inbounds_file: PathBuf,
    pub xray_bin: PathBuf,
    pub xray_restart_cmd: Vec<String>,

    // Host probes
    pub ip_endpoints: Vec<String>,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            notify_chat_id: 0,
            poll_timeout: Duration::from_secs(60),
            stats_interval: None,
            inbounds_file: PathBuf::from("/etc/xpb/inbounds.json"),
            xray_bin: PathBuf::from("/usr/local/x-ui/bin/xray"),
            xray_restart_cmd: split_command("systemctl restart xray"),
            ip_endpoints: vec![
                "https://api.ipify.org".to_string(),
                "https://ifconfig.me/ip".to_string(),
            ],
            http_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_env()
    }

    fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bot_token = env_str("XPB_BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let notify_chat_id = env_i64("XPB_CHAT_ID").unwrap_or(0);

        let poll_timeout = env_u64("XPB_POLL_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_timeout);
        let stats_interval = env_u64("XPB_STATS_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        let inbounds_file = env_path("XPB_INBOUNDS_FILE").unwrap_or(defaults.inbounds_file);
        let xray_bin = env_path("XPB_XRAY_BIN").unwrap_or(defaults.xray_bin);
        let xray_restart_cmd = env_str("XPB_XRAY_RESTART_CMD")
            .and_then(non_empty)
            .map(|s| split_command(&s))
            .unwrap_or(defaults.xray_restart_cmd);
        if xray_restart_cmd.is_empty() {
            return Err(Error::Config(
                "XPB_XRAY_RESTART_CMD must name a program".to_string(),
            ));
        }

        let ip_endpoints =
            parse_csv(env_str("XPB_IP_ENDPOINTS")).unwrap_or(defaults.ip_endpoints);
        let http_timeout = env_u64("XPB_HTTP_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Ok(Self {
            bot_token,
            notify_chat_id,
            poll_timeout,
            stats_interval,
            inbounds_file,
            xray_bin,
            xray_restart_cmd,
            ip_endpoints,
            http_timeout,
        })
    }
}

impl SettingsSource for Config {
    fn bot_token(&self) -> Result<String> {
        Ok(self.bot_token.clone())
    }

    fn notify_chat_id(&self) -> Result<i64> {
        Ok(self.notify_chat_id)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_str(key).and_then(non_empty).map(PathBuf::from)
}

fn parse_csv(v: Option<String>) -> Option<Vec<String>> {
    let out = v?
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn split_command(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
