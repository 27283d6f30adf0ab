//! Hand-written fakes shared by the unit tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{ChatId, Inbound, LoadAverage},
    errors::Error,
    messaging::{
        port::{ChatClient, ChatTransport},
        types::{BotCommandInfo, IncomingMessage, Update},
    },
    ports::{InboundService, ProxyController, SettingsSource, SystemProbe},
    Result,
};

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(IncomingMessage {
            chat_id: ChatId(chat_id),
            text: Some(text.to_string()),
        }),
    }
}

pub fn empty_update(update_id: i64) -> Update {
    Update {
        update_id,
        message: None,
    }
}

pub fn inbound(remark: &str, port: u16, up: u64, down: u64, expiry_time: i64) -> Inbound {
    Inbound {
        remark: remark.to_string(),
        port,
        enable: true,
        up,
        down,
        expiry_time,
    }
}

// ---------------------------------------------------------------------------
// Chat transport
// ---------------------------------------------------------------------------

/// Updates published to the transport form a backend log shared by every
/// client; like the real backend, an update is redelivered until a poll or an
/// acknowledgement moves the offset past it.
#[derive(Default)]
pub struct FakeTransport {
    clients: Mutex<Vec<Arc<FakeClient>>>,
    connects: AtomicUsize,
    backlog: Arc<Mutex<Vec<Update>>>,
}

impl FakeTransport {
    pub const BAD_TOKEN: &'static str = "bad-token";

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn client(&self, idx: usize) -> Arc<FakeClient> {
        self.clients.lock().unwrap()[idx].clone()
    }

    pub fn last_client(&self) -> Arc<FakeClient> {
        self.clients.lock().unwrap().last().cloned().unwrap()
    }

    pub fn publish(&self, updates: Vec<Update>) {
        self.backlog.lock().unwrap().extend(updates);
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn connect(&self, token: &str) -> Result<Arc<dyn ChatClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if token == Self::BAD_TOKEN {
            return Err(Error::External("401 Unauthorized".to_string()));
        }
        let client = Arc::new(FakeClient::new(self.backlog.clone()));
        self.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// Scripted client: each `push` is the result of one poll round; with nothing
/// scripted a poll blocks until cancelled.
pub struct FakeClient {
    tx: mpsc::UnboundedSender<Result<Vec<Update>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Vec<Update>>>>,
    sent: Mutex<Vec<(i64, String)>>,
    fail_sends: AtomicBool,
    backlog: Arc<Mutex<Vec<Update>>>,
    offset: AtomicI64,
    acked: Mutex<Vec<i64>>,
}

impl FakeClient {
    fn new(backlog: Arc<Mutex<Vec<Update>>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            backlog,
            offset: AtomicI64::new(0),
            acked: Mutex::new(Vec::new()),
        }
    }

    /// Offsets passed to `acknowledge`, in call order.
    pub fn acked(&self) -> Vec<i64> {
        self.acked.lock().unwrap().clone()
    }

    pub fn push(&self, batch: Result<Vec<Update>>) {
        let _ = self.tx.send(batch);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    fn username(&self) -> String {
        "fake_bot".to_string()
    }

    async fn poll_updates(&self, _timeout: Duration) -> Result<Vec<Update>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let published = {
            let mut log = self.backlog.lock().unwrap();
            log.retain(|u| u.update_id >= offset);
            log.clone()
        };
        if let Some(last) = published.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
            return Ok(published);
        }

        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }

    async fn acknowledge(&self, next_update_id: i64) -> Result<()> {
        self.offset.fetch_max(next_update_id, Ordering::SeqCst);
        self.backlog
            .lock()
            .unwrap()
            .retain(|u| u.update_id >= next_update_id);
        self.acked.lock().unwrap().push(next_update_id);
        Ok(())
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::External("send failed".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
        Ok(())
    }

    async fn commands(&self) -> Result<Vec<BotCommandInfo>> {
        Ok(vec![BotCommandInfo {
            command: "status".to_string(),
            description: "system status".to_string(),
        }])
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeInbounds {
    inbounds: Mutex<Vec<Inbound>>,
    calls: AtomicUsize,
    fail_list: AtomicBool,
}

impl FakeInbounds {
    pub fn with(inbounds: Vec<Inbound>) -> Self {
        Self {
            inbounds: Mutex::new(inbounds),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Inbound> {
        self.inbounds.lock().unwrap().clone()
    }

    /// Number of mutating calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    fn with_port(&self, port: u16, f: impl FnOnce(&mut Inbound)) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut all = self.inbounds.lock().unwrap();
        let ib = all
            .iter_mut()
            .find(|ib| ib.port == port)
            .ok_or_else(|| Error::NotFound(format!("no inbound on port {port}")))?;
        f(ib);
        Ok(())
    }
}

#[async_trait]
impl InboundService for FakeInbounds {
    async fn list_inbounds(&self) -> Result<Vec<Inbound>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::External("database is locked".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn delete_by_port(&self, port: u16) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut all = self.inbounds.lock().unwrap();
        let before = all.len();
        all.retain(|ib| ib.port != port);
        if all.len() == before {
            return Err(Error::NotFound(format!("no inbound on port {port}")));
        }
        Ok(())
    }

    async fn disable_by_port(&self, port: u16) -> Result<()> {
        self.with_port(port, |ib| ib.enable = false)
    }

    async fn enable_by_port(&self, port: u16) -> Result<()> {
        self.with_port(port, |ib| ib.enable = true)
    }

    async fn clear_traffic_by_port(&self, port: u16) -> Result<()> {
        self.with_port(port, |ib| {
            ib.up = 0;
            ib.down = 0;
        })
    }

    async fn clear_all_traffic(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for ib in self.inbounds.lock().unwrap().iter_mut() {
            ib.up = 0;
            ib.down = 0;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProxy {
    restarts: AtomicUsize,
    fail_restart: AtomicBool,
    restart_delay_ms: AtomicU64,
}

impl FakeProxy {
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn fail_restart(&self, fail: bool) {
        self.fail_restart.store(fail, Ordering::SeqCst);
    }

    pub fn restart_delay(&self, delay: Duration) {
        self.restart_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProxyController for FakeProxy {
    async fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        let delay = self.restart_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(Error::External("xray exited with status 1".to_string()));
        }
        Ok(())
    }

    async fn version(&self) -> String {
        "1.8.4".to_string()
    }
}

#[derive(Default)]
pub struct FakeProbe {
    pub fail_hostname: AtomicBool,
    pub fail_load: AtomicBool,
    pub fail_uptime: AtomicBool,
}

#[async_trait]
impl SystemProbe for FakeProbe {
    async fn hostname(&self) -> Result<String> {
        if self.fail_hostname.load(Ordering::SeqCst) {
            return Err(Error::External("uname failed".to_string()));
        }
        Ok("edge-1".to_string())
    }

    fn os(&self) -> String {
        "linux".to_string()
    }

    fn arch(&self) -> String {
        "x86_64".to_string()
    }

    async fn load_average(&self) -> Result<LoadAverage> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(Error::External("no /proc/loadavg".to_string()));
        }
        Ok(LoadAverage {
            one: 0.1,
            five: 0.2,
            fifteen: 0.3,
        })
    }

    async fn uptime(&self) -> Result<Duration> {
        if self.fail_uptime.load(Ordering::SeqCst) {
            return Err(Error::External("no /proc/uptime".to_string()));
        }
        Ok(Duration::from_secs(3 * 3600 + 25))
    }

    async fn public_ip(&self) -> String {
        "203.0.113.7".to_string()
    }
}

pub struct FakeSettings {
    pub token: Mutex<String>,
    /// `None` simulates a failed settings read.
    pub chat_id: Mutex<Option<i64>>,
}

impl FakeSettings {
    pub fn new(token: &str, chat_id: i64) -> Self {
        Self {
            token: Mutex::new(token.to_string()),
            chat_id: Mutex::new(Some(chat_id)),
        }
    }
}

impl SettingsSource for FakeSettings {
    fn bot_token(&self) -> Result<String> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn notify_chat_id(&self) -> Result<i64> {
        self.chat_id
            .lock()
            .unwrap()
            .ok_or_else(|| Error::Config("setting tgBotChatId not found".to_string()))
    }
}
