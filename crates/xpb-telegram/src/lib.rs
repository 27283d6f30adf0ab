//! Telegram adapter (teloxide).
//!
//! Implements the `xpb-core` chat transport over the Telegram Bot API using
//! long-polling `getUpdates`.

use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{AllowedUpdate, UpdateKind},
    ApiError, RequestError,
};
use tokio::time::sleep;
use tracing::debug;

use xpb_core::{
    domain::ChatId,
    errors::Error,
    messaging::{
        port::{ChatClient, ChatTransport},
        types::{BotCommandInfo, IncomingMessage, Update},
    },
    Result,
};

/// Extra HTTP headroom on top of the long-poll window.
const HTTP_SLACK: Duration = Duration::from_secs(10);

/// Creates authenticated [`TelegramClient`]s.
pub struct TelegramTransport {
    poll_timeout: Duration,
}

impl TelegramTransport {
    pub fn new(poll_timeout: Duration) -> Self {
        Self { poll_timeout }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self, token: &str) -> Result<Arc<dyn ChatClient>> {
        let http = teloxide::net::default_reqwest_settings()
            .timeout(self.poll_timeout + HTTP_SLACK)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        let bot = Bot::with_client(token, http);

        let me = bot
            .get_me()
            .await
            .map_err(|e| Error::External(format!("telegram getMe failed: {e}")))?;
        let username = me.user.username.clone().unwrap_or_default();

        Ok(Arc::new(TelegramClient::new(bot, username)))
    }
}

pub struct TelegramClient {
    bot: Bot,
    username: String,
    /// `getUpdates` offset; 0 until the first batch arrives.
    offset: AtomicI32,
}

impl TelegramClient {
    pub fn new(bot: Bot, username: String) -> Self {
        Self {
            bot,
            username,
            offset: AtomicI32::new(0),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::Api(ApiError::NotFound) => {
                Error::TransportClosed("telegram rejected the bot token".to_string())
            }
            other => Error::External(format!("telegram error: {other}")),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    fn username(&self) -> String {
        self.username.clone()
    }

    async fn poll_updates(&self, timeout: Duration) -> Result<Vec<Update>> {
        let mut req = self
            .bot
            .get_updates()
            .timeout(timeout.as_secs().min(u32::MAX as u64) as u32)
            .allowed_updates([AllowedUpdate::Message]);
        let offset = self.offset.load(Ordering::SeqCst);
        if offset != 0 {
            req = req.offset(offset);
        }

        let updates = req.await.map_err(Self::map_err)?;
        if let Some(next) = next_offset(&updates) {
            self.offset.store(next, Ordering::SeqCst);
        }
        debug!(count = updates.len(), "polled telegram updates");

        Ok(updates.into_iter().map(convert_update).collect())
    }

    async fn acknowledge(&self, next_update_id: i64) -> Result<()> {
        let offset = i32::try_from(next_update_id)
            .map_err(|_| Error::External(format!("update id {next_update_id} out of range")))?;
        self.offset.fetch_max(offset, Ordering::SeqCst);

        // getUpdates confirms everything below `offset`; no need to wait for more.
        self.bot
            .get_updates()
            .offset(offset)
            .timeout(0u32)
            .limit(1u8)
            .allowed_updates([AllowedUpdate::Message])
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(())
    }

    async fn commands(&self) -> Result<Vec<BotCommandInfo>> {
        let commands = self.with_retry(|| self.bot.get_my_commands()).await?;
        Ok(commands
            .into_iter()
            .map(|c| BotCommandInfo {
                command: c.command,
                description: c.description,
            })
            .collect())
    }
}

fn next_offset(updates: &[teloxide::types::Update]) -> Option<i32> {
    updates.iter().map(|u| u.id).max().map(|id| id + 1)
}

fn convert_update(update: teloxide::types::Update) -> Update {
    let message = match &update.kind {
        UpdateKind::Message(msg) => Some(IncomingMessage {
            chat_id: ChatId(msg.chat.id.0),
            text: msg.text().map(str::to_string),
        }),
        _ => None,
    };

    Update {
        update_id: i64::from(update.id),
        message,
    }
}
