use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::ChatId,
    messaging::types::{BotCommandInfo, Update},
    Result,
};

/// Entry point to a chat backend: turns a bot token into an authenticated client.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Authenticate with `token`. Errors mean the backend rejected the token or
    /// could not be reached.
    async fn connect(&self, token: &str) -> Result<Arc<dyn ChatClient>>;
}

/// An authenticated chat client.
///
/// The client owns the acknowledgement offset of the update stream: every
/// successful `poll_updates` acknowledges the previous batch.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Account name the client is authorised as.
    fn username(&self) -> String;

    /// One long-poll round. Returns an empty batch when `timeout` elapses.
    ///
    /// `Error::TransportClosed` means the stream cannot continue; any other
    /// error is transient.
    async fn poll_updates(&self, timeout: Duration) -> Result<Vec<Update>>;

    /// Confirm every update below `next_update_id` with the backend and resume
    /// polling from it, so consumed updates are never delivered again.
    async fn acknowledge(&self, next_update_id: i64) -> Result<()>;

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Command menu registered for the bot on the backend.
    async fn commands(&self) -> Result<Vec<BotCommandInfo>>;
}
