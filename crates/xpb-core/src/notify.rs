//! Proactive messages to the configured chat, independent of the update loop.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{domain::ChatId, ports::SettingsSource, session::SessionManager};

#[derive(Clone)]
pub struct Notifier {
    settings: Arc<dyn SettingsSource>,
    session: Arc<SessionManager>,
}

impl Notifier {
    pub fn new(settings: Arc<dyn SettingsSource>, session: Arc<SessionManager>) -> Self {
        Self { settings, session }
    }

    /// Push `text` to the notification chat. Returns whether it was delivered.
    ///
    /// The chat id is re-read on every call; a missing id skips the message.
    pub async fn notify(&self, text: &str) -> bool {
        let chat_id = match self.settings.notify_chat_id() {
            Ok(0) => {
                warn!("notification skipped: chat id is not configured");
                return false;
            }
            Ok(id) => ChatId(id),
            Err(e) => {
                warn!(error = %e, "notification skipped: reading chat id failed");
                return false;
            }
        };

        match self.session.send(chat_id, text).await {
            Ok(()) => {
                debug!(chat_id = chat_id.0, "notification sent");
                true
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "notification not delivered");
                false
            }
        }
    }
}
