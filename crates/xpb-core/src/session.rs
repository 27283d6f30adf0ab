//! Ownership of the single live chat session.
//!
//! Two kinds of callers share the session: the update loop (pulling updates
//! through an [`UpdateStream`]) and any number of outbound senders. Start/stop
//! swap the live handle under a write lock, so readers only ever see a fully
//! constructed session or none at all.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::RwLock, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    domain::ChatId,
    errors::Error,
    messaging::{
        port::{ChatClient, ChatTransport},
        types::Update,
    },
};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("bot token is missing")]
    MissingToken,

    #[error("chat backend rejected the bot token: {0}")]
    AuthFailure(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no active chat session")]
    NoActiveSession,

    #[error("delivery failed: {0}")]
    Transport(String),
}

struct LiveSession {
    client: Arc<dyn ChatClient>,
    cancel: CancellationToken,
    generation: u64,
}

/// Owns the chat session handle.
///
/// Starting while a session is live retires the old one (its stream ends) and
/// installs the new one in a single write-locked swap.
///
/// Every update handed out by a stream moves the consumed watermark past its
/// id. The watermark is confirmed to the backend when a session stops and
/// when a replacement session starts, so no update is dispatched twice.
pub struct SessionManager {
    transport: Arc<dyn ChatTransport>,
    poll_timeout: Duration,
    live: RwLock<Option<LiveSession>>,
    generations: AtomicU64,
    /// Id of the first update not yet consumed; 0 until one is.
    consumed: Arc<AtomicI64>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn ChatTransport>, poll_timeout: Duration) -> Self {
        Self {
            transport,
            poll_timeout,
            live: RwLock::new(None),
            generations: AtomicU64::new(0),
            consumed: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Authenticate and begin streaming updates.
    ///
    /// The connection attempt happens outside the lock; a failed attempt leaves
    /// any current session untouched.
    pub async fn start(&self, token: &str) -> Result<UpdateStream, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let client = self
            .transport
            .connect(token)
            .await
            .map_err(|e| SessionError::AuthFailure(e.to_string()))?;

        let cancel = CancellationToken::new();
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut live = self.live.write().await;
            let retired = live.replace(LiveSession {
                client: client.clone(),
                cancel: cancel.clone(),
                generation,
            });
            if let Some(old) = retired {
                old.cancel.cancel();
                info!(generation = old.generation, "retired previous chat session");
            }
        }

        info!(generation, account = %client.username(), "chat session started");

        // The retired stream is cancelled, so the watermark can no longer move.
        self.acknowledge(client.as_ref()).await;

        match client.commands().await {
            Ok(commands) => {
                for c in commands {
                    info!(command = %c.command, description = %c.description, "bot command");
                }
            }
            Err(e) => warn!(error = %e, "fetching bot command menu failed"),
        }

        Ok(UpdateStream {
            client,
            cancel,
            generation,
            consumed: self.consumed.clone(),
            poll_timeout: self.poll_timeout,
            pending: VecDeque::new(),
            backoff: INITIAL_BACKOFF,
        })
    }

    /// Close the update stream and drop the session. No-op when idle.
    ///
    /// Returns whether a session was retired.
    pub async fn stop(&self) -> bool {
        let retired = self.live.write().await.take();
        match retired {
            Some(session) => {
                session.cancel.cancel();
                self.acknowledge(session.client.as_ref()).await;
                info!(generation = session.generation, "chat session stopped");
                true
            }
            None => {
                debug!("stop requested with no active chat session");
                false
            }
        }
    }

    /// Drop the session only if it is still the one identified by `generation`.
    ///
    /// Used once a stream ends on its own, so a newer session is never torn down.
    pub async fn release(&self, generation: u64) -> bool {
        let mut live = self.live.write().await;
        if live.as_ref().map(|s| s.generation) != Some(generation) {
            return false;
        }
        if let Some(session) = live.take() {
            session.cancel.cancel();
            info!(generation, "chat session released after stream ended");
        }
        true
    }

    /// Id of the first update no stream has handed out yet (0 if none has).
    pub fn consumed_watermark(&self) -> i64 {
        self.consumed.load(Ordering::SeqCst)
    }

    async fn acknowledge(&self, client: &dyn ChatClient) {
        let next = self.consumed.load(Ordering::SeqCst);
        if next == 0 {
            return;
        }
        match client.acknowledge(next).await {
            Ok(()) => debug!(next_update_id = next, "consumed updates acknowledged"),
            Err(e) => warn!(next_update_id = next, error = %e, "acknowledging consumed updates failed"),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.live.read().await.is_some()
    }

    /// Deliver `text` to `chat_id` through the live session.
    ///
    /// The lock is held only long enough to clone the client handle; in-flight
    /// deliveries complete or fail on their own even if the session stops.
    pub async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), SendError> {
        let client = {
            let live = self.live.read().await;
            live.as_ref().map(|s| s.client.clone())
        };

        let Some(client) = client else {
            warn!(chat_id = chat_id.0, "no active chat session, message not sent");
            return Err(SendError::NoActiveSession);
        };

        client
            .send_text(chat_id, text)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }
}

/// Pull side of a session: yields updates in delivery order until the session
/// is stopped/retired or the transport closes the stream.
pub struct UpdateStream {
    client: Arc<dyn ChatClient>,
    cancel: CancellationToken,
    generation: u64,
    consumed: Arc<AtomicI64>,
    poll_timeout: Duration,
    pending: VecDeque<Update>,
    backoff: Duration,
}

impl UpdateStream {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Client this stream pulls from. It stays usable after the stream is
    /// retired, so replies to updates already pulled are still delivered.
    pub fn client(&self) -> Arc<dyn ChatClient> {
        self.client.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next update, or `None` once the stream is over.
    ///
    /// Buffered updates are discarded on cancellation; the backend has not
    /// seen them acknowledged and hands them to the next session.
    pub async fn next(&mut self) -> Option<Update> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Some(update) = self.pending.pop_front() {
                self.consumed
                    .fetch_max(update.update_id + 1, Ordering::SeqCst);
                return Some(update);
            }

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                res = self.client.poll_updates(self.poll_timeout) => res,
            };

            match polled {
                Ok(batch) => {
                    self.backoff = INITIAL_BACKOFF;
                    self.pending.extend(batch);
                }
                Err(Error::TransportClosed(reason)) => {
                    warn!(generation = self.generation, %reason, "update stream closed by transport");
                    return None;
                }
                Err(e) => {
                    warn!(
                        generation = self.generation,
                        error = %e,
                        retry_in_secs = self.backoff.as_secs(),
                        "polling updates failed"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return None,
                        _ = sleep(self.backoff) => {}
                    }
                    self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}
