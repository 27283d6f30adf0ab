//! Bot façade used by the rest of the panel: start, stop, notify.

use std::sync::Arc;

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    commands::CommandRouter,
    notify::Notifier,
    ports::SettingsSource,
    session::{SessionError, SessionManager},
    update_loop::UpdateLoop,
};

struct LoopTask {
    generation: u64,
    handle: JoinHandle<usize>,
}

/// Owns the session manager and the update-loop task.
///
/// `start_run` may be called again (e.g. after the token changed); the running
/// loop ends when its session is retired and a new loop takes over.
pub struct BotService {
    settings: Arc<dyn SettingsSource>,
    session: Arc<SessionManager>,
    update_loop: Arc<UpdateLoop>,
    notifier: Notifier,
    /// Loop of the newest session. Held across start and spawn so concurrent
    /// `start_run` calls record their tasks in session order.
    loop_task: Mutex<Option<LoopTask>>,
}

impl BotService {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        session: Arc<SessionManager>,
        router: Arc<CommandRouter>,
    ) -> Self {
        Self {
            notifier: Notifier::new(settings.clone(), session.clone()),
            update_loop: Arc::new(UpdateLoop::new(router)),
            settings,
            session,
            loop_task: Mutex::new(None),
        }
    }

    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Read the token, start a session and spawn its update loop.
    pub async fn start_run(&self) -> Result<(), SessionError> {
        info!("telegram service ready to run");

        let token = match self.settings.bot_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "reading bot token failed");
                String::new()
            }
        };

        let mut loop_task = self.loop_task.lock().await;
        let stream = match self.session.start(&token).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "telegram service start failed");
                return Err(e);
            }
        };

        let generation = stream.generation();
        let update_loop = self.update_loop.clone();
        let session = self.session.clone();
        let handle = tokio::spawn(async move {
            let handled = update_loop.run(stream).await;
            // The stream may also end on its own; drop the dead session then.
            session.release(generation).await;
            handled
        });

        // A previous loop was cancelled by the session swap; it finishes its
        // in-flight reply and exits on its own.
        *loop_task = Some(LoopTask { generation, handle });
        Ok(())
    }

    /// Stop the session and wait for the update loop to exit. Safe to repeat.
    pub async fn stop_run_and_close(&self) {
        self.session.stop().await;

        let task = self.loop_task.lock().await.take();
        if let Some(LoopTask { generation, handle }) = task {
            match handle.await {
                Ok(handled) => info!(generation, handled, "telegram service stopped"),
                Err(e) => warn!(error = %e, "update loop task failed"),
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session.is_active().await
    }

    pub async fn notify(&self, text: &str) -> bool {
        self.notifier.notify(text).await
    }
}
