//! The long-running consumer of a session's update stream.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    commands::CommandRouter,
    messaging::{port::ChatClient, types::Update},
    session::UpdateStream,
};

/// Pulls updates one at a time, dispatches commands and sends the replies.
///
/// Handling is strictly sequential: a command's reply is sent before the next
/// update is pulled, so a slow collaborator delays every later reply.
/// Replies go out through the client of the stream the update came from, so a
/// command still in flight when the session stops gets its answer delivered.
pub struct UpdateLoop {
    router: Arc<CommandRouter>,
}

impl UpdateLoop {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }

    /// Run until the stream ends (session stopped, retired or closed by the
    /// transport). Returns the number of commands handled.
    pub async fn run(&self, mut stream: UpdateStream) -> usize {
        let generation = stream.generation();
        let client = stream.client();
        info!(generation, "update loop polling");

        let mut handled = 0usize;
        while let Some(update) = stream.next().await {
            if self.handle(client.as_ref(), update).await {
                handled += 1;
            }
        }

        info!(generation, handled, "update loop stopped");
        handled
    }

    /// Returns whether the update carried a command.
    async fn handle(&self, client: &dyn ChatClient, update: Update) -> bool {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "ignoring update without message");
            return false;
        };
        let Some(call) = message.command() else {
            return false;
        };

        debug!(chat_id = message.chat_id.0, command = %call.name, "dispatching command");
        let reply = self.router.dispatch(&call.name, &call.args).await;

        if let Err(e) = client.send_text(message.chat_id, &reply).await {
            warn!(
                chat_id = message.chat_id.0,
                command = %call.name,
                error = %e,
                "failed to send command reply"
            );
        }
        true
    }
}
