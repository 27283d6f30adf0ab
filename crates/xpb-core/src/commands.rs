//! Command routing: a fixed table from command name to handler.

use std::{collections::HashMap, sync::Arc};

use tracing::{info, warn};

use crate::{
    ports::{InboundService, ProxyController},
    status::StatusReporter,
};

pub const INVALID_PORT_TEXT: &str = "🔴 Invalid inbound port, please check it";

pub const START_TEXT: &str = "\
😁 Hi!
💖 Welcome to the panel bot. Send /help to see what I can do.";

pub const BUY_TEXT: &str = "This project is available for purchase: t.me/zahed3turkir";

pub const AUTHOR_TEXT: &str = "\
👦🏻 Author   : zahed3turk
📞 Telegram: @zahed3turkir
📧 Email   : zahed3turk@gmail.com";

pub const HELP_TEXT: &str = "\
⭐ Available commands ⭐

| /help
|-🆘 Show this help
|
| /start
|-😁 Show the welcome message
|
| /delete [PORT]
|-♻ Delete the inbound on PORT
|
| /restart
|-🔁 Restart the Xray service
|
| /status
|-✔ Show current system status
|
| /enable [PORT]
|-🧩 Enable the inbound on PORT
|
| /disable [PORT]
|-🚫 Disable the inbound on PORT
|
| /clear [PORT]
|-🧹 Reset traffic of the inbound on PORT
|
| /clearall
|-🆕 Reset traffic of all inbounds, counting from 0
|
| /buy
|-✍🏻 Buy this project
|
| /author
|-👦🏻 Show author information";

/// Inbound operations addressed by port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortAction {
    Delete,
    Disable,
    Enable,
    Clear,
}

impl PortAction {
    fn verb(self) -> &'static str {
        match self {
            PortAction::Delete => "deleted",
            PortAction::Disable => "disabled",
            PortAction::Enable => "enabled",
            PortAction::Clear => "reset",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            PortAction::Delete => "Deleting",
            PortAction::Disable => "Disabling",
            PortAction::Enable => "Enabling",
            PortAction::Clear => "Resetting traffic of",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    Port(PortAction),
    Restart,
    ClearAll,
    Status,
    Static(&'static str),
}

/// Maps command names to handlers; every dispatch yields non-empty reply text.
pub struct CommandRouter {
    handlers: HashMap<&'static str, Handler>,
    inbounds: Arc<dyn InboundService>,
    proxy: Arc<dyn ProxyController>,
    status: Arc<StatusReporter>,
}

impl CommandRouter {
    pub fn new(
        inbounds: Arc<dyn InboundService>,
        proxy: Arc<dyn ProxyController>,
        status: Arc<StatusReporter>,
    ) -> Self {
        let handlers = HashMap::from([
            ("delete", Handler::Port(PortAction::Delete)),
            ("disable", Handler::Port(PortAction::Disable)),
            ("enable", Handler::Port(PortAction::Enable)),
            ("clear", Handler::Port(PortAction::Clear)),
            ("restart", Handler::Restart),
            ("clearall", Handler::ClearAll),
            ("status", Handler::Status),
            ("buy", Handler::Static(BUY_TEXT)),
            ("start", Handler::Static(START_TEXT)),
            ("author", Handler::Static(AUTHOR_TEXT)),
        ]);

        Self {
            handlers,
            inbounds,
            proxy,
            status,
        }
    }

    /// Handler registered for `command`, if any. Unregistered names get help text.
    pub fn handler(&self, command: &str) -> Option<Handler> {
        self.handlers.get(command).copied()
    }

    pub async fn dispatch(&self, command: &str, args: &str) -> String {
        let Some(handler) = self.handler(command) else {
            return HELP_TEXT.to_string();
        };

        match handler {
            Handler::Port(action) => self.run_port_action(action, args).await,
            Handler::Restart => self.restart().await,
            Handler::ClearAll => self.clear_all().await,
            Handler::Status => self.status().await,
            Handler::Static(text) => text.to_string(),
        }
    }

    async fn run_port_action(&self, action: PortAction, args: &str) -> String {
        let Some(port) = parse_port(args) else {
            return INVALID_PORT_TEXT.to_string();
        };

        let res = match action {
            PortAction::Delete => self.inbounds.delete_by_port(port).await,
            PortAction::Disable => self.inbounds.disable_by_port(port).await,
            PortAction::Enable => self.inbounds.enable_by_port(port).await,
            PortAction::Clear => self.inbounds.clear_traffic_by_port(port).await,
        };

        match res {
            Ok(()) => {
                info!(port, ?action, "inbound updated from chat");
                format!("✅ Inbound on port {port} {} successfully", action.verb())
            }
            Err(e) => {
                warn!(port, ?action, error = %e, "inbound command failed");
                format!(
                    "⚠ {} the inbound on port {port} failed, err: {e}",
                    action.noun()
                )
            }
        }
    }

    async fn restart(&self) -> String {
        match self.proxy.restart().await {
            Ok(()) => "✅ Xray service restarted successfully".to_string(),
            Err(e) => {
                warn!(error = %e, "xray restart from chat failed");
                format!("⚠ Restarting the Xray service failed, err: {e}")
            }
        }
    }

    async fn clear_all(&self) -> String {
        match self.inbounds.clear_all_traffic().await {
            Ok(()) => "✅ Traffic of all inbounds was reset successfully".to_string(),
            Err(e) => format!("⚠ Resetting traffic of all inbounds failed, err: {e}"),
        }
    }

    async fn status(&self) -> String {
        match self.status.build().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "status report aborted");
                format!("⚠ Building the status report failed, err: {e}")
            }
        }
    }
}

fn parse_port(args: &str) -> Option<u16> {
    args.trim().parse::<u16>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{inbound, FakeInbounds, FakeProbe, FakeProxy};
    use std::sync::atomic::Ordering;

    struct Fixture {
        router: CommandRouter,
        inbounds: Arc<FakeInbounds>,
        proxy: Arc<FakeProxy>,
        probe: Arc<FakeProbe>,
    }

    fn fixture(inbounds: Vec<crate::domain::Inbound>) -> Fixture {
        let inbounds = Arc::new(FakeInbounds::with(inbounds));
        let proxy = Arc::new(FakeProxy::default());
        let probe = Arc::new(FakeProbe::default());
        let status = Arc::new(StatusReporter::new(
            probe.clone(),
            proxy.clone(),
            inbounds.clone(),
        ));
        Fixture {
            router: CommandRouter::new(inbounds.clone(), proxy.clone(), status),
            inbounds,
            proxy,
            probe,
        }
    }

    #[test]
    fn port_parsing_rejects_non_ports() {
        assert_eq!(parse_port(" 8080 "), Some(8080));
        assert_eq!(parse_port(""), None);
        assert_eq!(parse_port("abc"), None);
        assert_eq!(parse_port("-1"), None);
        assert_eq!(parse_port("70000"), None);
        assert_eq!(parse_port("80 81"), None);
    }

    #[tokio::test]
    async fn invalid_port_makes_no_collaborator_call() {
        let f = fixture(vec![inbound("a", 8080, 10, 10, 0)]);
        for cmd in ["delete", "disable", "enable", "clear"] {
            for arg in ["", "abc", "80a", "1.5", "-3"] {
                assert_eq!(f.router.dispatch(cmd, arg).await, INVALID_PORT_TEXT);
            }
        }
        assert_eq!(f.inbounds.calls(), 0);
    }

    #[tokio::test]
    async fn clear_resets_traffic_of_one_inbound() {
        let f = fixture(vec![
            inbound("a", 8080, 500, 700, 0),
            inbound("b", 9090, 5, 5, 0),
        ]);

        let reply = f.router.dispatch("clear", "8080").await;
        assert!(reply.starts_with('✅'), "{reply}");
        assert!(reply.contains("8080"));

        let after = f.inbounds.snapshot();
        assert_eq!((after[0].up, after[0].down), (0, 0));
        assert_eq!((after[1].up, after[1].down), (5, 5));
    }

    #[tokio::test]
    async fn delete_of_unknown_port_reports_failure_and_keeps_inbounds() {
        let f = fixture(vec![inbound("a", 8080, 0, 0, 0)]);
        let before = f.inbounds.snapshot();

        let reply = f.router.dispatch("delete", "9999").await;
        assert!(reply.starts_with('⚠'), "{reply}");
        assert!(reply.contains("9999"));
        assert!(reply.contains("no inbound on port 9999"));
        assert_eq!(f.inbounds.snapshot(), before);
    }

    #[tokio::test]
    async fn enable_and_disable_toggle_inbound() {
        let f = fixture(vec![inbound("a", 8080, 0, 0, 0)]);

        let reply = f.router.dispatch("disable", "8080").await;
        assert!(reply.contains("disabled"), "{reply}");
        assert!(!f.inbounds.snapshot()[0].enable);

        let reply = f.router.dispatch("enable", "8080").await;
        assert!(reply.contains("enabled"), "{reply}");
        assert!(f.inbounds.snapshot()[0].enable);
    }

    #[tokio::test]
    async fn clearall_is_idempotent() {
        let f = fixture(vec![inbound("a", 1, 10, 20, 0), inbound("b", 2, 30, 40, 0)]);

        let first = f.router.dispatch("clearall", "").await;
        let second = f.router.dispatch("clearall", "").await;
        assert_eq!(first, second);
        assert!(first.starts_with('✅'));
        assert!(f.inbounds.snapshot().iter().all(|ib| ib.total() == 0));
    }

    #[tokio::test]
    async fn restart_reports_collaborator_outcome() {
        let f = fixture(vec![]);
        assert!(f.router.dispatch("restart", "").await.starts_with('✅'));

        f.proxy.fail_restart(true);
        let reply = f.router.dispatch("restart", "").await;
        assert!(reply.contains("xray exited with status 1"), "{reply}");
        assert_eq!(f.proxy.restarts(), 2);
    }

    #[tokio::test]
    async fn unknown_commands_get_identical_help() {
        let f = fixture(vec![]);
        assert_eq!(f.router.dispatch("xyz", "").await, HELP_TEXT);
        assert_eq!(f.router.dispatch("help", "").await, HELP_TEXT);
        assert_eq!(f.router.dispatch("xyz", "with some args 123").await, HELP_TEXT);
    }

    #[tokio::test]
    async fn static_commands_reply_with_fixed_text() {
        let f = fixture(vec![]);
        assert_eq!(f.router.dispatch("buy", "").await, BUY_TEXT);
        assert_eq!(f.router.dispatch("start", "").await, START_TEXT);
        assert_eq!(f.router.dispatch("author", "ignored").await, AUTHOR_TEXT);
    }

    #[tokio::test]
    async fn status_replies_even_when_hostname_fails() {
        let f = fixture(vec![]);
        assert!(f.router.dispatch("status", "").await.contains("Hostname: edge-1"));

        f.probe.fail_hostname.store(true, Ordering::SeqCst);
        let reply = f.router.dispatch("status", "").await;
        assert!(reply.starts_with('⚠'), "{reply}");
    }

    #[test]
    fn help_lists_every_registered_command() {
        let f = fixture(Vec::new());
        let listed: Vec<&str> = HELP_TEXT
            .lines()
            .filter_map(|l| l.strip_prefix("| /"))
            .filter_map(|l| l.split_whitespace().next())
            .collect();

        for name in f.router.handlers.keys() {
            assert!(listed.contains(name), "help is missing /{name}");
        }
        assert!(listed.contains(&"help"));
    }
}
