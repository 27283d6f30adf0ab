//! Single-host panel collaborators: inbound store, Xray process control and
//! host metrics.

pub mod host;
pub mod inbounds;
pub mod xray;

pub use host::HostProbe;
pub use inbounds::JsonInboundStore;
pub use xray::XrayController;
