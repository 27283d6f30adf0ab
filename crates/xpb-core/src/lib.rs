//! Core of the panel remote-control bot.
//!
//! This crate is transport-agnostic. The chat backend, the inbound store, the
//! proxy process and host metrics all live behind ports (traits) implemented in
//! adapter crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod jobs;
pub mod logging;
pub mod messaging;
pub mod notify;
pub mod ports;
pub mod service;
pub mod session;
pub mod status;
pub mod update_loop;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};
