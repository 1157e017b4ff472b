//! # chatlink_core
//!
//! Core domain logic for Chatlink: provisioning chat-backend accounts that
//! mirror host users, minting their session tokens, and keeping the module
//! settings in sync with the chat backend.

pub mod backend;
pub mod bootstrap;
pub mod crypto;
pub mod host;
pub mod language;
pub mod reconcile;
pub mod redact;
pub mod service;
pub mod session;
pub mod settings;
pub mod username;

#[cfg(test)]
mod test_support;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
