//! Request handlers.

pub mod entry;
pub mod health;
pub mod hooks;
pub mod rpc;
