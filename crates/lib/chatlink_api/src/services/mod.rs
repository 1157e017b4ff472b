//! Request-scoped services used by the handlers.

pub mod cookies;
pub mod tokens;
