//! Session material: the cached admin session, per-backend connections and
//! end-user token storage.

pub mod admin;
pub mod connection;
pub mod token_store;

use std::future::Future;

use thiserror::Error;
use tracing::debug;

use crate::backend::BackendError;

pub use admin::{AdminPassword, AdminScope, AdminSession, AdminSessionCache};
pub use connection::Connection;
pub use token_store::{AttributeTokenStore, StoredToken, TokenStore};

/// Why a single strategy attempt did not succeed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("strategy not applicable")]
    Skipped,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Try `strategies` in order and return the first success with the strategy
/// that produced it.
pub async fn first_success<S, T, F, Fut>(strategies: &[S], mut attempt: F) -> Option<(S, T)>
where
    S: Copy + std::fmt::Debug,
    F: FnMut(S) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    for &strategy in strategies {
        match attempt(strategy).await {
            Ok(value) => return Some((strategy, value)),
            Err(e) => debug!(?strategy, error = %e, "strategy failed"),
        }
    }
    None
}
