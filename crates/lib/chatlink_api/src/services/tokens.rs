//! Picks the configured token store for one request.

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use chatlink_core::session::{AttributeTokenStore, TokenStore};

use super::cookies::{CookiePolicy, CookieTokenStore};
use crate::AppState;
use crate::config::TokenStoreKind;

pub struct RequestTokens {
    kind: TokenStoreKind,
    cookies: CookieTokenStore,
    attributes: Arc<AttributeTokenStore>,
}

impl RequestTokens {
    pub fn new(state: &AppState, jar: CookieJar) -> Self {
        let policy = CookiePolicy {
            secure: state.config.cookie_secure,
            same_site: state.config.cookie_same_site,
        };
        Self {
            kind: state.config.token_store,
            cookies: CookieTokenStore::new(jar, state.service.secrets().clone(), policy),
            attributes: state.attributes.clone(),
        }
    }

    pub fn store(&self) -> &dyn TokenStore {
        match self.kind {
            TokenStoreKind::Cookie => &self.cookies,
            TokenStoreKind::Attribute => self.attributes.as_ref(),
        }
    }

    /// Cookie changes to send back; untouched in attribute mode.
    pub fn into_jar(self) -> CookieJar {
        self.cookies.into_jar()
    }
}
