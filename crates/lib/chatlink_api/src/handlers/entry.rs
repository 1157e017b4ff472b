//! Embeddable chat pages: `GET /?chat` and `GET /?chat-direct=<contact id>`.

use std::collections::HashMap;

use axum::extract::{Extension, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use chatlink_core::service::ChatPage;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::services::tokens::RequestTokens;

const CHAT_TEMPLATE: &str = include_str!("../../templates/chat.html");

/// Body of the direct-chat entry when the contact cannot be reached.
pub const USER_NOT_FOUND: &str = "User not found";

/// Fill the chat page template. `links` is trusted host markup.
pub fn render_chat(page: &ChatPage, links: &str) -> String {
    CHAT_TEMPLATE
        .replace("{{TOKEN}}", &htmlescape::encode_attribute(&page.token))
        .replace("{{URL}}", &htmlescape::encode_attribute(&page.url))
        .replace("{{IntegratorLinks}}", links)
}

/// `GET /` serves the entry named by the query string.
pub async fn entry_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(params): Query<HashMap<String, String>>,
    jar: CookieJar,
) -> AppResult<Response> {
    let tokens = RequestTokens::new(&state, jar);

    if let Some(contact_id) = params.get("chat-direct") {
        let page = match state.service.direct_chat_login(&user, contact_id).await {
            Some(login) => state
                .service
                .chat_page(&user, tokens.store(), &format!("direct/{login}?layout=embedded"))
                .await
                .ok(),
            None => None,
        };
        return Ok(match page {
            Some(page) => (tokens.into_jar(), Html(render_chat(&page, ""))).into_response(),
            None => {
                debug!(contact_id = %contact_id, "direct chat target not found");
                USER_NOT_FOUND.into_response()
            }
        });
    }

    if params.contains_key("chat") {
        let page = state.service.chat_page(&user, tokens.store(), "").await?;
        let html = render_chat(&page, &state.config.integrator_links);
        return Ok((tokens.into_jar(), Html(html)).into_response());
    }

    Err(AppError::NotFound("Unknown entry".into()))
}
