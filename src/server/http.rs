use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{CallbackParams, LoginError, LoginService};

use super::config::{ERROR_HTML, LOGGED_IN_HTML, LOGIN_HTML, ServerConfig};

#[derive(Clone)]
pub(super) struct LoginState {
    pub(super) service: Arc<LoginService>,
    pub(super) config: Arc<ServerConfig>,
}

impl LoginState {
    fn session_id(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.config.cookie_name)
            .map(|cookie| cookie.value().to_string())
    }

    fn session_cookie(&self, session_id: String) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), session_id))
            .path("/")
            .http_only(true)
            .secure(self.config.secure_cookie)
            .same_site(SameSite::Lax)
            .build()
    }
}

pub(super) async fn default_handler(
    State(state): State<LoginState>,
    jar: CookieJar,
) -> impl IntoResponse {
    let session_id = state.session_id(&jar);
    match state.service.current_user(session_id.as_deref()).await {
        Some(_) => Html(LOGGED_IN_HTML.to_string()),
        None => {
            let redirect_url = state.config.action_path("redirect");
            let redirect_url = html_escape::encode_double_quoted_attribute(&redirect_url);
            Html(LOGIN_HTML.replace("{{redirect_url}}", &redirect_url))
        }
    }
}

pub(super) async fn action_handler(
    State(state): State<LoginState>,
    Path(action): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    match action.as_str() {
        "redirect" => redirect(state, jar).await,
        "callback" => callback(state, jar, params).await,
        _ => fallback_handler().await.into_response(),
    }
}

pub(super) async fn fallback_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(error_page("Page not found.")))
}

async fn redirect(state: LoginState, jar: CookieJar) -> Response {
    let session_id = state.session_id(&jar);
    match state.service.begin(session_id.as_deref()).await {
        Ok(start) => {
            let jar = jar.add(state.session_cookie(start.session_id));
            (
                StatusCode::FOUND,
                jar,
                [(header::LOCATION, start.authorization_url)],
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn callback(state: LoginState, jar: CookieJar, params: CallbackParams) -> Response {
    let session_id = state.session_id(&jar);
    match state.service.complete(session_id.as_deref(), params).await {
        Ok(done) => {
            let jar = jar.add(state.session_cookie(done.session_id));
            (
                StatusCode::FOUND,
                jar,
                [(header::LOCATION, done.redirect_to)],
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &LoginError) -> Response {
    let (status, message) = match err {
        LoginError::InvalidCallback(_) => (StatusCode::BAD_REQUEST, "Invalid callback."),
        LoginError::InvalidProfile(_) => (
            StatusCode::BAD_REQUEST,
            "The identity provider returned an incomplete profile.",
        ),
        LoginError::AccountCreationExhausted { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unable to create new user account, please contact the wiki administrator.",
        ),
        LoginError::Provider(_) => (
            StatusCode::BAD_GATEWAY,
            "The identity provider could not be reached.",
        ),
        LoginError::Persistence(_) | LoginError::Configuration(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Login is currently unavailable.",
        ),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "login failed");
    } else {
        tracing::warn!(error = %err, "login rejected");
    }
    (status, Html(error_page(message))).into_response()
}

fn error_page(message: &str) -> String {
    ERROR_HTML.replace("{{message}}", &html_escape::encode_text(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_escapes_message() {
        let page = error_page(r#"<script>alert("x")</script> & more"#);
        assert!(page.contains("&lt;script&gt;alert"));
        assert!(page.contains("&amp; more"));
        assert!(!page.contains("<script>"));
    }
}
