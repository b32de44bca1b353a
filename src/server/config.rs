use std::net::SocketAddr;

pub(crate) const LOGIN_HTML: &str = include_str!("html/login.html");
pub(crate) const LOGGED_IN_HTML: &str = include_str!("html/logged_in.html");
pub(crate) const ERROR_HTML: &str = include_str!("html/error.html");

const DEFAULT_BASE_PATH: &str = "/oauth2";
const DEFAULT_COOKIE_NAME: &str = "wiki_oauth2_session";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub base_path: String,
    pub cookie_name: String,
    pub secure_cookie: bool,
}

impl ServerConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            base_path: DEFAULT_BASE_PATH.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secure_cookie: true,
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = normalize_path(base_path.into());
        self
    }

    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    pub fn with_secure_cookie(mut self, secure_cookie: bool) -> Self {
        self.secure_cookie = secure_cookie;
        self
    }

    pub fn action_path(&self, action: &str) -> String {
        format!("{}/{action}", self.base_path.trim_end_matches('/'))
    }
}

fn normalize_path(path: String) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::ServerConfig;

    #[test]
    fn server_config_normalizes_base_path() {
        let config = ServerConfig::new(([127, 0, 0, 1], 8080).into()).with_base_path("login/");
        assert_eq!(config.base_path, "/login");
        assert_eq!(config.action_path("redirect"), "/login/redirect");
    }
}
