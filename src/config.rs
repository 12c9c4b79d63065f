use std::time::Duration;

use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.tumblr.com/v2";
pub const DEFAULT_REQUEST_TOKEN_URL: &str = "https://www.tumblr.com/oauth/request_token";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.tumblr.com/oauth/authorize";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://www.tumblr.com/oauth/access_token";
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

const DEFAULT_USER_AGENT: &str = concat!("tumblr-oauth1/", env!("CARGO_PKG_VERSION"));

/// Provider endpoints used by the three-legged handshake.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub request_token_url: Url,
    pub authorize_url: Url,
    pub access_token_url: Url,
}

impl OAuthEndpoints {
    /// Endpoints rooted at another host, `{root}/oauth/{request_token,authorize,access_token}`.
    pub fn with_root(root: &str) -> Result<Self, url::ParseError> {
        let root = root.trim_end_matches('/');
        Ok(OAuthEndpoints {
            request_token_url: Url::parse(&format!("{}/oauth/request_token", root))?,
            authorize_url: Url::parse(&format!("{}/oauth/authorize", root))?,
            access_token_url: Url::parse(&format!("{}/oauth/access_token", root))?,
        })
    }
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        OAuthEndpoints {
            request_token_url: Url::parse(DEFAULT_REQUEST_TOKEN_URL).unwrap(),
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL).unwrap(),
            access_token_url: Url::parse(DEFAULT_ACCESS_TOKEN_URL).unwrap(),
        }
    }
}

/// Client configuration. Start from [`Config::default`] and override with the
/// `with_*` methods.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub endpoints: OAuthEndpoints,
    pub user_agent: String,
    pub request_timeout: Option<Duration>,
    pub callback_timeout: Duration,
    pub open_browser: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
            endpoints: OAuthEndpoints::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: None,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            open_browser: true,
        }
    }
}

impl Config {
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, url::ParseError> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// `{base_url}{path}`; `path` is appended verbatim, query string included.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        ))
    }
}
