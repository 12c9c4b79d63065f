use std::time::Duration;

use reqwest::Client as ReqwestClient;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    AuthError, AuthResult, BodyMap, CallbackListener, Config, ConsumerCredentials,
    OAuthEndpoints, OAuthParameters, OutgoingRequest, Result, Secrets, Signer, Token,
    TokenReader, OAUTH_TOKEN_KEY,
};

/// Where a session stands in the three-legged handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    Configured,
    RequestTokenObtained,
    Authorized,
}

/// Consumer credentials, the current token and the handshake that produces it.
///
/// One session drives one account. The handshake methods take `&mut self`, so
/// two handshakes can never interleave on the same session.
#[derive(Debug)]
pub struct OAuthSession {
    http: ReqwestClient,
    endpoints: OAuthEndpoints,
    callback_timeout: Duration,
    open_browser: bool,
    consumer: Option<ConsumerCredentials>,
    callback: Option<Url>,
    loopback: Option<Url>,
    request_token: Option<Token>,
    token: Option<Token>,
}

impl OAuthSession {
    pub fn new(http: ReqwestClient, config: &Config) -> Self {
        OAuthSession {
            http,
            endpoints: config.endpoints.clone(),
            callback_timeout: config.callback_timeout,
            open_browser: config.open_browser,
            consumer: None,
            callback: None,
            loopback: None,
            request_token: None,
            token: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.token.is_some() {
            SessionState::Authorized
        } else if self.request_token.is_some() {
            SessionState::RequestTokenObtained
        } else if self.consumer.is_some() {
            SessionState::Configured
        } else {
            SessionState::Unconfigured
        }
    }

    pub fn consumer(&self) -> Option<&ConsumerCredentials> {
        self.consumer.as_ref()
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn request_token(&self) -> Option<&Token> {
        self.request_token.as_ref()
    }

    /// The caller's callback, or else the loopback URI advertised by the last
    /// request token call.
    pub fn callback_uri(&self) -> Option<&Url> {
        self.callback.as_ref().or(self.loopback.as_ref())
    }

    /// Signing material for API calls, `None` when no token is installed.
    pub(crate) fn secrets(&self) -> AuthResult<Option<Secrets<'_>>> {
        match (&self.consumer, &self.token) {
            (_, None) => Ok(None),
            (Some(consumer), Some(token)) => Ok(Some(Secrets::new(consumer).token(token))),
            (None, Some(_)) => Err(AuthError::NotConfigured),
        }
    }

    /// Install consumer credentials and the callback URI.
    ///
    /// Without an explicit callback the provider is sent back to a loopback
    /// address on an OS chosen port. Nothing is bound here: the interactive
    /// flow binds its listener when it starts, and a manual handshake only
    /// advertises a port nobody listens on, so the browser fails fast and the
    /// verifier is read from its address bar.
    pub fn configure<TKey, TSecret>(
        &mut self,
        consumer_key: TKey,
        consumer_secret: TSecret,
        callback: Option<Url>,
    ) -> AuthResult<()>
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        match callback {
            Some(ref uri) => debug!(callback = %uri, "session configured"),
            None => debug!("session configured with loopback callback"),
        }
        self.consumer = Some(ConsumerCredentials::new(consumer_key, consumer_secret));
        self.callback = callback;
        self.loopback = None;
        self.request_token = None;
        Ok(())
    }

    /// Install an access token obtained elsewhere, skipping the handshake.
    pub fn set_token<TKey, TSecret>(&mut self, key: TKey, secret: TSecret)
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        self.token = Some(Token::new(key, secret));
        self.request_token = None;
    }

    /// Obtain a request token and the URL the user must visit to authorize it.
    #[instrument(skip(self))]
    pub async fn begin_authorization(&mut self) -> Result<(Token, Url)> {
        if self.consumer.is_none() {
            return Err(AuthError::NotConfigured.into());
        }
        let callback = match self.callback {
            Some(ref uri) => uri.clone(),
            None => {
                let listener = CallbackListener::bind_loopback().map_err(AuthError::from)?;
                self.loopback = Some(listener.uri().clone());
                listener.uri().clone()
            }
        };
        self.obtain_request_token(&callback).await
    }

    async fn obtain_request_token(&mut self, callback: &Url) -> Result<(Token, Url)> {
        let consumer = self.consumer.as_ref().ok_or(AuthError::NotConfigured)?;
        let params = OAuthParameters::new()
            .version(true)
            .callback(callback.as_str());
        let secrets = Secrets::new(consumer);

        let mut request =
            OutgoingRequest::post(self.endpoints.request_token_url.clone(), &BodyMap::new());
        request.sign(&Signer::new(&secrets, &params));
        let response = request
            .build(&self.http)
            .send()
            .await?
            .parse_oauth_token()
            .await?;

        let request_token = response.token();
        let authorization_url = self.authorization_url_for(&request_token);
        debug!("obtained request token");
        self.request_token = Some(request_token.clone());
        Ok((request_token, authorization_url))
    }

    /// The URL for the pending request token, if a handshake is under way.
    pub fn authorization_url(&self) -> Option<Url> {
        self.request_token
            .as_ref()
            .map(|token| self.authorization_url_for(token))
    }

    fn authorization_url_for(&self, request_token: &Token) -> Url {
        let mut url = self.endpoints.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair(OAUTH_TOKEN_KEY, request_token.key());
        url
    }

    /// Exchange the pending request token and `verifier` for an access token.
    #[instrument(skip(self, verifier))]
    pub async fn complete_authorization(&mut self, verifier: &str) -> Result<()> {
        let consumer = self.consumer.as_ref().ok_or(AuthError::NotConfigured)?;
        let request_token = self
            .request_token
            .as_ref()
            .ok_or(AuthError::NoRequestToken)?;
        let params = OAuthParameters::new().version(true).verifier(verifier);
        let secrets = Secrets::new(consumer).token(request_token);

        let mut request =
            OutgoingRequest::post(self.endpoints.access_token_url.clone(), &BodyMap::new());
        request.sign(&Signer::new(&secrets, &params));
        let response = request
            .build(&self.http)
            .send()
            .await?
            .parse_oauth_token()
            .await?;

        self.token = Some(response.token());
        self.request_token = None;
        debug!("access token installed");
        Ok(())
    }

    /// Run the whole handshake interactively: open the authorization URL in
    /// the system browser and wait for the provider to redirect back to the
    /// loopback listener.
    ///
    /// Every failure (timeout, I/O, provider rejection) is logged and reported
    /// as `false`.
    pub async fn auto_authenticate(&mut self) -> bool {
        match self.try_auto_authenticate().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "interactive authorization failed");
                false
            }
        }
    }

    async fn try_auto_authenticate(&mut self) -> Result<()> {
        if self.consumer.is_none() {
            return Err(AuthError::NotConfigured.into());
        }
        let listener = match self.callback {
            Some(ref uri) => CallbackListener::bind_for(uri).map_err(AuthError::from)?,
            None => {
                let listener = CallbackListener::bind_loopback().map_err(AuthError::from)?;
                self.loopback = Some(listener.uri().clone());
                listener
            }
        };

        let callback = listener.uri().clone();
        let (_, authorization_url) = self.obtain_request_token(&callback).await?;
        if self.open_browser {
            open::that(authorization_url.as_str())
                .map_err(|err| AuthError::BrowserLaunch(err.to_string()))?;
        } else {
            info!(url = %authorization_url, "visit the authorization url to continue");
        }

        let verifier = listener.wait_for_verifier(self.callback_timeout).await?;
        self.complete_authorization(&verifier).await
    }
}
