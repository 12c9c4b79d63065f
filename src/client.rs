use http::header::LOCATION;
use reqwest::{redirect, Client as ReqwestClient, RequestBuilder as ReqwestRequestBuilder};
use reqwest::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use crate::response::{self, ResponseEnvelope, ResponseWrapper};
use crate::{
    multipart, AuthResult, BodyMap, Config, Error, OAuthParameters, OAuthSession,
    OutgoingRequest, QueryParams, Result, SessionState, Signer, Token,
};

/// Transport options for a single call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SendOptions {
    pub follow_redirects: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        SendOptions {
            follow_redirects: true,
        }
    }
}

/// Builds, signs and sends API requests, and unwraps their responses.
///
/// Calls take `&self` and only read the session's credentials, so an
/// authorized `Client` can be shared across tasks. The handshake methods take
/// `&mut self`.
#[derive(Debug)]
pub struct Client {
    http: ReqwestClient,
    http_no_redirect: ReqwestClient,
    config: Config,
    parameters: OAuthParameters<'static>,
    session: OAuthSession,
}

impl Client {
    /// Constructs a new, unconfigured `Client`.
    pub fn new(config: Config) -> Result<Self> {
        let http = http_client(&config, redirect::Policy::default())?;
        let http_no_redirect = http_client(&config, redirect::Policy::none())?;
        let session = OAuthSession::new(http.clone(), &config);
        Ok(Client {
            http,
            http_no_redirect,
            config,
            parameters: OAuthParameters::new().version(true),
            session,
        })
    }

    /// Constructs a `Client` with the default configuration and the given
    /// consumer credentials, calling back to a loopback listener.
    pub fn with_consumer<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Result<Self>
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        let mut client = Client::new(Config::default())?;
        client.configure(consumer_key, consumer_secret, None)?;
        Ok(client)
    }

    /// Replace the OAuth parameter template used to sign API calls.
    ///
    /// Pinning nonce and timestamp here makes signatures reproducible.
    pub fn oauth_parameters(mut self, parameters: OAuthParameters<'static>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &OAuthSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut OAuthSession {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    // ------------------------------------------------------------------------
    // Authorization, delegated to the session

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
        self.session
            .configure(consumer_key, consumer_secret, callback)
    }

    pub fn set_token<TKey, TSecret>(&mut self, key: TKey, secret: TSecret)
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        self.session.set_token(key, secret)
    }

    pub async fn begin_authorization(&mut self) -> Result<(Token, Url)> {
        self.session.begin_authorization().await
    }

    pub async fn complete_authorization(&mut self, verifier: &str) -> Result<()> {
        self.session.complete_authorization(verifier).await
    }

    pub async fn auto_authenticate(&mut self) -> bool {
        self.session.auto_authenticate().await
    }

    // ------------------------------------------------------------------------
    // API calls

    /// `GET {base_url}{path}?query`.
    #[instrument(skip(self, query))]
    pub async fn get(&self, path: &str, query: &QueryParams) -> Result<Option<ResponseWrapper>> {
        let mut request = OutgoingRequest::get(self.config.endpoint(path)?, query);
        self.sign(&mut request)?;
        let response = self
            .send(request.build(self.transport(SendOptions::default())))
            .await?;
        response::unwrap(response)
    }

    /// `POST {base_url}{path}` with a form-encoded body; file entries are dropped.
    #[instrument(skip(self, body))]
    pub async fn post(&self, path: &str, body: &BodyMap) -> Result<Option<ResponseWrapper>> {
        let mut request = OutgoingRequest::post(self.config.endpoint(path)?, body);
        self.sign(&mut request)?;
        let response = self
            .send(request.build(self.transport(SendOptions::default())))
            .await?;
        response::unwrap(response)
    }

    /// `POST {base_url}{path}` as `multipart/form-data`, uploading file entries.
    #[instrument(skip(self, body))]
    pub async fn post_multipart(
        &self,
        path: &str,
        body: &BodyMap,
    ) -> Result<Option<ResponseWrapper>> {
        let mut request = OutgoingRequest::post(self.config.endpoint(path)?, body);
        self.sign(&mut request)?;
        let multipart = multipart::convert(request, body).await?;
        let builder = multipart.build(self.transport(SendOptions::default()))?;
        let response = self.send(builder).await?;
        response::unwrap(response)
    }

    /// Signed `GET` that must answer `301`; returns its `Location`.
    ///
    /// Only this call runs with redirect following disabled.
    #[instrument(skip(self))]
    pub async fn get_redirect_url(&self, path: &str) -> Result<String> {
        let mut request = OutgoingRequest::get(self.config.endpoint(path)?, &QueryParams::new());
        self.sign(&mut request)?;
        let options = SendOptions {
            follow_redirects: false,
        };
        let response = request.build(self.transport(options)).send().await?;

        let status = response.status();
        if status == StatusCode::MOVED_PERMANENTLY {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                return Ok(location.to_string());
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api { status, body })
    }

    // ------------------------------------------------------------------------
    // Internals

    /// Sign with the current access token; without one the request stays
    /// anonymous.
    fn sign(&self, request: &mut OutgoingRequest) -> Result<()> {
        if let Some(secrets) = self.session.secrets()? {
            request.sign(&Signer::new(&secrets, &self.parameters));
        }
        Ok(())
    }

    fn transport(&self, options: SendOptions) -> &ReqwestClient {
        if options.follow_redirects {
            &self.http
        } else {
            &self.http_no_redirect
        }
    }

    async fn send(&self, builder: ReqwestRequestBuilder) -> Result<ResponseEnvelope> {
        let response = builder.send().await?;
        debug!(status = %response.status(), url = %response.url(), "response received");
        Ok(ResponseEnvelope::read(response).await?)
    }
}

fn http_client(config: &Config, policy: redirect::Policy) -> reqwest::Result<ReqwestClient> {
    let mut builder = ReqwestClient::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(policy);
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_is_unconfigured() {
        let client = Client::new(Config::default()).unwrap();
        assert_eq!(client.state(), SessionState::Unconfigured);
    }

    #[test]
    fn with_consumer_configures_session() {
        let client = Client::with_consumer("ck", "cs").unwrap();
        assert_eq!(client.state(), SessionState::Configured);
        assert_eq!(client.session().consumer().unwrap().key(), "ck");
    }

    #[test]
    fn anonymous_requests_stay_unsigned() {
        let client = Client::new(Config::default()).unwrap();
        let mut request = OutgoingRequest::get(
            client.config().endpoint("/tagged?tag=cats").unwrap(),
            &QueryParams::new(),
        );
        client.sign(&mut request).unwrap();
        assert!(!request.is_signed());
    }

    #[test]
    fn token_without_consumer_cannot_sign() {
        let mut client = Client::new(Config::default()).unwrap();
        client.set_token("tk", "ts");
        let mut request =
            OutgoingRequest::get(client.config().endpoint("/user/info").unwrap(), &QueryParams::new());
        assert!(client.sign(&mut request).is_err());
    }

    #[test]
    fn transport_selection() {
        let client = Client::new(Config::default()).unwrap();
        let following = client.transport(SendOptions::default()) as *const ReqwestClient;
        let direct = client.transport(SendOptions {
            follow_redirects: false,
        }) as *const ReqwestClient;
        assert_eq!(following, &client.http as *const ReqwestClient);
        assert_eq!(direct, &client.http_no_redirect as *const ReqwestClient);
    }
}
