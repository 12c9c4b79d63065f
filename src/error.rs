use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type AuthResult<T> = std::result::Result<T, AuthError>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("authorization failed : {0}")]
    Auth(#[from] AuthError),
    #[error("API responded with status {status} : {body}")]
    Api { status: StatusCode, body: String },
    #[error("multipart encoding failed : {0}")]
    Encoding(#[from] EncodingError),
    #[error("request failed : {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid request url : {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// HTTP status carried by an API or token endpoint failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            Error::Transport(err) => err.status(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("consumer credentials are not configured")]
    NotConfigured,
    #[error("no request token, begin the authorization first")]
    NoRequestToken,
    #[error("token endpoint rejected the request with status {status} : {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("callback request did not carry oauth_verifier")]
    MissingVerifier,
    #[error("timed out waiting for the authorization callback")]
    CallbackTimeout,
    #[error("failed to launch system browser : {0}")]
    BrowserLaunch(String),
    #[error("callback listener I/O failed : {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("file {path} could not be read : {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
}
