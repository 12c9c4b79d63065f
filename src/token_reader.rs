use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use url::form_urlencoded;

use crate::{
    AuthError, AuthResult, Token, TokenReaderError, TokenReaderResult, OAUTH_TOKEN_KEY,
};

const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";

/// Represents response of token acquisition.
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    pub oauth_token_secret: String,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl TokenResponse {
    pub fn token(&self) -> Token {
        Token::new(self.oauth_token.as_str(), self.oauth_token_secret.as_str())
    }
}

/// Add parse_oauth_token feature to reqwest::Response.
// this trait is sealed
#[async_trait]
pub trait TokenReader: private::Sealed {
    async fn parse_oauth_token(self) -> AuthResult<TokenResponse>;
}

#[async_trait]
impl TokenReader for Response {
    async fn parse_oauth_token(self) -> AuthResult<TokenResponse> {
        let status = self.status();
        let text = match self.text().await {
            Ok(text) => text,
            Err(err) => {
                return Err(AuthError::Rejected {
                    status,
                    body: err.to_string(),
                })
            }
        };
        if !status.is_success() {
            return Err(AuthError::Rejected { status, body: text });
        }
        Ok(read_oauth_token(text)?)
    }
}

fn read_oauth_token(text: String) -> TokenReaderResult<TokenResponse> {
    let mut destructured = form_urlencoded::parse(text.trim().as_bytes())
        .into_owned()
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured.remove(OAUTH_TOKEN_KEY);
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (oauth_token, oauth_token_secret) {
        (Some(t), Some(s)) => Ok(TokenResponse {
            oauth_token: t,
            oauth_token_secret: s,
            remain: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text)),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
    }
}

mod private {
    use reqwest::Response;

    pub trait Sealed {}
    impl Sealed for Response {}
}
