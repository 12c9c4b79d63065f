use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{Error, Result};

/// Raw status and body of an API response.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn new<T: Into<String>>(status: StatusCode, body: T) -> Self {
        ResponseEnvelope {
            status,
            body: body.into(),
        }
    }

    pub(crate) async fn read(response: Response) -> reqwest::Result<Self> {
        let status = response.status();
        let body = response.text().await?;
        Ok(ResponseEnvelope { status, body })
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Meta {
    pub status: u16,
    pub msg: String,
}

/// The `{meta, response}` wrapper every API answer shares.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseWrapper {
    pub meta: Meta,
    #[serde(default)]
    pub response: Value,
}

impl ResponseWrapper {
    pub fn response(&self) -> &Value {
        &self.response
    }

    pub fn into_response(self) -> Value {
        self.response
    }

    /// Decode the payload into a model type.
    pub fn response_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.response)
    }
}

/// Unwrap an API response.
///
/// 200 and 201 are decoded; a body that is not a valid envelope yields
/// `Ok(None)` rather than an error. Any other status is an [`Error::Api`].
pub fn unwrap(envelope: ResponseEnvelope) -> Result<Option<ResponseWrapper>> {
    match envelope.status {
        StatusCode::OK | StatusCode::CREATED => {
            match serde_json::from_str::<ResponseWrapper>(&envelope.body) {
                Ok(wrapper) => Ok(Some(wrapper)),
                Err(err) => {
                    warn!(status = %envelope.status, error = %err, "discarding undecodable response body");
                    Ok(None)
                }
            }
        }
        status => Err(Error::Api {
            status,
            body: envelope.body,
        }),
    }
}
