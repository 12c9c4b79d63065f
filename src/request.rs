use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use http::{header::AUTHORIZATION, Method};
use reqwest::{Client as ReqwestClient, RequestBuilder as ReqwestRequestBuilder};
use url::Url;

use crate::signer::parse_authorization;
use crate::{SecretsProvider, Signer};

/// Query string parameters of a `GET`.
pub type QueryParams = BTreeMap<String, String>;

/// Body parameters of a `POST`; values are either text or a file to upload.
pub type BodyMap = BTreeMap<String, FormValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(PathBuf),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&Path> {
        match self {
            FormValue::Text(_) => None,
            FormValue::File(path) => Some(path),
        }
    }
}

impl From<&str> for FormValue {
    fn from(text: &str) -> Self {
        FormValue::Text(text.to_string())
    }
}

impl From<String> for FormValue {
    fn from(text: String) -> Self {
        FormValue::Text(text)
    }
}

impl From<PathBuf> for FormValue {
    fn from(path: PathBuf) -> Self {
        FormValue::File(path)
    }
}

impl From<&Path> for FormValue {
    fn from(path: &Path) -> Self {
        FormValue::File(path.to_path_buf())
    }
}

/// A request under construction: method, bare URL, its parameters and, once
/// signed, the `Authorization` value computed over them.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    method: Method,
    url: Url,
    query: Vec<(String, String)>,
    body: Vec<(String, String)>,
    authorization: Option<String>,
}

impl OutgoingRequest {
    /// Build a `GET`; any query already present on `url` is merged into `query`.
    pub fn get(url: Url, query: &QueryParams) -> Self {
        let mut request = Self::new(Method::GET, url);
        request
            .query
            .extend(query.iter().map(|(k, v)| (k.clone(), v.clone())));
        request
    }

    /// Build a form-encoded `POST`. File entries are left out of the body.
    pub fn post(url: Url, body: &BodyMap) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = body
            .iter()
            .filter_map(|(k, v)| v.as_text().map(|text| (k.clone(), text.to_string())))
            .collect();
        request
    }

    fn new(method: Method, mut url: Url) -> Self {
        let query = url.query_pairs().into_owned().collect();
        url.set_query(None);
        url.set_fragment(None);
        OutgoingRequest {
            method,
            url,
            query,
            body: Vec::new(),
            authorization: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &[(String, String)] {
        &self.body
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.authorization.is_some()
    }

    /// Compute the signature over the current parameters and attach it.
    ///
    /// A previous signature is replaced, never kept alongside.
    pub fn sign<T: SecretsProvider>(&mut self, signer: &Signer<'_, T>) {
        let params: Vec<(String, String)> =
            self.query.iter().chain(self.body.iter()).cloned().collect();
        let authorization = signer.generate_signature(&self.method, &self.url, &params);
        self.authorization = Some(authorization);
    }

    /// The `oauth_*` parameters of the attached signature, decoded.
    pub fn oauth_parameters(&self) -> Vec<(String, String)> {
        self.authorization
            .as_deref()
            .map(parse_authorization)
            .unwrap_or_default()
    }

    pub(crate) fn build(&self, client: &ReqwestClient) -> ReqwestRequestBuilder {
        let mut builder = client.request(self.method.clone(), self.url.clone());
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if self.method == Method::POST {
            builder = builder.form(&self.body);
        }
        if let Some(ref authorization) = self.authorization {
            builder = builder.header(AUTHORIZATION, authorization.as_str());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsumerCredentials, OAuthParameters, Secrets, Token};

    fn endpoint(path: &str) -> Url {
        Url::parse(&format!("https://api.tumblr.com/v2{}", path)).unwrap()
    }

    #[test]
    fn get_moves_embedded_query() {
        let mut query = QueryParams::new();
        query.insert("limit".into(), "5".into());
        let request = OutgoingRequest::get(endpoint("/user/likes?offset=10"), &query);

        assert_eq!(request.url().as_str(), "https://api.tumblr.com/v2/user/likes");
        assert_eq!(
            request.query(),
            &[
                ("offset".to_string(), "10".to_string()),
                ("limit".to_string(), "5".to_string())
            ]
        );
        assert!(!request.is_signed());
    }

    #[test]
    fn post_leaves_files_out_of_body() {
        let mut body = BodyMap::new();
        body.insert("caption".into(), "sunset".into());
        body.insert("data".into(), PathBuf::from("/tmp/sunset.jpg").into());
        let request = OutgoingRequest::post(endpoint("/blog/x/post"), &body);

        assert_eq!(
            request.body(),
            &[("caption".to_string(), "sunset".to_string())]
        );
    }

    #[test]
    fn resigning_replaces_authorization() {
        let consumer = ConsumerCredentials::new("ck", "cs");
        let token = Token::new("tk", "ts");
        let secrets = Secrets::new(&consumer).token(&token);
        let first_params = OAuthParameters::new().nonce("one").timestamp(1u64);
        let second_params = OAuthParameters::new().nonce("two").timestamp(2u64);

        let mut request = OutgoingRequest::get(endpoint("/user/info"), &QueryParams::new());
        request.sign(&Signer::new(&secrets, &first_params));
        let first = request.authorization().unwrap().to_string();
        request.sign(&Signer::new(&secrets, &second_params));
        let second = request.authorization().unwrap().to_string();

        assert_ne!(first, second);
        assert_eq!(request.authorization().unwrap().matches("OAuth ").count(), 1);
        let nonce = request
            .oauth_parameters()
            .into_iter()
            .find(|(k, _)| k == crate::OAUTH_NONCE_KEY)
            .map(|(_, v)| v);
        assert_eq!(nonce.as_deref(), Some("two"));
    }

    #[test]
    fn build_attaches_authorization_header() {
        let consumer = ConsumerCredentials::new("ck", "cs");
        let token = Token::new("tk", "ts");
        let secrets = Secrets::new(&consumer).token(&token);
        let params = OAuthParameters::new();
        let mut body = BodyMap::new();
        body.insert("state".into(), "draft".into());

        let mut request = OutgoingRequest::post(endpoint("/blog/x/post"), &body);
        request.sign(&Signer::new(&secrets, &params));
        let built = request.build(&ReqwestClient::new()).build().unwrap();

        assert_eq!(built.method(), &Method::POST);
        let header = built.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(header.starts_with("OAuth "));
        let body = built.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"state=draft");
    }
}
