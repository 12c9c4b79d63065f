use std::borrow::Cow;

use http::Method;
use oauth1_request::signer::Signer as OAuthSigner;
use oauth1_request::{HmacSha1, Options};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::SecretsProvider;

const OAUTH_IDENTIFIER: &str = "oauth_";
const REALM_IDENTIFIER: &str = "realm";
const AUTHORIZATION_SCHEME: &str = "OAuth ";

const RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Computes HMAC-SHA1 signatures and renders them as an `Authorization` value.
#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    secrets: &'a TSecretsProvider,
    parameters: &'a OAuthParameters<'a>,
}

impl<'a, TSecretsProvider> Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    pub fn new(secrets: &'a TSecretsProvider, parameters: &'a OAuthParameters<'a>) -> Self {
        Signer {
            secrets,
            parameters,
        }
    }

    /// Sign `method url` over the given query or body parameters.
    ///
    /// `url` must not carry a query string; pass its pairs in `params` instead.
    /// Parameters whose key starts with `oauth_` are ignored, the signer adds
    /// its own.
    pub fn generate_signature(
        &self,
        method: &Method,
        url: &Url,
        params: &[(String, String)],
    ) -> String {
        let (consumer_key, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (token, token_secret) = self.secrets.get_token_option_pair();
        let options = self.parameters.build_options(token);

        // parameters are normalized as in RFC 5849 section 3.4.1.3.2: encoded
        // first, then sorted, with the oauth_* block of oauth1-request placed
        // at its position in that order
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| !k.starts_with(OAUTH_IDENTIFIER))
            .map(|(k, v)| (encode(k), encode(v)))
            .chain(std::iter::once((OAUTH_IDENTIFIER.to_string(), String::new())))
            .collect();
        encoded.sort();

        let mut divided = encoded.splitn(2, |(k, _)| k == OAUTH_IDENTIFIER);
        let query_before_oauth = divided.next().unwrap_or_default();
        let query_after_oauth = divided.next().unwrap_or_default();

        let mut signer = if *method == Method::POST {
            OAuthSigner::form_with_signature_method(
                HmacSha1,
                method.as_str(),
                url.clone(),
                consumer_secret,
                token_secret,
            )
        } else {
            OAuthSigner::with_signature_method(
                HmacSha1,
                method.as_str(),
                url.clone(),
                consumer_secret,
                token_secret,
            )
        };

        // `parameter_encoded` writes the key into the base string as is, and
        // the base string holds every parameter encoded twice
        for (key, value) in query_before_oauth {
            signer.parameter_encoded(&encode(key), value);
        }
        let mut signer = signer.oauth_parameters(consumer_key, &options);
        for (key, value) in query_after_oauth {
            signer.parameter_encoded(&encode(key), value);
        }

        let sign = signer.finish().authorization;

        if let Some(ref realm) = self.parameters.realm {
            format!("{},{}=\"{}\"", sign, REALM_IDENTIFIER, realm.as_ref())
        } else {
            sign
        }
    }
}

/// Percent-encode with the RFC 3986 unreserved set left as is.
fn encode(value: &str) -> String {
    utf8_percent_encode(value, RESERVED).to_string()
}

/// Decode an `OAuth k="v",...` value into its `oauth_*` pairs.
///
/// `realm` and anything that is not an `oauth_` parameter is dropped.
pub(crate) fn parse_authorization(authorization: &str) -> Vec<(String, String)> {
    let content = authorization
        .strip_prefix(AUTHORIZATION_SCHEME)
        .unwrap_or(authorization);
    content
        .split(',')
        .filter_map(|item| {
            let mut kv = item.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some(k), Some(v)) if k.starts_with(OAUTH_IDENTIFIER) => Some((k, v)),
                _ => None,
            }
        })
        .map(|(k, v)| {
            let value = percent_encoding::percent_decode_str(v.trim_matches('"'))
                .decode_utf8_lossy()
                .into_owned();
            (k.to_string(), value)
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct OAuthParameters<'a> {
    callback: Option<Cow<'a, str>>,
    nonce: Option<Cow<'a, str>>,
    realm: Option<Cow<'a, str>>,
    timestamp: Option<u64>,
    verifier: Option<Cow<'a, str>>,
    version: bool,
}

impl<'a> OAuthParameters<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// set the oauth_callback value
    pub fn callback<T>(self, callback: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// set the oauth_nonce value
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the realm value
    pub fn realm<T>(self, realm: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            realm: Some(realm.into()),
            ..self
        }
    }

    /// set the oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_verifier value
    pub fn verifier<T>(self, verifier: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            verifier: Some(verifier.into()),
            ..self
        }
    }

    /// set the oauth_version value (boolean)
    ///
    /// # Note
    /// When the version has value `true`, oauth_version will be set with "1.0".
    /// Otherwise, oauth_version will not be included in your request.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    fn build_options<'s>(&'s self, token: Option<&'s str>) -> Options<'s> {
        let mut opt = Options::new();

        // NOTE: items must be added by alphabetical order

        if let Some(ref callback) = self.callback {
            opt.callback(callback.as_ref());
        }
        if let Some(ref nonce) = self.nonce {
            opt.nonce(nonce.as_ref());
        }
        if let Some(timestamp) = self.timestamp {
            opt.timestamp(timestamp);
        }
        if let Some(token) = token {
            opt.token(token);
        }
        if let Some(ref verifier) = self.verifier {
            opt.verifier(verifier.as_ref());
        }
        opt.version(self.version);

        opt
    }
}
