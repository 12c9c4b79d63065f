/*!
tumblr-oauth1: the request layer of a Tumblr v2 API client, built on
[reqwest](https://crates.io/crates/reqwest) and [oauth1-request](https://crates.io/crates/oauth1-request).

# Overview

This library establishes a three-legged OAuth 1.0a session, signs outgoing
`GET`/`POST` requests with HMAC-SHA1, encodes uploads as `multipart/form-data`
and unwraps the `{meta, response}` JSON envelope into a payload or an error.

# How to use

## Basic usecase 1 - calling the API with an access token you already hold

```no_run
# async fn run() -> tumblr_oauth1::Result<()> {
use tumblr_oauth1::{Client, Config, QueryParams};

let mut client = Client::new(Config::default())?;
client.configure("[CONSUMER_KEY]", "[CONSUMER_SECRET]", None)?;
client.set_token("[ACCESS_TOKEN]", "[TOKEN_SECRET]");

let info = client.get("/user/info", &QueryParams::new()).await?;
if let Some(info) = info {
    println!("{:#?}", info.response);
}
# Ok(())
# }
```

## Basic usecase 2 - acquiring the access token

```no_run
# async fn run() -> tumblr_oauth1::Result<()> {
use std::io;
use tumblr_oauth1::Client;

let mut client = Client::with_consumer("[CONSUMER_KEY]", "[CONSUMER_SECRET]")?;

// step 1: acquire the request token and the authorization url
let (_request_token, url) = client.begin_authorization().await?;
println!("please access to: {}", url);

// step 2: the provider redirects to the callback with oauth_verifier
println!("input verifier: ");
let mut user_input = String::new();
io::stdin().read_line(&mut user_input).expect("read verifier");

// step 3: exchange it for the access token
client.complete_authorization(user_input.trim()).await?;
let token = client.session().token().expect("authorized");
println!("token: {}\nsecret: {}", token.key(), token.secret());
# Ok(())
# }
```

Or let the library open the browser and catch the redirect itself:

```no_run
# async fn run() -> tumblr_oauth1::Result<()> {
let mut client = tumblr_oauth1::Client::with_consumer("[CONSUMER_KEY]", "[CONSUMER_SECRET]")?;
if !client.auto_authenticate().await {
    eprintln!("authorization failed");
}
# Ok(())
# }
```

## Uploading files

```no_run
# async fn run(client: tumblr_oauth1::Client) -> tumblr_oauth1::Result<()> {
use std::path::PathBuf;
use tumblr_oauth1::BodyMap;

let mut body = BodyMap::new();
body.insert("type".into(), "photo".into());
body.insert("caption".into(), "sunset".into());
body.insert("data".into(), PathBuf::from("sunset.jpg").into());
client.post_multipart("/blog/example.tumblr.com/post", &body).await?;
# Ok(())
# }
```
*/
mod callback;
mod client;
mod config;
mod error;
pub mod multipart;
mod request;
pub mod response;
mod secrets;
mod session;
mod signer;
mod token_reader;

// exposed to external program
pub use callback::CallbackListener;
pub use client::Client;
pub use config::{Config, OAuthEndpoints};
pub use error::{
    AuthError, AuthResult, EncodingError, Error, Result, TokenReaderError, TokenReaderResult,
};
pub use request::{BodyMap, FormValue, OutgoingRequest, QueryParams};
pub use response::{Meta, ResponseEnvelope, ResponseWrapper};
pub use secrets::{ConsumerCredentials, Secrets, SecretsProvider, Token};
pub use session::{OAuthSession, SessionState};
pub use signer::{OAuthParameters, Signer};
pub use token_reader::{TokenReader, TokenResponse};

// exposed constant variables
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_signature`.
pub const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";

// crate-private constant variables
pub(crate) const OAUTH_TOKEN_KEY: &str = "oauth_token";
