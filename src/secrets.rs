pub trait SecretsProvider {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str);

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)>;

    fn get_token_option_pair<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or_else(|| (None, None))
    }
}

/// An OAuth token: request token, access token or a caller-held one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    key: String,
    secret: String,
}

impl Token {
    pub fn new<TKey, TSecret>(key: TKey, secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Token {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// The application's consumer key and secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerCredentials {
    key: String,
    secret: String,
}

impl ConsumerCredentials {
    pub fn new<TKey, TSecret>(key: TKey, secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        ConsumerCredentials {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Borrowed signing material: consumer credentials plus an optional token.
#[derive(Debug, Clone, Copy)]
pub struct Secrets<'a> {
    consumer: &'a ConsumerCredentials,
    token: Option<&'a Token>,
}

impl<'a> Secrets<'a> {
    pub fn new(consumer: &'a ConsumerCredentials) -> Self {
        Secrets {
            consumer,
            token: None,
        }
    }

    pub fn token(self, token: &'a Token) -> Self {
        Secrets {
            token: Some(token),
            ..self
        }
    }
}

impl SecretsProvider for Secrets<'_> {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str) {
        (self.consumer.key(), self.consumer.secret())
    }

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)> {
        self.token.map(|t| (t.key(), t.secret()))
    }
}
