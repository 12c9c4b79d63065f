//! One-shot loopback listener catching the provider's redirect after the
//! user authorized the request token.

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::{AuthError, AuthResult, OAUTH_VERIFIER_KEY};

const SUCCESS_HTML: &str = "<html><body><h1>Authorization complete</h1><p>You may close this window and return to the application.</p></body></html>";
const ERROR_HTML: &str = "<html><body><h1>Authorization failed</h1><p>Please return to the application for details.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REQUEST_HEAD: usize = 8192;

/// A bound loopback socket and the callback URI that points at it.
///
/// The socket is held from bind until [`CallbackListener::wait_for_verifier`]
/// returns or the listener is dropped, so the advertised port cannot be
/// taken by another process in between.
#[derive(Debug)]
pub struct CallbackListener {
    listener: StdTcpListener,
    uri: Url,
}

impl CallbackListener {
    /// Bind `127.0.0.1` on a port chosen by the OS.
    pub fn bind_loopback() -> io::Result<Self> {
        let listener = StdTcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))?;
        let port = listener.local_addr()?.port();
        let uri = Url::parse(&format!("http://127.0.0.1:{}/", port))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Self::from_listener(listener, uri)
    }

    /// Bind the host and port named by a caller supplied callback URI.
    pub fn bind_for(uri: &Url) -> io::Result<Self> {
        let host = uri.host_str().unwrap_or("127.0.0.1");
        let port = uri.port_or_known_default().unwrap_or(80);
        let listener = StdTcpListener::bind((host, port))?;
        Self::from_listener(listener, uri.clone())
    }

    fn from_listener(listener: StdTcpListener, uri: Url) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(CallbackListener { listener, uri })
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn port(&self) -> io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Serve requests until one arrives on the callback path, and return its
    /// `oauth_verifier`.
    ///
    /// Requests to other paths (a browser's `/favicon.ico`) get a 404 and are
    /// otherwise ignored. The socket is closed on every return path.
    pub async fn wait_for_verifier(self, timeout: Duration) -> AuthResult<String> {
        let listener = TcpListener::from_std(self.listener)?;
        let callback_path = self.uri.path().to_string();
        debug!(uri = %self.uri, ?timeout, "waiting for authorization callback");
        match tokio::time::timeout(timeout, accept_verifier(&listener, &callback_path)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::CallbackTimeout),
        }
    }
}

/// What a single connection to the listener turned out to be.
enum Callback {
    Verifier(String),
    MissingVerifier,
}

async fn accept_verifier(listener: &TcpListener, callback_path: &str) -> AuthResult<String> {
    // every connection is served on its own task, so a browser's idle
    // preconnect cannot hold up the redirect behind it
    let (tx, mut rx) = mpsc::unbounded_channel();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    let callback_path = callback_path.to_string();
                    tokio::spawn(async move {
                        match serve(stream, &callback_path).await {
                            Ok(Some(callback)) => {
                                let _ = tx.send(callback);
                            }
                            Ok(None) => {}
                            Err(err) => {
                                debug!(%addr, error = %err, "dropped callback connection")
                            }
                        }
                    });
                }
                Err(err) => warn!(error = %err, "failed to accept callback connection"),
            },
            Some(callback) = rx.recv() => match callback {
                Callback::Verifier(verifier) => return Ok(verifier),
                Callback::MissingVerifier => return Err(AuthError::MissingVerifier),
            },
        }
    }
}

async fn serve(mut stream: TcpStream, callback_path: &str) -> io::Result<Option<Callback>> {
    let head = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut stream)).await {
        Ok(head) => head?,
        Err(_) => {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no request line received",
            ))
        }
    };
    if head.is_empty() {
        return Ok(None);
    }

    let target = match parse_request_target(&head) {
        Some(target) => target,
        None => {
            respond(&mut stream, 400, ERROR_HTML).await?;
            return Ok(None);
        }
    };

    let (status, body, callback) = if let Some(verifier) = query_value(&target, OAUTH_VERIFIER_KEY)
    {
        (200, SUCCESS_HTML, Some(Callback::Verifier(verifier)))
    } else if target.path() == callback_path {
        (400, ERROR_HTML, Some(Callback::MissingVerifier))
    } else {
        debug!(path = target.path(), "ignoring unrelated request on callback listener");
        (404, NOT_FOUND_HTML, None)
    };
    // the outcome stands even when the browser hung up before the reply
    if let Err(err) = respond(&mut stream, status, body).await {
        debug!(error = %err, "failed to answer callback request");
    }
    Ok(callback)
}

/// Read until the end of the request head, the peer closing, or the size cap.
async fn read_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn parse_request_target(request: &str) -> Option<Url> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    let path = parts.next()?;
    Url::parse(&format!("http://localhost{}", path)).ok()
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) -> io::Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let response = format!(
        "{}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
            target, port
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        let _ = stream.read_to_string(&mut response).await;
        response
    }

    #[test]
    fn loopback_uri_uses_bound_port() {
        let listener = CallbackListener::bind_loopback().unwrap();
        let port = listener.port().unwrap();
        assert_ne!(port, 0);
        assert_eq!(
            listener.uri().as_str(),
            format!("http://127.0.0.1:{}/", port)
        );
    }

    #[tokio::test]
    async fn receives_verifier_after_unrelated_request() {
        let listener = CallbackListener::bind_loopback().unwrap();
        let port = listener.port().unwrap();

        let client = tokio::spawn(async move {
            let favicon = send(port, "/favicon.ico").await;
            let callback = send(port, "/?oauth_token=req&oauth_verifier=v3r%21f13r").await;
            (favicon, callback)
        });

        let verifier = listener
            .wait_for_verifier(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(verifier, "v3r!f13r");

        let (favicon, callback) = client.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(callback.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn idle_connection_does_not_block_redirect() {
        let listener = CallbackListener::bind_loopback().unwrap();
        let port = listener.port().unwrap();

        let client = tokio::spawn(async move {
            // a speculative connection that never sends anything
            let idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            // and one that hangs up right away
            drop(TcpStream::connect(("127.0.0.1", port)).await.unwrap());
            let callback = send(port, "/?oauth_verifier=abc").await;
            drop(idle);
            callback
        });

        let verifier = listener
            .wait_for_verifier(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(verifier, "abc");
        assert!(client.await.unwrap().starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn request_line_split_across_writes() {
        let listener = CallbackListener::bind_loopback().unwrap();
        let port = listener.port().unwrap();

        tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            stream.write_all(b"GET /?oauth_ver").await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            stream
                .write_all(b"ifier=split HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            let _ = stream.read_to_string(&mut response).await;
        });

        let verifier = listener
            .wait_for_verifier(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(verifier, "split");
    }

    #[tokio::test]
    async fn callback_without_verifier_fails() {
        let listener = CallbackListener::bind_loopback().unwrap();
        let port = listener.port().unwrap();

        tokio::spawn(async move { send(port, "/?oauth_token=req").await });

        let err = listener
            .wait_for_verifier(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingVerifier));
    }

    #[tokio::test]
    async fn times_out_and_releases_port() {
        let listener = CallbackListener::bind_loopback().unwrap();
        let port = listener.port().unwrap();

        let err = listener
            .wait_for_verifier(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CallbackTimeout));

        let rebound = StdTcpListener::bind(("127.0.0.1", port));
        assert!(rebound.is_ok());
    }
}
