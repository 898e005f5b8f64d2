use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use futures::future::BoxFuture;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};
use unwrap_or::unwrap_ok_or;
use url::Url;

use super::{
    oauth::{AccessToken, Authorizer},
    types::TokenResponse,
    utils::json_or_api_err,
};
use crate::error::{Error, Result};

pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const CALLBACK_PATH: &str = "/callback";

/// Consent through the system browser, answered on a loopback listener.
///
/// The authorization code is exchanged for an access token straight away;
/// refresh tokens are dropped.
pub struct LoopbackAuthorizer {
    http: Client,
    client_id: String,
    client_secret: Option<SecretString>,
    port: u16,
    timeout: Duration,
    open_browser: bool,
}

impl LoopbackAuthorizer {
    pub fn new(http: Client, client_id: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: None,
            port: 0,
            timeout: Duration::from_secs(300),
            open_browser: true,
        }
    }

    pub fn client_secret(mut self, secret: Option<String>) -> Self {
        self.client_secret = secret.map(SecretString::from);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    async fn run(&self, scope: &str) -> Result<AccessToken> {
        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| Error::AuthProvider(format!("could not bind callback listener: {e}")))?;
        let port = listener.local_addr().map_err(listener_error)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}{CALLBACK_PATH}");

        let pkce = Pkce::new();
        let state = random_string(32);
        let url = authorization_url(&self.client_id, &redirect_uri, scope, &state, &pkce.challenge)?;

        info!(%url, "open this URL to authorize access");
        if self.open_browser {
            if let Err(e) = open::that(url.as_str()) {
                warn!(error = %e, "could not open a browser");
            }
        }

        let callback = tokio::time::timeout(self.timeout, wait_for_callback(&listener, &state))
            .await
            .map_err(|_| Error::AuthProvider("timed out waiting for consent".into()))??;

        let code = match callback {
            Callback::Code { code, .. } => code,
            Callback::Error { error, .. } if error == "access_denied" => {
                return Err(Error::AuthDenied(error))
            }
            Callback::Error { error, .. } => return Err(Error::AuthProvider(error)),
        };

        self.exchange_code(&code, &redirect_uri, &pkce.verifier).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
    ) -> Result<AccessToken> {
        let mut form = vec![
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
            ("code_verifier", verifier),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let res = self
            .http
            .post(TOKEN_URI)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::AuthProvider(format!("Could not send POST request to '{TOKEN_URI}': {e}")))?;

        let token = json_or_api_err::<TokenResponse>(res)
            .await
            .map_err(|e| Error::AuthProvider(e.to_string()))?;

        Ok(AccessToken::new(token.access_token))
    }
}

impl Authorizer for LoopbackAuthorizer {
    fn authorize<'a>(&'a self, scope: &'a str) -> BoxFuture<'a, Result<AccessToken>> {
        Box::pin(self.run(scope))
    }
}

struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn new() -> Self {
        Self::from_verifier(random_string(64))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn authorization_url(
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
    challenge: &str,
) -> Result<Url> {
    Url::parse_with_params(
        AUTH_URI,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| Error::AuthProvider(format!("invalid authorization url: {e}")))
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code {
        code: String,
        state: String,
    },
    Error {
        error: String,
        state: Option<String>,
    },
}

impl Callback {
    fn state(&self) -> Option<&str> {
        match self {
            Callback::Code { state, .. } => Some(state.as_str()),
            Callback::Error { state, .. } => state.as_deref(),
        }
    }
}

fn listener_error(e: std::io::Error) -> Error {
    Error::AuthProvider(format!("callback listener failed: {e}"))
}

/// Serves the listener until the consent redirect for `state` arrives.
/// Requests for other paths get a 404, callbacks carrying another state a 400.
async fn wait_for_callback(listener: &TcpListener, state: &str) -> Result<Callback> {
    loop {
        let (mut socket, peer) = listener.accept().await.map_err(listener_error)?;

        let request = unwrap_ok_or!(read_request(&mut socket).await, e, {
            debug!(%peer, error = %e, "dropping unreadable callback connection");
            continue;
        });

        match parse_callback(&request) {
            Some(callback) if callback.state() == Some(state) => {
                let body = match &callback {
                    Callback::Code { .. } => "Authorization complete. You can close this tab.",
                    Callback::Error { .. } => {
                        "Authorization was not granted. You can close this tab."
                    }
                };
                respond(&mut socket, "200 OK", body).await;
                return Ok(callback);
            }
            Some(_) => {
                warn!(%peer, "ignoring callback with unexpected state");
                respond(&mut socket, "400 Bad Request", "Unexpected state").await;
            }
            None => respond(&mut socket, "404 Not Found", "Not found").await,
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = vec![0u8; 8192];
    let n = socket.read(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let res = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = socket.write_all(res.as_bytes()).await {
        debug!(error = %e, "could not answer callback request");
    }
}

/// Extracts the consent result from a raw `GET /callback?...` request.
fn parse_callback(request: &str) -> Option<Callback> {
    let target = request.lines().next()?.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;

    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }

    match (error, code, state) {
        (Some(error), _, state) => Some(Callback::Error { error, state }),
        (None, Some(code), Some(state)) => Some(Callback::Code { code, state }),
        (None, _, state) => Some(Callback::Error {
            error: "callback carried no authorization code".into(),
            state,
        }),
    }
}
