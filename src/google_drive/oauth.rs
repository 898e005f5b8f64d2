use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Access to files created by this application only.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Opaque bearer credential. Its lifetime is decided by the provider and is
/// not tracked here.
#[derive(Debug)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }

    pub(crate) fn secret(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Authorization state of the process. There is exactly one per session
/// coordinator and it is never persisted.
#[derive(Debug, Default)]
pub struct Session {
    access_token: Option<AccessToken>,
}

impl Session {
    pub fn is_authorized(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }
}

/// Runs a provider consent flow for `scope`.
///
/// The returned future completes once the user has answered; a denial is
/// reported as [`Error::AuthDenied`], anything else that goes wrong as
/// [`Error::AuthProvider`].
pub trait Authorizer: Send + Sync {
    fn authorize<'a>(&'a self, scope: &'a str) -> BoxFuture<'a, Result<AccessToken>>;
}

/// Hands out a token obtained elsewhere.
pub struct PresetAuthorizer {
    token: SecretString,
}

impl PresetAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

impl Authorizer for PresetAuthorizer {
    fn authorize<'a>(&'a self, _scope: &'a str) -> BoxFuture<'a, Result<AccessToken>> {
        Box::pin(async move {
            if self.token.expose_secret().is_empty() {
                return Err(Error::AuthProvider("preset access token is empty".into()));
            }
            Ok(AccessToken::new(self.token.expose_secret()))
        })
    }
}

pub struct TokenController {
    authorizer: Box<dyn Authorizer>,
    scope: String,
    session: Session,
}

impl TokenController {
    pub fn new(authorizer: Box<dyn Authorizer>) -> Self {
        Self {
            authorizer,
            scope: DRIVE_FILE_SCOPE.into(),
            session: Session::default(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Asks the user for consent and stores the granted token. On failure the
    /// session is left as it was.
    pub async fn request_authorization(&mut self) -> Result<()> {
        match self.authorizer.authorize(&self.scope).await {
            Ok(token) => {
                self.session.access_token = Some(token);
                info!(scope = %self.scope, "authorization granted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "authorization failed");
                Err(e)
            }
        }
    }

    /// Forgets the token. Returns whether there was one.
    pub fn revoke(&mut self) -> bool {
        let had_token = self.session.access_token.take().is_some();
        if had_token {
            info!("access token cleared");
        }
        had_token
    }

    pub fn is_authorized(&self) -> bool {
        self.session.is_authorized()
    }

    pub fn current_token(&self) -> Result<&AccessToken> {
        self.session.access_token().ok_or(Error::NotAuthorized)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}
