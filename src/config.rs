use std::{env, fmt, path::Path, sync::Arc, time::Duration};

use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    google_drive::{
        Authorizer, DriveApi, DuplicatePolicy, HttpDrive, LoopbackAuthorizer, PresetAuthorizer,
        DRIVE_FILE_SCOPE,
    },
    session::SessionCoordinator,
};

/// Process-wide settings, read once at start-up.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub redirect_port: u16,
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");

        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("api_key", &redacted(&self.api_key))
            .field("scope", &self.scope)
            .field("redirect_port", &self.redirect_port)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .field("duplicate_policy", &self.duplicate_policy)
            .field("access_token", &redacted(&self.access_token))
            .finish()
    }
}

fn default_scope() -> String {
    DRIVE_FILE_SCOPE.into()
}

fn default_auth_timeout() -> u64 {
    300
}

impl Config {
    /// Reads `DRIVE_*` variables, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|k| env::var(k).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |k: &str| var(k).filter(|v| !v.trim().is_empty());

        let redirect_port = match var("DRIVE_REDIRECT_PORT") {
            None => 0,
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("invalid DRIVE_REDIRECT_PORT: {e}")))?,
        };

        let auth_timeout_secs = match var("DRIVE_AUTH_TIMEOUT_SECS") {
            None => default_auth_timeout(),
            Some(t) => t
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("invalid DRIVE_AUTH_TIMEOUT_SECS: {e}")))?,
        };

        let duplicate_policy = match var("DRIVE_DUPLICATE_POLICY") {
            None => DuplicatePolicy::default(),
            Some(p) => p.parse()?,
        };

        let config = Self {
            client_id: var("DRIVE_CLIENT_ID").unwrap_or_default(),
            client_secret: var("DRIVE_CLIENT_SECRET"),
            api_key: var("DRIVE_API_KEY"),
            scope: var("DRIVE_SCOPE").unwrap_or_else(default_scope),
            redirect_port,
            auth_timeout_secs,
            duplicate_policy,
            access_token: var("DRIVE_ACCESS_TOKEN"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let config = serde_json::from_str::<Self>(&text)
            .map_err(|e| Error::Config(format!("invalid config file '{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() && self.access_token.is_none() {
            return Err(Error::Config(
                "DRIVE_CLIENT_ID is required unless DRIVE_ACCESS_TOKEN is set".into(),
            ));
        }
        if self.scope.trim().is_empty() {
            return Err(Error::Config("scope must not be empty".into()));
        }
        Ok(())
    }

    pub fn authorizer(&self, http: Client) -> Box<dyn Authorizer> {
        match &self.access_token {
            Some(t) => Box::new(PresetAuthorizer::new(t.clone())),
            None => Box::new(
                LoopbackAuthorizer::new(http, self.client_id.clone())
                    .client_secret(self.client_secret.clone())
                    .port(self.redirect_port)
                    .timeout(Duration::from_secs(self.auth_timeout_secs)),
            ),
        }
    }

    pub fn drive(&self, http: Client) -> Arc<dyn DriveApi> {
        Arc::new(HttpDrive::new(http).api_key(self.api_key.clone()))
    }

    /// A fresh, unauthenticated session wired to the real endpoints.
    pub fn session(&self) -> SessionCoordinator {
        let http = Client::new();
        SessionCoordinator::new(self.authorizer(http.clone()), self.drive(http))
            .with_scope(self.scope.clone())
            .with_duplicate_policy(self.duplicate_policy)
    }
}
