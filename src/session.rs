use std::{fmt, sync::Arc};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    google_drive::{Authorizer, DriveApi, DuplicatePolicy, FolderResolver, TokenController, UploadExecutor},
    types::{FileId, FolderRef, LocalFile, UploadRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    Unresolved,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authorized(FolderState),
    UploadInFlight,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => f.write_str("unauthenticated"),
            SessionState::Authenticating => f.write_str("authenticating"),
            SessionState::Authorized(FolderState::Unresolved) => {
                f.write_str("authorized without a folder")
            }
            SessionState::Authorized(FolderState::Resolved) => f.write_str("authorized"),
            SessionState::UploadInFlight => f.write_str("uploading"),
        }
    }
}

/// What a front end tells the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Authorized,
    AuthFailed(String),
    FolderResolved(FolderRef),
    FolderFailed(String),
    Uploaded(FileId),
    UploadFailed(String),
    SignedOut,
}

/// Sequences authorization, folder resolution and upload.
///
/// Upload is only reachable once both earlier steps succeeded; signing out
/// drops the token and the folder together. Every failure leaves the session
/// in the last state that is still true.
pub struct SessionCoordinator {
    tokens: TokenController,
    folders: FolderResolver,
    uploader: UploadExecutor,
    state: SessionState,
    events: Option<UnboundedSender<SessionEvent>>,
}

impl SessionCoordinator {
    pub fn new(authorizer: Box<dyn Authorizer>, drive: Arc<dyn DriveApi>) -> Self {
        Self {
            tokens: TokenController::new(authorizer),
            folders: FolderResolver::new(drive.clone()),
            uploader: UploadExecutor::new(drive),
            state: SessionState::Unauthenticated,
            events: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.tokens = self.tokens.with_scope(scope);
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.folders = self.folders.with_policy(policy);
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn folder(&self) -> &FolderRef {
        self.folders.current()
    }

    pub fn is_authorized(&self) -> bool {
        self.tokens.is_authorized()
    }

    pub fn can_resolve_folder(&self) -> bool {
        matches!(self.state, SessionState::Authorized(_))
    }

    pub fn can_upload(&self) -> bool {
        self.state == SessionState::Authorized(FolderState::Resolved)
    }

    pub async fn authorize(&mut self) -> Result<()> {
        if self.state != SessionState::Unauthenticated {
            return Err(self.invalid("authorize"));
        }

        self.transition(SessionState::Authenticating);
        match self.tokens.request_authorization().await {
            Ok(()) => {
                self.transition(SessionState::Authorized(FolderState::Unresolved));
                self.emit(SessionEvent::Authorized);
                Ok(())
            }
            Err(e) => {
                self.transition(SessionState::Unauthenticated);
                self.emit(SessionEvent::AuthFailed(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn resolve_folder(&mut self, name: &str) -> Result<FolderRef> {
        if !self.can_resolve_folder() {
            return Err(self.invalid("resolve a folder"));
        }

        let token = self.tokens.current_token()?;
        match self.folders.resolve_or_create(token, name).await {
            Ok(folder) => {
                self.transition(SessionState::Authorized(FolderState::Resolved));
                self.emit(SessionEvent::FolderResolved(folder.clone()));
                Ok(folder)
            }
            Err(e) => {
                let folder = if self.folders.current().is_resolved() {
                    FolderState::Resolved
                } else {
                    FolderState::Unresolved
                };
                self.transition(SessionState::Authorized(folder));
                self.emit(SessionEvent::FolderFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Uploads `file` into the resolved folder.
    pub async fn upload(&mut self, file: LocalFile) -> Result<FileId> {
        if !self.can_upload() {
            let e = match self.state {
                SessionState::Unauthenticated | SessionState::Authenticating => {
                    Error::UploadPrecondition("session is not authorized")
                }
                SessionState::Authorized(FolderState::Unresolved) => {
                    Error::UploadPrecondition("target folder is not resolved")
                }
                _ => Error::UploadPrecondition("another upload is in flight"),
            };
            warn!(state = %self.state, error = %e, "upload rejected");
            return Err(e);
        }

        let request = UploadRequest::new(file, self.folders.current().clone());

        self.transition(SessionState::UploadInFlight);
        let r = self.uploader.upload(self.tokens.session(), &request).await;
        self.transition(SessionState::Authorized(FolderState::Resolved));

        match r {
            Ok(id) => {
                self.emit(SessionEvent::Uploaded(id.clone()));
                Ok(id)
            }
            Err(e) => {
                self.emit(SessionEvent::UploadFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Signs out. The folder has to be resolved again after the next
    /// authorization.
    pub fn revoke(&mut self) {
        if self.state == SessionState::Unauthenticated {
            return;
        }

        self.tokens.revoke();
        self.folders.reset();
        self.transition(SessionState::Unauthenticated);
        self.emit(SessionEvent::SignedOut);
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "session state changed");
            self.state = to;
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            // a closed receiver only means nobody is listening any more
            let _ = tx.send(event);
        }
    }

    fn invalid(&self, op: &'static str) -> Error {
        Error::InvalidState {
            op,
            state: self.state.to_string(),
        }
    }
}
