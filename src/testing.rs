//! Recording fakes for the remote seams.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;

use crate::{
    error::{ApiError, Error, Result},
    google_drive::{AccessToken, Authorizer, DriveApi, DriveFile, UploadMetadata, FOLDER},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindFolders {
        name: String,
        token: String,
    },
    CreateFolder {
        name: String,
        token: String,
    },
    Upload {
        meta: UploadMetadata,
        bytes: Vec<u8>,
        token: String,
    },
}

struct Folder {
    file: DriveFile,
    trashed: bool,
}

#[derive(Default)]
struct State {
    folders: Vec<Folder>,
    calls: Vec<Call>,
    folder_ids: VecDeque<String>,
    file_ids: VecDeque<String>,
    stale_listing: bool,
    fail_lookup: Option<ApiError>,
    fail_create: Option<ApiError>,
    fail_upload: Option<ApiError>,
}

/// In-memory Drive that records every call it receives.
#[derive(Default)]
pub struct FakeDrive {
    state: Mutex<State>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(self, id: &str, name: &str) -> Self {
        self.add_folder(id, name, false);
        self
    }

    pub fn with_trashed_folder(self, id: &str, name: &str) -> Self {
        self.add_folder(id, name, true);
        self
    }

    pub fn issuing_folder_ids<const N: usize>(self, ids: [&str; N]) -> Self {
        self.state().folder_ids.extend(ids.map(String::from));
        self
    }

    pub fn issuing_file_ids<const N: usize>(self, ids: [&str; N]) -> Self {
        self.state().file_ids.extend(ids.map(String::from));
        self
    }

    /// Created folders never show up in listings.
    pub fn stale_listing(self) -> Self {
        self.state().stale_listing = true;
        self
    }

    pub fn failing_lookup(self, e: ApiError) -> Self {
        self.set_lookup_failure(e);
        self
    }

    pub fn failing_create(self, e: ApiError) -> Self {
        self.state().fail_create = Some(e);
        self
    }

    pub fn failing_upload(self, e: ApiError) -> Self {
        self.state().fail_upload = Some(e);
        self
    }

    pub fn set_lookup_failure(&self, e: ApiError) {
        self.state().fail_lookup = Some(e);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn lookup_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::FindFolders { .. }))
    }

    pub fn create_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateFolder { .. }))
    }

    pub fn upload_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Upload { .. }))
    }

    fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| f(c)).count()
    }

    fn add_folder(&self, id: &str, name: &str, trashed: bool) {
        self.state().folders.push(Folder {
            file: folder(id, name),
            trashed,
        });
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

fn folder(id: &str, name: &str) -> DriveFile {
    DriveFile {
        id: id.into(),
        name: name.into(),
        mime_type: FOLDER.into(),
        parents: Some(vec!["root".into()]),
    }
}

impl DriveApi for FakeDrive {
    fn find_folders<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DriveFile>, ApiError>> {
        let mut s = self.state();
        s.calls.push(Call::FindFolders {
            name: name.into(),
            token: token.secret().into(),
        });

        let r = match &s.fail_lookup {
            Some(e) => Err(e.clone()),
            None => Ok(s
                .folders
                .iter()
                .filter(|f| !f.trashed && f.file.name == name)
                .map(|f| f.file.clone())
                .collect()),
        };
        Box::pin(async move { r })
    }

    fn create_folder<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<DriveFile, ApiError>> {
        let mut s = self.state();
        s.calls.push(Call::CreateFolder {
            name: name.into(),
            token: token.secret().into(),
        });

        let r = match s.fail_create.clone() {
            Some(e) => Err(e),
            None => {
                let n = s.calls.len();
                let id = s
                    .folder_ids
                    .pop_front()
                    .unwrap_or_else(|| format!("folder-{n}"));
                let f = folder(&id, name);
                if !s.stale_listing {
                    s.folders.push(Folder {
                        file: f.clone(),
                        trashed: false,
                    });
                }
                Ok(f)
            }
        };
        Box::pin(async move { r })
    }

    fn upload_multipart<'a>(
        &'a self,
        token: &'a AccessToken,
        meta: &'a UploadMetadata,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<DriveFile, ApiError>> {
        let mut s = self.state();
        s.calls.push(Call::Upload {
            meta: meta.clone(),
            bytes: bytes.to_vec(),
            token: token.secret().into(),
        });

        let r = match s.fail_upload.clone() {
            Some(e) => Err(e),
            None => {
                let n = s.calls.len();
                let id = s.file_ids.pop_front().unwrap_or_else(|| format!("file-{n}"));
                Ok(DriveFile {
                    id,
                    name: meta.name.clone(),
                    mime_type: meta.mime_type.clone(),
                    parents: Some(meta.parents.clone()),
                })
            }
        };
        Box::pin(async move { r })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Consent {
    Grant(&'static str),
    Deny,
    ProviderError,
}

/// Answers consent requests from a script, one entry per request.
pub struct ScriptedAuthorizer {
    script: Mutex<VecDeque<Consent>>,
    scopes: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAuthorizer {
    pub fn new(script: Vec<Consent>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            scopes: Arc::default(),
        }
    }

    /// Scopes requested so far.
    pub fn scopes(&self) -> Arc<Mutex<Vec<String>>> {
        self.scopes.clone()
    }
}

impl Authorizer for ScriptedAuthorizer {
    fn authorize<'a>(&'a self, scope: &'a str) -> BoxFuture<'a, Result<AccessToken>> {
        self.scopes.lock().unwrap().push(scope.to_string());
        let next = self.script.lock().unwrap().pop_front();

        let r = match next {
            Some(Consent::Grant(t)) => Ok(AccessToken::new(t)),
            Some(Consent::Deny) => Err(Error::AuthDenied("access_denied".into())),
            Some(Consent::ProviderError) | None => {
                Err(Error::AuthProvider("consent screen unavailable".into()))
            }
        };
        Box::pin(async move { r })
    }
}
