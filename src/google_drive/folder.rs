use std::{collections::HashMap, str::FromStr, sync::Arc};

use serde::Deserialize;
use tracing::{info, warn};

use super::{api::DriveApi, oauth::AccessToken};
use crate::{
    error::{Error, Result},
    types::{FolderId, FolderRef},
};

/// What to do when a folder name matches more than one folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Use the first folder the provider lists.
    #[default]
    First,
    /// Refuse to pick one.
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "reject" => Ok(Self::Reject),
            other => Err(Error::Config(format!(
                "unknown duplicate folder policy `{other}` (expected `first` or `reject`)"
            ))),
        }
    }
}

/// Find-or-create of the session's destination folder.
///
/// Names resolved during the session are remembered, so asking for the same
/// name again returns the same id even if the remote listing has not caught
/// up with a folder created moments ago. The memory is dropped by
/// [`FolderResolver::reset`].
///
/// Lookup and creation are two separate calls. Another client creating the
/// same name in between ends up with a second folder of that name.
pub struct FolderResolver {
    drive: Arc<dyn DriveApi>,
    policy: DuplicatePolicy,
    current: FolderRef,
    resolved: HashMap<String, FolderId>,
}

impl FolderResolver {
    pub fn new(drive: Arc<dyn DriveApi>) -> Self {
        Self {
            drive,
            policy: DuplicatePolicy::default(),
            current: FolderRef::default(),
            resolved: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn current(&self) -> &FolderRef {
        &self.current
    }

    /// Forgets the current folder and every name resolved so far.
    pub fn reset(&mut self) {
        self.current = FolderRef::default();
        self.resolved.clear();
    }

    pub async fn resolve_or_create(&mut self, token: &AccessToken, name: &str) -> Result<FolderRef> {
        if name.trim().is_empty() {
            return Err(Error::Validation("folder name must not be empty".into()));
        }

        self.current = FolderRef::unresolved(name);

        if let Some(id) = self.resolved.get(name) {
            info!(folder = name, id = %id, "folder already resolved in this session");
            self.current = FolderRef::resolved(name, id.clone());
            return Ok(self.current.clone());
        }

        let id = self.lookup_or_create(token, name).await?;

        self.resolved.insert(name.to_string(), id.clone());
        self.current = FolderRef::resolved(name, id);
        Ok(self.current.clone())
    }

    async fn lookup_or_create(&self, token: &AccessToken, name: &str) -> Result<FolderId> {
        let matches = self
            .drive
            .find_folders(token, name)
            .await
            .map_err(Error::FolderLookup)?;

        if matches.len() > 1 {
            let ids: Vec<&str> = matches.iter().map(|f| f.id.as_str()).collect();
            if self.policy == DuplicatePolicy::Reject {
                warn!(folder = name, ?ids, "folder name is ambiguous, refusing to pick one");
                return Err(Error::AmbiguousFolder {
                    name: name.to_string(),
                    count: matches.len(),
                });
            }
            warn!(folder = name, ?ids, "folder name is ambiguous, using the first match");
        }

        if let Some(f) = matches.into_iter().next() {
            info!(folder = name, id = %f.id, "found existing folder");
            return Ok(FolderId(f.id));
        }

        let f = self
            .drive
            .create_folder(token, name)
            .await
            .map_err(Error::FolderCreate)?;

        info!(folder = name, id = %f.id, "created folder");
        Ok(FolderId(f.id))
    }
}
