use std::{fmt, path::Path};

use anyhow::Context;

use crate::error::{Error, Result};

/// Identifier of an uploaded file, as issued by Drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId(pub String);

/// Identifier of a folder, as issued by Drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The destination folder of a session.
///
/// A `FolderRef` is resolved exactly when it carries an id. Only the folder
/// resolver hands out resolved refs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderRef {
    name: String,
    id: Option<FolderId>,
}

impl FolderRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub(crate) fn resolved(name: impl Into<String>, id: FolderId) -> Self {
        Self {
            name: name.into(),
            id: Some(id),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&FolderId> {
        self.id.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_some()
    }
}

/// A local file waiting for a destination.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub bytes: Vec<u8>,
    pub name: String,
    pub mime_type: String,
}

impl LocalFile {
    /// Reads `path` into memory. The media type is sniffed from the content
    /// unless `mime_type` is given.
    pub async fn read(path: &Path, mime_type: Option<&str>) -> anyhow::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("'{}' does not name a file", path.display()))?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Could not read file '{}'", path.display()))?;

        let mime_type = match mime_type {
            Some(m) => m.to_string(),
            None => tree_magic_mini::from_u8(&bytes).to_string(),
        };

        Ok(Self {
            bytes,
            name,
            mime_type,
        })
    }
}

/// One upload attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub target_folder: FolderRef,
}

impl UploadRequest {
    pub fn new(file: LocalFile, target_folder: FolderRef) -> Self {
        Self {
            file_bytes: file.bytes,
            file_name: file.name,
            mime_type: file.mime_type,
            target_folder,
        }
    }

    /// The folder id, or the precondition that is not met.
    pub(crate) fn parent(&self) -> Result<&FolderId> {
        self.target_folder
            .id()
            .ok_or(Error::UploadPrecondition("target folder is not resolved"))
    }
}
