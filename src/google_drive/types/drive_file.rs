use fievar::Fields;
use serde::Deserialize;

use crate::types::*;

pub const FOLDER: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Deserialize, Fields)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    #[fievar(name = "mimeType")]
    pub mime_type: String,
    pub parents: Option<Vec<String>>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER
    }
}

impl From<DriveFile> for FolderRef {
    fn from(file: DriveFile) -> Self {
        FolderRef::resolved(file.name, FolderId(file.id))
    }
}

impl From<DriveFile> for FileId {
    fn from(file: DriveFile) -> Self {
        FileId(file.id)
    }
}
