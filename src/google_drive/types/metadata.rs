use serde::Serialize;

use super::FOLDER;

/// Body of a folder create call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFolder<'a> {
    pub name: &'a str,
    pub mime_type: &'static str,
}

impl<'a> NewFolder<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            mime_type: FOLDER,
        }
    }
}

/// JSON part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
}
