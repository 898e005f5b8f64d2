mod drive_file;
mod metadata;

pub use drive_file::{DriveFile, FOLDER};
pub use metadata::{NewFolder, UploadMetadata};

use serde::Deserialize;

/// Successful answer of the token endpoint. Refresh tokens and lifetimes are
/// not kept, so only the access token is read.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub files: Vec<DriveFile>,
}
