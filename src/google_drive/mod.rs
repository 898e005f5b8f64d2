mod api;
mod folder;
mod loopback;
mod multipart;
mod oauth;
mod types;
mod upload;
mod utils;

pub use api::{DriveApi, HttpDrive, RES_URI, UPLOAD_URI};
pub use folder::{DuplicatePolicy, FolderResolver};
pub use loopback::LoopbackAuthorizer;
pub use oauth::*;
pub use types::{DriveFile, UploadMetadata, FOLDER};
pub use upload::UploadExecutor;
