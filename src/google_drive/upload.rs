use std::sync::Arc;

use tracing::{info, warn};

use super::{api::DriveApi, oauth::Session, types::UploadMetadata};
use crate::{
    error::{Error, Result},
    types::{FileId, UploadRequest},
};

/// Performs single-request multipart uploads.
pub struct UploadExecutor {
    drive: Arc<dyn DriveApi>,
}

impl UploadExecutor {
    pub fn new(drive: Arc<dyn DriveApi>) -> Self {
        Self { drive }
    }

    /// Uploads `request` into its target folder.
    ///
    /// Fails with [`Error::UploadPrecondition`] without touching the network
    /// unless `session` is authorized and the target folder is resolved.
    pub async fn upload(&self, session: &Session, request: &UploadRequest) -> Result<FileId> {
        let token = session
            .access_token()
            .ok_or(Error::UploadPrecondition("session is not authorized"))?;
        let parent = request.parent()?;

        if request.file_name.trim().is_empty() {
            return Err(Error::Validation("file name must not be empty".into()));
        }

        let meta = UploadMetadata {
            name: request.file_name.clone(),
            mime_type: request.mime_type.clone(),
            parents: vec![parent.0.clone()],
        };

        match self
            .drive
            .upload_multipart(token, &meta, &request.file_bytes)
            .await
        {
            Ok(f) => {
                info!(file = %meta.name, id = %f.id, folder = %parent, "uploaded");
                Ok(f.into())
            }
            Err(e) => {
                warn!(file = %meta.name, error = %e, "upload failed");
                Err(Error::UploadRequest(e))
            }
        }
    }
}
