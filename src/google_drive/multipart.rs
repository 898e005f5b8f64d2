use super::types::UploadMetadata;

/// A `multipart/related` body: JSON metadata first, file content second.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new(meta: &UploadMetadata, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Self::with_boundary(random_boundary(), meta, bytes)
    }

    pub fn with_boundary(
        boundary: String,
        meta: &UploadMetadata,
        bytes: &[u8],
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(meta)?;

        let mut body = Vec::with_capacity(json.len() + bytes.len() + 4 * boundary.len() + 128);

        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(&json);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", meta.mime_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Ok(Self { boundary, body })
    }

    pub fn content_type(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }
}

fn random_boundary() -> String {
    format!("drive_upload_{:032x}", rand::random::<u128>())
}
