use reqwest::Response;
use serde::{de::DeserializeOwned, Deserialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    // Drive API: {"error": {"code": 404, "message": "..."}}
    Api { message: String },
    // Token endpoint: {"error": "invalid_grant", "error_description": "..."}
    Code(String),
}

pub trait IntoApiErr {
    fn into_api_err(self) -> ApiError;
}

impl IntoApiErr for reqwest::Error {
    fn into_api_err(self) -> ApiError {
        self.into()
    }
}

impl IntoApiErr for serde_json::Error {
    fn into_api_err(self) -> ApiError {
        ApiError::new(None, format!("unexpected response body: {self}"))
    }
}

/// Decodes a successful response as `T`, or turns the status and the
/// provider's error message into an [`ApiError`].
pub async fn json_or_api_err<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    let status = res.status();

    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(ApiError::new(Some(status.as_u16()), error_message(&text)));
    }

    let bytes = res.bytes().await.map_err(IntoApiErr::into_api_err)?;
    serde_json::from_slice::<T>(&bytes).map_err(IntoApiErr::into_api_err)
}

/// Picks the human readable part out of a Google error body, falling back
/// to the raw text.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail::Api { message },
        }) => message,
        Ok(ErrorBody {
            error: ErrorDetail::Code(code),
        }) => code,
        Err(_) => body.trim().to_string(),
    }
}

/// Quotes `value` for use inside a single-quoted Drive query string.
pub fn escape_query_value(value: &str) -> String {
    let mut s = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            s.push('\\');
        }
        s.push(c);
    }
    s
}

/// Query selecting non-trashed folders named exactly `name`.
pub fn folder_query(name: &str) -> String {
    format!(
        "mimeType = '{}' and name = '{}' and trashed = false",
        super::types::FOLDER,
        escape_query_value(name)
    )
}
