use async_stream::try_stream;
use fievar::Fields;
use futures::{future::BoxFuture, Stream, TryStreamExt};
use reqwest::{header::*, Client, RequestBuilder};
use tracing::debug;

use super::{
    multipart::MultipartBody,
    oauth::AccessToken,
    types::*,
    utils::{folder_query, json_or_api_err, IntoApiErr},
};
use crate::error::ApiError;

pub const RES_URI: &str = "https://www.googleapis.com/drive/v3/files";
pub const UPLOAD_URI: &str = "https://www.googleapis.com/upload/drive/v3/files";

lazy_static::lazy_static! {
    static ref GET_FIELDS: String = DriveFile::fields().join(",");
    static ref LIST_FIELDS: String = format!("nextPageToken,files({})", GET_FIELDS.as_str());
}

/// The remote calls the session needs from Drive.
pub trait DriveApi: Send + Sync {
    /// All non-trashed folders named exactly `name`, in provider order.
    fn find_folders<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DriveFile>, ApiError>>;

    fn create_folder<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<DriveFile, ApiError>>;

    /// Single-request upload of `bytes` described by `meta`.
    fn upload_multipart<'a>(
        &'a self,
        token: &'a AccessToken,
        meta: &'a UploadMetadata,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<DriveFile, ApiError>>;
}

/// [`DriveApi`] over the Drive v3 REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpDrive {
    http: Client,
    res_uri: String,
    upload_uri: String,
    api_key: Option<String>,
}

impl HttpDrive {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            res_uri: RES_URI.into(),
            upload_uri: UPLOAD_URI.into(),
            api_key: None,
        }
    }

    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn endpoints(mut self, res_uri: impl Into<String>, upload_uri: impl Into<String>) -> Self {
        self.res_uri = res_uri.into();
        self.upload_uri = upload_uri.into();
        self
    }

    fn authorized(&self, req: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        let req = req.header(AUTHORIZATION, token.bearer());
        match &self.api_key {
            None => req,
            Some(k) => req.query(&[("key", k.as_str())]),
        }
    }

    fn list_folders<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> impl Stream<Item = Result<DriveFile, ApiError>> + Send + 'a {
        let q = folder_query(name);
        let mut next_page_token: Option<String> = None;

        try_stream! {
            loop {
                let req = self.http.get(&self.res_uri).query(&[
                    ("q", q.as_str()),
                    ("fields", LIST_FIELDS.as_str()),
                    ("pageSize", "100"),
                    ("spaces", "drive"),
                ]);
                let req = match next_page_token.as_deref() {
                    None => req,
                    Some(t) => req.query(&[("pageToken", t)]),
                };

                debug!(folder = name, "listing folders");
                let res = self
                    .authorized(req, token)
                    .send()
                    .await
                    .map_err(IntoApiErr::into_api_err)?;
                let page = json_or_api_err::<ListResponse>(res).await?;

                // the query's name comparison is not trusted to be case-sensitive
                for f in page
                    .files
                    .into_iter()
                    .filter(|f| f.is_folder() && f.name == name)
                {
                    yield f;
                }

                match page.next_page_token {
                    None => break,
                    Some(t) => next_page_token = Some(t),
                };
            }
        }
    }
}

impl DriveApi for HttpDrive {
    fn find_folders<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DriveFile>, ApiError>> {
        Box::pin(self.list_folders(token, name).try_collect())
    }

    fn create_folder<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<DriveFile, ApiError>> {
        Box::pin(async move {
            let req = self
                .http
                .post(&self.res_uri)
                .query(&[("fields", GET_FIELDS.as_str())])
                .json(&NewFolder::new(name));

            debug!(folder = name, "creating folder");
            let res = self
                .authorized(req, token)
                .send()
                .await
                .map_err(IntoApiErr::into_api_err)?;

            json_or_api_err::<DriveFile>(res).await
        })
    }

    fn upload_multipart<'a>(
        &'a self,
        token: &'a AccessToken,
        meta: &'a UploadMetadata,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<DriveFile, ApiError>> {
        Box::pin(async move {
            let body = MultipartBody::new(meta, bytes).map_err(IntoApiErr::into_api_err)?;

            let req = self
                .http
                .post(&self.upload_uri)
                .query(&[("uploadType", "multipart"), ("fields", GET_FIELDS.as_str())])
                .header(CONTENT_TYPE, body.content_type())
                .body(body.into_bytes());

            debug!(file = %meta.name, size = bytes.len(), "uploading");
            let res = self
                .authorized(req, token)
                .send()
                .await
                .map_err(IntoApiErr::into_api_err)?;

            json_or_api_err::<DriveFile>(res).await
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use super::*;

    #[test]
    fn field_lists() {
        assert_eq!(GET_FIELDS.as_str(), "id,name,mimeType,parents");
        assert_eq!(
            LIST_FIELDS.as_str(),
            "nextPageToken,files(id,name,mimeType,parents)"
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_api_error() {
        // Nothing listens on port 9 of the loopback interface.
        let drive = HttpDrive::new(Client::new())
            .endpoints("http://127.0.0.1:9/files", "http://127.0.0.1:9/upload");
        let token = AccessToken::new("t");

        let e = drive.find_folders(&token, "Reports").await.unwrap_err();
        assert_eq!(e.status, None);

        let e = drive.create_folder(&token, "Reports").await.unwrap_err();
        assert_eq!(e.status, None);
    }

    struct Captured {
        head: String,
        body: Vec<u8>,
    }

    impl Captured {
        fn request_line(&self) -> &str {
            self.head.lines().next().unwrap_or_default()
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().skip(1).find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
            })
        }
    }

    async fn read_request(socket: &mut TcpStream) -> anyhow::Result<Captured> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await?;
            anyhow::ensure!(n > 0, "connection closed inside the request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break i + 4;
            }
        };

        let mut captured = Captured {
            head: String::from_utf8_lossy(&buf[..head_end]).into_owned(),
            body: Vec::new(),
        };
        let len = captured
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < head_end + len {
            let n = socket.read(&mut chunk).await?;
            anyhow::ensure!(n > 0, "connection closed inside the request body");
            buf.extend_from_slice(&chunk[..n]);
        }
        captured.body = buf[head_end..head_end + len].to_vec();

        Ok(captured)
    }

    /// Answers one connection per scripted response and hands back what it
    /// was sent.
    async fn serve(
        script: Vec<(u16, &'static str)>,
    ) -> anyhow::Result<(HttpDrive, JoinHandle<anyhow::Result<Vec<Captured>>>)> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let base = format!("http://{}", listener.local_addr()?);

        let server = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in script {
                let (mut socket, _) = listener.accept().await?;
                seen.push(read_request(&mut socket).await?);

                let res = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(res.as_bytes()).await?;
                socket.shutdown().await?;
            }
            anyhow::Ok(seen)
        });

        let drive = HttpDrive::new(Client::new())
            .endpoints(format!("{base}/files"), format!("{base}/upload"));
        Ok((drive, server))
    }

    #[tokio::test]
    async fn folder_listing_follows_pages() -> anyhow::Result<()> {
        let (drive, server) = serve(vec![
            (
                200,
                r#"{"nextPageToken":"page-2","files":[
                    {"id":"F5","name":"reports","mimeType":"application/vnd.google-apps.folder"},
                    {"id":"F1","name":"Reports","mimeType":"application/vnd.google-apps.folder"}
                ]}"#,
            ),
            (
                200,
                r#"{"files":[
                    {"id":"X2","name":"Reports","mimeType":"application/pdf"},
                    {"id":"F3","name":"Reports","mimeType":"application/vnd.google-apps.folder"}
                ]}"#,
            ),
        ])
        .await?;
        let drive = drive.api_key(Some("k1".into()));

        let found = drive.find_folders(&AccessToken::new("tok"), "Reports").await?;
        let ids: Vec<&str> = found.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["F1", "F3"]);

        let seen = server.await??;
        assert_eq!(seen.len(), 2);
        for req in &seen {
            assert!(req.request_line().starts_with("GET /files?"));
            assert!(req.request_line().contains("key=k1"));
            assert_eq!(req.header("authorization"), Some("Bearer tok"));
        }
        assert!(!seen[0].request_line().contains("pageToken="));
        assert!(seen[1].request_line().contains("pageToken=page-2"));

        Ok(())
    }

    #[tokio::test]
    async fn upload_is_a_single_multipart_request() -> anyhow::Result<()> {
        let (drive, server) = serve(vec![(
            200,
            r#"{"id":"X1","name":"a.pdf","mimeType":"application/pdf","parents":["F1"]}"#,
        )])
        .await?;

        let meta = UploadMetadata {
            name: "a.pdf".into(),
            mime_type: "application/pdf".into(),
            parents: vec!["F1".into()],
        };
        let f = drive
            .upload_multipart(&AccessToken::new("tok"), &meta, b"%PDF-1.4 test")
            .await?;
        assert_eq!(f.id, "X1");

        let seen = server.await??;
        let req = &seen[0];
        assert!(req.request_line().starts_with("POST /upload?"));
        assert!(req.request_line().contains("uploadType=multipart"));
        assert_eq!(req.header("authorization"), Some("Bearer tok"));

        let boundary = req
            .header("content-type")
            .and_then(|v| v.strip_prefix("multipart/related; boundary="))
            .map(str::to_string);
        let boundary = match boundary {
            Some(b) => b,
            None => anyhow::bail!("unexpected content type {:?}", req.header("content-type")),
        };

        let body = String::from_utf8(req.body.clone())?;
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
        assert!(body.contains(r#""parents":["F1"]"#));
        assert!(body.contains("%PDF-1.4 test"));

        Ok(())
    }

    #[tokio::test]
    async fn error_status_and_message_are_kept() -> anyhow::Result<()> {
        let (drive, server) = serve(vec![(
            403,
            r#"{"error":{"code":403,"message":"Insufficient Permission"}}"#,
        )])
        .await?;

        let e = drive
            .create_folder(&AccessToken::new("tok"), "Reports")
            .await
            .unwrap_err();
        assert_eq!(e, ApiError::new(Some(403), "Insufficient Permission"));

        let seen = server.await??;
        assert!(seen[0].request_line().starts_with("POST /files?"));
        assert!(String::from_utf8(seen[0].body.clone())?.contains(r#""name":"Reports""#));

        Ok(())
    }
}
