use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::HashMap;
use tokio::io::AsyncRead;

use crate::core::error::Result;

/// Request body handed to a transport. Reads exactly `content_length` bytes.
pub type BodyReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// One `PUT <upload_url>` carrying a byte range of the file.
pub struct PutRequest {
    pub url: String,
    pub content_length: u64,
    pub content_range: String,
    pub body: BodyReader,
}

impl std::fmt::Debug for PutRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutRequest")
            .field("url", &self.url)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct TransportContext {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<String>,
    pub headers: HashMap<String, String>,
}

impl Default for TransportContext {
    fn default() -> Self {
        Self {
            user_agent: "OrangeUploader/0.1".to_string(),
            timeout_secs: 60,
            bearer_token: None,
            headers: HashMap::new(),
        }
    }
}

/// Network side of an upload session.
///
/// Implementations send one request per call and return once the response
/// has arrived. Connection failures and timeouts are `UploadError::Transport`;
/// any HTTP status, including errors, is a normal response.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn put(&self, req: PutRequest) -> Result<TransportResponse>;

    async fn delete(&self, url: &str) -> Result<TransportResponse>;
}
