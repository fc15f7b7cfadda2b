use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, USER_AGENT};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::core::error::{Result, UploadError};
use crate::plugins::transport::{PutRequest, TransportContext, TransportResponse, UploadTransport};

/// reqwest-backed transport for upload session URLs.
pub struct HttpTransport {
    client: reqwest::Client,
    ctx: TransportContext,
}

impl HttpTransport {
    pub fn new(ctx: TransportContext) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(UploadError::transport)?;
        Ok(Self { client, ctx })
    }

    /// Upload session URLs are pre-authorized, so only session management
    /// (`with_auth`) carries the bearer token; chunk PUTs never do.
    fn build_headers(ctx: &TransportContext, with_auth: bool) -> Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, header_value("user-agent", &ctx.user_agent)?);
        if let (true, Some(token)) = (with_auth, &ctx.bearer_token) {
            h.insert(AUTHORIZATION, header_value("authorization", &format!("Bearer {}", token))?);
        }
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| UploadError::InvalidArgument(format!("invalid header {}: {}", k, e)))?;
            h.insert(name, header_value(k, v)?);
        }
        Ok(h)
    }

    async fn finish(resp: reqwest::Response) -> Result<TransportResponse> {
        let status = resp.status();
        let body = resp.bytes().await.map_err(UploadError::transport)?;
        Ok(TransportResponse { status, body })
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| UploadError::InvalidArgument(format!("invalid header {}: {}", name, e)))
}

#[async_trait]
impl UploadTransport for HttpTransport {
    fn name(&self) -> &'static str { "http-transport" }

    async fn put(&self, req: PutRequest) -> Result<TransportResponse> {
        let mut headers = Self::build_headers(&self.ctx, false)?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(req.content_length));
        headers.insert(CONTENT_RANGE, header_value("content-range", &req.content_range)?);

        debug!(url = %req.url, range = %req.content_range, "PUT chunk");
        let body = reqwest::Body::wrap_stream(ReaderStream::new(req.body));
        let resp = self.client
            .put(&req.url)
            .headers(headers)
            .timeout(Duration::from_secs(self.ctx.timeout_secs))
            .body(body)
            .send()
            .await
            .map_err(UploadError::transport)?;

        Self::finish(resp).await
    }

    async fn delete(&self, url: &str) -> Result<TransportResponse> {
        let headers = Self::build_headers(&self.ctx, true)?;

        debug!(url, "DELETE upload session");
        let resp = self.client
            .delete(url)
            .headers(headers)
            .timeout(Duration::from_secs(self.ctx.timeout_secs))
            .send()
            .await
            .map_err(UploadError::transport)?;

        Self::finish(resp).await
    }
}
