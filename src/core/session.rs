use crate::core::error::{Result, UploadError};
use crate::core::events::UploadEvent;
use crate::core::model::*;
use crate::core::planner::plan_ranges;
use crate::core::source::UploadSource;
use crate::plugins::transport::{PutRequest, UploadTransport};
use bytes::Bytes;
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Drives uploads against a session URL created elsewhere.
///
/// Chunks go out strictly in file order: each PUT is awaited before the
/// next one is built. Nothing is retried here and a failed upload is not
/// cleaned up; call [`ChunkedUploadSession::delete_session`] to abandon it.
#[derive(Clone)]
pub struct ChunkedUploadSession {
    transport: Arc<dyn UploadTransport>,
    config: UploadConfig,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl ChunkedUploadSession {
    pub fn new(transport: Arc<dyn UploadTransport>, config: UploadConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { transport, config, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    /// Sends the whole file in one PUT. Succeeds iff the response is 200/201.
    pub async fn upload_whole(&self, upload_url: &str, path: &Path) -> Result<UploadOutcome> {
        validate_upload_url(upload_url)?;
        let upload_id = Uuid::new_v4();
        self.run_attempt(upload_id, path, upload_url, |size| {
            Ok(ByteRange::whole(size).into_iter().collect())
        })
        .await
    }

    /// Sends the file as consecutive ranges of at most `chunk_limit` bytes.
    pub async fn upload_in_chunks(
        &self,
        upload_url: &str,
        path: &Path,
        chunk_limit: u64,
    ) -> Result<UploadOutcome> {
        if chunk_limit == 0 {
            return Err(UploadError::InvalidArgument(
                "chunk limit must be greater than zero".to_string(),
            ));
        }
        validate_upload_url(upload_url)?;
        let upload_id = Uuid::new_v4();
        self.run_attempt(upload_id, path, upload_url, |size| plan_ranges(size, chunk_limit))
            .await
    }

    /// Abandons a server-side session. True iff the server answers 204.
    pub async fn delete_session(&self, upload_url: &str) -> Result<bool> {
        validate_upload_url(upload_url)?;
        let resp = self.transport.delete(upload_url).await?;
        let deleted = resp.status == StatusCode::NO_CONTENT;
        if deleted {
            info!(url = upload_url, "upload session deleted");
        } else {
            warn!(url = upload_url, status = %resp.status, "upload session not deleted");
        }
        Ok(deleted)
    }

    async fn run_attempt<F>(
        &self,
        upload_id: UploadId,
        path: &Path,
        upload_url: &str,
        plan: F,
    ) -> Result<UploadOutcome>
    where
        F: FnOnce(u64) -> Result<Vec<ByteRange>>,
    {
        self.set_state(upload_id, UploadState::Idle);

        let result = match UploadSource::open(path, self.config.upload_limit).await {
            Ok(source) => {
                self.set_state(upload_id, UploadState::StreamOpened);
                match plan(source.size()) {
                    Ok(ranges) => self.send_ranges(upload_id, upload_url, &source, &ranges).await,
                    Err(e) => Err(e),
                }
                // source dropped here, closing the file
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) if outcome.success => self.set_state(upload_id, UploadState::Completed),
            Ok(outcome) => {
                warn!(%upload_id, status = ?outcome.status, "upload rejected");
                self.set_state(upload_id, UploadState::Failed);
            }
            Err(e) => {
                let _ = self.event_tx.send(UploadEvent::Error {
                    scope: format!("upload({})", upload_id),
                    message: format!("{:#}", e),
                });
                self.set_state(upload_id, UploadState::Failed);
            }
        }
        result
    }

    async fn send_ranges(
        &self,
        upload_id: UploadId,
        upload_url: &str,
        source: &UploadSource,
        ranges: &[ByteRange],
    ) -> Result<UploadOutcome> {
        let total = source.size();
        let _ = self.event_tx.send(UploadEvent::Started {
            upload_id,
            source: source.path().to_path_buf(),
            total,
            chunks: ranges.len(),
        });
        info!(
            %upload_id,
            transport = self.transport.name(),
            path = %source.path().display(),
            total,
            chunks = ranges.len(),
            "begin upload"
        );

        let mut outcome = UploadOutcome {
            id: upload_id,
            success: false,
            status: None,
            body: Bytes::new(),
            chunks_sent: 0,
            bytes_sent: 0,
        };

        if ranges.is_empty() {
            info!(%upload_id, "empty file, nothing to send");
            let _ = self.event_tx.send(UploadEvent::Info {
                scope: format!("upload({})", upload_id),
                message: "empty file, nothing to send".to_string(),
            });
            outcome.success = true;
            return Ok(outcome);
        }

        for (index, range) in ranges.iter().enumerate() {
            self.set_state(upload_id, UploadState::SendingChunk);
            debug!(%upload_id, index, range = %range, "sending chunk");

            let req = PutRequest {
                url: upload_url.to_string(),
                content_length: range.length,
                content_range: range.content_range(),
                body: source.slice(range).await?,
            };
            let resp = match self.transport.put(req).await {
                Ok(resp) => resp,
                // a failed body read surfaces from the transport as a request error
                Err(e) => return Err(source.take_read_error().unwrap_or(e)),
            };

            outcome.chunks_sent += 1;
            outcome.bytes_sent += range.length;
            outcome.status = Some(resp.status);
            outcome.body = resp.body;

            let _ = self.event_tx.send(UploadEvent::ChunkSent {
                upload_id,
                index,
                chunks: ranges.len(),
                range: *range,
                status: resp.status,
            });
            let _ = self.event_tx.send(UploadEvent::Progress {
                upload_id,
                sent: outcome.bytes_sent,
                total,
            });

            let is_last = index + 1 == ranges.len();
            if !is_last && !resp.status.is_success() {
                warn!(%upload_id, index, range = %range, status = %resp.status, "intermediate chunk not accepted");
                let _ = self.event_tx.send(UploadEvent::Info {
                    scope: format!("chunk {} ({})", index, range),
                    message: format!("server answered {}", resp.status),
                });
                if self.config.status_policy == StatusPolicy::EveryChunk {
                    return Ok(outcome);
                }
            }
        }

        outcome.success = outcome.status.map_or(false, is_upload_complete);
        info!(%upload_id, status = ?outcome.status, success = outcome.success, "upload sent");
        Ok(outcome)
    }

    fn set_state(&self, upload_id: UploadId, state: UploadState) {
        debug!(%upload_id, ?state, "upload state");
        let _ = self.event_tx.send(UploadEvent::StateChanged { upload_id, state });
    }
}

fn validate_upload_url(upload_url: &str) -> Result<()> {
    let url = Url::parse(upload_url)
        .map_err(|e| UploadError::InvalidArgument(format!("upload url {:?}: {}", upload_url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UploadError::InvalidArgument(format!(
            "upload url must be http(s), got scheme {:?}",
            other
        ))),
    }
}
