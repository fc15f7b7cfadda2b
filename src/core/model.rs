use bytes::Bytes;
use reqwest::StatusCode;
use std::fmt;
use uuid::Uuid;

pub type UploadId = Uuid;

/// Files at or above this many bytes are refused before any request is made.
pub const DEFAULT_UPLOAD_LIMIT: u64 = 60_000_000;

/// Chunk size used when the caller does not pick one.
pub const DEFAULT_CHUNK_LIMIT: u64 = 1024;

/// One inclusive `[start, end]` slice of the file being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub length: u64,
    pub total_size: u64,
}

impl ByteRange {
    /// `Content-Range` header value, e.g. `bytes 0-3/10`.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }

    /// Range covering a whole non-empty file.
    pub fn whole(total_size: u64) -> Option<Self> {
        if total_size == 0 {
            return None;
        }
        Some(Self {
            start: 0,
            end: total_size - 1,
            length: total_size,
            total_size,
        })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.start, self.end, self.total_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    StreamOpened,
    SendingChunk,
    Completed,
    Failed,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Failed)
    }
}

/// Which responses decide whether a chunked upload succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Only the final chunk's status counts; intermediate statuses are logged.
    #[default]
    LastChunk,
    /// Every intermediate chunk must be 2xx and the final one 200/201.
    /// The first violation stops the upload.
    EveryChunk,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_limit: u64,
    pub status_policy: StatusPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            status_policy: StatusPolicy::default(),
        }
    }
}

/// Result of one upload attempt.
///
/// A rejected upload is not an error: `success` is false and `status`/`body`
/// hold the response that decided it.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub id: UploadId,
    pub success: bool,
    /// `None` when no request was needed (empty file).
    pub status: Option<StatusCode>,
    pub body: Bytes,
    pub chunks_sent: usize,
    pub bytes_sent: u64,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// 200 OK or 201 Created: the session has received the whole file.
pub fn is_upload_complete(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_is_inclusive() {
        let r = ByteRange { start: 4, end: 7, length: 4, total_size: 10 };
        assert_eq!(r.content_range(), "bytes 4-7/10");
    }

    #[test]
    fn whole_range_of_empty_file_is_none() {
        assert_eq!(ByteRange::whole(0), None);
        assert_eq!(
            ByteRange::whole(5),
            Some(ByteRange { start: 0, end: 4, length: 5, total_size: 5 })
        );
    }

    #[test]
    fn only_ok_and_created_complete_an_upload() {
        assert!(is_upload_complete(StatusCode::OK));
        assert!(is_upload_complete(StatusCode::CREATED));
        assert!(!is_upload_complete(StatusCode::ACCEPTED));
        assert!(!is_upload_complete(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
