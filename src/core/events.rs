use crate::core::model::{ByteRange, UploadId, UploadState};
use reqwest::StatusCode;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started { upload_id: UploadId, source: PathBuf, total: u64, chunks: usize },
    StateChanged { upload_id: UploadId, state: UploadState },
    ChunkSent {
        upload_id: UploadId,
        index: usize,
        chunks: usize,
        range: ByteRange,
        status: StatusCode,
    },
    Progress { upload_id: UploadId, sent: u64, total: u64 },
    Error { scope: String, message: String },
    Info { scope: String, message: String },
}
