pub mod core;
pub mod plugins;

pub use crate::core::error::{Result, UploadError};
pub use crate::core::events::UploadEvent;
pub use crate::core::model::{
    ByteRange, StatusPolicy, UploadConfig, UploadId, UploadOutcome, UploadState, DEFAULT_CHUNK_LIMIT,
    DEFAULT_UPLOAD_LIMIT,
};
pub use crate::core::planner::plan_ranges;
pub use crate::core::session::ChunkedUploadSession;
pub use crate::plugins::http::driver::HttpTransport;
pub use crate::plugins::transport::{BodyReader, PutRequest, TransportContext, TransportResponse, UploadTransport};
