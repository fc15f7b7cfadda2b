use crate::core::error::{Result, UploadError};
use crate::core::model::ByteRange;
use crate::plugins::transport::BodyReader;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, ReadBuf};

type ErrorSlot = Arc<Mutex<Option<io::Error>>>;

/// Wraps a chunk body and keeps the first read failure, so the session can
/// report it as an I/O error after the transport gives up on the request.
/// Ending before `remaining` bytes counts as `UnexpectedEof`.
struct RecordingReader<R> {
    inner: R,
    remaining: u64,
    error: ErrorSlot,
}

impl<R> RecordingReader<R> {
    fn record(&self, err: io::Error) -> io::Error {
        if let Ok(mut slot) = self.error.lock() {
            if slot.is_none() {
                *slot = Some(io::Error::new(err.kind(), err.to_string()));
            }
        }
        err
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for RecordingReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = (buf.filled().len() - before) as u64;
                if n == 0 && self.remaining > 0 && buf.remaining() > 0 {
                    let err = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file ended {} bytes before the end of the chunk", self.remaining),
                    );
                    return Poll::Ready(Err(self.record(err)));
                }
                self.remaining = self.remaining.saturating_sub(n);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(self.record(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Read side of one upload. Owns the file handle for the whole attempt;
/// dropping the source closes it, whichever way the upload ends.
pub struct UploadSource {
    path: PathBuf,
    file: File,
    size: u64,
    read_error: ErrorSlot,
}

impl UploadSource {
    /// Opens `path` and refuses files of `upload_limit` bytes or more.
    pub async fn open(path: &Path, upload_limit: u64) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| UploadError::io(path, e))?
            .len();

        if size >= upload_limit {
            return Err(UploadError::PayloadTooLarge { size, limit: upload_limit });
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            read_error: Arc::new(Mutex::new(None)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Streams exactly the bytes of `range`.
    ///
    /// The returned reader shares the file cursor, so it must be drained
    /// before the next slice is taken.
    pub async fn slice(&self, range: &ByteRange) -> Result<BodyReader> {
        let mut handle = self
            .file
            .try_clone()
            .await
            .map_err(|e| UploadError::io(&self.path, e))?;
        handle
            .seek(std::io::SeekFrom::Start(range.start))
            .await
            .map_err(|e| UploadError::io(&self.path, e))?;
        Ok(Box::new(RecordingReader {
            inner: handle.take(range.length),
            remaining: range.length,
            error: self.read_error.clone(),
        }))
    }

    /// First read failure seen by any slice, as `UploadError::Io`.
    pub fn take_read_error(&self) -> Option<UploadError> {
        let err = self.read_error.lock().ok()?.take()?;
        Some(UploadError::io(&self.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
        f
    }

    #[tokio::test]
    async fn slice_reads_only_the_range() {
        let f = temp_file(b"0123456789");
        let source = UploadSource::open(f.path(), 100).await.unwrap();
        assert_eq!(source.size(), 10);

        let range = ByteRange { start: 4, end: 7, length: 4, total_size: 10 };
        let mut buf = Vec::new();
        source.slice(&range).await.unwrap().read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"4567");

        let tail = ByteRange { start: 8, end: 9, length: 2, total_size: 10 };
        let mut buf = Vec::new();
        source.slice(&tail).await.unwrap().read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"89");
    }

    /// Yields `ok` bytes, then fails.
    struct FailingReader {
        ok: usize,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            if self.ok == 0 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk gone")));
            }
            let n = self.ok.min(buf.remaining());
            buf.put_slice(&vec![b'x'; n]);
            self.ok -= n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_read_is_kept_for_the_session() {
        let slot: ErrorSlot = Arc::new(Mutex::new(None));
        let mut reader = RecordingReader { inner: FailingReader { ok: 3 }, remaining: 8, error: slot.clone() };

        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(buf, b"xxx");
        assert_eq!(slot.lock().unwrap().as_ref().unwrap().kind(), io::ErrorKind::Other);
    }

    #[tokio::test]
    async fn short_file_is_unexpected_eof() {
        let f = temp_file(b"0123456789");
        let source = UploadSource::open(f.path(), 100).await.unwrap();
        f.as_file().set_len(6).unwrap();

        let range = ByteRange { start: 4, end: 7, length: 4, total_size: 10 };
        let mut buf = Vec::new();
        let err = source.slice(&range).await.unwrap().read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(matches!(source.take_read_error(), Some(UploadError::Io { .. })));
        assert!(source.take_read_error().is_none());
    }

    #[tokio::test]
    async fn limit_is_exclusive() {
        let f = temp_file(&[0u8; 16]);
        let err = UploadSource::open(f.path(), 16).await.err().unwrap();
        assert!(matches!(err, UploadError::PayloadTooLarge { size: 16, limit: 16 }));
        assert!(UploadSource::open(f.path(), 17).await.is_ok());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadSource::open(&dir.path().join("nope.bin"), 100)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, UploadError::Io { .. }));
    }
}
