//! File transfer pipelines — spec.md §4.6. RETR streams a file to the
//! data channel; STOR drains the data channel into a file.

use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// RETR reads in chunks this large before writing them on to the data
/// channel — sized to match the file-stream scratch's chunk buffer in
/// spec.md §3, which backs both the plain whole-file copy and the
/// watermark-paced TLS path (TLS write costs are what the watermark in
/// the original design paces against; under `tokio`'s own buffered/awaited
/// writes that backpressure falls out of `write_all` naturally).
const CHUNK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub enum TransferError {
    Open(std::io::Error),
    Io(std::io::Error),
    OutOfSpace,
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::Open(e) => write!(f, "open failed: {e}"),
            TransferError::Io(e) => write!(f, "transfer I/O failed: {e}"),
            TransferError::OutOfSpace => write!(f, "insufficient storage"),
        }
    }
}

/// Opens `path` read-only and returns its size. Kept separate from the
/// pump so the control channel's `150` reply can be sent with the size
/// already known to have been resolvable, matching the ordering guarantee
/// in spec.md §5.2 (the `150` always precedes the first data byte).
pub async fn open_retr(path: &Path) -> Result<(tokio::fs::File, u64), TransferError> {
    let file = tokio::fs::File::open(path).await.map_err(TransferError::Open)?;
    let metadata = file.metadata().await.map_err(TransferError::Open)?;
    Ok((file, metadata.len()))
}

/// Streams `size` bytes of `file` to `data`, `CHUNK_SIZE` bytes at a time.
/// Returns the number of bytes actually copied, which the caller compares
/// against `size` to decide between `226` and a mid-transfer `426`.
pub async fn pump_retr(
    mut file: tokio::fs::File,
    size: u64,
    data: &mut crate::stream::Channel,
) -> Result<u64, TransferError> {
    let mut buf = vec![0u8; CHUNK_SIZE.min(size.max(1) as usize)];
    let mut sent = 0u64;

    while sent < size {
        let want = ((size - sent) as usize).min(buf.len());
        let n = file.read(&mut buf[..want]).await.map_err(TransferError::Io)?;
        if n == 0 {
            break;
        }

        data.write_all(&buf[..n]).await.map_err(TransferError::Io)?;
        sent += n as u64;
    }

    data.flush().await.map_err(TransferError::Io)?;
    Ok(sent)
}

/// Opens `path` for writing with create+truncate semantics and `0o644`
/// permissions.
pub async fn open_stor(path: &Path) -> Result<tokio::fs::File, TransferError> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
        .await
        .map_err(TransferError::Open)
}

/// Drains `data` into `file` until EOF, then flushes and fsyncs. ENOSPC
/// while writing is reported distinctly so the caller can reply `452`
/// rather than a generic `550`.
pub async fn pump_stor(
    file: &mut tokio::fs::File,
    data: &mut crate::stream::Channel,
) -> Result<u64, TransferError> {
    let mut buf = vec![0u8; 256 * 1024];
    let mut received = 0u64;

    loop {
        let n = data.read(&mut buf).await.map_err(TransferError::Io)?;
        if n == 0 {
            break;
        }

        if let Err(e) = file.write_all(&buf[..n]).await {
            if e.raw_os_error() == Some(libc::ENOSPC) {
                return Err(TransferError::OutOfSpace);
            }
            return Err(TransferError::Io(e));
        }

        received += n as u64;
    }

    file.flush().await.map_err(TransferError::Io)?;
    file.sync_all().await.map_err(TransferError::Io)?;
    Ok(received)
}
