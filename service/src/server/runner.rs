use std::io::{self, Write};
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::http::StatusCode;
use bytes::Bytes;
use tokio::sync::{OwnedSemaphorePermit, mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use dbfs::{CancelToken, Provider, TableArtifact};
use dbfs_core::config::Limits;

const CHUNK_BYTES: usize = 64 * 1024;

pub(super) fn io_timeout(limits: &Limits) -> Duration {
    Duration::from_millis(limits.max_io_ms)
}

pub(super) async fn acquire(
    state: &super::AppState,
) -> Result<OwnedSemaphorePermit, (StatusCode, Json<super::ErrorBody>)> {
    state
        .inner
        .io_concurrency
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| super::err(StatusCode::SERVICE_UNAVAILABLE, "busy", "server is busy"))
}

/// Runs `f` on the blocking pool. The permit is released when `f` returns, not when the
/// caller gives up; on timeout `cancel` interrupts the SQLite work so that happens soon.
async fn run_blocking<T>(
    permit: OwnedSemaphorePermit,
    timeout: Duration,
    cancel: CancelToken,
    f: impl FnOnce() -> dbfs::Result<T> + Send + 'static,
) -> Result<T, (StatusCode, Json<super::ErrorBody>)>
where
    T: Send + 'static,
{
    let mut handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        f()
    });
    let sleep = tokio::time::sleep(timeout);
    tokio::pin!(sleep);
    let join = tokio::select! {
        res = &mut handle => res,
        _ = &mut sleep => {
            cancel.cancel();
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "dbfs request timed out");
            return Err(super::err(StatusCode::REQUEST_TIMEOUT, "timeout", "request timed out"));
        }
    };

    let result = join.map_err(|err| super::map_err(dbfs_core::Error::Io(err.to_string())))?;
    result.map_err(super::map_err)
}

/// Runs `op` against a provider whose table work is cancelled when the request times out.
pub(super) async fn run_tree<T>(
    state: super::AppState,
    permit: OwnedSemaphorePermit,
    op: impl FnOnce(&Provider) -> dbfs::Result<T> + Send + 'static,
) -> Result<T, (StatusCode, Json<super::ErrorBody>)>
where
    T: Send + 'static,
{
    let timeout = io_timeout(&state.inner.limits);
    let cancel = CancelToken::new();
    let provider = state.inner.provider.with_cancel(cancel.clone());
    run_blocking(permit, timeout, cancel, move || op(&provider)).await
}

/// Streams the encoded artifact as a response body.
///
/// The export runs on the blocking pool holding `permit` and stops when the client goes
/// away or when the request's I/O budget runs out; either way the body ends early.
pub(super) fn stream_artifact(
    state: &super::AppState,
    permit: OwnedSemaphorePermit,
    artifact: TableArtifact,
) -> Body {
    let timeout = io_timeout(&state.inner.limits);
    let cancel = CancelToken::new();
    let artifact = artifact.with_cancel(cancel.clone());
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(16);
    let (done_tx, done_rx) = oneshot::channel::<()>();

    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let _done = done_tx;
        let mut writer = ChannelWriter::new(tx.clone());
        match artifact.write_to(&mut writer) {
            Ok(bytes) => {
                tracing::debug!(path = %artifact.path(), bytes, "artifact streamed");
            }
            Err(err) if tx.is_closed() => {
                tracing::debug!(path = %artifact.path(), err = %err, "client went away");
            }
            Err(err) => {
                tracing::error!(path = %artifact.path(), err = %err, "artifact stream failed");
                let _ = tx.blocking_send(Err(io::Error::other(err.to_string())));
            }
        }
    });

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "artifact stream timed out");
                cancel.cancel();
            }
            _ = done_rx => {}
        }
    });

    Body::from_stream(ReceiverStream::new(rx))
}

/// Blocking writer feeding a response body in chunks.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_BYTES),
        }
    }

    fn send_chunk(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(CHUNK_BYTES),
        ));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body closed"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_BYTES {
            self.send_chunk()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_chunk()
    }
}
