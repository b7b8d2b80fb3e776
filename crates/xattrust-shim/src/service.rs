//! Dispatch service.
//!
//! Accepts transport connections and runs one pipeline invocation per
//! captured call. Calls are independent units of work: each runs on the
//! blocking pool with its own cancellation token, and the only shared
//! state is the immutable policy behind an `Arc`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use nix::errno::Errno;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use xattrust_common::config::ShimConfig;
use xattrust_core::pipeline::{CallHandler, CancelToken, Outcome};
use xattrust_core::policy::Policy;
use xattrust_core::proxy::PrivilegedExecutor;

use crate::error::Result;
use crate::event::{CallRequest, CallResponse, Request};
use crate::transport::{RequestReader, ResponseWriter};

/// Tokens of in-flight calls, keyed by correlation id.
type CancelMap = Arc<Mutex<HashMap<u64, CancelToken>>>;

/// The shim service for one container.
pub struct ShimService {
    handler: Arc<CallHandler>,
}

impl ShimService {
    /// Builds a service from a loaded configuration and an executor.
    #[must_use]
    pub fn new(config: &ShimConfig, executor: Arc<dyn PrivilegedExecutor>) -> Self {
        let policy = Policy::from_config(config);
        Self::with_handler(Arc::new(CallHandler::new(Arc::new(policy), executor)))
    }

    /// Builds a service around an existing handler.
    #[must_use]
    pub fn with_handler(handler: Arc<CallHandler>) -> Self {
        Self { handler }
    }

    /// Listens on the given Unix socket and serves connections until the
    /// task is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or an accept
    /// fails; per-connection failures are logged, not fatal.
    pub async fn serve(&self, socket: &Path) -> Result<()> {
        if let Some(parent) = socket.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::remove_file(socket);
        let listener = UnixListener::bind(socket)?;
        tracing::info!(socket = %socket.display(), "shim listening");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let handler = Arc::clone(&self.handler);
            let _ = tokio::spawn(async move {
                let (read_half, write_half) = tokio::io::split(stream);
                if let Err(err) = drive(handler, read_half, write_half).await {
                    tracing::warn!(%err, "transport connection failed");
                }
            });
        }
    }

    /// The handler this service dispatches to.
    #[must_use]
    pub fn handler(&self) -> &Arc<CallHandler> {
        &self.handler
    }
}

/// Serves one transport connection: reads requests, dispatches calls to
/// the blocking pool, and writes each verdict back as it completes.
///
/// # Errors
///
/// Returns an error on stream failure or a malformed message.
pub async fn drive<R, W>(handler: Arc<CallHandler>, read_half: R, write_half: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = RequestReader::new(read_half);
    let (tx, mut rx) = mpsc::channel::<CallResponse>(64);

    let writer_task = tokio::spawn(async move {
        let mut writer = ResponseWriter::new(write_half);
        while let Some(response) = rx.recv().await {
            writer.send(&response).await?;
        }
        Ok::<(), crate::error::ShimError>(())
    });

    let in_flight: CancelMap = Arc::new(Mutex::new(HashMap::new()));

    while let Some(request) = reader.recv().await? {
        match request {
            Request::Cancel { id } => {
                if let Ok(map) = in_flight.lock() {
                    if let Some(token) = map.get(&id) {
                        tracing::debug!(id, "cancelling in-flight call");
                        token.cancel();
                    }
                }
            }
            Request::Call(call) => {
                dispatch(call, &handler, &in_flight, tx.clone());
            }
        }
    }

    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(join_err) => {
            tracing::warn!(%join_err, "response writer aborted");
            Ok(())
        }
    }
}

/// Runs one call on the blocking pool and queues its response.
fn dispatch(
    request: CallRequest,
    handler: &Arc<CallHandler>,
    in_flight: &CancelMap,
    tx: mpsc::Sender<CallResponse>,
) {
    let CallRequest { id, call, process } = request;
    let token = CancelToken::new();
    if let Ok(mut map) = in_flight.lock() {
        let _ = map.insert(id, token.clone());
    }

    let handler = Arc::clone(handler);
    let in_flight = Arc::clone(in_flight);
    let _ = tokio::spawn(async move {
        let worker_token = token.clone();
        let joined = tokio::task::spawn_blocking(move || {
            handler.handle_cancellable(call, &process, &worker_token)
        })
        .await;

        // A panicked worker must still answer the caller; interrupted is
        // the only honest verdict at that point.
        let outcome = joined.unwrap_or_else(|_| Outcome::error(Errno::EINTR));

        if let Ok(mut map) = in_flight.lock() {
            let _ = map.remove(&id);
        }
        if tx.send(CallResponse::from_outcome(id, outcome)).await.is_err() {
            tracing::debug!(id, "transport closed before response delivery");
        }
    });
}
