//! [`ApiServer`] – TCP listener for the pose API.
//!
//! Listens on `0.0.0.0:8000` by default (see [`ApiServer::with_port`]).  Each
//! accepted connection is served on its own task: one request is read,
//! routed through [`handle_request`], answered, and the connection closed.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rigpose_runtime::PoseResolver;
use rigpose_types::RigError;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::api::{AppState, handle_request};
use crate::http::{Response, read_request};
use crate::images::ImagePattern;

/// Default TCP port for the API.
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// How long a client may take to send its request head.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server exposing the resolver's poses and the frame media.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rigpose_runtime::{JsonFileSource, PoseResolver, ResolverConfig};
/// use rigpose_server::ApiServer;
///
/// #[tokio::main]
/// async fn main() {
///     let resolver = PoseResolver::new(
///         &ResolverConfig::default(),
///         JsonFileSource::new("capture_log.json"),
///     );
///     ApiServer::new(Arc::new(resolver))
///         .with_port(8000)
///         .run()
///         .await
///         .expect("api server failed");
/// }
/// ```
pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
    read_timeout: Duration,
}

impl ApiServer {
    /// Create a server backed by `resolver` on [`DEFAULT_HOST`]:[`DEFAULT_PORT`].
    pub fn new(resolver: Arc<PoseResolver>) -> Self {
        Self {
            state: AppState::new(resolver),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_image_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.state.image_dir = dir;
        self
    }

    pub fn with_image_pattern(mut self, pattern: ImagePattern) -> Self {
        self.state.image_pattern = pattern;
        self
    }

    pub fn with_secondary_video(mut self, path: Option<PathBuf>) -> Self {
        self.state.secondary_video = path;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.state.allowed_origins = origins;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bind the listener without serving yet.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Io`] if the address cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, RigError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RigError::Io(format!("bind error on {addr}: {e}")))?;
        Ok(BoundServer {
            listener,
            state: Arc::new(self.state),
            read_timeout: self.read_timeout,
        })
    }

    /// Bind and serve forever.
    pub async fn run(self) -> Result<(), RigError> {
        self.bind().await?.serve(std::future::pending()).await
    }
}

/// A server whose listener is already bound.
pub struct BoundServer {
    listener: TcpListener,
    state: Arc<AppState>,
    read_timeout: Duration,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr, RigError> {
        self.listener
            .local_addr()
            .map_err(|e| RigError::Io(format!("local_addr: {e}")))
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<(), RigError> {
        let addr = self.local_addr()?;
        info!(%addr, "pose API listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("pose API shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        let read_timeout = self.read_timeout;
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, peer, state, read_timeout).await
                            {
                                warn!(%peer, error = %e, "client error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
    read_timeout: Duration,
) -> Result<(), RigError> {
    let request = match tokio::time::timeout(read_timeout, read_request(&mut stream)).await {
        Ok(read) => read.map_err(|e| RigError::Io(format!("read error from {peer}: {e}")))?,
        Err(_) => {
            debug!(%peer, "request head not received in time");
            let response = Response::error(408, "request timeout");
            stream.write_all(&response.to_bytes()).await.ok();
            stream.shutdown().await.ok();
            return Ok(());
        }
    };

    let response = match request {
        Some(req) => {
            let resp = handle_request(&req, &state).await;
            debug!(
                %peer,
                method = %req.method,
                path = %req.path,
                status = resp.status,
                "request served"
            );
            resp
        }
        None => Response::error(400, "bad request"),
    };

    response
        .write_to(&mut stream)
        .await
        .map_err(|e| RigError::Io(format!("write error to {peer}: {e}")))?;
    stream.shutdown().await.ok();
    Ok(())
}
