//! `rigpose-server` – HTTP API for the pose visualiser.
//!
//! Boots a small HTTP/1.1 server (default port `8000`) that:
//!
//! 1. **Serves** the resolved camera/light poses for every captured frame as
//!    JSON, computed once per process by the shared
//!    [`PoseResolver`][rigpose_runtime::PoseResolver].
//! 2. **Lists** and serves the processed frame images, and streams the
//!    secondary video.
//! 3. **Allows** browser access from the configured frontend origins (CORS).
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rigpose_runtime::{JsonFileSource, PoseResolver, ResolverConfig};
//! use rigpose_server::ApiServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = PoseResolver::new(&ResolverConfig::default(), JsonFileSource::new("log.json"));
//!     ApiServer::new(Arc::new(resolver)).run().await.expect("api server failed");
//! }
//! ```

pub mod api;
pub mod http;
pub mod images;
pub mod server;

pub use api::{AppState, default_allowed_origins, handle_request};
pub use images::{ImageListing, ImagePattern};
pub use server::{ApiServer, BoundServer, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_READ_TIMEOUT};
