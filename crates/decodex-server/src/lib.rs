//! Decodex Server - side-by-side comparison of decoding strategies over HTTP
//!
//! Serves a single-page front end and a `POST /generate` endpoint that runs a
//! prompt through five decoding strategies and scores every output.

/// Version of the decodex-server crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{create_router, DecodexServer, ServerState};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{config::*, error::*, handlers::*, middleware::*, server::*};
}
