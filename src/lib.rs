//! dav-controller: HTTP control surface for WebDAV integration-test containers.
//!
//! Exposes `GET /health` and `POST /reset/{container}`. A reset runs the init
//! script against the container's data directory and, for containers with a
//! configured probe, waits until a dependent service accepts TCP connections.

pub mod config;
pub mod container;
pub mod error;
pub mod http;
pub mod middleware;
pub mod probe;
pub mod reset;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use container::ContainerName;
pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
