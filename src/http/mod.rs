//! HTTP server module.
//!
//! Serves the router on plain HTTP and drains in-flight resets on
//! SIGTERM/SIGINT before exiting.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
