//! Mode routing
//!
//! The ad server only has one execution mode: the HTTP server.

pub mod server;

pub use server::{build_cors_middleware, build_default_headers, run_server};
