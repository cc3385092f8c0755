//! HTTP surface: the `/serve` endpoint and its middleware

pub mod middleware;
pub mod services;
