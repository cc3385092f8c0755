//! AdServer - A video ad server
//!
//! This library provides the core functionality for the ad server:
//! VAST tag serving through an ordered source waterfall, tracking pixels,
//! click redirects and a minimal OpenRTB responder.
//!
//! # Architecture
//! - `vast`: VAST document validation, tracking injection and builders
//! - `services`: zone resolution, candidate selection, waterfall, RTB
//! - `events`: batched counter updates and the raw event log
//! - `cache`: TTL object caches in front of the store
//! - `storage`: SeaORM-backed read model and event sinks
//! - `api`: HTTP handlers and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging and other process-level setup

pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod events;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
pub mod vast;
