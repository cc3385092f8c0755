//! System-level modules

pub mod logging;
