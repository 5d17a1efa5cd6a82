//! loadconfd library
//!
//! Layered configuration resolution and the key/value backend contract for
//! the loadconfd config-sync daemon.

pub mod backends;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod resource;
