//! Wharf - static file server
//!
//! A small HTTP/1.x server with bounded concurrency, incremental request
//! parsing, and document-root confinement.

pub mod config;
pub mod http;
pub mod server;
