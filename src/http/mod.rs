//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.x subset the server speaks: requests
//! are parsed from a per-connection buffer and answered with files from
//! the document root.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection read/parse/respond state machine
//! - **`parser`**: Decodes one request from the front of a byte buffer
//! - **`request`**: HTTP request representation and keep-alive rules
//! - **`response`**: Status codes and response heads
//! - **`writer`**: Writes a response head and streams its body
//! - **`static_files`**: Maps request targets to files under the root
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!   ┌──▶ │   Reading   │ ← Wait for bytes (bounded by the read deadline)
//!   │    └──────┬──────┘
//!   │           │ bytes appended
//!   │           ▼
//!   │    ┌──────────────────┐   Incomplete
//!   │    │     Parsing      │ ──────────────▶ Reading
//!   │    └──────┬───────────┘
//!   │           │ Complete              Error → Closing
//!   │           ▼
//!   │    ┌──────────────────┐
//!   │    │    Responding    │ ← Serve the file, keep the remainder
//!   │    └──────┬───────────┘
//!   │           ├─ remainder left → Parsing (pipelined request)
//!   └───────────┤─ Keep-Alive    → Reading
//!               └─ Close         → Closing
//! ```
//!
//! Timeouts, EOF, read errors and an over-limit buffer all go straight to
//! `Closing` without a response.

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod static_files;
pub mod writer;
