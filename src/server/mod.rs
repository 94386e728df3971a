//! Connection acceptance, admission control and shutdown.
//!
//! - **`admission`**: the connection token pool, connection ids, and
//!   port-scanning bind
//! - **`listener`**: the accept loop and drain-style shutdown
//! - **`handler`**: the per-connection behavior plugged into the server

pub mod admission;
pub mod handler;
pub mod listener;

pub use admission::{Admission, Admitted, BUSY_MESSAGE};
pub use handler::{ConnContext, Handler, HttpHandler};
pub use listener::Server;
