//! Admission control in front of connection workers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// Sent to a client turned away because every slot is taken.
pub const BUSY_MESSAGE: &[u8] = b"Server busy, try again later.\n";

/// A connection allowed in. Dropping it frees the slot.
#[derive(Debug)]
pub struct Admitted {
    pub id: u64,
    _permit: OwnedSemaphorePermit,
}

/// Fixed pool of connection slots plus the connection id counter.
///
/// Admission never waits: with no free slot the connection is refused on
/// the spot instead of being queued.
#[derive(Debug)]
pub struct Admission {
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl Admission {
    pub fn new(max_connections: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_connections)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Takes a slot if one is free. Ids start at 1.
    pub fn try_admit(&self) -> Option<Admitted> {
        let permit = self.permits.clone().try_acquire_owned().ok()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Some(Admitted {
            id,
            _permit: permit,
        })
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Writes the busy message and closes.
pub async fn reject(mut stream: TcpStream) -> std::io::Result<()> {
    stream.write_all(BUSY_MESSAGE).await?;
    stream.shutdown().await
}

/// Binds `host:port`, moving up one port at a time while the port is taken.
///
/// At most `window` ports are tried, never past 65535. Port 0 asks the OS
/// for any free port and is tried once.
pub async fn bind_with_scan(host: &str, port: u16, window: u16) -> anyhow::Result<TcpListener> {
    let last = if port == 0 {
        0
    } else {
        port.saturating_add(window.saturating_sub(1))
    };

    for candidate in port..=last {
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                let addr: SocketAddr = listener.local_addr()?;
                info!(%addr, "listening");
                return Ok(listener);
            }
            Err(e) => {
                debug!(port = candidate, error = %e, "port unavailable");
            }
        }
    }

    anyhow::bail!("could not bind to any port in range {}-{}", port, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_slots_are_returned() {
        let admission = Admission::new(2);

        let a = admission.try_admit().unwrap();
        let b = admission.try_admit().unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(admission.try_admit().is_none());

        drop(a);
        assert_eq!(admission.available(), 1);
        let c = admission.try_admit().unwrap();
        assert_eq!(c.id, 3);
    }
}
