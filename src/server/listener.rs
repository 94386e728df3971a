use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::http::static_files::StaticFiles;
use crate::server::admission::{Admission, bind_with_scan, reject};
use crate::server::handler::{ConnContext, Handler, HttpHandler};

enum Accepted {
    Connection(TcpStream, SocketAddr),
    // Shutdown fired; the listener is about to be dropped
    ListenerClosed,
}

/// The accept loop with admission control and drain-style shutdown.
pub struct Server<H> {
    listener: TcpListener,
    handler: Arc<H>,
    admission: Admission,
}

impl Server<HttpHandler> {
    /// Builds the static file server described by `cfg`.
    pub async fn from_config(cfg: &ServerConfig) -> anyhow::Result<Self> {
        let files = StaticFiles::new(&cfg.document_root)?;
        info!(root = %files.root().display(), "serving files");
        let handler = HttpHandler::new(files, Duration::from_secs(cfg.read_timeout));
        Self::bind(cfg, handler).await
    }
}

impl<H: Handler> Server<H> {
    pub async fn bind(cfg: &ServerConfig, handler: H) -> anyhow::Result<Self> {
        let listener = bind_with_scan(&cfg.host, cfg.port, cfg.port_scan_window).await?;
        Ok(Self {
            listener,
            handler: Arc::new(handler),
            admission: Admission::new(cfg.max_connections),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` completes, then drains.
    ///
    /// Draining closes the listener, tells every worker to stop, and waits
    /// for all of them. Workers are never cut off mid-response. A worker
    /// with an empty buffer leaves at once; one holding a partial request
    /// has a single read timeout, counted from its first read after the
    /// signal, to complete it. Drain time is thus bounded by one read
    /// timeout plus the time to write the responses already under way.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            handler,
            admission,
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                biased;
                _ = &mut shutdown => Accepted::ListenerClosed,
                res = listener.accept() => match res {
                    Ok((stream, peer)) => Accepted::Connection(stream, peer),
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let (stream, peer) = match accepted {
                Accepted::Connection(stream, peer) => (stream, peer),
                Accepted::ListenerClosed => break,
            };

            // Reap finished workers so the set tracks live ones only
            while workers.try_join_next().is_some() {}

            let Some(admitted) = admission.try_admit() else {
                warn!(%peer, "no free connection slot, rejecting");
                workers.spawn(async move {
                    if let Err(e) = reject(stream).await {
                        debug!(%peer, error = %e, "busy message not delivered");
                    }
                });
                continue;
            };

            let conn_id = admitted.id;
            info!(conn_id, %peer, "connection admitted");

            let ctx = ConnContext::new(conn_id, Some(peer), stop_rx.clone());
            let handler = handler.clone();
            workers.spawn(async move {
                if let Err(e) = handler.serve(stream, ctx).await {
                    error!(conn_id, %peer, error = %e, "connection error");
                }
                debug!(conn_id, "connection closed");
                drop(admitted);
            });
        }

        drop(listener);
        info!(active = workers.len(), "shutting down, waiting for connections to close");

        let _ = stop_tx.send(true);
        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "connection task failed");
            }
        }

        info!("all connections closed, server exited");
        Ok(())
    }
}
