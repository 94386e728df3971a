use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::http::connection::Connection;
use crate::http::static_files::StaticFiles;

/// What a worker knows about its connection besides the socket.
#[derive(Debug, Clone)]
pub struct ConnContext {
    /// Process-unique, increasing in admission order
    pub id: u64,
    pub peer: Option<SocketAddr>,
    shutdown: watch::Receiver<bool>,
}

impl ConnContext {
    pub fn new(id: u64, peer: Option<SocketAddr>, shutdown: watch::Receiver<bool>) -> Self {
        Self { id, peer, shutdown }
    }

    /// True once the server has started draining.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Per-connection behavior, injected when the server is built.
pub trait Handler: Send + Sync + 'static {
    fn serve(
        &self,
        stream: TcpStream,
        ctx: ConnContext,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Serves HTTP/1.x requests for files under one document root.
pub struct HttpHandler {
    files: StaticFiles,
    read_timeout: Duration,
}

impl HttpHandler {
    pub fn new(files: StaticFiles, read_timeout: Duration) -> Self {
        Self {
            files,
            read_timeout,
        }
    }
}

impl Handler for HttpHandler {
    async fn serve(&self, stream: TcpStream, ctx: ConnContext) -> anyhow::Result<()> {
        Connection::new(stream, &self.files, self.read_timeout, ctx)
            .run()
            .await
    }
}
