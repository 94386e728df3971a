use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::http::parser::{HEAD_TERMINATOR, ParseOutcome, find_head_end, parse_request};
use crate::http::request::Request;
use crate::http::static_files::StaticFiles;
use crate::server::handler::ConnContext;

/// A buffer may never grow past this; reaching it ends the connection.
pub const MAX_BUFFER: usize = 1024 * 1024;
/// Size of a single socket read.
pub const READ_CHUNK: usize = 4096;
/// Capacity an idle keep-alive buffer is brought back to.
pub const BASELINE_CAPACITY: usize = 4096;

pub enum ConnectionState {
    Reading,
    Parsing,
    // request, bytes of the buffer it occupied
    Responding(Request, usize),
    Closing,
}

/// Drives one client connection through read → parse → respond.
///
/// Requests are handled strictly one at a time: a second request already
/// sitting in the buffer is parsed only after the first response is
/// fully written.
///
/// Once shutdown is signalled, a partial request gets one more read
/// timeout in total to complete, however the client paces its bytes.
pub struct Connection<'a, S> {
    stream: S,
    buffer: BytesMut,
    // buffer prefix already known to hold no header terminator
    scanned: usize,
    drain_deadline: Option<Instant>,
    state: ConnectionState,
    files: &'a StaticFiles,
    read_timeout: Duration,
    ctx: ConnContext,
}

impl<'a, S> Connection<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, files: &'a StaticFiles, read_timeout: Duration, ctx: ConnContext) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(BASELINE_CAPACITY),
            scanned: 0,
            drain_deadline: None,
            state: ConnectionState::Reading,
            files,
            read_timeout,
            ctx,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let conn_id = self.ctx.id;

        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closing) {
                ConnectionState::Reading => {
                    self.state = self.read_more().await;
                }

                ConnectionState::Parsing => {
                    if find_head_end(&self.buffer, self.scanned).is_none() {
                        self.scanned = self.buffer.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
                        self.state = ConnectionState::Reading;
                        continue;
                    }

                    self.state = match parse_request(&self.buffer) {
                        ParseOutcome::Incomplete => ConnectionState::Reading,
                        ParseOutcome::Complete { request, remainder } => {
                            let consumed = self.buffer.len() - remainder.len();
                            ConnectionState::Responding(request, consumed)
                        }
                        ParseOutcome::Error(e) => {
                            warn!(conn_id, peer = ?self.ctx.peer, error = %e, "dropping connection on parse error");
                            ConnectionState::Closing
                        }
                    };
                }

                ConnectionState::Responding(request, consumed) => {
                    let served = self.files.respond(&request.target, &mut self.stream).await?;
                    info!(
                        conn_id,
                        method = request.method.as_str(),
                        target = %request.target,
                        status = served.status.as_u16(),
                        bytes = served.body_bytes,
                        "request served"
                    );

                    // What is left is the next request, if any
                    self.buffer.advance(consumed);
                    self.scanned = 0;
                    shrink_to_baseline(&mut self.buffer, BASELINE_CAPACITY);

                    self.state = if !request.keep_alive() {
                        ConnectionState::Closing
                    } else if !self.buffer.is_empty() {
                        ConnectionState::Parsing
                    } else {
                        ConnectionState::Reading
                    };
                }

                ConnectionState::Closing => {
                    if !self.buffer.is_empty() {
                        debug!(conn_id, pending = self.buffer.len(), "closing with unparsed bytes");
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn read_more(&mut self) -> ConnectionState {
        let conn_id = self.ctx.id;

        // Between requests, a shutdown ends the connection. Mid-request it
        // does not; the request is finished first.
        if self.buffer.is_empty() && self.ctx.is_shutting_down() {
            debug!(conn_id, "shutdown observed while idle");
            return ConnectionState::Closing;
        }

        let mut chunk = [0u8; READ_CHUNK];
        let read = if self.ctx.is_shutting_down() {
            let deadline = *self
                .drain_deadline
                .get_or_insert_with(|| Instant::now() + self.read_timeout);
            timeout_at(deadline, self.stream.read(&mut chunk)).await
        } else {
            timeout(self.read_timeout, self.stream.read(&mut chunk)).await
        };

        let n = match read {
            Err(_) => {
                debug!(conn_id, "read deadline elapsed");
                return ConnectionState::Closing;
            }
            Ok(Ok(0)) => {
                debug!(conn_id, "connection closed by client");
                return ConnectionState::Closing;
            }
            Ok(Err(e)) => {
                debug!(conn_id, error = %e, "read failed");
                return ConnectionState::Closing;
            }
            Ok(Ok(n)) => n,
        };

        if self.buffer.len() + n > MAX_BUFFER {
            warn!(conn_id, limit = MAX_BUFFER, "request buffer over limit, closing");
            return ConnectionState::Closing;
        }

        self.buffer.extend_from_slice(&chunk[..n]);
        ConnectionState::Parsing
    }
}

/// Reallocates `buf` at `baseline` capacity when it is mostly empty.
///
/// Applies when capacity exceeds `baseline` and the live bytes fill less
/// than a quarter of it. Live bytes are kept.
pub fn shrink_to_baseline(buf: &mut BytesMut, baseline: usize) {
    if buf.capacity() <= baseline || buf.len() >= buf.capacity() / 4 {
        return;
    }

    let mut fresh = BytesMut::with_capacity(baseline.max(buf.len()));
    fresh.extend_from_slice(buf);
    *buf = fresh;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_leaves_small_buffers_alone() {
        let mut buf = BytesMut::with_capacity(1024);
        buf.extend_from_slice(b"abc");
        shrink_to_baseline(&mut buf, 4096);
        assert_eq!(buf.capacity(), 1024);
    }

    #[test]
    fn shrink_reallocates_mostly_empty_buffer() {
        let mut buf = BytesMut::with_capacity(64 * 1024);
        buf.extend_from_slice(b"GET / HTTP/1.1\r\n");
        shrink_to_baseline(&mut buf, 4096);
        assert!(buf.capacity() < 64 * 1024);
        assert!(buf.capacity() >= 4096);
        assert_eq!(&buf[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn shrink_keeps_well_used_buffer() {
        let mut buf = BytesMut::with_capacity(16 * 1024);
        buf.extend_from_slice(&[b'x'; 8 * 1024]);
        let before = buf.capacity();
        shrink_to_baseline(&mut buf, 4096);
        assert_eq!(buf.capacity(), before);
    }
}
