use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::http::response::ResponseHead;

const HTTP_VERSION: &str = "HTTP/1.1";

fn serialize_head(head: &ResponseHead) -> Vec<u8> {
    format!(
        "{} {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        HTTP_VERSION,
        head.status.as_u16(),
        head.status.reason_phrase(),
        head.content_type,
        head.content_length,
    )
    .into_bytes()
}

/// Writes one response: the serialized head, then the body copied from
/// `body` in fixed-size pieces so a large file never sits in memory whole.
pub struct ResponseWriter {
    head: Vec<u8>,
}

impl ResponseWriter {
    pub fn new(head: &ResponseHead) -> Self {
        Self {
            head: serialize_head(head),
        }
    }

    /// Returns the number of body bytes written.
    pub async fn write_to_stream<W, R>(&self, stream: &mut W, body: &mut R) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
        R: AsyncRead + Unpin + ?Sized,
    {
        stream.write_all(&self.head).await?;
        let written = tokio::io::copy(body, stream).await?;
        stream.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::StatusCode;

    #[test]
    fn head_layout() {
        let head = ResponseHead::new(StatusCode::NotFound, "text/html; charset=utf-8", 22);
        let bytes = serialize_head(&head);
        assert_eq!(
            bytes,
            b"HTTP/1.1 404 Not Found\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 22\r\n\r\n"
        );
    }
}
