//! Static file responder confined to a single document root.

use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use tokio::io::AsyncWrite;

use crate::http::mime::content_type_for;
use crate::http::request::strip_query;
use crate::http::response::{ERROR_CONTENT_TYPE, ResponseHead, StatusCode, error_body};
use crate::http::writer::ResponseWriter;

/// Served in place of a directory. Directories are never listed.
pub const INDEX_FILE: &str = "index.html";

/// Where a request target leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A readable file inside the root
    File(PathBuf),
    /// No file will be served; answer with this status
    Status(StatusCode),
}

/// What was sent back for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Served {
    pub status: StatusCode,
    pub body_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Resolves `root` once to an absolute canonical directory.
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("document root {} is not accessible", root.display()))?;

        if !root.is_dir() {
            anyhow::bail!("document root {} is not a directory", root.display());
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request target to a file under the root, or to an error status.
    ///
    /// Anything that normalizes or canonicalizes to a path outside the root
    /// is 403. A path is never clamped back into the root.
    pub async fn resolve(&self, target: &str) -> Resolved {
        let candidate = lexical_join(&self.root, strip_query(target));
        if !candidate.starts_with(&self.root) {
            return Resolved::Status(StatusCode::Forbidden);
        }

        // Symlinks may still point elsewhere
        let path = match self.contained_canonical(&candidate).await {
            Ok(path) => path,
            Err(status) => return Resolved::Status(status),
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => return Resolved::Status(status_for_io_error(&e)),
        };

        if !metadata.is_dir() {
            return Resolved::File(path);
        }

        let Ok(index) = self.contained_canonical(&path.join(INDEX_FILE)).await else {
            return Resolved::Status(StatusCode::Forbidden);
        };
        match tokio::fs::metadata(&index).await {
            Ok(m) if m.is_file() => Resolved::File(index),
            _ => Resolved::Status(StatusCode::Forbidden),
        }
    }

    /// Resolves `target` and writes the full response to `stream`.
    ///
    /// Only failures writing to `stream` are returned as errors; every
    /// filesystem failure becomes a status code.
    pub async fn respond<W>(&self, target: &str, stream: &mut W) -> anyhow::Result<Served>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let status = match self.resolve(target).await {
            Resolved::File(path) => match open_file(&path).await {
                Ok((mut file, len)) => {
                    let head = ResponseHead::new(StatusCode::Ok, content_type_for(&path), len);
                    let body_bytes = ResponseWriter::new(&head)
                        .write_to_stream(stream, &mut file)
                        .await?;
                    return Ok(Served {
                        status: StatusCode::Ok,
                        body_bytes,
                    });
                }
                Err(e) => status_for_io_error(&e),
            },
            Resolved::Status(status) => status,
        };

        let body = error_body(status);
        let head = ResponseHead::new(status, ERROR_CONTENT_TYPE, body.len() as u64);
        let body_bytes = ResponseWriter::new(&head)
            .write_to_stream(stream, &mut body.as_bytes())
            .await?;

        Ok(Served { status, body_bytes })
    }

    async fn contained_canonical(&self, path: &Path) -> Result<PathBuf, StatusCode> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| status_for_io_error(&e))?;

        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(StatusCode::Forbidden)
        }
    }
}

async fn open_file(path: &Path) -> io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    Ok((file, len))
}

/// 404 for a missing path, 403 for a permission failure, 500 for the rest.
pub fn status_for_io_error(err: &io::Error) -> StatusCode {
    match err.kind() {
        io::ErrorKind::NotFound => StatusCode::NotFound,
        io::ErrorKind::PermissionDenied => StatusCode::Forbidden,
        _ => StatusCode::InternalServerError,
    }
}

/// Appends `target` below `root`, applying `.` and `..` without touching
/// the filesystem. Leading slashes and drive prefixes in `target` are
/// ignored so it can never replace `root`.
pub fn lexical_join(root: &Path, target: &str) -> PathBuf {
    let mut path = root.to_path_buf();

    for component in Path::new(target).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::ParentDir => {
                path.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    path
}
