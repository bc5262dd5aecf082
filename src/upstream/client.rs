//! Upstream client trait and common types.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{Cancelled, UpstreamError};
use crate::types::{Package, PackageVersion};

/// Trait for upstream feed clients.
///
/// Implemented by each protocol dialect and by the multi-feed aggregator.
/// Failures never escape: a feed that errors looks like a feed that does not
/// have the package. The only error is cancellation through `cancel`.
pub trait UpstreamClient: Send + Sync {
    /// Every version of `id` known to the feed, listed or not.
    fn list_package_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<PackageVersion>, Cancelled>> + Send;

    /// Full metadata for every version of `id`.
    fn list_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Package>, Cancelled>> + Send;

    /// The package content, or `None` if no feed could provide it.
    fn download_package_or_none(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<PackageContent>, Cancelled>> + Send;
}

/// Downloaded package content, staged in an anonymous temporary file.
///
/// The file is independent of the connection it was read from and is
/// removed as soon as this value is dropped.
#[derive(Debug)]
pub struct PackageContent {
    file: tokio::fs::File,
    len: u64,
}

impl PackageContent {
    /// Copy an HTTP response body into a fresh temporary file.
    pub(crate) async fn stage(
        mut response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> Result<Self, UpstreamError> {
        let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
        let mut len = 0u64;

        while let Some(chunk) = cancellable(cancel, response.chunk()).await? {
            file.write_all(&chunk).await?;
            len += chunk.len() as u64;
        }

        debug!(bytes = len, "staged package content");
        Self::rewind(file, len).await.map_err(Into::into)
    }

    /// Stage in-memory bytes.
    pub async fn from_bytes(data: &[u8]) -> io::Result<Self> {
        let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
        file.write_all(data).await?;
        Self::rewind(file, data.len() as u64).await
    }

    async fn rewind(mut file: tokio::fs::File, len: u64) -> io::Result<Self> {
        file.flush().await?;
        file.seek(SeekFrom::Start(0)).await?;
        Ok(Self { file, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the whole content into memory.
    pub async fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Copy the content to `path`, returning the number of bytes written.
    pub async fn persist_to(mut self, path: &Path) -> io::Result<u64> {
        let mut out = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut self.file, &mut out).await?;
        out.flush().await?;
        Ok(written)
    }
}

impl AsyncRead for PackageContent {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

/// Log a failure from one feed so the caller can move on to the next.
///
/// Cancellation is the exception: it aborts the whole operation.
pub(crate) fn skip_feed(source: &str, id: &str, err: UpstreamError) -> Result<(), Cancelled> {
    match err {
        err if err.is_cancelled() => Err(Cancelled),
        err if err.is_not_found() => {
            debug!(source = source, package = id, "package not found upstream");
            Ok(())
        }
        err => {
            warn!(source = source, package = id, error = %err, "upstream feed failed, skipping");
            Ok(())
        }
    }
}

/// Race `fut` against `cancel`.
pub(crate) async fn cancellable<F, T, E>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<UpstreamError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled.into()),
        result = fut => result.map_err(Into::into),
    }
}
