//! Upstream clients for mirroring packages from remote NuGet feeds.
//!
//! Every client answers the same three questions: which versions of a
//! package exist, what metadata they carry, and what the package bytes are.
//! Feed failures never reach the caller. A feed that cannot answer simply
//! contributes nothing, and only cancellation is reported as an error.
//!
//! # Example
//!
//! ```ignore
//! use upstream_mirror::options::MirrorOptions;
//! use upstream_mirror::upstream::{Upstream, UpstreamClient};
//!
//! let options = MirrorOptions::load(None)?;
//! let upstream = Upstream::from_options(&options)?;
//! let versions = upstream.list_package_versions("Newtonsoft.Json", &cancel).await?;
//! ```

mod client;
mod disabled;
mod error;
mod merge;
mod multi;
mod translate;
mod v2;
mod v3;

pub use client::{PackageContent, UpstreamClient};
pub use disabled::DisabledUpstreamClient;
pub use error::{Cancelled, UpstreamError};
pub use merge::{distinct_packages, distinct_versions};
pub use multi::MultiFeedUpstreamClient;
pub use v2::V2UpstreamClient;
pub use v3::V3UpstreamClient;

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::options::{ConfigError, MirrorOptions, MirrorSource};
use crate::types::{Package, PackageVersion};

const USER_AGENT: &str = concat!("upstream-mirror/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for upstream feeds. A zero timeout disables it.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ConfigError> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// A client for a single configured source, dispatching on its protocol.
#[derive(Debug)]
pub enum FeedClient {
    V3(V3UpstreamClient),
    V2(V2UpstreamClient),
}

impl FeedClient {
    /// Client for `source`, or `None` if it has no endpoint.
    pub fn for_source(source: &MirrorSource, client: &Client) -> Option<Self> {
        let url = source.package_source.clone()?;
        Some(if source.legacy {
            Self::V2(V2UpstreamClient::with_client(client.clone(), url))
        } else {
            Self::V3(V3UpstreamClient::with_client(client.clone(), [url]))
        })
    }
}

impl UpstreamClient for FeedClient {
    async fn list_package_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, Cancelled> {
        match self {
            Self::V3(c) => c.list_package_versions(id, cancel).await,
            Self::V2(c) => c.list_package_versions(id, cancel).await,
        }
    }

    async fn list_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Package>, Cancelled> {
        match self {
            Self::V3(c) => c.list_packages(id, cancel).await,
            Self::V2(c) => c.list_packages(id, cancel).await,
        }
    }

    async fn download_package_or_none(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, Cancelled> {
        match self {
            Self::V3(c) => c.download_package_or_none(id, version, cancel).await,
            Self::V2(c) => c.download_package_or_none(id, version, cancel).await,
        }
    }
}

/// The upstream selected by the mirror configuration.
#[derive(Debug)]
pub enum Upstream {
    Disabled(DisabledUpstreamClient),
    Mirror(MultiFeedUpstreamClient<FeedClient>),
}

impl Upstream {
    /// Build the upstream described by `options`.
    ///
    /// Disabled options yield a client that finds nothing. Enabled options
    /// are validated first, then get one client per distinct source, in
    /// configured order.
    pub fn from_options(options: &MirrorOptions) -> Result<Self, ConfigError> {
        if !options.enabled {
            debug!("mirroring disabled");
            return Ok(Self::Disabled(DisabledUpstreamClient));
        }
        options.ensure_valid()?;

        let client = http_client(options.download_timeout())?;

        let fallback;
        let sources = if options.has_sources() {
            options.sources()
        } else {
            // Only reachable when the single-source fields were set directly.
            fallback = options
                .package_source()
                .map(|url| MirrorSource::new(url.clone(), options.legacy()))
                .into_iter()
                .collect::<Vec<_>>();
            &fallback[..]
        };

        let feeds: Vec<FeedClient> = sources
            .iter()
            .filter_map(|source| FeedClient::for_source(source, &client))
            .collect();

        info!(feeds = feeds.len(), "mirroring enabled");
        Ok(Self::Mirror(MultiFeedUpstreamClient::new(feeds)?))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Mirror(_))
    }
}

impl UpstreamClient for Upstream {
    async fn list_package_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, Cancelled> {
        match self {
            Self::Disabled(c) => c.list_package_versions(id, cancel).await,
            Self::Mirror(c) => c.list_package_versions(id, cancel).await,
        }
    }

    async fn list_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Package>, Cancelled> {
        match self {
            Self::Disabled(c) => c.list_packages(id, cancel).await,
            Self::Mirror(c) => c.list_packages(id, cancel).await,
        }
    }

    async fn download_package_or_none(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, Cancelled> {
        match self {
            Self::Disabled(c) => c.download_package_or_none(id, version, cancel).await,
            Self::Mirror(c) => c.download_package_or_none(id, version, cancel).await,
        }
    }
}
