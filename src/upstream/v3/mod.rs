//! NuGet V3 upstream client.
//!
//! Each configured endpoint is an independent service index. Listings are
//! gathered from every endpoint and merged; downloads come from the first
//! endpoint that has the version.

mod catalog;
mod feed;

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use self::feed::V3Feed;
use super::client::{PackageContent, UpstreamClient, skip_feed};
use super::error::{Cancelled, UpstreamError};
use super::http_client;
use super::merge::{distinct_packages, distinct_versions};
use crate::options::ConfigError;
use crate::types::{Package, PackageVersion};

/// Mirroring client for feeds that speak the V3 protocol.
#[derive(Debug)]
pub struct V3UpstreamClient {
    feeds: Vec<V3Feed>,
}

impl V3UpstreamClient {
    pub fn new(
        endpoints: impl IntoIterator<Item = Url>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_client(http_client(timeout)?, endpoints))
    }

    pub fn with_client(client: Client, endpoints: impl IntoIterator<Item = Url>) -> Self {
        Self {
            feeds: endpoints
                .into_iter()
                .map(|url| V3Feed::new(client.clone(), url))
                .collect(),
        }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Url> {
        self.feeds.iter().map(V3Feed::index_url)
    }

    async fn try_download(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, UpstreamError> {
        for feed in &self.feeds {
            // Probe first: a missing package is the common case and should
            // not surface as a failed download.
            match feed.exists(id, version, cancel).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(source = %feed.index_url(), package = id, version = %version, "version not on feed");
                    continue;
                }
                Err(e) => {
                    skip_feed(feed.index_url().as_str(), id, e)?;
                    continue;
                }
            }

            let response = feed.download(id, version, cancel).await?;
            return PackageContent::stage(response, cancel).await.map(Some);
        }

        Ok(None)
    }
}

impl UpstreamClient for V3UpstreamClient {
    async fn list_package_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, Cancelled> {
        let mut versions = Vec::new();
        for feed in &self.feeds {
            match feed.list_versions(id, cancel).await {
                Ok(found) => versions.extend(found),
                Err(e) => skip_feed(feed.index_url().as_str(), id, e)?,
            }
        }

        Ok(distinct_versions(versions))
    }

    async fn list_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Package>, Cancelled> {
        let mut packages = Vec::new();
        for feed in &self.feeds {
            let entries = match feed.package_metadata(id, cancel).await {
                Ok(entries) => entries,
                Err(e) => {
                    skip_feed(feed.index_url().as_str(), id, e)?;
                    continue;
                }
            };

            for entry in entries {
                match entry.into_package() {
                    Ok(package) => packages.push(package),
                    Err(e) => {
                        debug!(source = %feed.index_url(), package = id, error = %e, "skipping untranslatable entry")
                    }
                }
            }
        }

        Ok(distinct_packages(packages))
    }

    async fn download_package_or_none(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, Cancelled> {
        match self.try_download(id, version, cancel).await {
            Ok(content) => Ok(content),
            Err(e) if e.is_cancelled() => Err(Cancelled),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                error!(package = id, version = %version, error = %e, "failed to download package from upstream");
                Ok(None)
            }
        }
    }
}
