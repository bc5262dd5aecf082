//! Aggregates several upstream clients into one.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::FeedClient;
use super::client::{PackageContent, UpstreamClient};
use super::error::Cancelled;
use super::merge::{distinct_packages, distinct_versions};
use crate::options::ConfigError;
use crate::types::{Package, PackageVersion};

/// Queries every configured feed in order.
///
/// Listings are concatenated in feed order and deduplicated, so the first
/// feed to report a version wins. Downloads return the first feed's content
/// and never touch the feeds after it.
#[derive(Debug)]
pub struct MultiFeedUpstreamClient<C = FeedClient> {
    clients: Vec<C>,
}

impl<C: UpstreamClient> MultiFeedUpstreamClient<C> {
    pub fn new(clients: Vec<C>) -> Result<Self, ConfigError> {
        if clients.is_empty() {
            return Err(ConfigError::NoClients);
        }
        Ok(Self { clients })
    }

    pub fn clients(&self) -> &[C] {
        &self.clients
    }
}

impl<C: UpstreamClient> UpstreamClient for MultiFeedUpstreamClient<C> {
    async fn list_package_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, Cancelled> {
        let mut versions = Vec::new();
        for client in &self.clients {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            versions.extend(client.list_package_versions(id, cancel).await?);
        }
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        Ok(distinct_versions(versions))
    }

    async fn list_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Package>, Cancelled> {
        let mut packages = Vec::new();
        for client in &self.clients {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            packages.extend(client.list_packages(id, cancel).await?);
        }
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        Ok(distinct_packages(packages))
    }

    async fn download_package_or_none(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, Cancelled> {
        for (i, client) in self.clients.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            let content = client.download_package_or_none(id, version, cancel).await?;
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            if let Some(content) = content {
                debug!(package = id, version = %version, feed = i, "downloaded package from upstream");
                return Ok(Some(content));
            }
        }

        Ok(None)
    }
}
