//! Client used when mirroring is turned off.

use tokio_util::sync::CancellationToken;

use super::client::{PackageContent, UpstreamClient};
use super::error::Cancelled;
use crate::types::{Package, PackageVersion};

/// Answers every query with nothing, without touching the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledUpstreamClient;

impl UpstreamClient for DisabledUpstreamClient {
    async fn list_package_versions(
        &self,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, Cancelled> {
        Ok(Vec::new())
    }

    async fn list_packages(
        &self,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Package>, Cancelled> {
        Ok(Vec::new())
    }

    async fn download_package_or_none(
        &self,
        _id: &str,
        _version: &PackageVersion,
        _cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, Cancelled> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_returns_nothing() {
        let client = DisabledUpstreamClient;
        let cancel = CancellationToken::new();
        let version = PackageVersion::parse("1.0.0").unwrap();

        assert!(client.list_package_versions("Foo", &cancel).await.unwrap().is_empty());
        assert!(client.list_packages("Foo", &cancel).await.unwrap().is_empty());
        assert!(
            client
                .download_package_or_none("Foo", &version, &cancel)
                .await
                .unwrap()
                .is_none()
        );
    }
}
