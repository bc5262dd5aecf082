//! One connection to a NuGet V3 feed.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::catalog::{CatalogEntry, OneOrMany};
use crate::types::PackageVersion;
use crate::upstream::client::cancellable;
use crate::upstream::error::UpstreamError;

const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

/// Registration hives in order of preference. The newer ones include
/// SemVer 2.0.0 packages.
const REGISTRATIONS_BASE_URLS: &[&str] = &[
    "RegistrationsBaseUrl/3.6.0",
    "RegistrationsBaseUrl/3.4.0",
    "RegistrationsBaseUrl/3.0.0-rc",
    "RegistrationsBaseUrl/3.0.0-beta",
    "RegistrationsBaseUrl",
];

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: OneOrMany,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistrationIndex {
    #[serde(default)]
    items: Vec<RegistrationPage>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPage {
    #[serde(rename = "@id")]
    id: String,
    /// Absent when the feed pages registrations out of the index.
    items: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationLeaf {
    catalog_entry: CatalogEntry,
}

/// Base URLs discovered from the service index, without trailing slashes.
#[derive(Debug)]
struct Resources {
    package_base_address: String,
    registrations_base_url: String,
}

/// A single V3 feed, identified by its service index URL.
///
/// The service index is fetched on first use and cached for the lifetime of
/// the feed.
#[derive(Debug)]
pub(crate) struct V3Feed {
    client: Client,
    index_url: Url,
    resources: OnceCell<Resources>,
}

impl V3Feed {
    pub fn new(client: Client, index_url: Url) -> Self {
        Self {
            client,
            index_url,
            resources: OnceCell::new(),
        }
    }

    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    async fn resources(&self, cancel: &CancellationToken) -> Result<&Resources, UpstreamError> {
        self.resources
            .get_or_try_init(|| self.discover(cancel))
            .await
    }

    async fn discover(&self, cancel: &CancellationToken) -> Result<Resources, UpstreamError> {
        debug!(source = %self.index_url, "fetching service index");

        let index: ServiceIndex = self
            .get_json(self.index_url.as_str(), cancel)
            .await?
            .ok_or(UpstreamError::MissingResource("service index"))?;

        let find = |kind: &str| {
            index
                .resources
                .iter()
                .find(|r| r.kind.contains(kind))
                .map(|r| r.id.trim_end_matches('/').to_string())
        };

        let package_base_address =
            find(PACKAGE_BASE_ADDRESS).ok_or(UpstreamError::MissingResource(PACKAGE_BASE_ADDRESS))?;
        let registrations_base_url = REGISTRATIONS_BASE_URLS
            .iter()
            .find_map(|kind| find(*kind))
            .ok_or(UpstreamError::MissingResource("RegistrationsBaseUrl"))?;

        Ok(Resources {
            package_base_address,
            registrations_base_url,
        })
    }

    /// GET and decode a JSON document. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, UpstreamError> {
        let response = cancellable(cancel, self.client.get(url).send()).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let body = cancellable(cancel, response.bytes()).await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// All versions in the flat container, listed or not.
    pub async fn list_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, UpstreamError> {
        let resources = self.resources(cancel).await?;
        let url = format!(
            "{}/{}/index.json",
            resources.package_base_address,
            id.to_lowercase()
        );
        debug!(source = %self.index_url, package = id, url = %url, "fetching versions");

        let response: VersionsResponse = self
            .get_json(&url, cancel)
            .await?
            .ok_or_else(|| UpstreamError::PackageNotFound(id.to_string()))?;

        Ok(response
            .versions
            .iter()
            .filter_map(|v| match PackageVersion::parse(v) {
                Ok(version) => Some(version),
                Err(e) => {
                    debug!(package = id, error = %e, "skipping unparseable version");
                    None
                }
            })
            .collect())
    }

    /// Whether the feed has this exact version.
    pub async fn exists(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<bool, UpstreamError> {
        let versions = self.list_versions(id, cancel).await?;
        Ok(versions.contains(version))
    }

    /// Start downloading the `.nupkg`. The body is left unread.
    pub async fn download(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, UpstreamError> {
        let resources = self.resources(cancel).await?;
        let id_lower = id.to_lowercase();
        let version_lower = version.to_normalized_string().to_lowercase();
        let url = format!(
            "{}/{}/{}/{}.{}.nupkg",
            resources.package_base_address, id_lower, version_lower, id_lower, version_lower
        );
        debug!(source = %self.index_url, package = id, version = %version, url = %url, "downloading package");

        let response = cancellable(cancel, self.client.get(&url).send()).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UpstreamError::VersionNotFound {
                package: id.to_string(),
                version: version.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status(),
                url,
            });
        }

        Ok(response)
    }

    /// Catalog entries for every version in the registration index.
    ///
    /// Leaves that do not decode are skipped rather than failing the page.
    pub async fn package_metadata(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogEntry>, UpstreamError> {
        let resources = self.resources(cancel).await?;
        let url = format!(
            "{}/{}/index.json",
            resources.registrations_base_url,
            id.to_lowercase()
        );
        debug!(source = %self.index_url, package = id, url = %url, "fetching registration index");

        let index: RegistrationIndex = self
            .get_json(&url, cancel)
            .await?
            .ok_or_else(|| UpstreamError::PackageNotFound(id.to_string()))?;

        let mut entries = Vec::new();
        for page in index.items {
            let leaves = match page.items {
                Some(leaves) => leaves,
                None => {
                    debug!(package = id, page = %page.id, "fetching registration page");
                    let page: RegistrationPage = self
                        .get_json(&page.id, cancel)
                        .await?
                        .ok_or_else(|| UpstreamError::PackageNotFound(id.to_string()))?;
                    page.items.unwrap_or_default()
                }
            };

            for leaf in leaves {
                match serde_json::from_value::<RegistrationLeaf>(leaf) {
                    Ok(leaf) => entries.push(leaf.catalog_entry),
                    Err(e) => debug!(package = id, error = %e, "skipping malformed registration leaf"),
                }
            }
        }

        Ok(entries)
    }
}
