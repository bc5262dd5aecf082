//! NuGet V2 (OData) upstream client.
//!
//! Older feeds only speak the Atom based V2 protocol. Package metadata comes
//! from `FindPackagesById()`, content from `package/{id}/{version}`.

use std::collections::HashMap;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

use super::client::{PackageContent, UpstreamClient, cancellable, skip_feed};
use super::error::{Cancelled, UpstreamError};
use super::http_client;
use super::merge::{distinct_packages, distinct_versions};
use super::translate::{
    is_listed, non_empty, parse_authors, parse_published, parse_tags, parse_url,
};
use crate::options::ConfigError;
use crate::types::{Package, PackageDependency, PackageVersion, SemVerLevel};

/// Upper bound on `rel="next"` links followed for one package.
const MAX_PAGES: usize = 20;

/// Key under which the Atom `<title>` of an entry is stored.
const ATOM_TITLE: &str = "atom:title";

/// Properties of one `<entry>`, keyed by local element name.
type EntryProperties = HashMap<String, String>;

#[derive(Debug, Default)]
struct FeedPage {
    entries: Vec<EntryProperties>,
    next: Option<String>,
}

/// Mirroring client for a single legacy V2 feed.
#[derive(Debug)]
pub struct V2UpstreamClient {
    client: Client,
    source: Url,
}

impl V2UpstreamClient {
    pub fn new(source: Url, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self::with_client(http_client(timeout)?, source))
    }

    pub fn with_client(client: Client, source: Url) -> Self {
        Self { client, source }
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    fn root(&self) -> &str {
        self.source.as_str().trim_end_matches('/')
    }

    async fn find_packages_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntryProperties>, UpstreamError> {
        let mut url = Url::parse(&format!("{}/FindPackagesById()", self.root()))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("'{}'", id.replace('\'', "''")));

        let mut entries = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0;

        while let Some(page_url) = next.take() {
            if pages == MAX_PAGES {
                warn!(source = %self.source, package = id, "too many result pages, truncating");
                break;
            }
            pages += 1;

            debug!(source = %self.source, package = id, url = %page_url, "fetching odata feed page");
            let response = cancellable(
                cancel,
                self.client
                    .get(&page_url)
                    .header(ACCEPT, "application/atom+xml")
                    .send(),
            )
            .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(UpstreamError::PackageNotFound(id.to_string()));
            }
            if !response.status().is_success() {
                return Err(UpstreamError::Status {
                    status: response.status(),
                    url: page_url,
                });
            }

            let body = cancellable(cancel, response.text()).await?;
            let page = parse_feed(&body)?;
            entries.extend(page.entries);
            next = page.next;
        }

        Ok(entries)
    }

    async fn try_download(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> Result<Option<PackageContent>, UpstreamError> {
        let url = format!("{}/package/{}/{}", self.root(), id, version.to_normalized_string());
        debug!(source = %self.source, package = id, version = %version, url = %url, "downloading package");

        let response = cancellable(cancel, self.client.get(&url).send()).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status(),
                url,
            });
        }

        PackageContent::stage(response, cancel).await.map(Some)
    }
}

impl UpstreamClient for V2UpstreamClient {
    async fn list_package_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageVersion>, Cancelled> {
        let entries = match self.find_packages_by_id(id, cancel).await {
            Ok(entries) => entries,
            Err(e) => {
                skip_feed(self.source.as_str(), id, e)?;
                return Ok(Vec::new());
            }
        };

        let versions = entries
            .iter()
            .filter_map(|props| props.get("Version").or_else(|| props.get("NormalizedVersion")))
            .filter_map(|v| PackageVersion::parse(v).ok());

        Ok(distinct_versions(versions))
    }

    async fn list_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Package>, Cancelled> {
        let entries = match self.find_packages_by_id(id, cancel).await {
            Ok(entries) => entries,
            Err(e) => {
                skip_feed(self.source.as_str(), id, e)?;
                return Ok(Vec::new());
            }
        };

        let packages = entries.iter().filter_map(|props| match to_package(props) {
            Ok(package) => Some(package),
            Err(e) => {
                debug!(source = %self.source, package = id, error = %e, "skipping untranslatable entry");
                None
            }
        });

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
            Err(e) => {
                error!(package = id, version = %version, error = %e, "failed to download package from upstream");
                Ok(None)
            }
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// The `href` of a `<link rel="next">` element, if `e` is one.
fn next_link(e: &BytesStart<'_>) -> Result<Option<String>, UpstreamError> {
    let mut rel = None;
    let mut href = None;
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    Ok(href.filter(|_| rel.as_deref() == Some("next")))
}

/// Parse one Atom page of an OData feed.
///
/// Only the pieces the mirror needs are read: `<m:properties>` children of
/// each entry, the entry title, and the feed's `next` link. Null properties
/// are left out of the map.
fn parse_feed(xml: &str) -> Result<FeedPage, UpstreamError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = FeedPage::default();
    let mut entry: Option<EntryProperties> = None;
    let mut in_properties = false;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                match (entry.is_some(), in_properties, name.as_str()) {
                    (false, _, "entry") => entry = Some(EntryProperties::new()),
                    (false, _, "link") => page.next = next_link(&e)?.or(page.next.take()),
                    (true, false, "properties") => in_properties = true,
                    (true, false, "title") => field = Some(ATOM_TITLE.to_string()),
                    (true, true, _) => field = Some(name),
                    _ => {}
                }
                text.clear();
            }
            Event::Empty(e) => {
                if entry.is_none() && local_name(&e) == "link" {
                    page.next = next_link(&e)?.or(page.next.take());
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(key) = field.take() {
                    if let Some(props) = entry.as_mut() {
                        if !text.is_empty() {
                            props.insert(key, std::mem::take(&mut text));
                        }
                    }
                } else if name == "properties" {
                    in_properties = false;
                } else if name == "entry" {
                    page.entries.extend(entry.take());
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}

fn parse_bool(props: &EntryProperties, key: &str) -> Option<bool> {
    props.get(key).and_then(|v| v.trim().parse::<bool>().ok())
}

fn get(props: &EntryProperties, key: &str) -> Option<String> {
    non_empty(props.get(key).cloned())
}

/// `id:range:framework|...`. An entry without an id marks a framework with
/// no dependencies.
fn parse_dependencies(deps: Option<&str>) -> Vec<PackageDependency> {
    deps.unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            let mut parts = d.splitn(3, ':').map(str::trim);
            let id = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
            let range = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
            let framework = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
            match id {
                None => PackageDependency::empty_group(framework),
                Some(id) => PackageDependency {
                    id: Some(id),
                    version_range: range,
                    target_framework: framework,
                },
            }
        })
        .collect()
}

fn to_package(props: &EntryProperties) -> Result<Package, UpstreamError> {
    let id = get(props, "Id")
        .or_else(|| get(props, ATOM_TITLE))
        .ok_or_else(|| UpstreamError::InvalidEntry("entry has no package id".to_string()))?;
    let version_text = get(props, "Version")
        .or_else(|| get(props, "NormalizedVersion"))
        .ok_or_else(|| UpstreamError::InvalidEntry(format!("{} has no version", id)))?;
    let version = PackageVersion::parse(&version_text)?;
    let published = parse_published(props.get("Published").map(String::as_str));

    Ok(Package {
        id,
        is_prerelease: version.is_prerelease(),
        semver_level: SemVerLevel::for_version(&version),
        version,
        authors: parse_authors(props.get("Authors").map(String::as_str)),
        description: get(props, "Description"),
        downloads: 0,
        has_readme: false,
        language: get(props, "Language"),
        listed: is_listed(parse_bool(props, "Listed"), &published),
        min_client_version: get(props, "MinClientVersion"),
        published,
        require_license_acceptance: parse_bool(props, "RequireLicenseAcceptance")
            .unwrap_or(false),
        summary: get(props, "Summary"),
        title: get(props, "Title"),
        icon_url: parse_url(props.get("IconUrl").map(String::as_str)),
        license_url: parse_url(props.get("LicenseUrl").map(String::as_str)),
        project_url: parse_url(props.get("ProjectUrl").map(String::as_str)),
        repository_url: None,
        repository_type: None,
        tags: parse_tags(props.get("Tags")),
        package_types: Vec::new(),
        dependencies: parse_dependencies(props.get("Dependencies").map(String::as_str)),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    fn entry_xml(id: &str, version: &str, extra: &str) -> String {
        format!(
            r#"<entry>
                <id>https://feed.test/api/v2/Packages(Id='{id}',Version='{version}')</id>
                <title type="text">{id}</title>
                <author><name>ignored</name></author>
                <content type="application/zip" src="https://feed.test/api/v2/package/{id}/{version}" />
                <m:properties>
                    <d:Version>{version}</d:Version>
                    <d:Authors>Alice, Bob</d:Authors>
                    <d:Tags> json  fast </d:Tags>
                    <d:Published m:type="Edm.DateTime">2020-03-04T05:06:07.89</d:Published>
                    <d:IsPrerelease m:type="Edm.Boolean">false</d:IsPrerelease>
                    <d:Summary m:null="true" />
                    {extra}
                </m:properties>
            </entry>"#
        )
    }

    fn feed_xml(entries: &[String], next: Option<&str>) -> String {
        let next = next
            .map(|href| format!(r#"<link rel="next" href="{}" />"#, href.replace('&', "&amp;")))
            .unwrap_or_default();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
            <feed xml:base="https://feed.test/api/v2" xmlns="http://www.w3.org/2005/Atom"
                  xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
                  xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
                <title type="text">FindPackagesById</title>
                <link rel="self" title="FindPackagesById" href="FindPackagesById" />
                {}
                {}
            </feed>"#,
            entries.join("\n"),
            next
        )
    }

    #[test]
    fn test_parse_feed_entries() {
        let xml = feed_xml(
            &[
                entry_xml(
                    "Newtonsoft.Json",
                    "13.0.1",
                    "<d:Description>Json.NET &amp; friends</d:Description>\
                     <d:ProjectUrl>https://www.newtonsoft.com/json</d:ProjectUrl>\
                     <d:LicenseUrl>::bad::</d:LicenseUrl>",
                ),
                entry_xml("Newtonsoft.Json", "13.0.2-beta.1", ""),
            ],
            None,
        );

        let page = parse_feed(&xml).unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(page.next.is_none());

        let first = &page.entries[0];
        assert_eq!(first.get(ATOM_TITLE).map(String::as_str), Some("Newtonsoft.Json"));
        assert_eq!(first.get("Version").map(String::as_str), Some("13.0.1"));
        assert_eq!(
            first.get("Description").map(String::as_str),
            Some("Json.NET & friends")
        );
        assert!(!first.contains_key("Summary"));
    }

    #[test]
    fn test_parse_feed_next_link() {
        let xml = feed_xml(&[], Some("https://feed.test/api/v2/FindPackagesById()?id='A'&$skiptoken='A','1.0.0'"));
        let page = parse_feed(&xml).unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(
            page.next.as_deref(),
            Some("https://feed.test/api/v2/FindPackagesById()?id='A'&$skiptoken='A','1.0.0'")
        );
    }

    #[test]
    fn test_to_package() {
        let xml = feed_xml(
            &[entry_xml(
                "Newtonsoft.Json",
                "13.0.1",
                "<d:Dependencies>Microsoft.CSharp:[4.3.0, ):netstandard1.0|::net45|System.Xml::netstandard1.3</d:Dependencies>\
                 <d:RequireLicenseAcceptance>true</d:RequireLicenseAcceptance>\
                 <d:IconUrl>not a url</d:IconUrl>",
            )],
            None,
        );
        let page = parse_feed(&xml).unwrap();
        let package = to_package(&page.entries[0]).unwrap();

        assert_eq!(package.id, "Newtonsoft.Json");
        assert_eq!(package.version, v("13.0.1"));
        assert_eq!(package.authors, ["Alice", "Bob"]);
        assert_eq!(package.tags, ["json", "fast"]);
        assert_eq!(
            package.published,
            Utc.with_ymd_and_hms(2020, 3, 4, 5, 6, 7).unwrap()
                + chrono::TimeDelta::milliseconds(890)
        );
        assert!(package.listed);
        assert!(package.require_license_acceptance);
        assert!(package.icon_url.is_none());
        assert!(package.summary.is_none());
        assert_eq!(package.semver_level, SemVerLevel::Unknown);

        assert_eq!(
            package.dependencies,
            [
                PackageDependency {
                    id: Some("Microsoft.CSharp".to_string()),
                    version_range: Some("[4.3.0, )".to_string()),
                    target_framework: Some("netstandard1.0".to_string()),
                },
                PackageDependency::empty_group(Some("net45".to_string())),
                PackageDependency {
                    id: Some("System.Xml".to_string()),
                    version_range: None,
                    target_framework: Some("netstandard1.3".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_dependencies_empty() {
        assert!(parse_dependencies(None).is_empty());
        assert!(parse_dependencies(Some("")).is_empty());
    }

    #[test]
    fn test_to_package_requires_version() {
        let mut props = EntryProperties::new();
        props.insert("Id".to_string(), "Foo".to_string());
        assert!(matches!(to_package(&props), Err(UpstreamError::InvalidEntry(_))));
    }

    #[tokio::test]
    async fn test_list_follows_paging() {
        let server = MockServer::start().await;
        let next = format!("{}/api/v2/FindPackagesById()?id='Foo'&$skip=1", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/v2/FindPackagesById()"))
            .and(query_param("id", "'Foo'"))
            .and(query_param("$skip", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed_xml(
                &[entry_xml("Foo", "2.0.0", ""), entry_xml("Foo", "1.0", "")],
                None,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/FindPackagesById()"))
            .and(query_param("id", "'Foo'"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed_xml(
                &[entry_xml("Foo", "1.0.0", "")],
                Some(&next),
            )))
            .mount(&server)
            .await;

        let source = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
        let client = V2UpstreamClient::new(source, Duration::from_secs(5)).unwrap();
        let cancel = CancellationToken::new();

        let versions = client.list_package_versions("Foo", &cancel).await.unwrap();
        let texts: Vec<_> = versions.iter().map(|v| v.original()).collect();
        assert_eq!(texts, ["1.0.0", "2.0.0", "1.0"]);

        let packages = client.list_packages("Foo", &cancel).await.unwrap();
        let versions: Vec<_> = packages.iter().map(|p| p.version.to_string()).collect();
        assert_eq!(versions, ["1.0.0", "2.0.0"]);
    }

    #[tokio::test]
    async fn test_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/package/Foo/1.0.0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"nupkg".to_vec()))
            .mount(&server)
            .await;

        let source = Url::parse(&format!("{}/api/v2", server.uri())).unwrap();
        let client = V2UpstreamClient::new(source, Duration::from_secs(5)).unwrap();
        let cancel = CancellationToken::new();

        let content = client
            .download_package_or_none("Foo", &v("1.0"), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content.into_bytes().await.unwrap(), b"nupkg");

        let missing = client
            .download_package_or_none("Foo", &v("2.0.0"), &cancel)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
        let client = V2UpstreamClient::new(source, Duration::from_secs(5)).unwrap();
        let cancel = CancellationToken::new();

        assert!(client.list_packages("Foo", &cancel).await.unwrap().is_empty());
        assert!(
            client
                .download_package_or_none("Foo", &v("1.0.0"), &cancel)
                .await
                .unwrap()
                .is_none()
        );
    }
}
