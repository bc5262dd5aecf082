//! Registration catalog entries and their translation into [`Package`].

use serde::Deserialize;

use crate::types::{Package, PackageDependency, PackageVersion, SemVerLevel};
use crate::upstream::error::UpstreamError;
use crate::upstream::translate::{
    is_listed, non_empty, parse_authors, parse_published, parse_tags, parse_url,
};

/// A field feeds send either as one string or as a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        match self {
            OneOrMany::One(s) => s == needle,
            OneOrMany::Many(v) => v.iter().any(|s| s == needle),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CatalogEntry {
    pub id: String,
    pub version: String,
    pub authors: Option<OneOrMany>,
    pub dependency_groups: Option<Vec<DependencyGroup>>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub language: Option<String>,
    pub license_url: Option<String>,
    pub listed: Option<bool>,
    pub min_client_version: Option<String>,
    pub project_url: Option<String>,
    pub published: Option<String>,
    pub require_license_acceptance: Option<bool>,
    pub summary: Option<String>,
    pub tags: Option<OneOrMany>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DependencyGroup {
    pub target_framework: Option<String>,
    pub dependencies: Option<Vec<Dependency>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Dependency {
    pub id: String,
    pub range: Option<String>,
}

impl CatalogEntry {
    pub(crate) fn into_package(self) -> Result<Package, UpstreamError> {
        let version = PackageVersion::parse(&self.version)?;
        let published = parse_published(self.published.as_deref());

        let authors = self
            .authors
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .flat_map(|a| parse_authors(Some(a)))
            .collect();

        Ok(Package {
            id: self.id,
            is_prerelease: version.is_prerelease(),
            semver_level: SemVerLevel::for_version(&version),
            version,
            authors,
            description: self.description,
            downloads: 0,
            has_readme: false,
            language: non_empty(self.language),
            listed: is_listed(self.listed, &published),
            min_client_version: non_empty(self.min_client_version),
            published,
            require_license_acceptance: self.require_license_acceptance.unwrap_or(false),
            summary: self.summary,
            title: self.title,
            icon_url: parse_url(self.icon_url.as_deref()),
            license_url: parse_url(self.license_url.as_deref()),
            project_url: parse_url(self.project_url.as_deref()),
            repository_url: None,
            repository_type: None,
            tags: parse_tags(self.tags.map(OneOrMany::into_vec).unwrap_or_default()),
            package_types: Vec::new(),
            dependencies: to_dependencies(self.dependency_groups.unwrap_or_default()),
        })
    }
}

fn to_dependencies(groups: Vec<DependencyGroup>) -> Vec<PackageDependency> {
    groups
        .into_iter()
        .flat_map(|group| {
            let framework = group.target_framework;
            match group.dependencies.filter(|deps| !deps.is_empty()) {
                None => vec![PackageDependency::empty_group(framework)],
                Some(deps) => deps
                    .into_iter()
                    .map(|d| PackageDependency {
                        id: Some(d.id),
                        version_range: d.range,
                        target_framework: framework.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}
