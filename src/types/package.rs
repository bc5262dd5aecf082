use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::PackageVersion;

/// Whether a package needs SemVer 2.0.0 aware clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SemVerLevel {
    #[default]
    Unknown,
    SemVer2,
}

impl SemVerLevel {
    pub fn for_version(version: &PackageVersion) -> Self {
        if version.is_semver2() {
            SemVerLevel::SemVer2
        } else {
            SemVerLevel::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageType {
    pub name: String,
    pub version: Option<String>,
}

/// A dependency of a package, scoped to one target framework.
///
/// A framework that has no dependencies is recorded as a single entry with
/// neither `id` nor `version_range`. That is different from a package with
/// no dependency entries at all, which carries no framework information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub id: Option<String>,
    pub version_range: Option<String>,
    pub target_framework: Option<String>,
}

impl PackageDependency {
    pub fn empty_group(target_framework: Option<String>) -> Self {
        Self {
            id: None,
            version_range: None,
            target_framework,
        }
    }

    pub fn is_empty_group(&self) -> bool {
        self.id.is_none() && self.version_range.is_none()
    }
}

/// Canonical package metadata, as stored by the registry.
///
/// Every upstream dialect is translated into this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub version: PackageVersion,
    pub authors: Vec<String>,
    pub description: Option<String>,
    /// Upstream download counts are not authoritative; always 0 when mirrored.
    pub downloads: i64,
    pub has_readme: bool,
    pub is_prerelease: bool,
    pub language: Option<String>,
    pub listed: bool,
    pub min_client_version: Option<String>,
    pub published: DateTime<Utc>,
    pub require_license_acceptance: bool,
    pub semver_level: SemVerLevel,
    pub summary: Option<String>,
    pub title: Option<String>,
    pub icon_url: Option<Url>,
    pub license_url: Option<Url>,
    pub project_url: Option<Url>,
    pub repository_url: Option<Url>,
    pub repository_type: Option<String>,
    pub tags: Vec<String>,
    pub package_types: Vec<PackageType>,
    pub dependencies: Vec<PackageDependency>,
}

impl Package {
    /// `id@normalized-version`.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }
}
