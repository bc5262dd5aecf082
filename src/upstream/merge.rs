//! First-seen-wins deduplication of results gathered from several feeds.

use std::collections::HashSet;

use crate::types::{Package, PackageVersion};

/// Keep the first occurrence of each version text.
///
/// `1.0` and `1.0.0` are the same version but different text; both survive,
/// since feeds disagree on how they spell versions.
pub fn distinct_versions(versions: impl IntoIterator<Item = PackageVersion>) -> Vec<PackageVersion> {
    let mut seen = HashSet::new();
    versions
        .into_iter()
        .filter(|v| seen.insert(v.original().to_string()))
        .collect()
}

/// Keep the first package for each parsed version.
pub fn distinct_packages(packages: impl IntoIterator<Item = Package>) -> Vec<Package> {
    let mut seen = HashSet::new();
    packages
        .into_iter()
        .filter(|p| seen.insert(p.version.clone()))
        .collect()
}
