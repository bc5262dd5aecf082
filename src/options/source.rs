use serde::{Deserialize, Serialize};
use url::Url;

/// One upstream feed to mirror.
///
/// Compared and hashed by value so duplicate configuration entries collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MirrorSource {
    /// Service index (V3) or OData root (V2). `None` only in invalid configs.
    #[serde(default)]
    pub package_source: Option<Url>,

    /// Whether the feed speaks the legacy V2 protocol.
    #[serde(default)]
    pub legacy: bool,
}

impl MirrorSource {
    pub fn new(package_source: Url, legacy: bool) -> Self {
        Self {
            package_source: Some(package_source),
            legacy,
        }
    }

    pub fn dialect(&self) -> &'static str {
        if self.legacy { "v2" } else { "v3" }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_equality_by_value() {
        let a = MirrorSource::new(url("https://api.nuget.org/v3/index.json"), false);
        let b = MirrorSource::new(url("https://api.nuget.org/v3/index.json"), false);
        let c = MirrorSource::new(url("https://api.nuget.org/v3/index.json"), true);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_dialect() {
        assert_eq!(MirrorSource::new(url("https://a.test/"), true).dialect(), "v2");
        assert_eq!(MirrorSource::new(url("https://a.test/"), false).dialect(), "v3");
    }
}
