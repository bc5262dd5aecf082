//! Mirror configuration.
//!
//! Read from `~/.config/upmirror/mirror.toml` unless a path is given:
//!
//! ```toml
//! enabled = true
//! package_download_timeout_seconds = 600
//!
//! [[sources]]
//! package_source = "https://api.nuget.org/v3/index.json"
//! legacy = false
//! ```
//!
//! Older deployments set a single `package_source`/`legacy` pair at the top
//! level instead. That pair is projected into `sources` on load, so the rest
//! of the crate only ever reads the source list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{ConfigError, ValidationError};
use super::source::MirrorSource;

const CONFIG_DIR: &str = "upmirror";
const CONFIG_FILE: &str = "mirror.toml";

const DEFAULT_DOWNLOAD_TIMEOUT_SECONDS: u64 = 600;

/// Validated description of the upstream feeds to mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMirrorOptions")]
pub struct MirrorOptions {
    /// If false, nothing is mirrored and the rest is not validated.
    pub enabled: bool,

    package_source: Option<Url>,

    legacy: bool,

    /// Timeout applied to every request made to an upstream feed.
    pub package_download_timeout_seconds: u64,

    sources: Vec<MirrorSource>,
}

#[derive(Deserialize)]
struct RawMirrorOptions {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    package_source: Option<Url>,
    #[serde(default)]
    legacy: bool,
    #[serde(default = "default_download_timeout")]
    package_download_timeout_seconds: u64,
    #[serde(default)]
    sources: Vec<MirrorSource>,
}

fn default_download_timeout() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECONDS
}

impl From<RawMirrorOptions> for MirrorOptions {
    fn from(raw: RawMirrorOptions) -> Self {
        let mut options = MirrorOptions {
            enabled: raw.enabled,
            package_source: None,
            legacy: raw.legacy,
            package_download_timeout_seconds: raw.package_download_timeout_seconds,
            sources: Vec::new(),
        };

        // An explicit source list takes precedence over the single-source fields.
        if raw.sources.is_empty() {
            if let Some(url) = raw.package_source {
                options.set_package_source(url, raw.legacy);
            }
        } else {
            options.package_source = raw.package_source;
            for source in raw.sources {
                options.add_source(source);
            }
        }

        options
    }
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            package_source: None,
            legacy: false,
            package_download_timeout_seconds: DEFAULT_DOWNLOAD_TIMEOUT_SECONDS,
            sources: Vec::new(),
        }
    }
}

impl MirrorOptions {
    /// Enabled options mirroring the given sources, in order.
    pub fn with_sources(sources: impl IntoIterator<Item = MirrorSource>) -> Self {
        let mut options = Self {
            enabled: true,
            ..Self::default()
        };
        for source in sources {
            options.add_source(source);
        }
        options
    }

    /// Single-source compatibility setter.
    ///
    /// Replaces the source list with exactly this feed.
    pub fn set_package_source(&mut self, url: Url, legacy: bool) {
        self.package_source = Some(url.clone());
        self.legacy = legacy;
        self.sources = vec![MirrorSource::new(url, legacy)];
    }

    /// Append a source unless an identical one is already configured.
    pub fn add_source(&mut self, source: MirrorSource) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    pub fn package_source(&self) -> Option<&Url> {
        self.package_source.as_ref()
    }

    pub fn legacy(&self) -> bool {
        self.legacy
    }

    /// Distinct sources in configured order.
    pub fn sources(&self) -> &[MirrorSource] {
        &self.sources
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.package_download_timeout_seconds)
    }

    /// Check the configuration rules. Never fails; returns every violation.
    pub fn validate(&self) -> Vec<ValidationError> {
        if !self.enabled {
            return Vec::new();
        }

        if self.sources.is_empty() {
            if self.package_source.is_none() {
                return vec![ValidationError::new(
                    "package_source",
                    "endpoint required if mirroring is enabled",
                )];
            }
            return Vec::new();
        }

        self.sources
            .iter()
            .enumerate()
            .filter(|(_, source)| source.package_source.is_none())
            .map(|(i, _)| {
                ValidationError::new(format!("sources[{}]", i), "each source must have a valid URL")
            })
            .collect()
    }

    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Load options from `path`, or from the default location.
    ///
    /// A missing default file means mirroring is disabled; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::config_path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read mirror config {}", path.display()))?;

        Self::from_toml(&content).context("Failed to parse mirror config")
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize mirror config")
    }

    /// Default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn null_source() -> MirrorSource {
        MirrorSource {
            package_source: None,
            legacy: false,
        }
    }

    #[test]
    fn test_default_options() {
        let options = MirrorOptions::default();
        assert!(!options.enabled);
        assert!(!options.has_sources());
        assert_eq!(options.package_download_timeout_seconds, 600);
        assert_eq!(options.download_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_disabled_is_always_valid() {
        let mut options = MirrorOptions::default();
        assert!(options.validate().is_empty());

        options.add_source(null_source());
        assert!(options.validate().is_empty());
    }

    #[test]
    fn test_enabled_without_sources_requires_endpoint() {
        let options = MirrorOptions {
            enabled: true,
            ..MirrorOptions::default()
        };

        let errors = options.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].member, "package_source");
        assert!(options.ensure_valid().is_err());
    }

    #[test]
    fn test_enabled_with_legacy_endpoint_is_valid() {
        let mut options = MirrorOptions {
            enabled: true,
            ..MirrorOptions::default()
        };
        options.set_package_source(url("https://www.nuget.org/api/v2/"), true);

        assert!(options.validate().is_empty());
        assert_eq!(
            options.sources(),
            [MirrorSource::new(url("https://www.nuget.org/api/v2/"), true)]
        );
    }

    #[test]
    fn test_each_null_source_is_reported() {
        let options = MirrorOptions::with_sources([
            null_source(),
            MirrorSource::new(url("https://api.nuget.org/v3/index.json"), false),
            MirrorSource {
                package_source: None,
                legacy: true,
            },
        ]);

        let errors = options.validate();
        let members: Vec<_> = errors.iter().map(|e| e.member.as_str()).collect();
        assert_eq!(members, ["sources[0]", "sources[2]"]);
        assert!(errors.iter().all(|e| e.message == "each source must have a valid URL"));
    }

    #[test]
    fn test_duplicate_sources_collapse() {
        let nuget = MirrorSource::new(url("https://api.nuget.org/v3/index.json"), false);
        let options = MirrorOptions::with_sources([
            nuget.clone(),
            MirrorSource::new(url("https://feed.example.com/v3/index.json"), false),
            nuget.clone(),
        ]);

        assert_eq!(options.sources().len(), 2);
        assert_eq!(options.sources()[0], nuget);
    }

    #[test]
    fn test_parse_source_list() {
        let options = MirrorOptions::from_toml(
            r#"
            enabled = true
            package_download_timeout_seconds = 30

            [[sources]]
            package_source = "https://api.nuget.org/v3/index.json"

            [[sources]]
            package_source = "https://www.nuget.org/api/v2/"
            legacy = true

            [[sources]]
            package_source = "https://api.nuget.org/v3/index.json"
            "#,
        )
        .unwrap();

        assert!(options.enabled);
        assert_eq!(options.download_timeout(), Duration::from_secs(30));
        assert_eq!(options.sources().len(), 2);
        assert!(!options.sources()[0].legacy);
        assert!(options.sources()[1].legacy);
        assert!(options.validate().is_empty());
    }

    #[test]
    fn test_parse_legacy_fields_project_into_sources() {
        let options = MirrorOptions::from_toml(
            r#"
            enabled = true
            package_source = "https://www.nuget.org/api/v2/"
            legacy = true
            "#,
        )
        .unwrap();

        assert_eq!(options.package_download_timeout_seconds, 600);
        assert_eq!(
            options.sources(),
            [MirrorSource::new(url("https://www.nuget.org/api/v2/"), true)]
        );
    }

    #[test]
    fn test_parse_source_without_url() {
        let options = MirrorOptions::from_toml(
            r#"
            enabled = true

            [[sources]]
            legacy = true
            "#,
        )
        .unwrap();

        let errors = options.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].member, "sources[0]");
    }

    #[test]
    fn test_negative_timeout_rejected() {
        assert!(MirrorOptions::from_toml("package_download_timeout_seconds = -1").is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let options = MirrorOptions::with_sources([MirrorSource::new(
            url("https://api.nuget.org/v3/index.json"),
            false,
        )]);

        let toml_str = options.to_toml().unwrap();
        let parsed = MirrorOptions::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.toml");
        std::fs::write(
            &path,
            "enabled = true\npackage_source = \"https://api.nuget.org/v3/index.json\"\n",
        )
        .unwrap();

        let options = MirrorOptions::load(Some(&path)).unwrap();
        assert!(options.enabled);
        assert_eq!(options.sources().len(), 1);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MirrorOptions::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
