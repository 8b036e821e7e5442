//! Layered configuration.
//!
//! Built-in defaults first, then every given file merged over them in order.
//! Files are TOML or JSON, picked by extension; a file that does not exist
//! contributes nothing. Environment variables are never read.
//!
//! ```toml
//! [site]
//! origin = "https://si.example/"
//!
//! [cache]
//! generation = "si-cache-v2"
//! storage = { kind = "local", path = "/var/cache/lectern" }
//!
//! [embed]
//! verify_delay_ms = 1500
//! strings.default_author = "Académie"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml};
use lectern_cache::{DEFAULT_GENERATION, Manifest, validate_generation};
use lectern_embed::{DEFAULT_VERIFY_DELAY, Strings};
use lectern_fetch::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "lectern.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub cache: CacheConfig,
    pub embed: EmbedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin every relative path is resolved against.
    pub origin: String,
}
impl Default for SiteConfig {
    fn default() -> Self {
        Self { origin: "http://localhost:8080/".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub generation: String,
    pub storage: StorageConfig,
    pub manifest: Manifest,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: DEFAULT_GENERATION.to_string(),
            storage: StorageConfig::default(),
            manifest: Manifest::default(),
        }
    }
}

/// Where cached responses live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    Local {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub verify_delay_ms: u64,
    pub strings: Strings,
}
impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            verify_delay_ms: u64::try_from(DEFAULT_VERIFY_DELAY.as_millis()).unwrap_or(2000),
            strings: Strings::default(),
        }
    }
}
impl EmbedConfig {
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

impl Config {
    /// Load the defaults overlaid with `paths`, in order, and validate.
    pub fn load<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        for path in paths {
            let path = path.as_ref();
            figment = match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
            };
            tracing::debug!(path = %path.display(), "Merged configuration file");
        }
        Self::extract(figment)
    }

    /// Load the defaults overlaid with a TOML document, and validate.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Self::extract(Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)))
    }

    /// Load from the per-user configuration file, if there is one.
    pub fn discover() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load([path]),
            None => {
                tracing::debug!("No configuration directory on this platform; using defaults");
                Self::load(Vec::<PathBuf>::new())
            },
        }
    }

    /// `<config dir>/lectern.toml` for the current user.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lectern").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.origin()?;
        validate_generation(&self.cache.generation)
            .or_raise(|| ErrorKind::InvalidGeneration(self.cache.generation.clone()))?;
        if let StorageConfig::Local { path } = &self.cache.storage
            && !path.is_absolute()
        {
            exn::bail!(ErrorKind::InvalidCachePath(path.display().to_string()));
        }
        Ok(())
    }

    /// The parsed site origin.
    pub fn origin(&self) -> Result<Url> {
        let origin = &self.site.origin;
        let url = Url::parse(origin).or_raise(|| ErrorKind::InvalidOrigin(origin.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidOrigin(origin.clone()));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::load(Vec::<PathBuf>::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache.generation, "si-cache-v1");
        assert_eq!(config.cache.storage, StorageConfig::Memory);
        assert_eq!(config.embed.verify_delay(), Duration::from_millis(2000));
        assert_eq!(config.embed.strings.default_title, "Document PDF");
    }

    #[test]
    fn test_toml_overrides_only_what_it_names() {
        let config = Config::from_toml(
            r#"
            [site]
            origin = "https://si.example/"

            [cache]
            generation = "si-cache-v2"
            storage = { kind = "local", path = "/var/cache/lectern" }

            [embed]
            verify_delay_ms = 1500
            strings.default_author = "Académie"
            "#,
        )
        .unwrap();
        assert_eq!(config.origin().unwrap().as_str(), "https://si.example/");
        assert_eq!(config.cache.generation, "si-cache-v2");
        assert_eq!(config.cache.storage, StorageConfig::Local { path: "/var/cache/lectern".into() });
        assert_eq!(config.cache.manifest, Manifest::default());
        assert_eq!(config.embed.verify_delay_ms, 1500);
        assert_eq!(config.embed.strings.default_author, "Académie");
        assert_eq!(config.embed.strings.byline, "par");
    }

    #[test]
    fn test_files_merge_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let toml = dir.path().join("lectern.toml");
        let json = dir.path().join("override.json");
        fs::write(&toml, "[cache]\ngeneration = \"from-toml\"\n[embed]\nverify_delay_ms = 10\n").unwrap();
        fs::write(&json, r#"{ "cache": { "generation": "from-json" } }"#).unwrap();

        let config = Config::load([&toml, &json]).unwrap();
        assert_eq!(config.cache.generation, "from-json");
        assert_eq!(config.embed.verify_delay_ms, 10);
    }

    #[test]
    fn test_missing_file_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load([dir.path().join("absent.toml")]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unsupported_format() {
        let err = Config::load(["/etc/lectern.yaml"]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[cache\ngeneration = ").unwrap();
        let err = Config::load([&path]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[rstest]
    #[case("[site]\norigin = \"not a url\"")]
    #[case("[site]\norigin = \"ftp://si.example/\"")]
    #[case("[site]\norigin = \"mailto:someone@si.example\"")]
    fn test_rejects_bad_origin(#[case] toml: &str) {
        let err = Config::from_toml(toml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidOrigin(_)));
    }

    #[rstest]
    #[case("[cache]\ngeneration = \"\"")]
    #[case("[cache]\ngeneration = \"../escape\"")]
    fn test_rejects_bad_generation(#[case] toml: &str) {
        let err = Config::from_toml(toml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidGeneration(_)));
    }

    #[test]
    fn test_rejects_relative_cache_path() {
        let err = Config::from_toml("[cache]\nstorage = { kind = \"local\", path = \"cache\" }").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidCachePath(_)));
    }
}
