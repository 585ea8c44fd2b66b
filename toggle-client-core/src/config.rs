//! Client configuration: source address parsing and the YAML config file.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A parsed definition source address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Poll an HTTP service at this base URL.
    Http(String),
    /// Watch a local definitions file.
    File(PathBuf),
    /// No source configured; the client evaluates everything to false.
    Disabled,
}

impl SourceSpec {
    /// Parse a source address.
    ///
    /// `http(s)://` URLs poll a service, `file://` URLs and bare paths watch
    /// a local file, an empty string disables the client. Anything else is a
    /// configuration error and fails construction.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Self::Disabled);
        }
        if spec.contains("://") {
            let url = url::Url::parse(spec)?;
            return match url.scheme() {
                "http" | "https" => Ok(Self::Http(spec.trim_end_matches('/').to_string())),
                "file" => Ok(Self::File(PathBuf::from(url.path()))),
                other => Err(anyhow!(
                    "Unsupported source scheme '{}', available schemes: [http, https, file]",
                    other
                )),
            };
        }
        Ok(Self::File(PathBuf::from(spec)))
    }
}

fn default_app_name() -> String {
    "anon-app".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_fetch_timeout_seconds() -> u64 {
    3
}

/// Toggle client settings, loadable from YAML or built programmatically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Definition source address; see [`SourceSpec::parse`].
    pub source: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Defaults to `hostname:pid` when absent.
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default = "default_interval_seconds")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_interval_seconds")]
    pub metrics_interval_seconds: u64,
    #[serde(default)]
    pub disable_metrics: bool,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
}

impl ClientConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            app_name: default_app_name(),
            instance_id: None,
            refresh_interval_seconds: default_interval_seconds(),
            metrics_interval_seconds: default_interval_seconds(),
            disable_metrics: false,
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Err(anyhow!("Empty configuration file"));
        }
        let config: ClientConfig = serde_saphyr::from_str(yaml).map_err(|err| anyhow!(err))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_source() -> Result<()> {
        assert_eq!(
            SourceSpec::parse("http://localhost:4242/")?,
            SourceSpec::Http("http://localhost:4242".to_string())
        );
        assert_eq!(
            SourceSpec::parse("https://toggles.example.com")?,
            SourceSpec::Http("https://toggles.example.com".to_string())
        );
        Ok(())
    }

    #[test]
    fn parse_file_source() -> Result<()> {
        assert_eq!(
            SourceSpec::parse("file:///etc/toggles.json")?,
            SourceSpec::File(PathBuf::from("/etc/toggles.json"))
        );
        assert_eq!(
            SourceSpec::parse("data/toggles.json")?,
            SourceSpec::File(PathBuf::from("data/toggles.json"))
        );
        Ok(())
    }

    #[test]
    fn empty_source_disables_the_client() -> Result<()> {
        assert_eq!(SourceSpec::parse("")?, SourceSpec::Disabled);
        assert_eq!(SourceSpec::parse("   ")?, SourceSpec::Disabled);
        Ok(())
    }

    #[test]
    fn unknown_scheme_fails_fast() {
        assert!(SourceSpec::parse("ftp://example.com/toggles").is_err());
    }

    #[test]
    fn parse_config_with_defaults() -> Result<()> {
        let config = ClientConfig::from_yaml_str("source: http://localhost:4242\n")?;
        assert_eq!(config.source, "http://localhost:4242");
        assert_eq!(config.app_name, "anon-app");
        assert_eq!(config.refresh_interval_seconds, 60);
        assert_eq!(config.metrics_interval_seconds, 60);
        assert!(!config.disable_metrics);
        assert_eq!(config.fetch_timeout_seconds, 3);
        Ok(())
    }

    #[test]
    fn parse_full_config() -> Result<()> {
        let yaml = r#"
source: https://toggles.example.com
app_name: checkout
instance_id: web-1:42
refresh_interval_seconds: 15
metrics_interval_seconds: 30
disable_metrics: true
fetch_timeout_seconds: 5
"#;
        let config = ClientConfig::from_yaml_str(yaml)?;
        assert_eq!(config.app_name, "checkout");
        assert_eq!(config.instance_id.as_deref(), Some("web-1:42"));
        assert_eq!(config.refresh_interval_seconds, 15);
        assert_eq!(config.metrics_interval_seconds, 30);
        assert!(config.disable_metrics);
        assert_eq!(config.fetch_timeout_seconds, 5);
        Ok(())
    }

    #[test]
    fn empty_config_is_rejected() {
        assert!(ClientConfig::from_yaml_str("").is_err());
    }
}
