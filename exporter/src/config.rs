use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::collectors::connections::ConnectionSource;

/// Exporter configuration loaded from a TOML file or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Address and port the HTTP server listens on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Seconds between two periodic collection passes.
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u64,

    /// File listing package names to leave out, one per line.
    #[serde(default)]
    pub exclude_packages_file: Option<PathBuf>,

    /// Where open ports are read from.
    #[serde(default)]
    pub connection_source: ConnectionSource,

    /// Fill the `interface` label of open ports from the local address.
    #[serde(default)]
    pub resolve_interfaces: bool,
}

fn default_listen_address() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_scrape_interval() -> u64 {
    300
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            scrape_interval_secs: default_scrape_interval(),
            exclude_packages_file: None,
            connection_source: ConnectionSource::default(),
            resolve_interfaces: false,
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: ExporterConfig = toml::de::from_str(&contents)?;
        Ok(config)
    }

    /// Package names to exclude, read from `exclude_packages_file`.
    pub fn load_exclusions(&self) -> Result<HashSet<String>> {
        match &self.exclude_packages_file {
            Some(path) => load_exclusions(path),
            None => Ok(HashSet::new()),
        }
    }
}

/// Read an exclusion list: one package name per line, blank lines and
/// `#` comments ignored.
pub fn load_exclusions(path: &Path) -> Result<HashSet<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading exclusion file {}", path.display()))?;
    Ok(parse_exclusions(&contents))
}

pub fn parse_exclusions(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.listen_address, "0.0.0.0:9100");
        assert_eq!(config.scrape_interval_secs, 300);
        assert_eq!(config.connection_source, ConnectionSource::Procfs);
        assert!(!config.resolve_interfaces);
        assert!(config.load_exclusions().unwrap().is_empty());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExporterConfig = toml::de::from_str(
            r#"
            scrape_interval_secs = 15
            connection_source = "ss"
            "#,
        )
        .unwrap();
        assert_eq!(config.scrape_interval_secs, 15);
        assert_eq!(config.connection_source, ConnectionSource::Ss);
        assert_eq!(config.listen_address, "0.0.0.0:9100");
    }

    #[test]
    fn test_unknown_connection_source_rejected() {
        let parsed: std::result::Result<ExporterConfig, _> =
            toml::de::from_str(r#"connection_source = "netlink""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_exclusions() {
        let set = parse_exclusions("# kernels\nkernel\n  kernel-core  \n\n#gpg-pubkey\nbash\n");
        assert_eq!(set.len(), 3);
        assert!(set.contains("kernel"));
        assert!(set.contains("kernel-core"));
        assert!(set.contains("bash"));
        assert!(!set.contains("#gpg-pubkey"));
    }

    #[test]
    fn test_load_exclusions_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "kernel\n# comment\nfirmware").unwrap();

        let config = ExporterConfig {
            exclude_packages_file: Some(file.path().to_path_buf()),
            ..ExporterConfig::default()
        };
        let set = config.load_exclusions().unwrap();
        assert_eq!(set, HashSet::from(["kernel".to_string(), "firmware".to_string()]));
    }

    #[test]
    fn test_missing_exclusion_file_is_error() {
        assert!(load_exclusions(Path::new("/nonexistent/exclude.txt")).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_address = \"127.0.0.1:9200\"\nresolve_interfaces = true").unwrap();

        let config = ExporterConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9200");
        assert!(config.resolve_interfaces);
    }
}
