//! Runtime server configuration.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

/// Deserialised from `config.toml` and `SEGMENTS_*` environment variables.
/// Every field has a default, so an absent file is not an error.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  #[serde(default = "default_reports_dir")]
  pub reports_dir:         PathBuf,
  /// Origin used when building report download links.
  #[serde(default = "default_base_url")]
  pub base_url:            String,
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs: u64,
}

fn default_host() -> String { "0.0.0.0".to_owned() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("segments.db") }
fn default_reports_dir() -> PathBuf { PathBuf::from("reports") }
fn default_base_url() -> String { "http://localhost:8000".to_owned() }
fn default_sweep_interval_secs() -> u64 { 3600 }

impl ServerConfig {
  /// Load from an optional TOML file, then overlay `SEGMENTS_*` variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SEGMENTS"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_secs) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/segments-config.toml")).unwrap();
    assert_eq!(cfg.port, 8000);
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.store_path, PathBuf::from("segments.db"));
    assert_eq!(cfg.sweep_interval(), Duration::from_secs(3600));
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "port = 9100\nreports_dir = \"/tmp/out\"\nsweep_interval_secs = 60").unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.reports_dir, PathBuf::from("/tmp/out"));
    assert_eq!(cfg.sweep_interval_secs, 60);
    assert_eq!(cfg.base_url, "http://localhost:8000");
    assert_eq!(cfg.address(), "0.0.0.0:9100");
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
