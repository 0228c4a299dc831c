use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::tmdb::client::TmdbSession;

/// Application configuration. Every field has a default, so running without
/// a config file works; only the API key (environment variable) is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub tmdb: TmdbConfig,
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
  /// Base URL of the TMDb v3 API
  pub base_url: String,
  /// Language for titles and overviews (e.g. "en-US")
  pub language: String,
}

impl Default for TmdbConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.themoviedb.org/3/".to_string(),
      language: "en-US".to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long cached catalog pages stay fresh
  pub page_ttl_minutes: i64,
  /// How long cached movie details stay fresh
  pub detail_ttl_minutes: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      page_ttl_minutes: 30,
      detail_ttl_minutes: 30,
    }
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./marquee.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/marquee/config.yaml
  ///
  /// When no file exists, defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Config::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("marquee.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("marquee").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the TMDb API key from environment variables.
  ///
  /// Checks MARQUEE_TMDB_KEY first, then TMDB_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("MARQUEE_TMDB_KEY")
      .or_else(|_| std::env::var("TMDB_API_KEY"))
      .map_err(|_| {
        eyre!("TMDb API key not found. Set MARQUEE_TMDB_KEY or TMDB_API_KEY environment variable.")
      })
  }

  /// Get the TMDb session credentials from environment variables, if set.
  /// Required only for the account list commands.
  pub fn get_session() -> Option<TmdbSession> {
    let session_id = std::env::var("MARQUEE_TMDB_SESSION").ok()?;
    let account_id = std::env::var("MARQUEE_TMDB_ACCOUNT").ok()?;
    Some(TmdbSession {
      session_id,
      account_id,
    })
  }

  /// Host and port of the API endpoint, used by the connectivity probe.
  pub fn api_endpoint(&self) -> (String, u16) {
    match url::Url::parse(&self.tmdb.base_url) {
      Ok(url) => {
        let host = url.host_str().unwrap_or("api.themoviedb.org").to_string();
        let port = url.port_or_known_default().unwrap_or(443);
        (host, port)
      }
      Err(_) => ("api.themoviedb.org".to_string(), 443),
    }
  }
}
