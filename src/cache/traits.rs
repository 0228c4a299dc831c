//! Contracts for the local page store and the freshness timestamp store.

use color_eyre::Result;

use crate::tmdb::types::{AccountMovieType, AppConfiguration, MovieDetail, MoviePage, MovieSection};

/// Durable keyed storage for pages and entities.
///
/// Implementations are shared across repositories, so everything takes
/// `&self` and must be internally synchronized. Errors cross this boundary
/// as `Err`, but callers on the read path treat them as cache misses.
pub trait PageStore: Send + Sync {
  /// Get the stored movie page for a section, if present.
  fn get_movie_page(&self, section: MovieSection, page: u32) -> Result<Option<MoviePage>>;

  /// Store a movie page for a section, replacing any previous page with
  /// the same number.
  fn save_movie_page(&self, section: MovieSection, page: &MoviePage) -> Result<()>;

  /// Delete every stored page for a section.
  fn flush_section(&self, section: MovieSection) -> Result<()>;

  /// Get stored details for a movie, if present.
  fn get_movie_detail(&self, id: u64) -> Result<Option<MovieDetail>>;

  /// Store details for a movie.
  fn save_movie_detail(&self, detail: &MovieDetail) -> Result<()>;

  /// Get the stored API configuration, if present.
  fn get_app_configuration(&self) -> Result<Option<AppConfiguration>>;

  /// Store the API configuration.
  fn save_app_configuration(&self, config: &AppConfiguration) -> Result<()>;

  /// Get a stored page of one of the user's account lists, if present.
  fn get_account_page(&self, kind: AccountMovieType, page: u32) -> Result<Option<MoviePage>>;

  /// Store a page of one of the user's account lists.
  fn save_account_page(&self, kind: AccountMovieType, page: &MoviePage) -> Result<()>;

  /// Delete every stored page of one of the user's account lists.
  fn flush_account_pages(&self, kind: AccountMovieType) -> Result<()>;
}

/// Storage for per-entity-class last-write timestamps.
///
/// Keys are the stable entity class ids (e.g. "movie-section:popular").
/// Values are Unix timestamps in milliseconds.
pub trait TimestampStore: Send + Sync {
  /// Read the stored timestamp for an entity class id.
  fn read(&self, id: &str) -> Result<Option<i64>>;

  /// Write (or overwrite) the timestamp for an entity class id.
  fn write(&self, id: &str, timestamp_ms: i64) -> Result<()>;

  /// Remove the timestamp for an entity class id.
  fn delete(&self, id: &str) -> Result<()>;
}
