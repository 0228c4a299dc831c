//! SQLite implementation of the local page store.

use std::collections::HashMap;
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::traits::{PageStore, TimestampStore};
use crate::tmdb::types::{AccountMovieType, AppConfiguration, MovieDetail, MoviePage, MovieSection};

/// SQLite-backed page store.
///
/// Pages and entities are stored as serialized JSON blobs; freshness
/// timestamps live in their own table in the same database file. Account
/// list pages are user-session scoped and deliberately kept in memory only,
/// so they never outlive the process.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  account_pages: Mutex<HashMap<(AccountMovieType, u32), MoviePage>>,
}

impl SqliteStore {
  /// Open the store at the default location, creating it if needed.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory store. Used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
      account_pages: Mutex::new(HashMap::new()),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("marquee").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per (section, page number), serialized JSON
CREATE TABLE IF NOT EXISTS movie_pages (
    section TEXT NOT NULL,
    page INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (section, page)
);

-- One row per movie id
CREATE TABLE IF NOT EXISTS movie_details (
    movie_id INTEGER PRIMARY KEY,
    data BLOB NOT NULL
);

-- Singleton row for the API configuration
CREATE TABLE IF NOT EXISTS app_configuration (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    data BLOB NOT NULL
);

-- Last-write timestamps per entity class
CREATE TABLE IF NOT EXISTS freshness (
    class_id TEXT PRIMARY KEY,
    stamped_at INTEGER NOT NULL
);
"#;

impl PageStore for SqliteStore {
  fn get_movie_page(&self, section: MovieSection, page: u32) -> Result<Option<MoviePage>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM movie_pages WHERE section = ? AND page = ?",
        params![section.name(), page],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query movie page: {}", e))?;

    match data {
      Some(bytes) => {
        let page = serde_json::from_slice(&bytes)
          .map_err(|e| eyre!("Failed to deserialize movie page: {}", e))?;
        Ok(Some(page))
      }
      None => Ok(None),
    }
  }

  fn save_movie_page(&self, section: MovieSection, page: &MoviePage) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(page).map_err(|e| eyre!("Failed to serialize movie page: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO movie_pages (section, page, data) VALUES (?, ?, ?)",
        params![section.name(), page.page, data],
      )
      .map_err(|e| eyre!("Failed to store movie page: {}", e))?;

    Ok(())
  }

  fn flush_section(&self, section: MovieSection) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM movie_pages WHERE section = ?",
        params![section.name()],
      )
      .map_err(|e| eyre!("Failed to flush section: {}", e))?;

    Ok(())
  }

  fn get_movie_detail(&self, id: u64) -> Result<Option<MovieDetail>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM movie_details WHERE movie_id = ?",
        params![id],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query movie detail: {}", e))?;

    match data {
      Some(bytes) => {
        let detail = serde_json::from_slice(&bytes)
          .map_err(|e| eyre!("Failed to deserialize movie detail: {}", e))?;
        Ok(Some(detail))
      }
      None => Ok(None),
    }
  }

  fn save_movie_detail(&self, detail: &MovieDetail) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(detail).map_err(|e| eyre!("Failed to serialize movie detail: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO movie_details (movie_id, data) VALUES (?, ?)",
        params![detail.id, data],
      )
      .map_err(|e| eyre!("Failed to store movie detail: {}", e))?;

    Ok(())
  }

  fn get_app_configuration(&self) -> Result<Option<AppConfiguration>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row("SELECT data FROM app_configuration WHERE id = 0", [], |row| {
        row.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to query app configuration: {}", e))?;

    match data {
      Some(bytes) => {
        let config = serde_json::from_slice(&bytes)
          .map_err(|e| eyre!("Failed to deserialize app configuration: {}", e))?;
        Ok(Some(config))
      }
      None => Ok(None),
    }
  }

  fn save_app_configuration(&self, config: &AppConfiguration) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data = serde_json::to_vec(config)
      .map_err(|e| eyre!("Failed to serialize app configuration: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO app_configuration (id, data) VALUES (0, ?)",
        params![data],
      )
      .map_err(|e| eyre!("Failed to store app configuration: {}", e))?;

    Ok(())
  }

  fn get_account_page(&self, kind: AccountMovieType, page: u32) -> Result<Option<MoviePage>> {
    let pages = self
      .account_pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(pages.get(&(kind, page)).cloned())
  }

  fn save_account_page(&self, kind: AccountMovieType, page: &MoviePage) -> Result<()> {
    let mut pages = self
      .account_pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    pages.insert((kind, page.page), page.clone());
    Ok(())
  }

  fn flush_account_pages(&self, kind: AccountMovieType) -> Result<()> {
    let mut pages = self
      .account_pages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    pages.retain(|(k, _), _| *k != kind);
    Ok(())
  }
}

impl TimestampStore for SqliteStore {
  fn read(&self, id: &str) -> Result<Option<i64>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT stamped_at FROM freshness WHERE class_id = ?",
        params![id],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read freshness timestamp: {}", e))
  }

  fn write(&self, id: &str, timestamp_ms: i64) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO freshness (class_id, stamped_at) VALUES (?, ?)",
        params![id, timestamp_ms],
      )
      .map_err(|e| eyre!("Failed to write freshness timestamp: {}", e))?;

    Ok(())
  }

  fn delete(&self, id: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM freshness WHERE class_id = ?", params![id])
      .map_err(|e| eyre!("Failed to delete freshness timestamp: {}", e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tmdb::types::Movie;

  fn sample_movie(id: u64, title: &str) -> Movie {
    Movie {
      id,
      title: title.to_string(),
      original_title: title.to_string(),
      overview: String::new(),
      release_date: "2024-01-01".to_string(),
      poster_path: None,
      backdrop_path: None,
      vote_count: 10,
      vote_average: 7.5,
      popularity: 1.0,
    }
  }

  fn sample_page(page: u32) -> MoviePage {
    MoviePage {
      page,
      results: vec![sample_movie(page as u64 * 100, "Movie")],
      total_pages: 5,
      total_results: 100,
    }
  }

  #[test]
  fn test_movie_page_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let page = sample_page(1);

    assert!(store
      .get_movie_page(MovieSection::Popular, 1)
      .unwrap()
      .is_none());

    store.save_movie_page(MovieSection::Popular, &page).unwrap();
    let loaded = store
      .get_movie_page(MovieSection::Popular, 1)
      .unwrap()
      .unwrap();
    assert_eq!(loaded, page);

    // Same page number in a different section is a different row.
    assert!(store
      .get_movie_page(MovieSection::Upcoming, 1)
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_save_replaces_existing_page() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .save_movie_page(MovieSection::Popular, &sample_page(1))
      .unwrap();

    let mut updated = sample_page(1);
    updated.results = vec![sample_movie(7, "Replacement")];
    store.save_movie_page(MovieSection::Popular, &updated).unwrap();

    let loaded = store
      .get_movie_page(MovieSection::Popular, 1)
      .unwrap()
      .unwrap();
    assert_eq!(loaded.results[0].title, "Replacement");
  }

  #[test]
  fn test_flush_section_only_touches_that_section() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .save_movie_page(MovieSection::Popular, &sample_page(1))
      .unwrap();
    store
      .save_movie_page(MovieSection::Popular, &sample_page(2))
      .unwrap();
    store
      .save_movie_page(MovieSection::TopRated, &sample_page(1))
      .unwrap();

    store.flush_section(MovieSection::Popular).unwrap();

    assert!(store
      .get_movie_page(MovieSection::Popular, 1)
      .unwrap()
      .is_none());
    assert!(store
      .get_movie_page(MovieSection::Popular, 2)
      .unwrap()
      .is_none());
    assert!(store
      .get_movie_page(MovieSection::TopRated, 1)
      .unwrap()
      .is_some());
  }

  #[test]
  fn test_movie_detail_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let detail = MovieDetail {
      id: 550,
      title: "Fight Club".to_string(),
      overview: "An insomniac office worker...".to_string(),
      release_date: "1999-10-15".to_string(),
      poster_path: Some("/poster.jpg".to_string()),
      genres: vec![crate::tmdb::types::MovieGenre {
        id: 18,
        name: "Drama".to_string(),
      }],
      vote_count: 26280,
      vote_average: 8.4,
      popularity: 61.4,
    };

    assert!(store.get_movie_detail(550).unwrap().is_none());
    store.save_movie_detail(&detail).unwrap();
    assert_eq!(store.get_movie_detail(550).unwrap().unwrap(), detail);
  }

  #[test]
  fn test_app_configuration_is_a_singleton() {
    let store = SqliteStore::open_in_memory().unwrap();
    let config = AppConfiguration {
      images: crate::tmdb::types::ImagesConfiguration {
        base_url: "https://image.tmdb.org/t/p/".to_string(),
        poster_sizes: vec!["w342".to_string(), "w500".to_string()],
        profile_sizes: vec![],
        backdrop_sizes: vec![],
      },
    };

    assert!(store.get_app_configuration().unwrap().is_none());
    store.save_app_configuration(&config).unwrap();

    let mut updated = config.clone();
    updated.images.base_url = "https://mirror.example/t/p/".to_string();
    store.save_app_configuration(&updated).unwrap();

    let loaded = store.get_app_configuration().unwrap().unwrap();
    assert_eq!(loaded.images.base_url, "https://mirror.example/t/p/");
  }

  #[test]
  fn test_account_pages_are_in_memory_per_kind() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .save_account_page(AccountMovieType::Favorite, &sample_page(1))
      .unwrap();
    store
      .save_account_page(AccountMovieType::Watchlist, &sample_page(1))
      .unwrap();

    assert!(store
      .get_account_page(AccountMovieType::Favorite, 1)
      .unwrap()
      .is_some());

    store.flush_account_pages(AccountMovieType::Favorite).unwrap();
    assert!(store
      .get_account_page(AccountMovieType::Favorite, 1)
      .unwrap()
      .is_none());
    assert!(store
      .get_account_page(AccountMovieType::Watchlist, 1)
      .unwrap()
      .is_some());
  }

  #[test]
  fn test_timestamp_store_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();

    assert!(TimestampStore::read(&store, "movie-section:popular")
      .unwrap()
      .is_none());

    TimestampStore::write(&store, "movie-section:popular", 1_700_000_000_000).unwrap();
    assert_eq!(
      TimestampStore::read(&store, "movie-section:popular").unwrap(),
      Some(1_700_000_000_000)
    );

    TimestampStore::write(&store, "movie-section:popular", 1_700_000_100_000).unwrap();
    assert_eq!(
      TimestampStore::read(&store, "movie-section:popular").unwrap(),
      Some(1_700_000_100_000)
    );

    TimestampStore::delete(&store, "movie-section:popular").unwrap();
    assert!(TimestampStore::read(&store, "movie-section:popular")
      .unwrap()
      .is_none());
  }
}
