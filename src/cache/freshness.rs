//! Freshness tracking for cached data.
//!
//! Each category of cached data (an entity class) has a last-write timestamp
//! and a refresh window. Data written longer ago than the window is stale and
//! must be refetched; data with no timestamp at all is never considered fresh.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use super::traits::TimestampStore;
use crate::tmdb::types::{AccountMovieType, MovieSection};

/// A named category of cached data with its own freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
  /// Pages of a catalog section
  MovieSection(MovieSection),
  /// Per-movie details
  MovieDetail,
  /// The API image configuration
  AppConfiguration,
  /// Pages of one of the user's account lists
  AccountMovies(AccountMovieType),
}

impl EntityClass {
  /// Stable id used as the timestamp storage key.
  pub fn id(&self) -> String {
    match self {
      EntityClass::MovieSection(section) => format!("movie-section:{}", section.name()),
      EntityClass::MovieDetail => "movie-detail".to_string(),
      EntityClass::AppConfiguration => "app-configuration".to_string(),
      EntityClass::AccountMovies(kind) => format!("account-movies:{}", kind.name()),
    }
  }
}

/// Source of the current wall-clock time, pluggable for tests.
pub trait Clock: Send + Sync {
  /// Current Unix time in milliseconds.
  fn now_ms(&self) -> i64;
}

/// Clock backed by the system wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Tracks when each entity class was last written and answers whether its
/// cached data is still inside the refresh window.
///
/// Storage failures never escape this type: an unreadable timestamp counts
/// as stale (a refetch beats serving unknown-age data), and a failed write
/// only costs an extra refetch later.
pub struct FreshnessTracker {
  store: Arc<dyn TimestampStore>,
  clock: Arc<dyn Clock>,
  page_ttl: Duration,
  detail_ttl: Duration,
  configuration_ttl: Duration,
}

impl FreshnessTracker {
  pub fn new(store: Arc<dyn TimestampStore>) -> Self {
    Self::with_clock(store, Arc::new(SystemClock))
  }

  pub fn with_clock(store: Arc<dyn TimestampStore>, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      clock,
      page_ttl: Duration::minutes(30),
      detail_ttl: Duration::minutes(30),
      configuration_ttl: Duration::days(7),
    }
  }

  /// Override the refresh window for movie pages and account lists.
  pub fn with_page_ttl(mut self, ttl: Duration) -> Self {
    self.page_ttl = ttl;
    self
  }

  /// Override the refresh window for movie details.
  pub fn with_detail_ttl(mut self, ttl: Duration) -> Self {
    self.detail_ttl = ttl;
    self
  }

  fn ttl(&self, class: EntityClass) -> Duration {
    match class {
      EntityClass::MovieSection(_) | EntityClass::AccountMovies(_) => self.page_ttl,
      EntityClass::MovieDetail => self.detail_ttl,
      EntityClass::AppConfiguration => self.configuration_ttl,
    }
  }

  /// Whether the cached data for `class` is still inside its refresh window.
  ///
  /// Returns false when no timestamp exists or when it cannot be read.
  pub fn is_up_to_date(&self, class: EntityClass) -> bool {
    let id = class.id();
    let stamped = match self.store.read(&id) {
      Ok(value) => value,
      Err(e) => {
        warn!(class = %id, "failed to read freshness timestamp, treating as stale: {e}");
        return false;
      }
    };

    match stamped {
      Some(timestamp_ms) => {
        let age_ms = self.clock.now_ms() - timestamp_ms;
        age_ms < self.ttl(class).num_milliseconds()
      }
      None => false,
    }
  }

  /// Record that the cached data for `class` was just written.
  ///
  /// Overwrites any prior timestamp. A storage failure is logged and
  /// swallowed; the caller's fetch is still a success.
  pub fn mark_refreshed(&self, class: EntityClass) {
    let id = class.id();
    if let Err(e) = self.store.write(&id, self.clock.now_ms()) {
      warn!(class = %id, "failed to write freshness timestamp: {e}");
    }
  }

  /// Drop the timestamp for `class`, forcing the next read to refetch.
  pub fn invalidate(&self, class: EntityClass) {
    let id = class.id();
    if let Err(e) = self.store.delete(&id) {
      warn!(class = %id, "failed to invalidate freshness timestamp: {e}");
    }
  }
}

#[cfg(test)]
pub(crate) mod test_support {
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicI64, Ordering};
  use std::sync::Mutex;

  use color_eyre::{eyre::eyre, Result};

  use super::Clock;
  use crate::cache::traits::TimestampStore;

  /// Clock that only moves when the test advances it.
  pub struct FakeClock {
    now_ms: AtomicI64,
  }

  impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
      Self {
        now_ms: AtomicI64::new(start_ms),
      }
    }

    pub fn advance_ms(&self, delta: i64) {
      self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }
  }

  impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
      self.now_ms.load(Ordering::SeqCst)
    }
  }

  /// In-memory timestamp store, optionally failing every operation.
  #[derive(Default)]
  pub struct MemoryTimestamps {
    values: Mutex<HashMap<String, i64>>,
    pub fail: std::sync::atomic::AtomicBool,
  }

  impl TimestampStore for MemoryTimestamps {
    fn read(&self, id: &str) -> Result<Option<i64>> {
      if self.fail.load(Ordering::SeqCst) {
        return Err(eyre!("timestamp store unavailable"));
      }
      Ok(self.values.lock().unwrap().get(id).copied())
    }

    fn write(&self, id: &str, timestamp_ms: i64) -> Result<()> {
      if self.fail.load(Ordering::SeqCst) {
        return Err(eyre!("timestamp store unavailable"));
      }
      self
        .values
        .lock()
        .unwrap()
        .insert(id.to_string(), timestamp_ms);
      Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
      if self.fail.load(Ordering::SeqCst) {
        return Err(eyre!("timestamp store unavailable"));
      }
      self.values.lock().unwrap().remove(id);
      Ok(())
    }
  }
}
