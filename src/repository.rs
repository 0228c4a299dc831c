//! Cache-aside access to the movie catalog.
//!
//! Every read follows the same flow: if the entity class is still fresh, try
//! the local store and return a hit immediately; otherwise fetch from the
//! remote source, persist the result, and stamp the freshness tracker. The
//! stamp is only written after a successful persist, so a crash between the
//! two costs one extra fetch rather than serving stale data as fresh.
//!
//! Expected failures never propagate as errors through `?` chains: every
//! outcome is a value, and a failed fetch is classified by the connectivity
//! check into one of two error kinds.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{EntityClass, FreshnessTracker, PageStore};
use crate::connectivity::Connectivity;
use crate::tmdb::client::RemoteError;
use crate::tmdb::types::{
  AccountMovieType, AppConfiguration, MovieDetail, MoviePage, MovieSection, SearchPage,
};

/// Why a catalog read failed. The only two error kinds that cross the
/// repository boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageError {
  /// The fetch failed and the machine appears to be offline.
  #[error("no network connectivity")]
  NoConnectivity,
  /// The fetch failed while the machine appears to be online.
  #[error("the catalog could not be reached")]
  Unknown,
}

/// Remote half of the cache-aside flow.
///
/// `Ok(None)` means the server answered "no data"; `Err` means the fetch
/// itself failed. The repository treats both as a failed read and classifies
/// them through the connectivity check.
pub trait RemoteSource: Send + Sync {
  fn movie_page(
    &self,
    section: MovieSection,
    page: u32,
  ) -> impl Future<Output = Result<Option<MoviePage>, RemoteError>> + Send;

  fn movie_detail(&self, id: u64)
    -> impl Future<Output = Result<Option<MovieDetail>, RemoteError>> + Send;

  fn search_page(
    &self,
    query: &str,
    page: u32,
  ) -> impl Future<Output = Result<Option<SearchPage>, RemoteError>> + Send;

  fn app_configuration(
    &self,
  ) -> impl Future<Output = Result<Option<AppConfiguration>, RemoteError>> + Send;

  fn account_page(
    &self,
    kind: AccountMovieType,
    page: u32,
  ) -> impl Future<Output = Result<Option<MoviePage>, RemoteError>> + Send;
}

/// Cache-aside repository for all catalog reads.
///
/// The store and freshness tracker are injected so every instance shares
/// them explicitly; nothing here is process-global.
pub struct MovieRepository<R, S, C>
where
  R: RemoteSource,
  S: PageStore,
  C: Connectivity,
{
  remote: R,
  store: Arc<S>,
  freshness: FreshnessTracker,
  connectivity: C,
  /// Per-scope locks so concurrent requests for the same page coalesce
  /// into one fetch instead of racing to double-fetch.
  in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<R, S, C> MovieRepository<R, S, C>
where
  R: RemoteSource,
  S: PageStore,
  C: Connectivity,
{
  pub fn new(remote: R, store: Arc<S>, freshness: FreshnessTracker, connectivity: C) -> Self {
    Self {
      remote,
      store,
      freshness,
      connectivity,
      in_flight: Mutex::new(HashMap::new()),
    }
  }

  /// Get one page of a catalog section.
  pub async fn movie_page(
    &self,
    section: MovieSection,
    page: u32,
  ) -> Result<MoviePage, PageError> {
    let class = EntityClass::MovieSection(section);
    let _guard = self.scope_lock(format!("{}:{}", class.id(), page)).await;

    if self.freshness.is_up_to_date(class) {
      match self.store.get_movie_page(section, page) {
        Ok(Some(stored)) => {
          debug!(section = section.name(), page, "serving movie page from cache");
          return Ok(stored);
        }
        Ok(None) => {
          // Fresh timestamp but the page itself is absent: fall through to
          // the remote rather than surfacing an unexplained empty page.
          debug!(section = section.name(), page, "page missing despite fresh cache");
        }
        Err(e) => warn!(
          section = section.name(),
          page, "cache read failed, treating as miss: {e}"
        ),
      }
    }

    let fetched = self.remote.movie_page(section, page).await;
    self.complete_fetch(fetched, Some(class), |p| {
      self.store.save_movie_page(section, p)
    })
  }

  /// Get details for a single movie.
  pub async fn movie_detail(&self, id: u64) -> Result<MovieDetail, PageError> {
    let class = EntityClass::MovieDetail;
    let _guard = self.scope_lock(format!("{}:{}", class.id(), id)).await;

    if self.freshness.is_up_to_date(class) {
      match self.store.get_movie_detail(id) {
        Ok(Some(stored)) => {
          debug!(id, "serving movie detail from cache");
          return Ok(stored);
        }
        Ok(None) => debug!(id, "detail missing despite fresh cache"),
        Err(e) => warn!(id, "cache read failed, treating as miss: {e}"),
      }
    }

    let fetched = self.remote.movie_detail(id).await;
    self.complete_fetch(fetched, Some(class), |d| self.store.save_movie_detail(d))
  }

  /// Get the API image configuration.
  pub async fn app_configuration(&self) -> Result<AppConfiguration, PageError> {
    let class = EntityClass::AppConfiguration;
    let _guard = self.scope_lock(class.id()).await;

    if self.freshness.is_up_to_date(class) {
      match self.store.get_app_configuration() {
        Ok(Some(stored)) => return Ok(stored),
        Ok(None) => {}
        Err(e) => warn!("cache read failed, treating as miss: {e}"),
      }
    }

    let fetched = self.remote.app_configuration().await;
    self.complete_fetch(fetched, Some(class), |c| {
      self.store.save_app_configuration(c)
    })
  }

  /// Search the catalog. Results are never persisted locally; they are
  /// filtered to the supported media kinds (movies and people).
  pub async fn search_page(&self, query: &str, page: u32) -> Result<SearchPage, PageError> {
    match self.remote.search_page(query, page).await {
      Ok(Some(mut result)) => {
        result.results.retain(|r| r.is_movie() || r.is_person());
        Ok(result)
      }
      Ok(None) => Err(self.classify_failure("search returned no data")),
      Err(e) => Err(self.classify_failure(&format!("search failed: {e}"))),
    }
  }

  /// Get one page of one of the user's account lists (favorites, rated,
  /// watchlist). These are session-scoped memoization with no freshness
  /// window: a stored page is served until its list is flushed.
  pub async fn account_movie_page(
    &self,
    kind: AccountMovieType,
    page: u32,
  ) -> Result<MoviePage, PageError> {
    let class = EntityClass::AccountMovies(kind);
    let _guard = self.scope_lock(format!("{}:{}", class.id(), page)).await;

    match self.store.get_account_page(kind, page) {
      Ok(Some(stored)) => return Ok(stored),
      Ok(None) => {}
      Err(e) => warn!(kind = kind.name(), page, "cache read failed, treating as miss: {e}"),
    }

    let fetched = self.remote.account_page(kind, page).await;
    self.complete_fetch(fetched, None, |p| self.store.save_account_page(kind, p))
  }

  /// Delete all locally stored pages for a section and force the next read
  /// to refetch by invalidating the section's freshness record.
  pub fn flush_section(&self, section: MovieSection) -> color_eyre::Result<()> {
    self.store.flush_section(section)?;
    self.freshness.invalidate(EntityClass::MovieSection(section));
    Ok(())
  }

  /// Delete all locally stored pages of one of the user's account lists.
  pub fn flush_account_pages(&self, kind: AccountMovieType) -> color_eyre::Result<()> {
    self.store.flush_account_pages(kind)?;
    Ok(())
  }

  /// Settle a remote fetch: persist on success (stamping freshness only
  /// after the persist succeeded), classify on failure.
  fn complete_fetch<T>(
    &self,
    fetched: Result<Option<T>, RemoteError>,
    class: Option<EntityClass>,
    save: impl FnOnce(&T) -> color_eyre::Result<()>,
  ) -> Result<T, PageError> {
    match fetched {
      Ok(Some(value)) => {
        match save(&value) {
          Ok(()) => {
            if let Some(class) = class {
              self.freshness.mark_refreshed(class);
            }
          }
          Err(e) => warn!("failed to persist fetched data, skipping freshness stamp: {e}"),
        }
        Ok(value)
      }
      Ok(None) => Err(self.classify_failure("remote returned no data")),
      Err(e) => Err(self.classify_failure(&format!("remote fetch failed: {e}"))),
    }
  }

  fn classify_failure(&self, reason: &str) -> PageError {
    if self.connectivity.is_connected() {
      debug!(reason, "fetch failed while online");
      PageError::Unknown
    } else {
      debug!(reason, "fetch failed while offline");
      PageError::NoConnectivity
    }
  }

  async fn scope_lock(&self, key: String) -> tokio::sync::OwnedMutexGuard<()> {
    let lock = {
      let mut map = self.in_flight.lock().expect("in-flight map lock poisoned");
      map
        .entry(key)
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        .clone()
    };
    lock.lock_owned().await
  }
}
