//! Forward-only pagination driver.
//!
//! A `ForwardPager<T>` feeds a scrolling list: it loads page 1 eagerly, loads
//! higher pages on demand, and exposes a loading/error/content state machine
//! the UI polls on its tick. Backward loading is unsupported; the catalog is
//! paginated forward only.
//!
//! # Example
//!
//! ```ignore
//! let repo = repo.clone();
//! let mut pager = ForwardPager::new(move |page| {
//!     let repo = repo.clone();
//!     async move { repo.movie_page(MovieSection::Popular, page).await.map(Into::into) }
//! });
//!
//! pager.load_initial();
//! // In the event loop tick:
//! if pager.poll() {
//!     match pager.state() {
//!         PagerState::LoadingInitialDone => render(pager.items()),
//!         PagerState::ErrorNoConnectivity => offer_retry(),
//!         _ => {}
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::repository::PageError;
use crate::tmdb::types::MoviePage;

/// The state of a pager. Observed by the UI after every `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
  /// No request has been made yet
  Idle,
  /// Page 1 is being fetched
  LoadingInitial,
  /// Page 1 arrived
  LoadingInitialDone,
  /// A subsequent page is being fetched
  LoadingAfter,
  /// A subsequent page arrived
  LoadingAfterDone,
  /// The last request failed while offline
  ErrorNoConnectivity,
  /// The last request failed for any other reason
  ErrorUnknown,
}

impl PagerState {
  pub fn is_loading(&self) -> bool {
    matches!(self, PagerState::LoadingInitial | PagerState::LoadingAfter)
  }

  pub fn is_error(&self) -> bool {
    matches!(
      self,
      PagerState::ErrorNoConnectivity | PagerState::ErrorUnknown
    )
  }
}

/// One fetched page of items, with the total page count when the source
/// reports one.
#[derive(Debug, Clone)]
pub struct FetchedPage<T> {
  pub items: Vec<T>,
  pub total_pages: Option<u32>,
}

impl From<MoviePage> for FetchedPage<crate::tmdb::types::Movie> {
  fn from(page: MoviePage) -> Self {
    Self {
      total_pages: Some(page.total_pages),
      items: page.results,
    }
  }
}

/// The most recent page request, kept as a value so `retry` can replay it
/// through the same entry point with identical parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageRequest {
  Initial,
  After(u32),
}

impl PageRequest {
  fn page_number(&self) -> u32 {
    match self {
      PageRequest::Initial => 1,
      PageRequest::After(page) => *page,
    }
  }
}

/// A boxed future resolving to one fetched page
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<FetchedPage<T>, PageError>> + Send>>;

/// A factory creating page-fetch futures from a page number
type FetcherFn<T> = Box<dyn Fn(u32) -> BoxFuture<T> + Send + Sync>;

/// Forward-only pager over a page-fetch callback.
///
/// At most one request is in flight: `load_initial` and `load_after` are
/// no-ops while a fetch is pending, and `retry` cancels the pending fetch
/// before re-issuing. Results are delivered through a channel and drained
/// by `poll`; dropping the pager drops the channel, so completions of
/// abandoned fetches are discarded instead of mutating anything.
pub struct ForwardPager<T> {
  state: PagerState,
  items: Vec<T>,
  next_page: Option<u32>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<(PageRequest, Result<FetchedPage<T>, PageError>)>>,
  last_request: Option<PageRequest>,
}

impl<T: Send + 'static> ForwardPager<T> {
  /// Create a pager over the given page-fetch callback. The callback is
  /// invoked with the page number to fetch, starting at 1.
  pub fn new<F, Fut>(fetch_page: F) -> Self
  where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FetchedPage<T>, PageError>> + Send + 'static,
  {
    Self {
      state: PagerState::Idle,
      items: Vec::new(),
      next_page: None,
      fetcher: Box::new(move |page| Box::pin(fetch_page(page))),
      receiver: None,
      last_request: None,
    }
  }

  pub fn state(&self) -> PagerState {
    self.state
  }

  /// All items accumulated so far, in page order.
  pub fn items(&self) -> &[T] {
    &self.items
  }

  /// Page number to request next, or `None` once the last page arrived.
  pub fn next_page(&self) -> Option<u32> {
    self.next_page
  }

  /// Request page 1. No-op while another request is in flight.
  pub fn load_initial(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.items.clear();
    self.next_page = None;
    self.start(PageRequest::Initial);
  }

  /// Request the given page, appending its items to the accumulated list.
  /// No-op while another request is in flight.
  pub fn load_after(&mut self, page: u32) {
    if self.state.is_loading() {
      return;
    }
    self.start(PageRequest::After(page));
  }

  /// Backward loading is unsupported.
  pub fn load_before(&mut self) {}

  /// Replay the most recent request with its original parameters. Cancels
  /// any pending fetch first. No-op before the first request.
  pub fn retry(&mut self) {
    let Some(request) = self.last_request else {
      return;
    };
    self.receiver = None;
    self.start(request);
  }

  /// Drain the completion channel.
  ///
  /// Returns `true` if the state changed. Call this on the event loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok((request, Ok(fetched))) => {
        self.receiver = None;
        let page = request.page_number();
        self.next_page = match fetched.total_pages {
          Some(total) if page < total => Some(page + 1),
          Some(_) => None,
          // Total unknown: assume more pages until an empty one arrives.
          None if fetched.items.is_empty() => None,
          None => Some(page + 1),
        };
        self.items.extend(fetched.items);
        self.state = match request {
          PageRequest::Initial => PagerState::LoadingInitialDone,
          PageRequest::After(_) => PagerState::LoadingAfterDone,
        };
        true
      }
      Ok((_, Err(error))) => {
        self.receiver = None;
        self.state = match error {
          PageError::NoConnectivity => PagerState::ErrorNoConnectivity,
          PageError::Unknown => PagerState::ErrorUnknown,
        };
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as an unknown failure
        self.receiver = None;
        self.state = PagerState::ErrorUnknown;
        true
      }
    }
  }

  fn start(&mut self, request: PageRequest) {
    self.last_request = Some(request);
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = match request {
      PageRequest::Initial => PagerState::LoadingInitial,
      PageRequest::After(_) => PagerState::LoadingAfter,
    };

    let future = (self.fetcher)(request.page_number());
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the request may have been superseded
      let _ = tx.send((request, result));
    });
  }
}

impl<T> std::fmt::Debug for ForwardPager<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ForwardPager")
      .field("state", &self.state)
      .field("items", &self.items.len())
      .field("next_page", &self.next_page)
      .field("last_request", &self.last_request)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  use super::*;

  /// Fetcher that journals requested page numbers and pops scripted results.
  struct ScriptedFetcher {
    requested: Arc<Mutex<Vec<u32>>>,
    results: Arc<Mutex<VecDeque<Result<FetchedPage<u32>, PageError>>>>,
  }

  impl ScriptedFetcher {
    fn new() -> Self {
      Self {
        requested: Arc::new(Mutex::new(Vec::new())),
        results: Arc::new(Mutex::new(VecDeque::new())),
      }
    }

    fn push(&self, result: Result<FetchedPage<u32>, PageError>) {
      self.results.lock().unwrap().push_back(result);
    }

    fn requested(&self) -> Vec<u32> {
      self.requested.lock().unwrap().clone()
    }

    fn pager(&self) -> ForwardPager<u32> {
      let requested = self.requested.clone();
      let results = self.results.clone();
      ForwardPager::new(move |page| {
        requested.lock().unwrap().push(page);
        let result = results
          .lock()
          .unwrap()
          .pop_front()
          .unwrap_or(Err(PageError::Unknown));
        async move { result }
      })
    }
  }

  fn page_of(items: Vec<u32>, total_pages: u32) -> FetchedPage<u32> {
    FetchedPage {
      items,
      total_pages: Some(total_pages),
    }
  }

  async fn settle<T: Send + 'static>(pager: &mut ForwardPager<T>) {
    for _ in 0..50 {
      tokio::time::sleep(Duration::from_millis(2)).await;
      if pager.poll() {
        return;
      }
    }
    panic!("pager did not settle");
  }

  #[tokio::test]
  async fn test_load_initial_requests_page_one() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(page_of(vec![1, 2, 3], 10)));
    let mut pager = fetcher.pager();

    assert_eq!(pager.state(), PagerState::Idle);
    pager.load_initial();
    assert_eq!(pager.state(), PagerState::LoadingInitial);

    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::LoadingInitialDone);
    assert_eq!(pager.items(), &[1, 2, 3]);
    assert_eq!(pager.next_page(), Some(2));
    assert_eq!(fetcher.requested(), vec![1]);
  }

  #[tokio::test]
  async fn test_load_after_advances_next_page() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(page_of(vec![1], 10)));
    fetcher.push(Ok(page_of(vec![2], 10)));
    let mut pager = fetcher.pager();

    pager.load_initial();
    settle(&mut pager).await;

    let next = pager.next_page().unwrap();
    pager.load_after(next);
    assert_eq!(pager.state(), PagerState::LoadingAfter);

    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::LoadingAfterDone);
    assert_eq!(pager.items(), &[1, 2]);
    assert_eq!(pager.next_page(), Some(3));
    assert_eq!(fetcher.requested(), vec![1, 2]);
  }

  #[tokio::test]
  async fn test_last_page_has_no_next() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(page_of(vec![1], 1)));
    let mut pager = fetcher.pager();

    pager.load_initial();
    settle(&mut pager).await;
    assert_eq!(pager.next_page(), None);
  }

  #[tokio::test]
  async fn test_load_before_is_a_no_op() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(page_of(vec![1], 5)));
    let mut pager = fetcher.pager();

    pager.load_initial();
    settle(&mut pager).await;

    let state_before = pager.state();
    pager.load_before();
    assert_eq!(pager.state(), state_before);
    assert_eq!(fetcher.requested(), vec![1]);
  }

  #[tokio::test]
  async fn test_error_kinds_map_to_error_states() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Err(PageError::NoConnectivity));
    let mut pager = fetcher.pager();

    pager.load_initial();
    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::ErrorNoConnectivity);

    fetcher.push(Err(PageError::Unknown));
    pager.retry();
    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::ErrorUnknown);
  }

  #[tokio::test]
  async fn test_retry_replays_failed_initial_load() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Err(PageError::Unknown));
    fetcher.push(Ok(page_of(vec![1], 10)));
    let mut pager = fetcher.pager();

    // LoadingInitial -> ErrorUnknown -> LoadingInitial -> LoadingInitialDone
    pager.load_initial();
    assert_eq!(pager.state(), PagerState::LoadingInitial);
    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::ErrorUnknown);

    pager.retry();
    assert_eq!(pager.state(), PagerState::LoadingInitial);
    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::LoadingInitialDone);

    // Both requests asked for exactly page 1.
    assert_eq!(fetcher.requested(), vec![1, 1]);
  }

  #[tokio::test]
  async fn test_retry_replays_failed_after_load() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(page_of(vec![1], 10)));
    fetcher.push(Err(PageError::Unknown));
    fetcher.push(Ok(page_of(vec![3], 10)));
    let mut pager = fetcher.pager();

    pager.load_initial();
    settle(&mut pager).await;
    pager.load_after(3);
    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::ErrorUnknown);

    pager.retry();
    settle(&mut pager).await;
    assert_eq!(pager.state(), PagerState::LoadingAfterDone);
    assert_eq!(pager.next_page(), Some(4));
    assert_eq!(fetcher.requested(), vec![1, 3, 3]);
  }

  #[tokio::test]
  async fn test_retry_before_any_request_is_a_no_op() {
    let fetcher = ScriptedFetcher::new();
    let mut pager = fetcher.pager();

    pager.retry();
    assert_eq!(pager.state(), PagerState::Idle);
    assert!(fetcher.requested().is_empty());
  }

  #[tokio::test]
  async fn test_load_while_loading_is_a_no_op() {
    let requested = Arc::new(Mutex::new(Vec::new()));
    let requested_clone = requested.clone();
    let mut pager: ForwardPager<u32> = ForwardPager::new(move |page| {
      requested_clone.lock().unwrap().push(page);
      async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(FetchedPage {
          items: vec![page],
          total_pages: Some(10),
        })
      }
    });

    pager.load_initial();
    pager.load_initial();
    pager.load_after(2);
    assert_eq!(pager.state(), PagerState::LoadingInitial);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(requested.lock().unwrap().clone(), vec![1]);
  }

  #[tokio::test]
  async fn test_unknown_total_stops_at_empty_page() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(FetchedPage {
      items: vec![1],
      total_pages: None,
    }));
    fetcher.push(Ok(FetchedPage {
      items: vec![],
      total_pages: None,
    }));
    let mut pager = fetcher.pager();

    pager.load_initial();
    settle(&mut pager).await;
    assert_eq!(pager.next_page(), Some(2));

    pager.load_after(2);
    settle(&mut pager).await;
    assert_eq!(pager.next_page(), None);
  }
}
