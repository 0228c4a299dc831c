use serde::{Deserialize, Serialize};

/// A section of the movie catalog that can be listed page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovieSection {
  /// Movies currently playing in theatres
  Playing,
  /// Most popular movies
  Popular,
  /// Top rated movies
  TopRated,
  /// Upcoming releases
  Upcoming,
}

impl MovieSection {
  /// Stable name used for cache keys and CLI output.
  pub fn name(&self) -> &'static str {
    match self {
      MovieSection::Playing => "playing",
      MovieSection::Popular => "popular",
      MovieSection::TopRated => "toprated",
      MovieSection::Upcoming => "upcoming",
    }
  }

  /// API path fragment for the section listing endpoint.
  pub fn api_path(&self) -> &'static str {
    match self {
      MovieSection::Playing => "movie/now_playing",
      MovieSection::Popular => "movie/popular",
      MovieSection::TopRated => "movie/top_rated",
      MovieSection::Upcoming => "movie/upcoming",
    }
  }

  pub fn all() -> &'static [MovieSection] {
    &[
      MovieSection::Playing,
      MovieSection::Popular,
      MovieSection::TopRated,
      MovieSection::Upcoming,
    ]
  }
}

/// The per-user movie lists exposed by the account endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountMovieType {
  Favorite,
  Rated,
  Watchlist,
}

impl AccountMovieType {
  pub fn name(&self) -> &'static str {
    match self {
      AccountMovieType::Favorite => "favorite",
      AccountMovieType::Rated => "rated",
      AccountMovieType::Watchlist => "watchlist",
    }
  }

  /// API path fragment under `account/{id}/`.
  pub fn api_path(&self) -> &'static str {
    match self {
      AccountMovieType::Favorite => "favorite/movies",
      AccountMovieType::Rated => "rated/movies",
      AccountMovieType::Watchlist => "watchlist/movies",
    }
  }
}

/// A movie as returned by the listing endpoints.
///
/// Field names match the TMDb wire format so pages deserialize directly
/// and round-trip through the local store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
  pub id: u64,
  pub title: String,
  pub original_title: String,
  #[serde(default)]
  pub overview: String,
  #[serde(default)]
  pub release_date: String,
  pub poster_path: Option<String>,
  pub backdrop_path: Option<String>,
  #[serde(default)]
  pub vote_count: u64,
  #[serde(default)]
  pub vote_average: f32,
  #[serde(default)]
  pub popularity: f32,
}

/// One numbered page of movies, plus the total counts reported by the API.
///
/// `total_pages` is what tells a pager whether more pages exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
  pub page: u32,
  pub results: Vec<Movie>,
  pub total_pages: u32,
  pub total_results: u64,
}

impl MoviePage {
  /// Page number to request after this one, if any pages remain.
  pub fn next_page(&self) -> Option<u32> {
    if self.page < self.total_pages {
      Some(self.page + 1)
    } else {
      None
    }
  }
}

/// A movie genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieGenre {
  pub id: u32,
  pub name: String,
}

/// Full details for a single movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub overview: String,
  #[serde(default)]
  pub release_date: String,
  pub poster_path: Option<String>,
  #[serde(default)]
  pub genres: Vec<MovieGenre>,
  #[serde(default)]
  pub vote_count: u64,
  #[serde(default)]
  pub vote_average: f32,
  #[serde(default)]
  pub popularity: f32,
}

/// One page of multi-search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
  pub page: u32,
  pub results: Vec<SearchResult>,
  pub total_pages: u32,
  pub total_results: u64,
}

/// An item in a search result page. The multi-search endpoint mixes media
/// kinds, discriminated by `media_type`; most fields are only present for
/// some kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
  pub id: u64,
  pub media_type: String,
  /// Person name. Present when `media_type` is "person".
  pub name: Option<String>,
  /// Movie or show title. Present when `media_type` is "movie" or "tv".
  pub title: Option<String>,
  pub overview: Option<String>,
  pub release_date: Option<String>,
  pub poster_path: Option<String>,
  pub profile_path: Option<String>,
}

impl SearchResult {
  pub fn is_movie(&self) -> bool {
    self.media_type == "movie"
  }

  pub fn is_person(&self) -> bool {
    self.media_type == "person"
  }

  /// Display name regardless of media kind.
  pub fn display_title(&self) -> &str {
    self
      .title
      .as_deref()
      .or(self.name.as_deref())
      .unwrap_or("(untitled)")
  }
}

/// Image path configuration needed to build full image URLs.
///
/// A movie only carries the file path of its images; the base URL and the
/// supported sizes come from the configuration endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagesConfiguration {
  pub base_url: String,
  #[serde(default)]
  pub poster_sizes: Vec<String>,
  #[serde(default)]
  pub profile_sizes: Vec<String>,
  #[serde(default)]
  pub backdrop_sizes: Vec<String>,
}

/// General API configuration, refreshed rarely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfiguration {
  pub images: ImagesConfiguration,
}

impl AppConfiguration {
  /// Full URL for a poster image path, using the largest configured size.
  pub fn poster_url(&self, poster_path: &str) -> Option<String> {
    let size = self.images.poster_sizes.last()?;
    Some(format!("{}{}{}", self.images.base_url, size, poster_path))
  }
}
