//! HTTP client for The Movie Database REST API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::repository::RemoteSource;
use crate::tmdb::types::{
  AccountMovieType, AppConfiguration, MovieDetail, MoviePage, MovieSection, SearchPage,
};

/// Failure of a remote fetch.
///
/// "No data" (HTTP 404) is not an error; it surfaces as `Ok(None)` from the
/// client methods.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("server returned status {0}")]
  Status(StatusCode),
  #[error("invalid endpoint url: {0}")]
  Url(#[from] url::ParseError),
  #[error("no TMDb session configured, set MARQUEE_TMDB_SESSION")]
  MissingSession,
}

/// Credentials for the account endpoints.
#[derive(Debug, Clone)]
pub struct TmdbSession {
  pub session_id: String,
  pub account_id: String,
}

/// Typed client for the TMDb v3 API.
#[derive(Clone)]
pub struct TmdbClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: String,
  language: String,
  session: Option<TmdbSession>,
}

impl TmdbClient {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let api_key = Config::get_api_key()?;
    let session = Config::get_session();
    Ok(Self::with_credentials(
      &config.tmdb.base_url,
      api_key,
      config.tmdb.language.clone(),
      session,
    )?)
  }

  pub fn with_credentials(
    base_url: &str,
    api_key: String,
    language: String,
    session: Option<TmdbSession>,
  ) -> Result<Self, RemoteError> {
    Ok(Self {
      http: reqwest::Client::new(),
      base_url: Url::parse(base_url)?,
      api_key,
      language,
      session,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
    Ok(self.base_url.join(path)?)
  }

  /// Issue a GET and decode the JSON body.
  ///
  /// Returns `Ok(None)` on 404 ("no data"), `Err` on transport failures and
  /// any other non-success status.
  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, &str)],
  ) -> Result<Option<T>, RemoteError> {
    let mut url = self.endpoint(path)?;
    url
      .query_pairs_mut()
      .append_pair("api_key", &self.api_key)
      .append_pair("language", &self.language)
      .extend_pairs(query);

    debug!(path, "fetching from TMDb");
    let response = self.http.get(url).send().await?;

    match response.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if !status.is_success() => Err(RemoteError::Status(status)),
      _ => Ok(Some(response.json().await?)),
    }
  }
}

impl RemoteSource for TmdbClient {
  /// Fetch one page of a catalog section listing.
  async fn movie_page(
    &self,
    section: MovieSection,
    page: u32,
  ) -> Result<Option<MoviePage>, RemoteError> {
    self
      .get_json(section.api_path(), &[("page", &page.to_string())])
      .await
  }

  /// Fetch details for a single movie.
  async fn movie_detail(&self, id: u64) -> Result<Option<MovieDetail>, RemoteError> {
    self.get_json(&format!("movie/{id}"), &[]).await
  }

  /// Fetch one page of multi-search results.
  async fn search_page(
    &self,
    query: &str,
    page: u32,
  ) -> Result<Option<SearchPage>, RemoteError> {
    self
      .get_json(
        "search/multi",
        &[("query", query), ("page", &page.to_string())],
      )
      .await
  }

  /// Fetch the API image configuration.
  async fn app_configuration(&self) -> Result<Option<AppConfiguration>, RemoteError> {
    self.get_json("configuration", &[]).await
  }

  /// Fetch one page of one of the user's account movie lists.
  async fn account_page(
    &self,
    kind: AccountMovieType,
    page: u32,
  ) -> Result<Option<MoviePage>, RemoteError> {
    let session = self.session.as_ref().ok_or(RemoteError::MissingSession)?;
    self
      .get_json(
        &format!("account/{}/{}", session.account_id, kind.api_path()),
        &[
          ("session_id", session.session_id.as_str()),
          ("page", &page.to_string()),
        ],
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> TmdbClient {
    TmdbClient::with_credentials(
      "https://api.themoviedb.org/3/",
      "test-key".to_string(),
      "en-US".to_string(),
      None,
    )
    .unwrap()
  }

  #[test]
  fn test_endpoint_joins_relative_paths() {
    let client = client();
    assert_eq!(
      client.endpoint("movie/now_playing").unwrap().as_str(),
      "https://api.themoviedb.org/3/movie/now_playing"
    );
    assert_eq!(
      client.endpoint("movie/550").unwrap().as_str(),
      "https://api.themoviedb.org/3/movie/550"
    );
  }

  #[test]
  fn test_section_paths() {
    assert_eq!(MovieSection::Playing.api_path(), "movie/now_playing");
    assert_eq!(MovieSection::Popular.api_path(), "movie/popular");
    assert_eq!(MovieSection::TopRated.api_path(), "movie/top_rated");
    assert_eq!(MovieSection::Upcoming.api_path(), "movie/upcoming");
  }

  #[tokio::test]
  async fn test_account_page_without_session_is_rejected() {
    let client = client();
    let result = RemoteSource::account_page(&client, AccountMovieType::Favorite, 1).await;
    assert!(matches!(result, Err(RemoteError::MissingSession)));
  }
}
