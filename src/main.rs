mod cache;
mod config;
mod connectivity;
mod pager;
mod repository;
mod tmdb;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use tracing_subscriber::EnvFilter;

use cache::{FreshnessTracker, SqliteStore};
use config::Config;
use connectivity::TcpProbe;
use pager::{FetchedPage, ForwardPager, PagerState};
use repository::MovieRepository;
use tmdb::client::TmdbClient;
use tmdb::types::{AccountMovieType, Movie, MovieSection};

#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(about = "A terminal browser for The Movie Database")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/marquee/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Movies now playing in theatres
  Playing(ListArgs),
  /// Most popular movies
  Popular(ListArgs),
  /// Top rated movies
  TopRated(ListArgs),
  /// Upcoming releases
  Upcoming(ListArgs),
  /// Search movies and people
  Search {
    query: String,
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// Show details for a movie
  Movie { id: u64 },
  /// Your favorite movies (needs MARQUEE_TMDB_SESSION)
  Favorites(ListArgs),
  /// Movies you rated (needs MARQUEE_TMDB_SESSION)
  Rated(ListArgs),
  /// Your watchlist (needs MARQUEE_TMDB_SESSION)
  Watchlist(ListArgs),
  /// Drop locally cached pages
  Flush {
    #[arg(value_enum)]
    scope: FlushScope,
  },
}

#[derive(clap::Args, Debug)]
struct ListArgs {
  /// How many pages to load
  #[arg(long, default_value_t = 1)]
  pages: u32,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FlushScope {
  Playing,
  Popular,
  TopRated,
  Upcoming,
  Favorites,
  Rated,
  Watchlist,
  All,
}

type Repo = MovieRepository<TmdbClient, SqliteStore, TcpProbe>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let store = Arc::new(SqliteStore::open()?);
  let freshness = FreshnessTracker::new(store.clone())
    .with_page_ttl(chrono::Duration::minutes(config.cache.page_ttl_minutes))
    .with_detail_ttl(chrono::Duration::minutes(config.cache.detail_ttl_minutes));
  let client = TmdbClient::new(&config)?;
  let (host, port) = config.api_endpoint();
  let repo: Arc<Repo> = Arc::new(MovieRepository::new(
    client,
    store,
    freshness,
    TcpProbe::new(host, port),
  ));

  match args.command {
    Command::Playing(list) => list_section(repo, MovieSection::Playing, list.pages).await,
    Command::Popular(list) => list_section(repo, MovieSection::Popular, list.pages).await,
    Command::TopRated(list) => list_section(repo, MovieSection::TopRated, list.pages).await,
    Command::Upcoming(list) => list_section(repo, MovieSection::Upcoming, list.pages).await,
    Command::Search { query, page } => search(repo, &query, page).await,
    Command::Movie { id } => movie_detail(repo, id).await,
    Command::Favorites(list) => list_account(repo, AccountMovieType::Favorite, list.pages).await,
    Command::Rated(list) => list_account(repo, AccountMovieType::Rated, list.pages).await,
    Command::Watchlist(list) => list_account(repo, AccountMovieType::Watchlist, list.pages).await,
    Command::Flush { scope } => flush(&repo, scope),
  }
}

/// List a catalog section by walking pages through the forward pager.
async fn list_section(repo: Arc<Repo>, section: MovieSection, pages: u32) -> Result<()> {
  let fetch_repo = repo.clone();
  let pager = ForwardPager::new(move |page| {
    let repo = fetch_repo.clone();
    async move { repo.movie_page(section, page).await.map(FetchedPage::from) }
  });
  let movies = drive_pager(pager, pages).await?;
  print_movies(&movies);
  Ok(())
}

/// List one of the user's account lists through the forward pager.
async fn list_account(repo: Arc<Repo>, kind: AccountMovieType, pages: u32) -> Result<()> {
  let fetch_repo = repo.clone();
  let pager = ForwardPager::new(move |page| {
    let repo = fetch_repo.clone();
    async move {
      repo
        .account_movie_page(kind, page)
        .await
        .map(FetchedPage::from)
    }
  });
  let movies = drive_pager(pager, pages).await?;
  print_movies(&movies);
  Ok(())
}

/// Load the initial page, then keep loading the next page until `pages`
/// pages arrived or the catalog ran out. Polls the pager on a tick, the
/// same way an interactive UI would.
async fn drive_pager(mut pager: ForwardPager<Movie>, pages: u32) -> Result<Vec<Movie>> {
  let mut loaded = 1u32;
  pager.load_initial();

  loop {
    tokio::time::sleep(Duration::from_millis(20)).await;
    if !pager.poll() {
      continue;
    }

    match pager.state() {
      PagerState::LoadingInitialDone | PagerState::LoadingAfterDone => {
        match pager.next_page() {
          Some(next) if loaded < pages => {
            loaded += 1;
            pager.load_after(next);
          }
          _ => break,
        }
      }
      PagerState::ErrorNoConnectivity => {
        return Err(eyre!("You appear to be offline and nothing is cached for this list."));
      }
      PagerState::ErrorUnknown => {
        return Err(eyre!("The catalog could not be fetched. Try again later."));
      }
      _ => {}
    }
  }

  Ok(pager.items().to_vec())
}

async fn search(repo: Arc<Repo>, query: &str, page: u32) -> Result<()> {
  let results = repo.search_page(query, page).await?;

  if results.results.is_empty() {
    println!("No results for \"{query}\".");
    return Ok(());
  }

  println!(
    "Results for \"{query}\" (page {} of {}):",
    results.page, results.total_pages
  );
  for result in &results.results {
    let kind = if result.is_person() { "person" } else { "movie" };
    println!("  [{kind:6}] {} (#{})", result.display_title(), result.id);
  }
  Ok(())
}

async fn movie_detail(repo: Arc<Repo>, id: u64) -> Result<()> {
  let detail = repo.movie_detail(id).await?;

  println!("{} ({})", detail.title, detail.release_date);
  if !detail.genres.is_empty() {
    let genres: Vec<&str> = detail.genres.iter().map(|g| g.name.as_str()).collect();
    println!("  genres: {}", genres.join(", "));
  }
  println!(
    "  rating: {:.1} ({} votes)",
    detail.vote_average, detail.vote_count
  );
  if !detail.overview.is_empty() {
    println!("\n{}", detail.overview);
  }

  // Poster URL needs the image configuration; best-effort only.
  if let Some(poster_path) = &detail.poster_path {
    if let Ok(config) = repo.app_configuration().await {
      if let Some(url) = config.poster_url(poster_path) {
        println!("\nposter: {url}");
      }
    }
  }
  Ok(())
}

fn flush(repo: &Repo, scope: FlushScope) -> Result<()> {
  match scope {
    FlushScope::Playing => repo.flush_section(MovieSection::Playing)?,
    FlushScope::Popular => repo.flush_section(MovieSection::Popular)?,
    FlushScope::TopRated => repo.flush_section(MovieSection::TopRated)?,
    FlushScope::Upcoming => repo.flush_section(MovieSection::Upcoming)?,
    FlushScope::Favorites => repo.flush_account_pages(AccountMovieType::Favorite)?,
    FlushScope::Rated => repo.flush_account_pages(AccountMovieType::Rated)?,
    FlushScope::Watchlist => repo.flush_account_pages(AccountMovieType::Watchlist)?,
    FlushScope::All => {
      for section in MovieSection::all() {
        repo.flush_section(*section)?;
      }
      for kind in [
        AccountMovieType::Favorite,
        AccountMovieType::Rated,
        AccountMovieType::Watchlist,
      ] {
        repo.flush_account_pages(kind)?;
      }
    }
  }
  println!("Flushed.");
  Ok(())
}

fn print_movies(movies: &[Movie]) {
  for movie in movies {
    let year = movie.release_date.split('-').next().unwrap_or("");
    println!(
      "  {:>8}  {:<42} {:>4}  {:.1}",
      movie.id, movie.title, year, movie.vote_average
    );
  }
}
