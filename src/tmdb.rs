use crate::config::Config;
use crate::models::{CatalogPage, ContentType, MovieDetail, Season, ShowDetail, Title};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB resource not found: {0}")]
    NotFound(String),
    #[error("TMDB returned {status} for {path}")]
    Status { status: StatusCode, path: String },
    #[error("TMDB request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("TMDB returned invalid data: {0}")]
    InvalidData(String),
}

pub type TmdbResult<T> = Result<T, TmdbError>;

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn popular(&self, kind: ContentType, page: u32) -> TmdbResult<CatalogPage>;
    async fn search(&self, kind: ContentType, query: &str, page: u32) -> TmdbResult<CatalogPage>;
    async fn movie(&self, id: u64) -> TmdbResult<MovieDetail>;
    async fn show(&self, id: u64) -> TmdbResult<ShowDetail>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let user_agent = format!("yassuflix/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            base_url: config.tmdb_base_url.clone(),
            api_key: config.tmdb_api_key.clone(),
        })
    }

    /// `path` must start with `/` and may already carry a query string.
    fn url(&self, path: &str) -> String {
        let sep = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}{path}{sep}api_key={}",
            self.base_url,
            urlencoding::encode(&self.api_key)
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> TmdbResult<T> {
        debug!("GET {}", path);
        let res = self.client.get(self.url(path)).send().await?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TmdbError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(TmdbError::Status {
                status,
                path: path.to_string(),
            });
        }
        let text = res.text().await?;
        parse_json(&text)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn popular(&self, kind: ContentType, page: u32) -> TmdbResult<CatalogPage> {
        let path = format!("/{}/popular?page={}", kind.as_path(), page.max(1));
        let raw: RawPage = self.get_json(&path).await?;
        raw.into_page(page)
    }

    async fn search(&self, kind: ContentType, query: &str, page: u32) -> TmdbResult<CatalogPage> {
        let path = format!(
            "/search/{}?query={}&page={}",
            kind.as_path(),
            urlencoding::encode(query),
            page.max(1)
        );
        let raw: RawPage = self.get_json(&path).await?;
        raw.into_page(page)
    }

    async fn movie(&self, id: u64) -> TmdbResult<MovieDetail> {
        let raw: RawMovie = self.get_json(&format!("/movie/{id}")).await?;
        raw.into_detail()
    }

    async fn show(&self, id: u64) -> TmdbResult<ShowDetail> {
        let raw: RawShow = self.get_json(&format!("/tv/{id}")).await?;
        raw.into_detail()
    }
}

pub fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> TmdbResult<T> {
    serde_json::from_str(text).map_err(|e| TmdbError::InvalidData(format!("JSON parse failed: {e}")))
}

pub fn parse_tmdb_id(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    input.parse().ok().filter(|id| *id > 0)
}

/// `https://image.tmdb.org/t/p/{width}{path}`; `None` when the title has no poster.
pub fn poster_url(image_base: &str, poster_path: Option<&str>, width: &str) -> Option<String> {
    let path = poster_path.map(str::trim).filter(|p| !p.is_empty())?;
    if path.starts_with('/') {
        Some(format!("{image_base}/{width}{path}"))
    } else {
        Some(format!("{image_base}/{width}/{path}"))
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    page: Option<u32>,
    total_pages: Option<u32>,
    results: Option<Vec<RawTitle>>,
}

impl RawPage {
    fn into_page(self, requested: u32) -> TmdbResult<CatalogPage> {
        let results = self
            .results
            .ok_or_else(|| TmdbError::InvalidData("listing has no results array".to_string()))?
            .into_iter()
            .map(RawTitle::into_title)
            .collect::<TmdbResult<Vec<_>>>()?;
        Ok(CatalogPage {
            page: self.page.unwrap_or(requested.max(1)),
            total_pages: self.total_pages,
            results,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawTitle {
    id: Option<i64>,
    title: Option<String>,
    name: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f64>,
    overview: Option<String>,
}

impl RawTitle {
    fn into_title(self) -> TmdbResult<Title> {
        let id = match self.id {
            Some(id) if id > 0 => id as u64,
            other => {
                return Err(TmdbError::InvalidData(format!(
                    "title id must be positive, got {:?}",
                    other
                )))
            }
        };
        let name = self
            .title
            .or(self.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| TmdbError::InvalidData(format!("title {id} has no name")))?;
        let vote_average = match self.vote_average {
            Some(v) if !(0.0..=10.0).contains(&v) => {
                return Err(TmdbError::InvalidData(format!(
                    "title {id} has vote_average {v} outside 0-10"
                )))
            }
            other => other.map(|v| v as f32),
        };
        let date = self
            .release_date
            .or(self.first_air_date)
            .filter(|d| !d.trim().is_empty());
        Ok(Title {
            id,
            name,
            poster_path: self.poster_path.filter(|p| !p.trim().is_empty()),
            date,
            vote_average,
            overview: self.overview.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

fn genre_names(genres: Option<Vec<Genre>>) -> Vec<String> {
    genres
        .map(|g| g.into_iter().map(|x| x.name).collect())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct RawMovie {
    #[serde(flatten)]
    title: RawTitle,
    tagline: Option<String>,
    runtime: Option<u32>,
    genres: Option<Vec<Genre>>,
}

impl RawMovie {
    fn into_detail(self) -> TmdbResult<MovieDetail> {
        Ok(MovieDetail {
            title: self.title.into_title()?,
            tagline: self.tagline.filter(|t| !t.trim().is_empty()),
            runtime_minutes: self.runtime.filter(|r| *r > 0),
            genres: genre_names(self.genres),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawShow {
    #[serde(flatten)]
    title: RawTitle,
    number_of_seasons: Option<u32>,
    genres: Option<Vec<Genre>>,
    seasons: Option<Vec<RawSeason>>,
}

#[derive(Debug, Deserialize)]
struct RawSeason {
    id: Option<u64>,
    season_number: Option<i32>,
    episode_count: Option<i64>,
    name: Option<String>,
}

impl RawShow {
    fn into_detail(self) -> TmdbResult<ShowDetail> {
        // Seasons without a number can't be selected; drop them instead of failing.
        let seasons = self
            .seasons
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| {
                let season_number = s.season_number?;
                Some(Season {
                    id: s.id.unwrap_or_default(),
                    season_number,
                    episode_count: s
                        .episode_count
                        .and_then(|c| u32::try_from(c).ok())
                        .unwrap_or(0),
                    name: s.name,
                })
            })
            .collect();
        Ok(ShowDetail {
            title: self.title.into_title()?,
            number_of_seasons: self.number_of_seasons,
            genres: genre_names(self.genres),
            seasons,
        })
    }
}
