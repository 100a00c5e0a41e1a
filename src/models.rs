use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Movie vs series discriminator. Doubles as the TMDB path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Movie,
    Tv,
}

impl ContentType {
    pub fn as_path(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Tv => "tv",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Movie => "Movies",
            ContentType::Tv => "TV Shows",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Tv => "TV show",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => Ok(ContentType::Movie),
            "tv" | "series" | "show" | "shows" => Ok(ContentType::Tv),
            other => Err(anyhow::anyhow!("unknown content type '{}'", other)),
        }
    }
}

/// A catalog entry, either a movie or a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub id: u64,
    pub name: String,
    pub poster_path: Option<String>,
    /// `release_date` for movies, `first_air_date` for series. Not guaranteed to parse.
    pub date: Option<String>,
    pub vote_average: Option<f32>,
    pub overview: String,
}

impl Title {
    pub fn year(&self) -> Option<i32> {
        self.date.as_deref().and_then(extract_year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Season {
    pub id: u64,
    pub season_number: i32,
    pub episode_count: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetail {
    pub title: Title,
    pub tagline: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowDetail {
    pub title: Title,
    pub number_of_seasons: Option<u32>,
    pub genres: Vec<String>,
    pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogPage {
    pub page: u32,
    pub total_pages: Option<u32>,
    pub results: Vec<Title>,
}

pub fn extract_year(date: &str) -> Option<i32> {
    let date = date.trim();
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return Some(parsed.year());
    }
    let head = date.get(..4)?;
    if head.chars().all(|c| c.is_ascii_digit()) {
        return head.parse().ok();
    }
    None
}
