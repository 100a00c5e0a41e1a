//! Query TMDB the way the site does and print what a page would show.
//! Usage:
//!   cargo run --bin tmdb_inspect -- catalog <movie|tv> [page] [query...]
//!   cargo run --bin tmdb_inspect -- movie <tmdb_id>
//!   cargo run --bin tmdb_inspect -- tv <tmdb_id> [season] [episode]
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use yassuflix::catalog::{self, CatalogState};
use yassuflix::config::Config;
use yassuflix::models::ContentType;
use yassuflix::playback::{self, PlaybackSelector};
use yassuflix::tmdb::{parse_tmdb_id, TmdbApi, TmdbClient};

fn usage() -> anyhow::Error {
    anyhow!("usage: tmdb_inspect catalog <movie|tv> [page] [query...] | movie <id> | tv <id> [season] [episode]")
}

fn parse_id(arg: Option<&String>) -> Result<u64> {
    arg.and_then(|s| parse_tmdb_id(s)).ok_or_else(usage)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let config = Config::from_env().context("Invalid configuration")?;
    let client = TmdbClient::new(&config)?;
    let args: Vec<String> = env::args().skip(1).collect();

    let out = match args.first().map(String::as_str) {
        Some("catalog") => {
            let kind: ContentType = args.get(1).ok_or_else(usage)?.parse()?;
            let page = args.get(2).and_then(|p| p.parse().ok()).unwrap_or(1);
            let query = args.iter().skip(3).cloned().collect::<Vec<_>>().join(" ");
            let state = CatalogState::new(kind, &query, page);
            let result = catalog::load(&client, &state.request()).await;
            json!({ "state": state, "result": result })
        }
        Some("movie") => {
            let id = parse_id(args.get(1))?;
            let movie = client.movie(id).await?;
            json!({
                "movie": movie,
                "embed_url": playback::movie_embed_url(&config.embed_base_url, id),
            })
        }
        Some("tv") => {
            let id = parse_id(args.get(1))?;
            let show = client.show(id).await?;
            let season = args.get(2).and_then(|s| s.parse().ok());
            let episode = args.get(3).and_then(|e| e.parse().ok());
            let selector = PlaybackSelector::from_query(&show.seasons, season, episode);
            json!({
                "name": show.title.name,
                "seasons": selector.seasons(),
                "selected_season": selector.selected_season(),
                "selected_episode": selector.selected_episode(),
                "episodes": selector.episodes(),
                "embed_url": selector.embed_url(&config.embed_base_url, id),
            })
        }
        _ => return Err(usage()),
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
