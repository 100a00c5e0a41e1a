//! Season/episode selection and embed URL derivation for the watch routes.
use crate::models::Season;

pub const NO_EPISODES_MESSAGE: &str = "No episodes available for this season.";

pub fn movie_embed_url(embed_base: &str, id: u64) -> String {
    format!("{embed_base}/movie/{id}")
}

pub fn tv_embed_url(embed_base: &str, id: u64, season: i32, episode: u32) -> String {
    format!("{embed_base}/tv/{id}/{season}/{episode}")
}

/// Selection state for a series. Holds only the user-facing seasons (number > 0),
/// sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSelector {
    seasons: Vec<Season>,
    selected_season: i32,
    selected_episode: u32,
}

impl PlaybackSelector {
    pub fn new(seasons: &[Season]) -> Self {
        let mut seasons: Vec<Season> = seasons
            .iter()
            .filter(|s| s.season_number > 0)
            .cloned()
            .collect();
        seasons.sort_by_key(|s| s.season_number);
        let selected_season = seasons.last().map(|s| s.season_number).unwrap_or(1);
        Self {
            seasons,
            selected_season,
            selected_episode: 1,
        }
    }

    /// Restores a selection carried in a URL. Rejected values keep the defaults.
    pub fn from_query(seasons: &[Season], season: Option<i32>, episode: Option<u32>) -> Self {
        let mut selector = Self::new(seasons);
        if let Some(season) = season {
            selector.select_season(season);
        }
        if let Some(episode) = episode {
            selector.select_episode(episode);
        }
        selector
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn selected_season(&self) -> i32 {
        self.selected_season
    }

    pub fn selected_episode(&self) -> u32 {
        self.selected_episode
    }

    /// Always resets the episode to 1, so a stale index never outlives a shorter season.
    pub fn select_season(&mut self, season_number: i32) -> bool {
        let known = if self.seasons.is_empty() {
            season_number == 1
        } else {
            self.seasons.iter().any(|s| s.season_number == season_number)
        };
        if !known {
            return false;
        }
        self.selected_season = season_number;
        self.selected_episode = 1;
        true
    }

    pub fn select_episode(&mut self, episode: u32) -> bool {
        if episode == 0 || episode > self.episode_count() {
            return false;
        }
        self.selected_episode = episode;
        true
    }

    /// Episode count of the selected season, 0 when that season isn't listed.
    pub fn episode_count(&self) -> u32 {
        self.seasons
            .iter()
            .find(|s| s.season_number == self.selected_season)
            .map(|s| s.episode_count)
            .unwrap_or(0)
    }

    pub fn episodes(&self) -> Vec<u32> {
        (1..=self.episode_count()).collect()
    }

    pub fn embed_url(&self, embed_base: &str, show_id: u64) -> String {
        tv_embed_url(embed_base, show_id, self.selected_season, self.selected_episode)
    }
}
