//! Client for the external show-metadata catalog.
//!
//! The catalog is read-only: the engine consumes show totals, season lists
//! and per-season episode lists, and never writes back. Everything the rest
//! of the crate sees goes through the [`CatalogSource`] trait so the cache
//! and tests do not depend on the network.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::Config;
use crate::constants::catalog::USER_AGENT;
use crate::domain::ShowId;
use crate::models::catalog::{EpisodeMetadata, SeasonMetadata, ShowMetadata};

/// Errors from the metadata catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog API error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("show {0} not found in catalog")]
    NotFound(ShowId),
}

/// Read-only source of show metadata.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches show-level metadata: episode totals, runtimes, season list.
    async fn show(&self, id: ShowId) -> Result<ShowMetadata, CatalogError>;

    /// Fetches the episode list for one season of a show.
    async fn season_episodes(
        &self,
        id: ShowId,
        season: i32,
    ) -> Result<Vec<EpisodeMetadata>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    number_of_episodes: Option<u32>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
    #[serde(default)]
    seasons: Vec<SeasonEntry>,
}

#[derive(Debug, Deserialize)]
struct SeasonEntry {
    season_number: i32,
    #[serde(default)]
    episode_count: u32,
    air_date: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeasonResponse {
    #[serde(default)]
    episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Deserialize)]
struct EpisodeEntry {
    id: i64,
    episode_number: i32,
    name: Option<String>,
    air_date: Option<String>,
}

/// Catalog dates come as `YYYY-MM-DD`; anything else is treated as absent
/// rather than failing the whole payload.
fn parse_air_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

impl From<ShowResponse> for ShowMetadata {
    fn from(raw: ShowResponse) -> Self {
        let avg_runtime = if raw.episode_run_time.is_empty() {
            None
        } else {
            let sum: u32 = raw.episode_run_time.iter().sum();
            let len = u32::try_from(raw.episode_run_time.len()).unwrap_or(1);
            Some(sum / len)
        };

        Self {
            total_episodes: raw.number_of_episodes,
            avg_runtime,
            seasons: raw
                .seasons
                .into_iter()
                .map(|s| SeasonMetadata {
                    number: s.season_number,
                    episode_count: s.episode_count,
                    air_date: parse_air_date(s.air_date),
                    name: s.name,
                })
                .collect(),
        }
    }
}

/// HTTP client for a TMDB-shaped catalog API.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CatalogClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Builds a client from the loaded configuration, honoring the
    /// environment override for the API key.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        Self::new(
            config.catalog.base_url.clone(),
            config.catalog_api_key(),
            config.catalog_timeout(),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        show: ShowId,
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}?api_key={}", self.base_url, path, self.api_key);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(show));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn show(&self, id: ShowId) -> Result<ShowMetadata, CatalogError> {
        let raw: ShowResponse = self.get_json(&format!("/tv/{id}"), id).await?;
        Ok(raw.into())
    }

    async fn season_episodes(
        &self,
        id: ShowId,
        season: i32,
    ) -> Result<Vec<EpisodeMetadata>, CatalogError> {
        let raw: SeasonResponse = self
            .get_json(&format!("/tv/{id}/season/{season}"), id)
            .await?;

        Ok(raw
            .episodes
            .into_iter()
            .map(|e| EpisodeMetadata {
                id: e.id,
                episode_number: e.episode_number,
                name: e.name,
                air_date: parse_air_date(e.air_date),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_payload_maps_to_metadata() {
        let raw: ShowResponse = serde_json::from_value(serde_json::json!({
            "number_of_episodes": 62,
            "episode_run_time": [45, 47],
            "seasons": [
                { "season_number": 0, "episode_count": 5, "air_date": null, "name": "Specials" },
                { "season_number": 1, "episode_count": 7, "air_date": "2008-01-20", "name": "Season 1" }
            ]
        }))
        .unwrap();

        let show: ShowMetadata = raw.into();
        assert_eq!(show.total_episodes, Some(62));
        assert_eq!(show.avg_runtime, Some(46));
        assert_eq!(show.seasons.len(), 2);
        assert_eq!(
            show.seasons[1].air_date,
            NaiveDate::from_ymd_opt(2008, 1, 20)
        );
        assert_eq!(show.regular_seasons().count(), 1);
    }

    #[test]
    fn empty_runtimes_yield_no_average() {
        let raw: ShowResponse =
            serde_json::from_value(serde_json::json!({ "number_of_episodes": 10 })).unwrap();
        let show: ShowMetadata = raw.into();
        assert_eq!(show.avg_runtime, None);
    }

    #[test]
    fn unparsable_air_dates_become_absent() {
        assert_eq!(parse_air_date(Some("not-a-date".to_string())), None);
        assert_eq!(parse_air_date(None), None);
        assert_eq!(
            parse_air_date(Some("2026-08-01".to_string())),
            NaiveDate::from_ymd_opt(2026, 8, 1)
        );
    }
}
