//! Wire codec for tracking documents.
//!
//! This is the only place where the `"{season}_{episode}"` string key and
//! the camelCase document shape exist; everything past this boundary works
//! with typed keys and parsed timestamps. Decoding doubles as the
//! structural shape check: any document that fails it is treated as absent,
//! which guards consumers against partially-written or legacy-shaped
//! records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::{EpisodeKey, ShowId};
use crate::models::tracking::{
    NextEpisodeConfidence, NextEpisodeInfo, NextEpisodeState, TrackingMetadata, TvShowTracking,
    WatchedEpisode,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    episodes: HashMap<String, RawEpisode>,
    metadata: RawMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEpisode {
    episode_id: i64,
    tv_show_id: i32,
    season_number: i32,
    episode_number: i32,
    watched_at: String,
    episode_name: Option<String>,
    episode_air_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    tv_show_name: String,
    poster_path: Option<String>,
    last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_episodes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_runtime: Option<u32>,
    /// Absent = never computed, `null` = caught up, object = upcoming.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    next_episode: Option<Option<RawNextEpisode>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNextEpisode {
    season: i32,
    episode: i32,
    title: String,
    air_date: Option<String>,
    confidence: Option<String>,
}

/// Keeps `null` distinguishable from an absent field: a present `null`
/// decodes to `Some(None)` instead of `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Decodes a stored document, returning `None` for anything that fails the
/// structural shape check: unparsable episode keys, keys that contradict
/// the entry's own season/episode fields, or unparsable timestamps.
/// Optional display-only fields (names, air dates) degrade to `None`
/// instead of failing the document.
#[must_use]
pub fn decode(value: &Value) -> Option<TvShowTracking> {
    let raw: RawDocument = serde_json::from_value(value.clone()).ok()?;

    let last_updated = parse_timestamp(&raw.metadata.last_updated)?;

    let next_episode = match raw.metadata.next_episode {
        None => NextEpisodeState::Unknown,
        Some(None) => NextEpisodeState::CaughtUp,
        Some(Some(next)) => NextEpisodeState::Upcoming(NextEpisodeInfo {
            season: next.season,
            episode: next.episode,
            title: next.title,
            air_date: parse_date(next.air_date.as_deref()),
            confidence: match next.confidence.as_deref() {
                Some("approximate") => NextEpisodeConfidence::Approximate,
                _ => NextEpisodeConfidence::Exact,
            },
        }),
    };

    let mut episodes = HashMap::with_capacity(raw.episodes.len());
    for (key_str, entry) in raw.episodes {
        let key: EpisodeKey = key_str.parse().ok()?;
        if key.season != entry.season_number || key.episode != entry.episode_number {
            debug!(%key, "tracking entry contradicts its own key, dropping document");
            return None;
        }
        let watched_at = parse_timestamp(&entry.watched_at)?;
        episodes.insert(
            key,
            WatchedEpisode {
                episode_id: entry.episode_id,
                show_id: ShowId::new(entry.tv_show_id),
                key,
                watched_at,
                name: entry.episode_name,
                air_date: parse_date(entry.episode_air_date.as_deref()),
            },
        );
    }

    Some(TvShowTracking {
        episodes,
        metadata: TrackingMetadata {
            show_name: raw.metadata.tv_show_name,
            poster_path: raw.metadata.poster_path,
            last_updated,
            total_episodes: raw.metadata.total_episodes,
            avg_runtime: raw.metadata.avg_runtime,
            next_episode,
        },
    })
}

/// Encodes a document into its wire shape.
#[must_use]
pub fn encode(tracking: &TvShowTracking) -> Value {
    let episodes = tracking
        .episodes
        .iter()
        .map(|(key, episode)| {
            (
                key.to_string(),
                RawEpisode {
                    episode_id: episode.episode_id,
                    tv_show_id: episode.show_id.value(),
                    season_number: key.season,
                    episode_number: key.episode,
                    watched_at: episode.watched_at.to_rfc3339(),
                    episode_name: episode.name.clone(),
                    episode_air_date: episode.air_date.map(|d| d.to_string()),
                },
            )
        })
        .collect();

    let next_episode = match &tracking.metadata.next_episode {
        NextEpisodeState::Unknown => None,
        NextEpisodeState::CaughtUp => Some(None),
        NextEpisodeState::Upcoming(next) => Some(Some(RawNextEpisode {
            season: next.season,
            episode: next.episode,
            title: next.title.clone(),
            air_date: next.air_date.map(|d| d.to_string()),
            confidence: Some(
                match next.confidence {
                    NextEpisodeConfidence::Exact => "exact",
                    NextEpisodeConfidence::Approximate => "approximate",
                }
                .to_string(),
            ),
        })),
    };

    let raw = RawDocument {
        episodes,
        metadata: RawMetadata {
            tv_show_name: tracking.metadata.show_name.clone(),
            poster_path: tracking.metadata.poster_path.clone(),
            last_updated: tracking.metadata.last_updated.to_rfc3339(),
            total_episodes: tracking.metadata.total_episodes,
            avg_runtime: tracking.metadata.avg_runtime,
            next_episode,
        },
    };

    serde_json::to_value(raw).expect("tracking document serialization cannot fail")
}
