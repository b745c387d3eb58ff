//! Domain types for watch-progress tracking with strong typing.
//!
//! This module provides type-safe wrappers and domain primitives for the
//! tracking subsystem. It follows the Newtype pattern to prevent ID mixing
//! and to keep the `"{season}_{episode}"` wire key out of the core logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a TV show in the external catalog.
///
/// This newtype wrapper prevents mixing show IDs with other numeric IDs
/// (e.g., raw episode IDs).
///
/// # Examples
///
/// ```rust
/// use trackarr::domain::ShowId;
///
/// let id = ShowId::new(1399);
/// assert_eq!(id.value(), 1399);
/// assert_eq!(id.to_string(), "1399");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShowId(i32);

impl ShowId {
    /// Creates a new `ShowId` from a raw i32 value.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `id` is negative. Production code should
    /// validate before construction.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        debug_assert!(id >= 0, "ShowId should be non-negative");
        Self(id)
    }

    /// Returns the underlying i32 value.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ShowId> for i32 {
    fn from(id: ShowId) -> Self {
        id.0
    }
}

impl From<i32> for ShowId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for ShowId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for ShowId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self(id))
    }
}

/// Identifier of the account that owns a set of tracking documents.
///
/// Opaque string assigned by the authentication layer; the engine never
/// inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Composite key identifying one episode within a show.
///
/// The store serializes this as `"{season}_{episode}"`; inside the engine it
/// stays a typed pair so the aggregator and resolver never parse strings.
/// Within one show's tracking map no two entries may share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeKey {
    pub season: i32,
    pub episode: i32,
}

impl EpisodeKey {
    #[must_use]
    pub const fn new(season: i32, episode: i32) -> Self {
        Self { season, episode }
    }

    /// Whether this key belongs to season 0 (specials).
    ///
    /// Specials never contribute to show-level progress totals.
    #[must_use]
    pub const fn is_special(&self) -> bool {
        self.season <= 0
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.season, self.episode)
    }
}

/// Error returned when a stored episode key does not match the
/// `"{season}_{episode}"` pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid episode key: {0:?}")]
pub struct ParseEpisodeKeyError(String);

impl FromStr for EpisodeKey {
    type Err = ParseEpisodeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (season, episode) = s
            .split_once('_')
            .ok_or_else(|| ParseEpisodeKeyError(s.to_string()))?;
        let season = season
            .parse::<i32>()
            .map_err(|_| ParseEpisodeKeyError(s.to_string()))?;
        let episode = episode
            .parse::<i32>()
            .map_err(|_| ParseEpisodeKeyError(s.to_string()))?;
        Ok(Self { season, episode })
    }
}
