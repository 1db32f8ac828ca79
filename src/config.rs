//! Process settings and room creation limits

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RoomError;
use crate::types::{Difficulty, RoomCode, RoomConfig, SortKey};

const DEFAULT_SECRET: &str = "secret";

pub const ROUNDS_RANGE: RangeInclusive<u32> = 3..=30;
pub const SECONDS_RANGE: RangeInclusive<u32> = 10..=90;
pub const PLAYERS_RANGE: RangeInclusive<usize> = 2..=20;
pub const POINTS_RANGE: RangeInclusive<u32> = 0..=1000;
pub const POOL_SIZE_RANGE: RangeInclusive<usize> = 1..=10_000;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared secret expected in `X-API-Key`
    pub api_secret_key: String,
    pub pool_path: PathBuf,
    pub bind_addr: String,
    pub cover_base_url: String,
    /// Defaults applied to options a room creator leaves out
    pub room_defaults: RoomConfig,
    /// Pause between a round ending and the next one starting
    pub round_pause: Duration,
    /// How long a disconnected player is kept before being purged
    pub reconnect_grace: Duration,
    /// Age after which a room nobody ever joined is deleted
    pub idle_room_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_secret_key: DEFAULT_SECRET.to_string(),
            pool_path: PathBuf::from("data/content_pool.json"),
            bind_addr: "0.0.0.0:8000".to_string(),
            cover_base_url: "https://uploads.mangadex.org/covers".to_string(),
            room_defaults: RoomConfig::default(),
            round_pause: Duration::from_secs(4),
            reconnect_grace: Duration::from_secs(3),
            idle_room_timeout: Duration::from_secs(600),
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let room = &defaults.room_defaults;

        let api_secret_key = std::env::var("API_SECRET_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SECRET.to_string());

        let room_defaults = RoomConfig {
            rounds_total: env_or("ROUNDS_PER_GAME", room.rounds_total),
            seconds_per_round: env_or("SECONDS_PER_ROUND", room.seconds_per_round),
            points_exact: env_or("POINTS_EXACT", room.points_exact),
            points_fuzzy: env_or("POINTS_FUZZY", room.points_fuzzy),
            max_players: env_or("MAX_PLAYERS_PER_ROOM", room.max_players),
            suggestions_enabled: env_or("SUGGESTIONS_ENABLED_DEFAULT", room.suggestions_enabled),
            ..room.clone()
        };

        Self {
            api_secret_key,
            pool_path: env_or("POOL_PATH", defaults.pool_path),
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            cover_base_url: env_or("COVER_BASE_URL", defaults.cover_base_url)
                .trim_end_matches('/')
                .to_string(),
            room_defaults,
            round_pause: Duration::from_secs(env_or("ROUND_PAUSE_SECS", 4)),
            reconnect_grace: Duration::from_secs(env_or("RECONNECT_GRACE_SECS", 3)),
            idle_room_timeout: Duration::from_secs(env_or("IDLE_ROOM_SECS", 600)),
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.api_secret_key == DEFAULT_SECRET
    }
}

/// Parse an env var, warning and keeping the default when it is malformed
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring invalid {}={:?}: {}", key, raw, e);
                default
            }
        },
        _ => default,
    }
}

/// Options accepted when creating a room. Missing fields take the server defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateRoomOptions {
    pub room_code: Option<String>,
    pub rounds_total: Option<u32>,
    pub seconds_per_round: Option<u32>,
    pub max_players: Option<usize>,
    pub points_exact: Option<u32>,
    pub points_fuzzy: Option<u32>,
    pub suggestions_enabled: Option<bool>,
    pub difficulty: Option<Difficulty>,
    pub genres: Option<Vec<String>>,
    pub sort_by: Option<SortKey>,
    pub pool_size: Option<usize>,
}

impl CreateRoomOptions {
    /// Validate against the creation limits and merge with defaults
    pub fn resolve(self, defaults: &RoomConfig) -> Result<(Option<RoomCode>, RoomConfig), RoomError> {
        let code = match self.room_code.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(RoomCode::parse(raw)?),
            _ => None,
        };

        let config = RoomConfig {
            rounds_total: check("rounds_total", self.rounds_total, defaults.rounds_total, &ROUNDS_RANGE)?,
            seconds_per_round: check(
                "seconds_per_round",
                self.seconds_per_round,
                defaults.seconds_per_round,
                &SECONDS_RANGE,
            )?,
            max_players: check("max_players", self.max_players, defaults.max_players, &PLAYERS_RANGE)?,
            points_exact: check("points_exact", self.points_exact, defaults.points_exact, &POINTS_RANGE)?,
            points_fuzzy: check("points_fuzzy", self.points_fuzzy, defaults.points_fuzzy, &POINTS_RANGE)?,
            suggestions_enabled: self.suggestions_enabled.unwrap_or(defaults.suggestions_enabled),
            difficulty: self.difficulty.unwrap_or(defaults.difficulty),
            genres: self
                .genres
                .map(|g| g.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect::<Vec<_>>())
                .filter(|g| !g.is_empty()),
            sort_by: self.sort_by.unwrap_or(defaults.sort_by),
            pool_size: match self.pool_size {
                Some(size) if !POOL_SIZE_RANGE.contains(&size) => {
                    return Err(out_of_range("pool_size", &POOL_SIZE_RANGE))
                }
                other => other,
            },
        };

        if config.difficulty == Difficulty::Custom && config.pool_size.is_none() {
            return Err(RoomError::InvalidConfig(
                "pool_size is required for custom difficulty".to_string(),
            ));
        }
        Ok((code, config))
    }
}

fn check<T>(field: &str, value: Option<T>, default: T, range: &RangeInclusive<T>) -> Result<T, RoomError>
where
    T: PartialOrd + Display + Copy,
{
    match value {
        Some(v) if !range.contains(&v) => Err(out_of_range(field, range)),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

fn out_of_range<T: Display>(field: &str, range: &RangeInclusive<T>) -> RoomError {
    RoomError::InvalidConfig(format!(
        "{} must be between {} and {}",
        field,
        range.start(),
        range.end()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_options_take_defaults() {
        let defaults = RoomConfig::default();
        let (code, config) = CreateRoomOptions::default().resolve(&defaults).unwrap();
        assert!(code.is_none());
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_custom_code_is_normalized() {
        let options = CreateRoomOptions {
            room_code: Some("abcd".into()),
            ..Default::default()
        };
        let (code, _) = options.resolve(&RoomConfig::default()).unwrap();
        assert_eq!(code.unwrap().as_str(), "ABCD");
    }

    #[test]
    fn test_invalid_code_rejected() {
        let options = CreateRoomOptions {
            room_code: Some("ab!".into()),
            ..Default::default()
        };
        assert_eq!(options.resolve(&RoomConfig::default()), Err(RoomError::InvalidCode));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let options = CreateRoomOptions {
            rounds_total: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            options.resolve(&RoomConfig::default()),
            Err(RoomError::InvalidConfig(_))
        ));

        let options = CreateRoomOptions {
            max_players: Some(21),
            ..Default::default()
        };
        assert!(options.resolve(&RoomConfig::default()).is_err());
    }

    #[test]
    fn test_custom_difficulty_requires_pool_size() {
        let options = CreateRoomOptions {
            difficulty: Some(Difficulty::Custom),
            ..Default::default()
        };
        assert!(options.resolve(&RoomConfig::default()).is_err());

        let options = CreateRoomOptions {
            difficulty: Some(Difficulty::Custom),
            pool_size: Some(25),
            ..Default::default()
        };
        let (_, config) = options.resolve(&RoomConfig::default()).unwrap();
        assert_eq!(config.pool_size, Some(25));
    }

    #[test]
    fn test_blank_genres_dropped() {
        let options = CreateRoomOptions {
            genres: Some(vec![" ".into(), "Action ".into()]),
            ..Default::default()
        };
        let (_, config) = options.resolve(&RoomConfig::default()).unwrap();
        assert_eq!(config.genres, Some(vec!["Action".to_string()]));
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        std::env::set_var("ROUNDS_PER_GAME", "5");
        std::env::set_var("POINTS_FUZZY", "not-a-number");
        std::env::set_var("RECONNECT_GRACE_SECS", "7");
        std::env::set_var("IDLE_ROOM_SECS", "120");
        std::env::set_var("COVER_BASE_URL", "http://covers.local/");
        let settings = Settings::from_env();
        std::env::remove_var("ROUNDS_PER_GAME");
        std::env::remove_var("POINTS_FUZZY");
        std::env::remove_var("RECONNECT_GRACE_SECS");
        std::env::remove_var("IDLE_ROOM_SECS");
        std::env::remove_var("COVER_BASE_URL");

        assert_eq!(settings.room_defaults.rounds_total, 5);
        assert_eq!(settings.room_defaults.points_fuzzy, 50);
        assert_eq!(settings.reconnect_grace, Duration::from_secs(7));
        assert_eq!(settings.idle_room_timeout, Duration::from_secs(120));
        assert_eq!(settings.cover_base_url, "http://covers.local");
    }

    #[test]
    #[serial]
    fn test_default_secret_detected() {
        std::env::remove_var("API_SECRET_KEY");
        assert!(Settings::from_env().uses_default_secret());
        std::env::set_var("API_SECRET_KEY", "hunter2");
        assert!(!Settings::from_env().uses_default_secret());
        std::env::remove_var("API_SECRET_KEY");
    }
}
