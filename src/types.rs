use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RoomError;

/// Opaque ID types
pub type PlayerId = String;
pub type PlayerToken = String;
pub type OwnerToken = String;
pub type ContentId = String;

/// Safe character set for generated room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const GENERATED_CODE_LENGTH: usize = 6;
const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 8;

/// Case-insensitive room code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate a user-chosen code: 4-8 ASCII letters or digits, any case.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let code = raw.trim().to_ascii_uppercase();
        let valid_len = (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len());
        if !valid_len || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(RoomError::InvalidCode);
        }
        Ok(Self(code))
    }

    /// Canonical form for lookups. Does not validate; unknown codes simply miss.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self(
            (0..GENERATED_CODE_LENGTH)
                .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate an unguessable 128-bit hex secret (player and owner tokens)
pub fn generate_secret() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier issued to every accepted transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Playing,
    Results,
}

/// How much of the (sorted) content pool a room draws its questions from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Custom,
}

impl Difficulty {
    /// Size cap applied after sorting and genre filtering. `None` = whole pool.
    pub fn pool_cap(self, custom_size: Option<usize>) -> Option<usize> {
        match self {
            Difficulty::Easy => Some(50),
            Difficulty::Medium => Some(200),
            Difficulty::Hard => None,
            Difficulty::Custom => custom_size,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Views,
    Rating,
}

/// Settings captured when a room is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomConfig {
    pub rounds_total: u32,
    pub seconds_per_round: u32,
    pub max_players: usize,
    pub points_exact: u32,
    pub points_fuzzy: u32,
    pub suggestions_enabled: bool,
    pub difficulty: Difficulty,
    pub genres: Option<Vec<String>>,
    pub sort_by: SortKey,
    pub pool_size: Option<usize>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            rounds_total: 10,
            seconds_per_round: 20,
            max_players: 8,
            points_exact: 100,
            points_fuzzy: 50,
            suggestions_enabled: true,
            difficulty: Difficulty::Medium,
            genres: None,
            sort_by: SortKey::Views,
            pool_size: None,
        }
    }
}

/// One entry of the content pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    #[serde(alias = "id")]
    pub content_id: ContentId,
    pub title: String,
    #[serde(default, alias = "cover_filename")]
    pub cover_reference: String,
    #[serde(default, alias = "views")]
    pub popularity: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl ContentItem {
    pub fn metric(&self, key: SortKey) -> f64 {
        match key {
            SortKey::Views => self.popularity,
            SortKey::Rating => self.rating,
        }
    }
}

/// A question as held by the room (includes the answer)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub content_id: ContentId,
    pub title: String,
    pub cover_reference: String,
}

impl From<&ContentItem> for Question {
    fn from(item: &ContentItem) -> Self {
        Self {
            content_id: item.content_id.clone(),
            title: item.title.clone(),
            cover_reference: item.cover_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerScore {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

/// Immutable record appended to the room history at the end of each round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResult {
    pub correct_title: String,
    pub scores: Vec<PlayerScore>,
    /// Raw answers keyed by public player id
    pub answers: BTreeMap<PlayerId, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub token: PlayerToken,
    pub name: String,
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_parse_uppercases() {
        let code = RoomCode::parse("  abcd ").unwrap();
        assert_eq!(code.as_str(), "ABCD");
        assert_eq!(code, RoomCode::normalize("AbCd"));
    }

    #[test]
    fn test_room_code_parse_rejects_bad_input() {
        assert_eq!(RoomCode::parse("abc"), Err(RoomError::InvalidCode));
        assert_eq!(RoomCode::parse("ABCDEFGHI"), Err(RoomError::InvalidCode));
        assert_eq!(RoomCode::parse("AB-CD"), Err(RoomError::InvalidCode));
        assert_eq!(RoomCode::parse(""), Err(RoomError::InvalidCode));
    }

    #[test]
    fn test_generated_code_is_valid() {
        for _ in 0..50 {
            let code = RoomCode::generate();
            assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);
            assert!(!code.as_str().contains('O'));
            assert!(!code.as_str().contains('0'));
        }
    }

    #[test]
    fn test_secret_is_128_bit_hex() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_item_accepts_catalog_field_names() {
        let json = r#"{"id":"m1","title":"Solo Leveling","cover_filename":"c.jpg","views":12.0,"genres":["Action"]}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.content_id, "m1");
        assert_eq!(item.cover_reference, "c.jpg");
        assert_eq!(item.metric(SortKey::Views), 12.0);
        assert_eq!(item.metric(SortKey::Rating), 0.0);
    }

    #[test]
    fn test_difficulty_caps() {
        assert_eq!(Difficulty::Easy.pool_cap(None), Some(50));
        assert_eq!(Difficulty::Medium.pool_cap(Some(5)), Some(200));
        assert_eq!(Difficulty::Hard.pool_cap(None), None);
        assert_eq!(Difficulty::Custom.pool_cap(Some(7)), Some(7));
    }
}
