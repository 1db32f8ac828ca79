use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages a connected player may send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Owner only; ignored for everyone else
    StartGame,
    SubmitAnswer {
        answer: String,
    },
    Ping,
}

/// Events pushed to connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once to the joining connection only
    Joined {
        player_id: PlayerId,
        /// Keep this to reconnect as the same player
        player_token: PlayerToken,
        is_owner: bool,
        state: RoomView,
    },
    RoomState {
        state: RoomView,
    },
    Tick {
        seconds_left: u64,
    },
    RoundStart {
        question: QuestionView,
        deadline: DateTime<Utc>,
        state: RoomView,
    },
    RoundEnd {
        result: RoundResult,
    },
    GameOver {
        results: Vec<RoundResult>,
        scores: Vec<PlayerScore>,
    },
    AnswerReceived,
    Error {
        code: String,
        message: String,
    },
    Pong,
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<crate::error::RoomError> for ServerMessage {
    fn from(err: crate::error::RoomError) -> Self {
        ServerMessage::error(err.code(), err.to_string())
    }
}

/// Question as shown during play (title withheld until the round ends)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub content_id: ContentId,
    pub cover_reference: String,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            content_id: q.content_id.clone(),
            cover_reference: q.cover_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub connected: bool,
}

/// Client-facing projection of a room. Contains no secrets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomView {
    pub room_code: RoomCode,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    pub round_index: usize,
    pub rounds_total: u32,
    pub seconds_per_round: u32,
    pub max_players: usize,
    pub suggestions_enabled: bool,
    pub difficulty: Difficulty,
    pub genres: Option<Vec<String>>,
    pub sort_by: SortKey,
    pub pool_size: Option<usize>,
    pub points_exact: u32,
    pub points_fuzzy: u32,
    pub current_question: Option<QuestionView>,
    /// Public ids of connected players who have answered (only while playing)
    pub answered: Vec<PlayerId>,
    pub round_ends_at: Option<DateTime<Utc>>,
    pub last_result: Option<RoundResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"submit_answer","answer":"Tower of God"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitAnswer {
                answer: "Tower of God".into()
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"start_game"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartGame);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"host_reset"}"#).is_err());
    }

    #[test]
    fn test_server_message_tags() {
        let json = serde_json::to_value(ServerMessage::Tick { seconds_left: 3 }).unwrap();
        assert_eq!(json["event"], "tick");
        assert_eq!(json["seconds_left"], 3);

        let json = serde_json::to_value(ServerMessage::from(crate::error::RoomError::Full)).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["code"], "room_full");
    }

    #[test]
    fn test_question_view_hides_title() {
        let q = Question {
            content_id: "m1".into(),
            title: "Tower of God".into(),
            cover_reference: "c.jpg".into(),
        };
        let json = serde_json::to_string(&QuestionView::from(&q)).unwrap();
        assert!(!json.contains("Tower of God"));
    }
}
