use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of room operations. Surfaced to the immediate caller only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room code already in use")]
    CodeTaken,
    #[error("Room not found")]
    NotFound,
    #[error("Room is full")]
    Full,
    #[error("Could not join room")]
    JoinFailed,
    #[error("Room code must be 4-8 letters or digits")]
    InvalidCode,
    #[error("Invalid room settings: {0}")]
    InvalidConfig(String),
    #[error("Only the room owner can do that")]
    NotOwner,
    #[error("Game already started")]
    NotInLobby,
    #[error("No questions available for these settings")]
    NoQuestions,
    #[error("No round in progress")]
    RoundNotActive,
}

impl RoomError {
    /// Stable wire code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::CodeTaken => "room_code_taken",
            RoomError::NotFound => "room_not_found",
            RoomError::Full => "room_full",
            RoomError::JoinFailed => "join_failed",
            RoomError::InvalidCode => "invalid_room_code",
            RoomError::InvalidConfig(_) => "invalid_config",
            RoomError::NotOwner => "not_owner",
            RoomError::NotInLobby => "not_in_lobby",
            RoomError::NoQuestions => "no_questions",
            RoomError::RoundNotActive => "round_not_active",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RoomError::NotFound => StatusCode::NOT_FOUND,
            RoomError::CodeTaken | RoomError::Full | RoomError::NotInLobby => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(RoomError::CodeTaken.code(), "room_code_taken");
        assert_eq!(RoomError::InvalidCode.code(), "invalid_room_code");
        assert_eq!(RoomError::InvalidConfig("x".into()).code(), "invalid_config");
        assert_eq!(RoomError::RoundNotActive.code(), "round_not_active");
    }

    #[test]
    fn test_response_status() {
        assert_eq!(RoomError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(RoomError::CodeTaken.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(RoomError::InvalidCode.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
