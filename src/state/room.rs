use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::RoomError;
use crate::protocol::{PlayerView, QuestionView, RoomView, ServerMessage};
use crate::scoring::score_answer;
use crate::types::*;

/// Outbound half of a live transport channel
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    /// Mint a connection with a fresh id and its outbound queue
    pub fn open() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::next(),
                sender,
            },
            receiver,
        )
    }

    /// Queue a message. Returns false if the receiving end is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.sender.send(msg).is_ok()
    }
}

/// What happened when a round was closed
#[derive(Debug, Clone)]
pub enum RoundOutcome {
    /// More questions remain
    Continue(RoundResult),
    GameOver {
        results: Vec<RoundResult>,
        scores: Vec<PlayerScore>,
    },
}

impl RoundOutcome {
    pub fn into_message(self) -> ServerMessage {
        match self {
            RoundOutcome::Continue(result) => ServerMessage::RoundEnd { result },
            RoundOutcome::GameOver { results, scores } => ServerMessage::GameOver { results, scores },
        }
    }
}

/// One game session. Only ever touched through its mutex.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub owner_token: OwnerToken,
    pub config: RoomConfig,
    pub phase: Phase,
    /// Join order
    pub players: Vec<Player>,
    pub questions: Vec<Question>,
    pub round_index: usize,
    pub current_question: Option<Question>,
    pub answers: HashMap<PlayerToken, String>,
    pub results: Vec<RoundResult>,
    pub round_deadline: Option<Instant>,
    pub round_ends_at: Option<DateTime<Utc>>,
    pub connections: HashMap<ConnectionId, Connection>,
    /// At most one live connection per player
    pub live: HashMap<PlayerToken, ConnectionId>,
    pub pending_purges: HashMap<PlayerToken, JoinHandle<()>>,
    pub timer_running: bool,
    /// Wakes the round timer when answers or presence change
    pub answer_signal: Arc<Notify>,
    /// Set once the room has been removed from the registry
    pub closed: bool,
    pub created_at: Instant,
}

impl Room {
    pub fn new(code: RoomCode, owner_token: OwnerToken, config: RoomConfig) -> Self {
        Self {
            code,
            owner_token,
            config,
            phase: Phase::Lobby,
            players: Vec::new(),
            questions: Vec::new(),
            round_index: 0,
            current_question: None,
            answers: HashMap::new(),
            results: Vec::new(),
            round_deadline: None,
            round_ends_at: None,
            connections: HashMap::new(),
            live: HashMap::new(),
            pending_purges: HashMap::new(),
            timer_running: false,
            answer_signal: Arc::new(Notify::new()),
            closed: false,
            created_at: Instant::now(),
        }
    }

    pub fn is_owner(&self, token: Option<&str>) -> bool {
        token == Some(self.owner_token.as_str())
    }

    pub fn player(&self, token: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.token == token)
    }

    pub fn is_active(&self, token: &str) -> bool {
        self.live.contains_key(token)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    /// Create a player with a token unique within this room
    pub fn add_player(&mut self, name: &str) -> &Player {
        let mut token = generate_secret();
        while self.player(&token).is_some() {
            token = generate_secret();
        }
        self.players.push(Player {
            id: ulid::Ulid::new().to_string(),
            token,
            name: name.to_string(),
            score: 0,
        });
        &self.players[self.players.len() - 1]
    }

    /// Bind a connection to a player, returning the connection it supersedes
    pub fn attach(&mut self, token: &str, conn: Connection) -> Option<Connection> {
        if let Some(purge) = self.pending_purges.remove(token) {
            purge.abort();
        }
        let superseded = self
            .live
            .insert(token.to_string(), conn.id)
            .and_then(|old| self.connections.remove(&old));
        self.connections.insert(conn.id, conn);
        superseded
    }

    /// Drop a connection. Returns the player token if that player is now inactive.
    pub fn detach(&mut self, conn_id: ConnectionId) -> Option<PlayerToken> {
        self.connections.remove(&conn_id);
        let token = self
            .live
            .iter()
            .find(|(_, id)| **id == conn_id)
            .map(|(token, _)| token.clone())?;
        self.live.remove(&token);
        Some(token)
    }

    /// Remove an inactive player. Connected players are never removed.
    pub fn remove_player(&mut self, token: &str) -> bool {
        if self.is_active(token) {
            return false;
        }
        let before = self.players.len();
        self.players.retain(|p| p.token != token);
        self.players.len() != before
    }

    /// Mark the room deleted and cancel its pending cleanups
    pub fn close(&mut self) {
        self.closed = true;
        for (_, purge) in self.pending_purges.drain() {
            purge.abort();
        }
        self.answer_signal.notify_one();
    }

    /// Enter `playing` with a fresh question list
    pub fn begin_game(&mut self, questions: Vec<Question>) {
        self.config.rounds_total = questions.len() as u32;
        self.questions = questions;
        self.round_index = 0;
        self.results.clear();
        self.phase = Phase::Playing;
    }

    /// Open the round at `round_index`. Returns None when no question is left.
    pub fn start_round(&mut self, now: Instant) -> Option<ServerMessage> {
        if self.phase != Phase::Playing {
            return None;
        }
        let question = self.questions.get(self.round_index)?.clone();
        let length = Duration::from_secs(u64::from(self.config.seconds_per_round));
        let ends_at = Utc::now() + chrono::Duration::seconds(i64::from(self.config.seconds_per_round));

        self.answers.clear();
        self.round_deadline = Some(now + length);
        self.round_ends_at = Some(ends_at);
        let view = QuestionView::from(&question);
        self.current_question = Some(question);

        Some(ServerMessage::RoundStart {
            question: view,
            deadline: ends_at,
            state: self.view(),
        })
    }

    pub fn round_active(&self) -> bool {
        self.phase == Phase::Playing && self.current_question.is_some()
    }

    /// Store (or replace) a player's answer for the open round
    pub fn record_answer(&mut self, token: &str, answer: &str) -> Result<(), RoomError> {
        if !self.round_active() {
            return Err(RoomError::RoundNotActive);
        }
        if self.player(token).is_none() {
            return Err(RoomError::NotFound);
        }
        self.answers.insert(token.to_string(), answer.to_string());
        Ok(())
    }

    /// True when every connected player has a non-empty answer.
    /// With nobody connected the round only ends at its deadline.
    pub fn all_active_answered(&self) -> bool {
        !self.live.is_empty()
            && self.live.keys().all(|token| {
                self.answers
                    .get(token)
                    .is_some_and(|a| !a.trim().is_empty())
            })
    }

    /// Whole seconds until the deadline, floored
    pub fn seconds_left(&self, now: Instant) -> u64 {
        self.round_deadline
            .map(|d| d.saturating_duration_since(now).as_secs())
            .unwrap_or(0)
    }

    pub fn deadline_passed(&self, now: Instant) -> bool {
        self.round_deadline.map_or(true, |d| now >= d)
    }

    /// Score the open round and advance
    pub fn end_round(&mut self) -> Option<RoundOutcome> {
        let question = self.current_question.take()?;
        let mut answers = BTreeMap::new();

        for player in &mut self.players {
            let Some(submitted) = self.answers.get(&player.token) else {
                continue;
            };
            player.score += score_answer(
                submitted,
                &question.title,
                self.config.points_exact,
                self.config.points_fuzzy,
            );
            answers.insert(player.id.clone(), submitted.clone());
        }

        let result = RoundResult {
            correct_title: question.title,
            scores: self.scores(),
            answers,
        };
        self.results.push(result.clone());
        self.answers.clear();
        self.round_deadline = None;
        self.round_ends_at = None;
        self.round_index += 1;

        if self.round_index >= self.questions.len() {
            self.phase = Phase::Results;
            let mut scores = self.scores();
            scores.sort_by(|a, b| b.score.cmp(&a.score));
            return Some(RoundOutcome::GameOver {
                results: self.results.clone(),
                scores,
            });
        }
        Some(RoundOutcome::Continue(result))
    }

    pub fn scores(&self) -> Vec<PlayerScore> {
        self.players
            .iter()
            .map(|p| PlayerScore {
                player_id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    pub fn view(&self) -> RoomView {
        let answered = if self.phase == Phase::Playing {
            self.players
                .iter()
                .filter(|p| {
                    self.is_active(&p.token)
                        && self.answers.get(&p.token).is_some_and(|a| !a.is_empty())
                })
                .map(|p| p.id.clone())
                .collect()
        } else {
            Vec::new()
        };

        RoomView {
            room_code: self.code.clone(),
            phase: self.phase,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    score: p.score,
                    connected: self.is_active(&p.token),
                })
                .collect(),
            round_index: self.round_index,
            rounds_total: self.config.rounds_total,
            seconds_per_round: self.config.seconds_per_round,
            max_players: self.config.max_players,
            suggestions_enabled: self.config.suggestions_enabled,
            difficulty: self.config.difficulty,
            genres: self.config.genres.clone(),
            sort_by: self.config.sort_by,
            pool_size: self.config.pool_size,
            points_exact: self.config.points_exact,
            points_fuzzy: self.config.points_fuzzy,
            current_question: self.current_question.as_ref().map(QuestionView::from),
            answered,
            round_ends_at: self.round_ends_at,
            last_result: self.results.last().cloned(),
        }
    }

    /// Queue a message on every connection. Returns the ones that are dead.
    pub fn deliver(&self, msg: &ServerMessage) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|conn| !conn.send(msg.clone()))
            .map(|conn| conn.id)
            .collect()
    }

    pub fn send_to(&self, conn_id: ConnectionId, msg: ServerMessage) -> bool {
        self.connections
            .get(&conn_id)
            .is_some_and(|conn| conn.send(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(title: &str) -> Question {
        Question {
            content_id: title.to_lowercase(),
            title: title.to_string(),
            cover_reference: String::new(),
        }
    }

    fn room() -> Room {
        Room::new(RoomCode::normalize("TEST"), "owner".into(), RoomConfig::default())
    }

    fn join(room: &mut Room, name: &str) -> (PlayerToken, mpsc::UnboundedReceiver<ServerMessage>) {
        let token = room.add_player(name).token.clone();
        let (conn, rx) = Connection::open();
        room.attach(&token, conn);
        (token, rx)
    }

    #[test]
    fn test_begin_game_clamps_rounds() {
        let mut room = room();
        room.begin_game(vec![question("A"), question("B")]);
        assert_eq!(room.phase, Phase::Playing);
        assert_eq!(room.config.rounds_total, 2);
        assert_eq!(room.round_index, 0);
    }

    #[tokio::test]
    async fn test_round_lifecycle() {
        let mut room = room();
        let (alice, _rx_a) = join(&mut room, "Alice");
        let (bob, _rx_b) = join(&mut room, "Bob");
        room.begin_game(vec![question("Tower of God"), question("Solo Leveling")]);

        assert!(matches!(
            room.start_round(Instant::now()),
            Some(ServerMessage::RoundStart { .. })
        ));
        assert!(room.current_question.is_some());

        room.record_answer(&alice, "tower of god").unwrap();
        assert!(!room.all_active_answered());
        room.record_answer(&bob, "").unwrap();
        assert!(!room.all_active_answered());
        room.record_answer(&bob, "tower").unwrap();
        assert!(room.all_active_answered());

        let Some(RoundOutcome::Continue(result)) = room.end_round() else {
            panic!("expected another round");
        };
        assert_eq!(result.correct_title, "Tower of God");
        assert_eq!(result.scores[0].score, 100);
        assert_eq!(result.scores[1].score, 50);
        assert_eq!(room.round_index, 1);
        assert!(room.current_question.is_none());
        assert!(room.answers.is_empty());

        room.start_round(Instant::now());
        let Some(RoundOutcome::GameOver { results, scores }) = room.end_round() else {
            panic!("expected game over");
        };
        assert_eq!(results.len(), 2);
        assert_eq!(scores[0].name, "Alice");
        assert_eq!(room.phase, Phase::Results);
        assert!(room.start_round(Instant::now()).is_none());
    }

    #[test]
    fn test_answer_outside_round_rejected() {
        let mut room = room();
        let (alice, _rx) = join(&mut room, "Alice");
        assert_eq!(room.record_answer(&alice, "x"), Err(RoomError::RoundNotActive));
    }

    #[tokio::test]
    async fn test_round_result_keeps_empty_answers() {
        let mut room = room();
        let (alice, _rx_a) = join(&mut room, "Alice");
        let (bob, _rx_b) = join(&mut room, "Bob");
        let (carol, _rx_c) = join(&mut room, "Carol");
        room.begin_game(vec![question("Solo Leveling")]);
        room.start_round(Instant::now());
        room.record_answer(&alice, "solo leveling").unwrap();
        room.record_answer(&bob, "").unwrap();

        let alice_id = room.player(&alice).unwrap().id.clone();
        let bob_id = room.player(&bob).unwrap().id.clone();
        let carol_id = room.player(&carol).unwrap().id.clone();
        let Some(RoundOutcome::GameOver { results, .. }) = room.end_round() else {
            panic!("expected game over");
        };
        let answers = &results[0].answers;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[&alice_id], "solo leveling");
        assert_eq!(answers[&bob_id], "");
        assert!(!answers.contains_key(&carol_id));
    }

    #[test]
    fn test_no_active_players_never_all_answered() {
        let room = room();
        assert!(!room.all_active_answered());
    }

    #[test]
    fn test_inactive_players_not_required() {
        let mut room = room();
        let (alice, _rx_a) = join(&mut room, "Alice");
        let (bob, _rx_b) = join(&mut room, "Bob");
        room.begin_game(vec![question("A")]);
        room.start_round(Instant::now());
        room.record_answer(&alice, "a").unwrap();

        let bob_conn = room.live[&bob];
        assert_eq!(room.detach(bob_conn), Some(bob.clone()));
        assert!(room.all_active_answered());
    }

    #[test]
    fn test_attach_supersedes_previous_connection() {
        let mut room = room();
        let (alice, mut old_rx) = join(&mut room, "Alice");
        let old_id = room.live[&alice];

        let (conn, _new_rx) = Connection::open();
        let new_id = conn.id;
        let superseded = room.attach(&alice, conn).unwrap();
        assert_eq!(superseded.id, old_id);
        drop(superseded);

        assert_eq!(room.connections.len(), 1);
        assert_eq!(room.live[&alice], new_id);
        // Old queue is closed once the room lets go of it
        assert!(old_rx.try_recv().is_err());
        // Detaching the stale id does not deactivate the player
        assert_eq!(room.detach(old_id), None);
        assert!(room.is_active(&alice));
    }

    #[test]
    fn test_remove_player_only_when_inactive() {
        let mut room = room();
        let (alice, _rx) = join(&mut room, "Alice");
        assert!(!room.remove_player(&alice));
        let conn = room.live[&alice];
        room.detach(conn);
        assert!(room.remove_player(&alice));
        assert!(room.players.is_empty());
    }

    #[test]
    fn test_deliver_reports_dead_connections() {
        let mut room = room();
        let (_alice, rx_a) = join(&mut room, "Alice");
        let (bob, mut rx_b) = join(&mut room, "Bob");
        drop(rx_a);

        let dead = room.deliver(&ServerMessage::AnswerReceived);
        assert_eq!(dead.len(), 1);
        assert_ne!(dead[0], room.live[&bob]);
        assert!(matches!(rx_b.try_recv(), Ok(ServerMessage::AnswerReceived)));
    }

    #[test]
    fn test_view_hides_tokens() {
        let mut room = room();
        let (alice, _rx) = join(&mut room, "Alice");
        let json = serde_json::to_string(&room.view()).unwrap();
        assert!(!json.contains(&alice));
        assert!(!json.contains("owner"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seconds_left_floors() {
        let mut room = room();
        room.config.seconds_per_round = 3;
        room.begin_game(vec![question("A")]);
        let start = Instant::now();
        room.start_round(start);
        assert_eq!(room.seconds_left(start), 3);
        assert_eq!(room.seconds_left(start + Duration::from_millis(1500)), 1);
        assert!(!room.deadline_passed(start + Duration::from_millis(2999)));
        assert!(room.deadline_passed(start + Duration::from_secs(3)));
        assert_eq!(room.seconds_left(start + Duration::from_secs(5)), 0);
    }
}
