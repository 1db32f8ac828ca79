//! Per-room round timer
//!
//! One task per room drives `playing`: it ticks once a second, ends the round
//! when the deadline passes or every connected player has answered, pauses,
//! and opens the next round until the questions run out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

use crate::protocol::ServerMessage;
use crate::state::{AppState, Room, RoundOutcome};

const TICK: Duration = Duration::from_secs(1);

/// Spawn the timer for a room that has just entered `playing`.
/// The caller must have set `timer_running` under the room lock.
pub fn spawn_round_timer(state: Arc<AppState>, room: Arc<Mutex<Room>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        run(&state, &room).await;
        let mut room = room.lock().await;
        room.timer_running = false;
        tracing::debug!("Round timer for room {} stopped", room.code);
    })
}

async fn run(state: &AppState, room: &Arc<Mutex<Room>>) {
    let code = room.lock().await.code.clone();
    loop {
        if !run_round(state, room).await {
            return;
        }

        let (game_over, dead) = {
            let mut room = room.lock().await;
            if room.closed {
                return;
            }
            let Some(outcome) = room.end_round() else {
                return;
            };
            tracing::info!(
                "Room {} finished round {}/{}",
                code,
                room.round_index,
                room.questions.len()
            );
            let game_over = matches!(outcome, RoundOutcome::GameOver { .. });
            (game_over, room.deliver(&outcome.into_message()))
        };
        state.prune(dead).await;

        if game_over {
            tracing::info!("Game over in room {}", code);
            return;
        }

        sleep(state.settings.round_pause).await;

        let dead = {
            let mut room = room.lock().await;
            if room.closed {
                return;
            }
            match room.start_round(Instant::now()) {
                Some(msg) => room.deliver(&msg),
                None => return,
            }
        };
        state.prune(dead).await;
    }
}

/// Tick until the open round should end. Returns false if the room went away
/// or left `playing` underneath us.
async fn run_round(state: &AppState, room: &Arc<Mutex<Room>>) -> bool {
    let signal = room.lock().await.answer_signal.clone();
    let mut next_tick = Instant::now();

    loop {
        let now = Instant::now();
        let (dead, done, deadline) = {
            let room = room.lock().await;
            if room.closed || !room.round_active() {
                return false;
            }
            let mut dead = Vec::new();
            if now >= next_tick {
                let seconds_left = room.seconds_left(now);
                dead = room.deliver(&ServerMessage::Tick { seconds_left });
                next_tick += TICK;
                if next_tick <= now {
                    next_tick = now + TICK;
                }
            }
            let done = room.all_active_answered() || room.deadline_passed(now);
            (dead, done, room.round_deadline)
        };
        state.prune(dead).await;
        if done {
            return true;
        }

        let wake_at = deadline.map_or(next_tick, |d| d.min(next_tick));
        tokio::select! {
            _ = sleep_until(wake_at) => {}
            _ = signal.notified() => {}
        }
    }
}
