use tokio::task::JoinHandle;

use crate::types::{GameStatus, Player};

/// Handle to a scheduled turn timeout. Aborted on drop.
#[derive(Debug)]
pub struct TurnTimer {
    turn: u64,
    task: JoinHandle<()>,
}

impl TurnTimer {
    pub fn turn(&self) -> u64 {
        self.turn
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Outcome of removing a player from the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub was_current: bool,
    pub remaining: usize,
}

/// Point-in-time copy of a session, for inspection outside the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub code: String,
    pub players: Vec<Player>,
    pub status: GameStatus,
    pub current_player: usize,
    pub current_question: Option<usize>,
    pub pending_turn: Option<u64>,
}

/// One game instance, keyed by its short code.
#[derive(Debug)]
pub struct Session {
    code: String,
    players: Vec<Player>,
    current_player: usize,
    /// `None` until the first question is served.
    current_question: Option<usize>,
    status: GameStatus,
    timer: Option<TurnTimer>,
    turns_armed: u64,
}

impl Session {
    pub fn new(code: String, host: Player) -> Self {
        Self {
            code,
            players: vec![host],
            current_player: 0,
            current_question: None,
            status: GameStatus::Waiting,
            timer: None,
            turns_armed: 0,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            code: self.code.clone(),
            players: self.players.clone(),
            status: self.status,
            current_player: self.current_player,
            current_question: self.current_question,
            pending_turn: self.pending_turn(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn set_status(&mut self, status: GameStatus) {
        self.status = status;
    }

    pub fn current_player_index(&self) -> usize {
        self.current_player
    }

    pub fn current_question(&self) -> Option<usize> {
        self.current_question
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player)
    }

    pub fn is_current(&self, connection_id: &str) -> bool {
        self.current_player().is_some_and(|p| p.id == connection_id)
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.push(player);
    }

    /// Removes a player and keeps the turn pointer on a live slot.
    ///
    /// When the current player leaves, the pointer is moved back one slot so
    /// that the next rotation lands on the player who followed them.
    pub fn remove_player(&mut self, connection_id: &str) -> Option<Removal> {
        let index = self.players.iter().position(|p| p.id == connection_id)?;
        let was_current = index == self.current_player;
        self.players.remove(index);

        let remaining = self.players.len();
        if self.current_question.is_none() {
            // Nothing served yet: the first turn always goes to the front of the roster.
            self.current_player = 0;
        } else if remaining > 0 {
            if index < self.current_player {
                self.current_player -= 1;
            } else if was_current {
                self.current_player = (index + remaining - 1) % remaining;
            }
        }

        Some(Removal {
            was_current,
            remaining,
        })
    }

    /// Moves to the next player and question. The first call of a game keeps
    /// the host on turn and serves question 0.
    pub fn rotate(&mut self) -> usize {
        let next_question = match self.current_question {
            Some(q) => {
                if !self.players.is_empty() {
                    self.current_player = (self.current_player + 1) % self.players.len();
                }
                q + 1
            }
            None => 0,
        };
        self.current_question = Some(next_question);
        next_question
    }

    pub fn award_current_player(&mut self) {
        if let Some(player) = self.players.get_mut(self.current_player) {
            player.score += 1;
        }
    }

    pub fn pending_turn(&self) -> Option<u64> {
        self.timer.as_ref().map(TurnTimer::turn)
    }

    /// Cancels the pending timer. A no-op when none is pending.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
        }
    }

    /// Cancels any pending timer, then stores the one produced by `schedule`.
    pub fn arm_timer(&mut self, schedule: impl FnOnce(u64) -> JoinHandle<()>) -> u64 {
        self.cancel_timer();
        self.turns_armed += 1;
        let turn = self.turns_armed;
        self.timer = Some(TurnTimer {
            turn,
            task: schedule(turn),
        });
        turn
    }
}
