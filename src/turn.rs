//! Turn rotation, the per-turn timeout, answer scoring and end of game.
//!
//! Every turn arms exactly one timer. Arming, answering and deleting a game
//! all cancel the pending timer first, and an expiry is only honoured when its
//! turn number still matches the session's pending timer, so a timeout that
//! was queued just before an answer cannot advance the game a second time.

use crate::error::GameError;
use crate::game::{Game, GameCommand};
use crate::types::{GameStatus, QuestionUpdate, QuestionView, ServerMsg};

impl Game {
    /// Moves the session to its next player and question, or ends the game
    /// once the questions run out.
    pub(crate) fn advance_turn(&mut self, code: &str) {
        let Some(session) = self.registry.get_mut(code) else {
            return;
        };
        session.cancel_timer();

        let question_index = session.rotate();
        let Some(question) = self.questions.get(question_index) else {
            self.end_game(code);
            return;
        };
        let Some(current_player) = session.current_player().cloned() else {
            return;
        };

        let budget = self.settings.turn_duration;
        self.hub.broadcast(
            code,
            ServerMsg::QuestionUpdate(QuestionUpdate {
                question: QuestionView::from(question),
                current_player,
                time_left: budget.as_secs(),
            }),
        );

        let timer_tx = self.timer_tx.clone();
        let timer_code = code.to_string();
        let turn = session.arm_timer(move |turn| {
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                if let Some(tx) = timer_tx.upgrade() {
                    let _ = tx
                        .send(GameCommand::TurnExpired {
                            code: timer_code,
                            turn,
                        })
                        .await;
                }
            })
        });
        tracing::debug!("Game {} turn {} on question {}", code, turn, question_index);
    }

    fn end_game(&mut self, code: &str) {
        if let Some(session) = self.registry.get_mut(code) {
            session.set_status(GameStatus::Finished);
            session.cancel_timer();
        }
        self.hub.broadcast(code, ServerMsg::GameState(GameStatus::Finished));
        self.registry.delete(code);
        self.hub.close_room(code);
        tracing::info!("Game {} finished", code);
    }

    /// Scores an answer from the current player and moves on. Anything else
    /// is rejected without touching the session.
    pub(crate) fn submit_answer(&mut self, connection_id: &str, answer_index: usize) -> Result<(), GameError> {
        let code = self
            .registry
            .find_by_player(connection_id)
            .ok_or(GameError::NotInGame)?
            .to_string();
        let session = self.registry.get_mut(&code).ok_or(GameError::NotInGame)?;
        if session.status() != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        if !session.is_current(connection_id) {
            return Err(GameError::NotYourTurn);
        }

        session.cancel_timer();
        let correct = session
            .current_question()
            .and_then(|index| self.questions.get(index))
            .is_some_and(|q| q.correct_answer == answer_index);
        if correct {
            session.award_current_player();
        }

        self.broadcast_players(&code);
        self.advance_turn(&code);
        Ok(())
    }

    pub(crate) fn on_turn_expired(&mut self, code: &str, turn: u64) -> Result<(), GameError> {
        let session = self.registry.get(code).ok_or(GameError::StaleTimer)?;
        if session.status() != GameStatus::Playing || session.pending_turn() != Some(turn) {
            return Err(GameError::StaleTimer);
        }

        tracing::info!("Game {} turn {} timed out", code, turn);
        self.advance_turn(code);
        Ok(())
    }
}
