//! Rejections produced while routing client events.
//!
//! Only some of these reach the client as an `error` event. The rest are
//! stale or out-of-turn messages and are dropped after a debug log.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Game not found or already started")]
    NotJoinable,

    #[error("Game is full")]
    GameFull,

    #[error("Too many active games")]
    TooManyGames,

    #[error("Player name cannot be empty")]
    EmptyName,

    #[error("Player name cannot exceed {0} characters")]
    NameTooLong(usize),

    #[error("connection is not in a game")]
    NotInGame,

    #[error("game is not waiting for players")]
    NotWaiting,

    #[error("game is not in progress")]
    NotPlaying,

    #[error("not this connection's turn")]
    NotYourTurn,

    #[error("stale turn timer")]
    StaleTimer,
}

impl GameError {
    /// Whether the sender should be told about this rejection.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::NotJoinable | Self::GameFull | Self::TooManyGames | Self::EmptyName | Self::NameTooLong(_)
        )
    }
}
