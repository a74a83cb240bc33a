use serde::{Deserialize, Serialize};

/// A player in a game session. The id is the owning connection's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: u32,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
        }
    }
}

/// A single trivia question as stored in `questions.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    pub answers: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: usize,
}

/// The part of a question that is safe to show to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub text: String,
    pub answers: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            text: q.text.clone(),
            answers: q.answers.clone(),
        }
    }
}

/// Payload of the `questionUpdate` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionUpdate {
    pub question: QuestionView,
    pub current_player: Player,
    pub time_left: u64,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Messages sent from server to clients via WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    GameCode(String),
    GameState(GameStatus),
    PlayerList(Vec<Player>),
    QuestionUpdate(QuestionUpdate),
    Error(String),
}

/// Payload of the `joinGame` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub game_code: String,
    pub player_name: String,
}

/// Messages sent from clients to server via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    CreateGame(String),
    JoinGame(JoinRequest),
    StartGame,
    Answer(usize),
    LeaveGame,
}
