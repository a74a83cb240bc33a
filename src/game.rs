use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::GameSettings;
use crate::error::GameError;
use crate::hub::Hub;
use crate::questions::QuestionBank;
use crate::registry::Registry;
use crate::session::{Session, SessionSnapshot};
use crate::types::*;

const COMMAND_CHANNEL_BUFFER: usize = 256;

/// Commands processed, one at a time, by the game coordinator task.
#[derive(Debug)]
pub enum GameCommand {
    Client {
        connection_id: String,
        msg: ClientMsg,
    },
    Disconnect {
        connection_id: String,
    },
    TurnExpired {
        code: String,
        turn: u64,
    },
    Snapshot {
        code: String,
        respond_to: oneshot::Sender<Option<SessionSnapshot>>,
    },
}

/// Cloneable handle used by WebSocket connections to reach the coordinator.
#[derive(Clone)]
pub struct GameHandle {
    cmd_tx: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    pub async fn client_event(&self, connection_id: &str, msg: ClientMsg) {
        let _ = self
            .cmd_tx
            .send(GameCommand::Client {
                connection_id: connection_id.to_string(),
                msg,
            })
            .await;
    }

    pub async fn disconnect(&self, connection_id: &str) {
        let _ = self
            .cmd_tx
            .send(GameCommand::Disconnect {
                connection_id: connection_id.to_string(),
            })
            .await;
    }

    /// Current state of the session with `code`, or `None` if it does not exist.
    pub async fn snapshot(&self, code: &str) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(GameCommand::Snapshot {
                code: code.to_string(),
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }
}

/// Owns every session and routes client events to them.
///
/// All mutation happens inside [`Game::handle`], called from a single task, so
/// session state needs no locking. Turn timers post [`GameCommand::TurnExpired`]
/// back onto the same mailbox.
pub struct Game {
    pub(crate) registry: Registry,
    pub(crate) questions: QuestionBank,
    pub(crate) hub: Arc<Hub>,
    pub(crate) settings: GameSettings,
    pub(crate) timer_tx: mpsc::WeakSender<GameCommand>,
}

/// Spawn the coordinator task. Returns its handle and join handle.
pub fn spawn(questions: QuestionBank, hub: Arc<Hub>, settings: GameSettings) -> (GameHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
    let game = Game::new(questions, hub, settings, cmd_tx.downgrade());
    let task = tokio::spawn(game_task(game, cmd_rx));
    (GameHandle { cmd_tx }, task)
}

async fn game_task(mut game: Game, mut cmd_rx: mpsc::Receiver<GameCommand>) {
    while let Some(cmd) = cmd_rx.recv().await {
        game.handle(cmd);
    }
    tracing::info!("Game coordinator stopped with {} live games", game.registry.len());
}

impl Game {
    pub fn new(
        questions: QuestionBank,
        hub: Arc<Hub>,
        settings: GameSettings,
        timer_tx: mpsc::WeakSender<GameCommand>,
    ) -> Self {
        Self {
            registry: Registry::new(),
            questions,
            hub,
            settings,
            timer_tx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn handle(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Client { connection_id, msg } => {
                let result = match msg {
                    ClientMsg::CreateGame(name) => self.handle_create(&connection_id, name),
                    ClientMsg::JoinGame(req) => self.handle_join(&connection_id, req),
                    ClientMsg::StartGame => self.handle_start(&connection_id),
                    ClientMsg::Answer(index) => self.submit_answer(&connection_id, index),
                    ClientMsg::LeaveGame => self.handle_leave(&connection_id),
                };
                if let Err(err) = result {
                    self.reject(&connection_id, err);
                }
            }
            GameCommand::Disconnect { connection_id } => {
                if let Err(err) = self.handle_leave(&connection_id) {
                    tracing::debug!("Disconnect of {} needed no cleanup: {}", connection_id, err);
                }
            }
            GameCommand::TurnExpired { code, turn } => {
                if let Err(err) = self.on_turn_expired(&code, turn) {
                    tracing::debug!("Ignoring timer for game {} turn {}: {}", code, turn, err);
                }
            }
            GameCommand::Snapshot { code, respond_to } => {
                let _ = respond_to.send(self.registry.get(&code).map(Session::snapshot));
            }
        }
    }

    fn reject(&self, connection_id: &str, err: GameError) {
        if err.is_user_visible() {
            self.hub.send_to(connection_id, ServerMsg::Error(err.to_string()));
        } else {
            tracing::debug!("Ignoring event from {}: {}", connection_id, err);
        }
    }

    fn validate_name(&self, name: String) -> Result<String, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::EmptyName);
        }
        if name.chars().count() > self.settings.max_name_len {
            return Err(GameError::NameTooLong(self.settings.max_name_len));
        }
        Ok(name.to_string())
    }

    /// Sends the waiting-room view: code to the sender, state and roster to the room.
    fn announce_lobby(&self, connection_id: &str, code: &str) {
        self.hub.send_to(connection_id, ServerMsg::GameCode(code.to_string()));
        self.hub.broadcast(code, ServerMsg::GameState(GameStatus::Waiting));
        self.broadcast_players(code);
    }

    pub(crate) fn broadcast_players(&self, code: &str) {
        if let Some(session) = self.registry.get(code) {
            self.hub
                .broadcast(code, ServerMsg::PlayerList(session.players().to_vec()));
        }
    }

    fn handle_create(&mut self, connection_id: &str, name: String) -> Result<(), GameError> {
        let name = self.validate_name(name)?;

        // Leaving frees a slot only when it empties the sender's current game.
        let frees_slot = self
            .registry
            .find_by_player(connection_id)
            .and_then(|code| self.registry.get(code))
            .is_some_and(|session| session.players().len() == 1);
        if self.registry.len() >= self.settings.max_sessions && !frees_slot {
            return Err(GameError::TooManyGames);
        }

        let _ = self.handle_leave(connection_id);

        let code = self.registry.create(Player::new(connection_id, name));
        self.hub.subscribe(&code, connection_id);
        self.announce_lobby(connection_id, &code);

        tracing::info!("Game created: {} by {}", code, connection_id);
        Ok(())
    }

    fn handle_join(&mut self, connection_id: &str, req: JoinRequest) -> Result<(), GameError> {
        let name = self.validate_name(req.player_name)?;
        let code = req.game_code.trim().to_string();

        let session = self.registry.get(&code).ok_or(GameError::NotJoinable)?;
        if session.status() != GameStatus::Waiting {
            return Err(GameError::NotJoinable);
        }
        if self.registry.find_by_player(connection_id) == Some(code.as_str()) {
            self.announce_lobby(connection_id, &code);
            return Ok(());
        }
        if session.players().len() >= self.settings.max_players {
            return Err(GameError::GameFull);
        }

        let _ = self.handle_leave(connection_id);
        self.registry.add_player(&code, Player::new(connection_id, name));
        self.hub.subscribe(&code, connection_id);
        self.announce_lobby(connection_id, &code);

        tracing::info!("Player {} joined game {}", connection_id, code);
        Ok(())
    }

    fn handle_start(&mut self, connection_id: &str) -> Result<(), GameError> {
        let code = self
            .registry
            .find_by_player(connection_id)
            .ok_or(GameError::NotInGame)?
            .to_string();
        let session = self.registry.get_mut(&code).ok_or(GameError::NotInGame)?;
        if session.status() != GameStatus::Waiting {
            return Err(GameError::NotWaiting);
        }

        session.set_status(GameStatus::Playing);
        self.hub.broadcast(&code, ServerMsg::GameState(GameStatus::Playing));
        tracing::info!("Game {} started with {} players", code, session.players().len());

        self.advance_turn(&code);
        Ok(())
    }

    /// Shared by `leaveGame` and connection drop.
    fn handle_leave(&mut self, connection_id: &str) -> Result<(), GameError> {
        let (code, removal) = self
            .registry
            .remove_player(connection_id)
            .ok_or(GameError::NotInGame)?;
        self.hub.unsubscribe(&code, connection_id);

        if removal.remaining == 0 {
            self.hub.close_room(&code);
            return Ok(());
        }

        self.broadcast_players(&code);
        let playing = self
            .registry
            .get(&code)
            .is_some_and(|s| s.status() == GameStatus::Playing);
        if playing && removal.was_current {
            self.advance_turn(&code);
        }

        tracing::info!("Player {} left game {}", connection_id, code);
        Ok(())
    }
}
