use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::questions::QuestionBank;
use crate::types::Question;

/// Errors raised while reading startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("question {index} has correctAnswer {correct} but only {answers} answers")]
    BadQuestion {
        index: usize,
        correct: usize,
        answers: usize,
    },
}

/// Limits applied by the game coordinator.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub turn_duration: Duration,
    pub max_sessions: usize,
    pub max_players: usize,
    pub max_name_len: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            turn_duration: Duration::from_secs(10),
            max_sessions: 1000,
            max_players: 16,
            max_name_len: 20,
        }
    }
}

/// Process-level configuration read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub config_path: PathBuf,
    pub static_dir: PathBuf,
    pub cors_origin: Option<String>,
    pub game: GameSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = GameSettings::default();
        let game = GameSettings {
            turn_duration: Duration::from_secs(nonzero_env_or("TURN_SECONDS", defaults.turn_duration.as_secs())?),
            max_sessions: nonzero_env_or("MAX_SESSIONS", defaults.max_sessions)?,
            max_players: nonzero_env_or("MAX_PLAYERS", defaults.max_players)?,
            max_name_len: nonzero_env_or("MAX_NAME_LENGTH", defaults.max_name_len)?,
        };

        Ok(Self {
            port: env_or("PORT", 3001)?,
            config_path: std::env::var("CONFIG_PATH")
                .unwrap_or_else(|_| "config".to_string())
                .into(),
            static_dir: std::env::var("STATIC_DIR")
                .unwrap_or_else(|_| "static".to_string())
                .into(),
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty()),
            game,
        })
    }

    pub fn questions_path(&self) -> PathBuf {
        self.config_path.join("questions.json")
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::Io { path, source }
}

fn env_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    parse_var(name, std::env::var(name).ok(), default)
}

/// Like [`env_or`], but a zero budget or cap is rejected.
fn nonzero_env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + From<u8>,
{
    parse_nonzero(name, std::env::var(name).ok(), default)
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        None => Ok(default),
    }
}

fn parse_nonzero<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + From<u8>,
{
    let raw = value.clone();
    let parsed = parse_var(name, value, default)?;
    if parsed == T::from(0) {
        return Err(ConfigError::InvalidVar {
            name,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(parsed)
}

/// Initialize the config directory with an example question bank if missing.
pub fn init(config_path: &Path) -> Result<(), ConfigError> {
    if !config_path.exists() {
        fs::create_dir_all(config_path).map_err(io_err(config_path))?;
    }

    let questions_path = config_path.join("questions.json");
    if !questions_path.exists() {
        let example = serde_json::json!([
            {
                "question": "What is the capital of France?",
                "answers": ["Berlin", "Madrid", "Paris", "Rome"],
                "correctAnswer": 2
            },
            {
                "question": "How many legs does a spider have?",
                "answers": ["6", "8", "10", "12"],
                "correctAnswer": 1
            },
            {
                "question": "Which planet is known as the Red Planet?",
                "answers": ["Mars", "Venus", "Jupiter", "Mercury"],
                "correctAnswer": 0
            }
        ]);
        let body = serde_json::to_string_pretty(&example).map_err(|source| ConfigError::Parse {
            path: questions_path.clone(),
            source,
        })?;
        fs::write(&questions_path, body).map_err(io_err(&questions_path))?;
        tracing::info!("Wrote example question bank to {}", questions_path.display());
    }

    Ok(())
}

/// Load and validate the question bank.
pub fn load_questions(path: &Path) -> Result<QuestionBank, ConfigError> {
    let data = fs::read_to_string(path).map_err(io_err(path))?;
    parse_questions(path, &data)
}

fn parse_questions(path: &Path, data: &str) -> Result<QuestionBank, ConfigError> {
    let questions: Vec<Question> = serde_json::from_str(data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    for (index, q) in questions.iter().enumerate() {
        if q.correct_answer >= q.answers.len() {
            return Err(ConfigError::BadQuestion {
                index,
                correct: q.correct_answer,
                answers: q.answers.len(),
            });
        }
    }

    Ok(QuestionBank::new(questions))
}
