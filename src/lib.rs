//! Turn-based multiplayer trivia over WebSockets.
//!
//! Players create or join a game by its short code, then take turns answering
//! questions against a per-turn timer. A single coordinator task owns every
//! game; connections talk to it through a [`game::GameHandle`] and receive
//! room broadcasts through the [`hub::Hub`].

pub mod config;
pub mod error;
pub mod game;
pub mod hub;
pub mod questions;
pub mod registry;
pub mod session;
pub mod turn;
pub mod types;
