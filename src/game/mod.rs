//! Connect Four rules engine.
//!
//! The session layer only touches the engine through [`Connect4::play`],
//! [`Connect4::winner`] and the recorded move log. Everything about turn
//! order, board geometry and win detection lives here.

pub mod connect4;

pub use connect4::{COLUMNS, Connect4, GameError, Move, Player, ROWS};
