//! # Siege AI
//!
//! Rule-based opponent for single-player matches.
//!
//! The agent is deliberately not a planner: every think pass re-derives
//! the dominant need (defend, grow the economy, raise an army, attack)
//! from the current world snapshot and emits ordinary [`Command`]s. Those
//! commands run through exactly the same validation as a human player's,
//! so the AI can never do anything a player could not — a rejected
//! command simply gets re-planned on the next pass.
//!
//! [`Command`]: siege_core::command::Command

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod difficulty;
pub mod opponent;

pub use difficulty::{Difficulty, DifficultyProfile};
pub use opponent::AiOpponent;
