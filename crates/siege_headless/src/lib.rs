//! Headless match runner.
//!
//! Drives full matches without a renderer: AI-vs-AI skirmishes for balance work,
//! determinism verification for CI, and the host/join sides of a networked
//! match with the local seat on AI. Logging goes to stderr; the binary's
//! stdout carries only the final outcome line.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod game_loop;

pub use config::{ConfigError, MatchConfig};
pub use game_loop::{
    run_host, run_join, run_skirmish, verify_determinism, GameLoopError, MatchOutcome,
};
