//! Encore terminal player
//!
//! Plays local files or server track lists through the desktop audio backend
//! with keyboard control on stdin.

pub mod command;
pub mod config;
pub mod display;
pub mod error;
pub mod player;
pub mod source;

pub use config::AppConfig;
pub use error::{CliError, Result};
