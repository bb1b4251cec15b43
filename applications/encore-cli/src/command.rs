//! Interactive commands typed on stdin while playing

use crate::error::{CliError, Result};
use std::time::Duration;

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePlay,
    Next,
    Previous,
    Seek(Duration),
    SeekFraction(f64),
    Volume(f32),
    Mute,
    Like,
    ListPlaylists,
    AddToPlaylist(String),
    Retry,
    Help,
    Quit,
}

pub const HELP: &str = "\
p          play / pause
n          next track
b          previous track
s <secs>   seek to position
f <0..1>   seek to fraction of the track
v <0..1>   set volume
m          mute / unmute
l          like / unlike
a          list your playlists
a <id>     add the current song to a playlist
r          retry a failed track
h          this help
q          quit";

impl Command {
    /// Parse a line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();

        let mut chars = word.chars();
        let (Some(key), None) = (chars.next(), chars.next()) else {
            return Err(CliError::UnknownCommand(word.to_string()));
        };

        let command = match key {
            'p' => Self::TogglePlay,
            'n' => Self::Next,
            'b' => Self::Previous,
            's' => {
                let secs: f64 = number(key, arg)?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(invalid(key, "expected a non-negative number of seconds"));
                }
                Self::Seek(Duration::from_secs_f64(secs))
            }
            'f' => Self::SeekFraction(unit(key, arg)?),
            'v' => Self::Volume(unit(key, arg)? as f32),
            'm' => Self::Mute,
            'l' => Self::Like,
            'a' => match arg {
                Some(id) => Self::AddToPlaylist(id.to_string()),
                None => Self::ListPlaylists,
            },
            'r' => Self::Retry,
            'h' | '?' => Self::Help,
            'q' => Self::Quit,
            _ => return Err(CliError::UnknownCommand(word.to_string())),
        };
        Ok(Some(command))
    }
}

fn invalid(command: char, reason: &str) -> CliError {
    CliError::InvalidArgument {
        command,
        reason: reason.to_string(),
    }
}

fn number(command: char, arg: Option<&str>) -> Result<f64> {
    let arg = arg.ok_or_else(|| invalid(command, "missing value"))?;
    arg.parse()
        .map_err(|_| invalid(command, &format!("'{}' is not a number", arg)))
}

fn unit(command: char, arg: Option<&str>) -> Result<f64> {
    let value = number(command, arg)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(invalid(command, "expected a value between 0 and 1"))
    }
}
