/// Input validation for names and identifiers arriving from sessions and commands
use mester_db::{IdError, PlayerId, PlayerName};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max 16 characters, got {0})")]
    PlayerNameTooLong(usize),

    #[error("Player name contains invalid characters (only alphanumeric and underscore allowed)")]
    PlayerNameInvalidChars,
}

/// Validates a Minecraft player name and converts it to its inline form
///
/// Rules:
/// - Cannot be empty
/// - Max 16 characters (Minecraft username limit)
/// - Only ASCII alphanumeric characters and underscores
pub fn parse_player_name(name: &str) -> Result<PlayerName, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    let chars = name.chars().count();
    if chars > 16 {
        return Err(ValidationError::PlayerNameTooLong(chars));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::PlayerNameInvalidChars);
    }

    // ASCII only, so 16 chars always fit in 16 bytes
    PlayerName::from(name).map_err(|_| ValidationError::PlayerNameTooLong(chars))
}

/// Parses a player identifier typed by a user or sent by the proxy
///
/// Accepts the 32-character compact form or the hyphenated UUID form.
pub fn parse_player_id(raw: &str) -> Result<PlayerId, IdError> {
    raw.trim().parse()
}
