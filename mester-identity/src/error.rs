use mester_db::{DbError, IdError};
use thiserror::Error;

use crate::validation::ValidationError;

/// Identity service error type
#[derive(Debug, Error)]
pub enum IdentityError {
  #[error(transparent)]
  Database(#[from] DbError),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Identifier(#[from] IdError),
}

impl IdentityError {
  /// Neutral text for players. Details stay in the logs.
  pub fn user_message(&self) -> &'static str {
    match self {
      IdentityError::Database(db_err) => {
        // Log the detailed error server-side
        tracing::error!(?db_err, "Database error occurred");
        match db_err {
          DbError::SelfFriendship => "You cannot add yourself as a friend.",
          DbError::InvalidName(_) => "That player could not be found.",
          DbError::Sqlite(_) | DbError::Connection(_) | DbError::Timeout(_) => {
            "An internal error occurred. Please try again later."
          }
        }
      }
      IdentityError::Config(msg) => {
        tracing::error!(config_error = %msg, "Configuration error");
        "An internal error occurred. Please try again later."
      }
      IdentityError::Validation(err) => {
        tracing::warn!(validation_error = %err, "Validation failed");
        "That is not a valid player name."
      }
      IdentityError::Identifier(err) => {
        tracing::warn!(identifier_error = %err, "Identifier rejected");
        "That is not a valid player identifier."
      }
    }
  }
}
