//! Player identifier and its fixed-width storage encoding.
//!
//! Every column that holds an identifier stores the 32 lowercase hex digits
//! of the UUID with the separators removed. Lowercase keeps string order
//! identical to byte order, which the friendship table relies on.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio_rusqlite::rusqlite::types::{
  FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef,
};
use uuid::Uuid;

/// Length of the compact form.
pub const COMPACT_LEN: usize = 32;

/// Hex group widths of the canonical UUID layout.
const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
  #[error("identifier must be exactly {COMPACT_LEN} characters, got {0}")]
  BadLength(usize),

  #[error("identifier is not hex-groupable: {0:?}")]
  NotHex(String),
}

/// 128-bit player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(Uuid);

impl PlayerId {
  pub const fn from_uuid(uuid: Uuid) -> Self {
    Self(uuid)
  }

  pub const fn from_u128(value: u128) -> Self {
    Self(Uuid::from_u128(value))
  }

  pub const fn as_uuid(&self) -> &Uuid {
    &self.0
  }

  /// Fixed-width storage form: 32 lowercase hex digits, no separators.
  pub fn compact(&self) -> String {
    self.0.simple().to_string()
  }

  /// Inverse of [`PlayerId::compact`].
  ///
  /// Accepts upper- or lowercase hex. Anything that is not exactly 32 hex
  /// digits is rejected.
  pub fn expand(s: &str) -> Result<Self, IdError> {
    if s.len() != COMPACT_LEN {
      return Err(IdError::BadLength(s.len()));
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(IdError::NotHex(s.to_string()));
    }

    let mut grouped = String::with_capacity(COMPACT_LEN + GROUPS.len() - 1);
    let mut start = 0;
    for (i, width) in GROUPS.iter().enumerate() {
      if i > 0 {
        grouped.push('-');
      }
      grouped.push_str(&s[start..start + width]);
      start += width;
    }

    Uuid::parse_str(&grouped)
      .map(Self)
      .map_err(|_| IdError::NotHex(s.to_string()))
  }
}

impl From<Uuid> for PlayerId {
  fn from(uuid: Uuid) -> Self {
    Self(uuid)
  }
}

impl fmt::Display for PlayerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.hyphenated())
  }
}

impl FromStr for PlayerId {
  type Err = IdError;

  /// Parses either the compact or the hyphenated form.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.len() == COMPACT_LEN {
      return Self::expand(s);
    }
    let stripped: String = s.chars().filter(|c| *c != '-').collect();
    if stripped.len() != COMPACT_LEN || s.len() != COMPACT_LEN + GROUPS.len() - 1 {
      return Err(IdError::BadLength(s.len()));
    }
    let parsed = Self::expand(&stripped)?;
    // Reject hyphens in the wrong places.
    if parsed.to_string() != s.to_ascii_lowercase() {
      return Err(IdError::NotHex(s.to_string()));
    }
    Ok(parsed)
  }
}

impl ToSql for PlayerId {
  fn to_sql(&self) -> tokio_rusqlite::rusqlite::Result<ToSqlOutput<'_>> {
    Ok(ToSqlOutput::from(self.compact()))
  }
}

impl FromSql for PlayerId {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    let s = value.as_str()?;
    Self::expand(s).map_err(|e| FromSqlError::Other(Box::new(e)))
  }
}
