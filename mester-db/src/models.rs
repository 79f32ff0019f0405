use arrayvec::ArrayString;

use crate::codec::PlayerId;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// An unordered pair of distinct players, held in canonical order.
///
/// The lower identifier (by compact encoding) always comes first, so each
/// friendship maps to exactly one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FriendPair {
  lower: PlayerId,
  higher: PlayerId,
}

impl FriendPair {
  /// Normalize `(a, b)` into canonical order. Returns `None` for a self-pair.
  pub fn new(a: PlayerId, b: PlayerId) -> Option<Self> {
    if a == b {
      return None;
    }
    let (lower, higher) = if a.compact() < b.compact() { (a, b) } else { (b, a) };
    Some(Self { lower, higher })
  }

  pub fn lower(&self) -> PlayerId {
    self.lower
  }

  pub fn higher(&self) -> PlayerId {
    self.higher
  }

  /// The member of the pair that is not `player`, if `player` is a member.
  pub fn peer_of(&self, player: PlayerId) -> Option<PlayerId> {
    if player == self.lower {
      Some(self.higher)
    } else if player == self.higher {
      Some(self.lower)
    } else {
      None
    }
  }
}

/// A stored friendship row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friendship {
  pub pair: FriendPair,
  /// Milliseconds since the Unix epoch when the friendship was made or last refreshed
  pub established_at: i64,
}

/// One friend of a player, as seen from that player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendEntry {
  pub peer: PlayerId,
  pub established_at: i64,
}
