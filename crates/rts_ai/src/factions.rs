//! Faction identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one side in a match.
///
/// Resources and other unowned entities carry no faction at all
/// (`Option<FactionId>::None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(pub u8);

impl FactionId {
    /// Create a new faction id.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction-{}", self.0)
    }
}
