//! JSON-lines output protocol.
//!
//! Every line written to stdout is one [`Response`], tagged by `type`.
//! Consumers (CI scripts, replay diffing) read the stream line by line.

use std::io::{self, Write};

use rts_ai::command::AiCommand;
use rts_ai::state::Strategy;
use serde::{Deserialize, Serialize};

// ============================================================================
// Output Responses (Runner -> Consumer)
// ============================================================================

/// Messages emitted by the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Run is starting.
    Ready {
        /// Crate version.
        version: String,
        /// Scenario name.
        scenario: String,
        /// Base seed.
        seed: u64,
        /// Tick of the first snapshot.
        tick: u64,
    },

    /// Commands one faction issued on one tick. Empty batches are not sent.
    Commands {
        /// Tick.
        tick: u64,
        /// Issuing faction.
        faction: u8,
        /// Commands in issue order.
        commands: Vec<AiCommand>,
    },

    /// A faction switched macro strategy.
    Strategy {
        /// Tick of the switch.
        tick: u64,
        /// Faction.
        faction: u8,
        /// Previous strategy.
        from: Strategy,
        /// New strategy.
        to: Strategy,
        /// Desperation score at the switch.
        desperation: u8,
    },

    /// Running hash of everything issued so far.
    StateHash {
        /// Tick.
        tick: u64,
        /// Hash value.
        hash: u64,
    },

    /// Run finished.
    Summary {
        /// Ticks simulated.
        ticks: u64,
        /// Commands issued across all factions.
        commands: u64,
        /// Final command-stream hash.
        hash: u64,
    },

    /// Something went wrong.
    Error {
        /// Error message.
        message: String,
    },
}

impl Response {
    /// Serialize to one line of JSON, without the trailing newline.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Write `response` as a single JSON line.
pub fn write_line<W: Write>(out: &mut W, response: &Response) -> io::Result<()> {
    let line = response.to_json().map_err(io::Error::other)?;
    writeln!(out, "{line}")
}
