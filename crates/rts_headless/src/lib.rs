//! Headless scenario runner for AI testing and CI verification.
//!
//! Loads a scenario (RON), drives every AI faction tick by tick through
//! [`rts_ai::engine::AiDirector`] and streams the issued commands as JSON
//! lines. This enables:
//!
//! - **AI inspection**: see exactly what each faction decided and when
//! - **CI verification**: the same scenario and seed must always produce the
//!   same command stream
//! - **Seed sweeps**: run many seeds in parallel and compare outcomes
//!
//! # Protocol
//!
//! - **stdout**: one JSON [`protocol::Response`] per line
//! - **stderr**: logs (human-readable, filtered by `RUST_LOG`)
//!
//! # Example
//!
//! ```bash
//! # Run the built-in raid scenario for 2000 ticks
//! cargo run -p rts_headless -- run --scenario raid --ticks 2000
//!
//! # Check that five runs of one seed agree
//! cargo run -p rts_headless -- verify --scenario scenarios/skirmish.ron --runs 5
//!
//! # Sweep 100 seeds
//! cargo run -p rts_headless -- batch --count 100 --output results/batch.json
//! ```

pub mod batch;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use protocol::{write_line, Response};
pub use runner::{run_scenario, FactionSummary, RunSummary, ScenarioRunner};
pub use scenario::{EventAction, Scenario, ScenarioError, ScriptedEvent};
