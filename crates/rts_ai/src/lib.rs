//! # RTS AI
//!
//! Deterministic opponent decision engine for Post-Scarcity RTS.
//!
//! Each tick, the host hands the engine an immutable [`world::WorldSnapshot`]
//! and gets back a list of [`command::AiCommand`] intents per AI faction. The
//! engine never mutates the world; the host's reducer validates and applies
//! the commands.
//!
//! This crate contains **only** deterministic logic:
//! - No IO on the decision path
//! - No ambient randomness (a seeded ChaCha stream per invocation)
//! - No floating-point math (uses fixed-point)
//! - Ordered maps everywhere iteration order is observable
//!
//! ## Crate Structure
//!
//! - [`engine`] - Per-tick orchestration and the multi-faction [`engine::AiDirector`]
//! - [`state`] - Per-faction persistent memory and the state table
//! - [`threat`], [`strategy`], [`economy`], [`desperation`] - Macro decisions
//! - [`combat`], [`defense`] - Group tactics and target scoring
//! - [`harvester`] - Worker safety, fleet coordination and stuck recovery
//! - [`placement`], [`sell`] - Building sites and liquidation
//! - [`world`], [`rules`], [`config`], [`spatial`] - Inputs and tunables
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod command;
pub mod config;
pub mod context;
pub mod defense;
pub mod desperation;
pub mod economy;
pub mod engine;
pub mod error;
pub mod factions;
pub mod harvester;
pub mod intel;
pub mod math;
pub mod placement;
pub mod rules;
pub mod sell;
pub mod spatial;
pub mod state;
pub mod strategy;
pub mod threat;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::command::{AiCommand, MoveMode};
    pub use crate::config::{AiConfig, Difficulty, DifficultyProfile};
    pub use crate::engine::{compute_ai_actions, AiDirector};
    pub use crate::error::{AiError, Result};
    pub use crate::factions::FactionId;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::rules::{BuildingRole, ProductionCategory, RulesTable};
    pub use crate::spatial::{SpatialGrid, SpatialQuery};
    pub use crate::state::{AiState, AiStateTable, Strategy};
    pub use crate::world::{Entity, EntityId, FactionEconomy, MapBounds, WorldSnapshot};
}
