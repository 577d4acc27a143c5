//! Worker management: danger tracking, safety, fleet coordination and stuck
//! recovery.
//!
//! Runs every tick regardless of strategy. Conscripted workers are skipped by
//! every pass, and a worker that flees this tick is left alone by the fleet
//! and stuck passes so it does not receive conflicting orders.

pub mod danger;
pub mod fleet;
pub mod safety;
pub mod stuck;

use crate::command::AiCommand;
use crate::config::RiskBand;
use crate::context::AiContext;
use crate::state::AiState;

pub use danger::{refresh_danger_map, track_worker_losses, zone_of};
pub use fleet::{assign_role, coordinate_fleet, get_role_max_danger};
pub use safety::{evaluate_worker_safety, SafetyOutcome, WorkerThreat};
pub use stuck::{break_depot_deadlocks, level_for_duration, resolve_stuck, StuckLevel};

/// Every worker order for this tick.
pub fn manage_harvesters(ctx: &AiContext<'_>, state: &mut AiState, band: RiskBand) -> Vec<AiCommand> {
    refresh_danger_map(ctx, state);

    let SafetyOutcome { mut commands, fled } = evaluate_worker_safety(ctx, state, band);

    let mut busy = fled;
    let fleet_orders = coordinate_fleet(ctx, state, band, &busy);
    busy.extend(fleet_orders.iter().flat_map(|c| c.unit_ids().iter().copied()));
    commands.extend(fleet_orders);

    let stuck_orders = resolve_stuck(ctx, state, &busy);
    busy.extend(stuck_orders.iter().flat_map(|c| c.unit_ids().iter().copied()));
    commands.extend(stuck_orders);

    commands.extend(break_depot_deadlocks(ctx, state, &busy));
    commands
}
