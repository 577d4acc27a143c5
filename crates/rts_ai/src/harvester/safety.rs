//! Per-tick worker safety.
//!
//! Each worker looks for the nearest threat inside its flee trigger, which is
//! scaled by the current risk band. A confirmed attacker always counts. Economic
//! pressure (low credits and a valuable load) lets a worker ignore threats that
//! are neither attacking it nor point-blank.

use std::collections::BTreeSet;

use tracing::debug;

use crate::command::{AiCommand, MoveMode};
use crate::config::RiskBand;
use crate::context::AiContext;
use crate::math::{units, Fixed, Vec2Fixed};
use crate::state::AiState;
use crate::world::{Entity, EntityId};

/// The threat a worker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerThreat {
    /// Where the threat is.
    pub position: Vec2Fixed,
    /// Distance from the worker.
    pub distance: Fixed,
    /// Whether the threat is the worker's own live, recent attacker.
    pub direct: bool,
}

/// Result of the safety pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyOutcome {
    /// Flee orders.
    pub commands: Vec<AiCommand>,
    /// Workers ordered to flee this tick.
    pub fled: BTreeSet<EntityId>,
}

/// Flee trigger distance under `band`.
#[must_use]
pub fn flee_trigger(ctx: &AiContext<'_>, band: RiskBand) -> Fixed {
    units(ctx.config.harvester.flee_trigger_distance) * units(band.flee_multiplier_pct) / units(100)
}

/// Nearest threat to `worker`, if any warrants attention.
#[must_use]
pub fn assess_threat(ctx: &AiContext<'_>, worker: &Entity, band: RiskBand) -> Option<WorkerThreat> {
    let cfg = &ctx.config.harvester;
    let now = ctx.tick();
    let unit = worker.unit.as_ref()?;
    let threat_at = |position: Vec2Fixed, direct: bool| WorkerThreat {
        position,
        distance: worker.position.distance(position),
        direct,
    };

    let attacker = unit
        .last_attacker
        .and_then(|id| ctx.snapshot.get_alive(id))
        .filter(|e| e.is_enemy_of(ctx.faction));
    if let Some(attacker) = attacker {
        // A stale damage record demotes the attacker to an ordinary threat.
        let stale = unit
            .last_damage_tick
            .is_some_and(|t| now.saturating_sub(t) > cfg.recent_damage_ticks);
        if !stale {
            return Some(threat_at(attacker.position, true));
        }
    }

    let trigger = flee_trigger(ctx, band);
    let mut candidates: Vec<WorkerThreat> = Vec::new();
    if let Some(attacker) = attacker {
        candidates.push(threat_at(attacker.position, false));
    }
    if let Some(hostile) = ctx
        .spatial
        .nearest(worker.position, Some(trigger), &|id| ctx.is_hostile_unit(id))
        .and_then(|id| ctx.snapshot.get(id))
    {
        candidates.push(threat_at(hostile.position, false));
    }

    let ally_radius = units(cfg.damaged_ally_radius);
    for ally_id in ctx.spatial.query_radius(worker.position, ally_radius) {
        if ally_id == worker.id {
            continue;
        }
        let Some(ally) = ctx.snapshot.get_alive(ally_id) else {
            continue;
        };
        if !ally.is_owned_by(ctx.faction) {
            continue;
        }
        let Some(ally_state) = ally.unit.as_ref() else {
            continue;
        };
        if !ally_state.damaged_recently(now, cfg.recent_damage_ticks) {
            continue;
        }
        let source = ally_state
            .last_attacker
            .and_then(|id| ctx.snapshot.get_alive(id))
            .filter(|e| e.is_enemy_of(ctx.faction))
            .map_or(ally.position, |e| e.position);
        candidates.push(threat_at(source, false));
    }

    candidates
        .into_iter()
        .filter(|t| t.distance <= trigger)
        .min_by_key(|t| (t.distance, t.position.x, t.position.y))
}

/// Whether economic pressure currently lets `worker` keep working.
#[must_use]
pub fn under_economic_pressure(ctx: &AiContext<'_>, worker: &Entity) -> bool {
    let cfg = &ctx.config.harvester;
    let cargo = worker.unit.as_ref().map_or(0, |u| u.cargo);
    ctx.economy.credits < cfg.pressure_credits && cargo >= cfg.pressure_cargo
}

/// Whether `worker` should run from `threat`.
#[must_use]
pub fn should_flee(ctx: &AiContext<'_>, worker: &Entity, threat: &WorkerThreat) -> bool {
    if threat.direct || threat.distance <= units(ctx.config.harvester.min_safe_distance) {
        return true;
    }
    !under_economic_pressure(ctx, worker)
}

/// Where a fleeing worker should go.
///
/// With several depots, fleeing workers rotate through the ones far enough
/// from the threat so they do not pile onto one point.
pub fn flee_destination(
    ctx: &AiContext<'_>,
    state: &mut AiState,
    worker: &Entity,
    threat: &WorkerThreat,
) -> Vec2Fixed {
    let cfg = &ctx.config.harvester;
    let depots: Vec<&Entity> = ctx.depots().collect();
    if depots.len() >= 2 {
        let safe_distance = units(cfg.safe_depot_distance);
        let safe: Vec<&Entity> = depots
            .into_iter()
            .filter(|d| !d.position.within(threat.position, safe_distance))
            .collect();
        if !safe.is_empty() {
            let pick = safe[state.harvester.flee_rotation % safe.len()];
            state.harvester.flee_rotation = state.harvester.flee_rotation.wrapping_add(1);
            return pick.position;
        }
    }

    let anchor = ctx.view.base_center.unwrap_or(worker.position);
    let fallback_dir = worker.position - threat.position;
    let target = anchor.away_from(threat.position, units(cfg.flee_distance), fallback_dir);
    ctx.snapshot.map.clamp(target)
}

/// Flee orders for every worker in danger.
pub fn evaluate_worker_safety(ctx: &AiContext<'_>, state: &mut AiState, band: RiskBand) -> SafetyOutcome {
    let mut outcome = SafetyOutcome::default();
    for worker in &ctx.view.harvesters {
        if state.harvester.conscripted.contains(&worker.id) {
            continue;
        }
        let Some(threat) = assess_threat(ctx, worker, band) else {
            continue;
        };
        if !should_flee(ctx, worker, &threat) {
            continue;
        }
        let destination = flee_destination(ctx, state, worker, &threat);
        debug!(
            faction = %ctx.faction,
            tick = ctx.tick(),
            worker = worker.id,
            direct = threat.direct,
            distance = %threat.distance,
            "worker fleeing"
        );
        outcome
            .commands
            .push(AiCommand::move_unit(worker.id, destination, MoveMode::Flee));
        outcome.fled.insert(worker.id);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::desperation::risk_band;
    use crate::factions::FactionId;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{FactionEconomy, MapBounds, UnitState, WorldSnapshot};

    const ME: FactionId = FactionId(1);
    const THEM: FactionId = FactionId(2);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world(credits: i32) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(1000, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(credits, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(500, 500), 1000, 0));
        snap
    }

    fn worker(cargo: i32, attacker: Option<EntityId>, damage: Option<u64>) -> Entity {
        Entity::new_unit(10, ME, "harvester", pos(1500, 1500), 500).with_unit_state(UnitState {
            cargo,
            last_attacker: attacker,
            last_damage_tick: damage,
            ..Default::default()
        })
    }

    fn run(snap: &WorldSnapshot, state: &mut AiState) -> SafetyOutcome {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        // Balanced band: trigger stays at the configured distance.
        let band = risk_band(&config.desperation, 40);
        evaluate_worker_safety(&ctx, state, band)
    }

    #[test]
    fn test_flees_from_nearby_hostile() {
        let mut snap = world(5000);
        snap.insert(worker(0, None, None));
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1700, 1500), 50));
        let out = run(&snap, &mut AiState::new());
        assert!(out.fled.contains(&10));
        assert!(out.commands[0].is_flee());
    }

    #[test]
    fn test_ignores_threat_beyond_trigger() {
        let mut snap = world(5000);
        snap.insert(worker(0, None, None));
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1900, 1500), 50));
        assert!(run(&snap, &mut AiState::new()).commands.is_empty());
    }

    #[test]
    fn test_pressure_suppresses_distant_threat() {
        let mut snap = world(100);
        snap.insert(worker(300, None, None));
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1700, 1500), 50));
        assert!(run(&snap, &mut AiState::new()).commands.is_empty());
    }

    #[test]
    fn test_pressure_never_suppresses_point_blank() {
        let mut snap = world(100);
        snap.insert(worker(300, None, None));
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1550, 1500), 50));
        assert!(run(&snap, &mut AiState::new()).fled.contains(&10));
    }

    #[test]
    fn test_pressure_never_suppresses_direct_attacker() {
        let mut snap = world(100);
        snap.insert(worker(300, Some(50), Some(990)));
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(2500, 1500), 50));
        assert!(run(&snap, &mut AiState::new()).fled.contains(&10));
    }

    #[test]
    fn test_damaged_ally_is_a_signal() {
        let mut snap = world(5000);
        snap.insert(worker(0, None, None));
        snap.insert(
            Entity::new_unit(11, ME, "harvester", pos(1600, 1500), 500).with_unit_state(UnitState {
                last_damage_tick: Some(995),
                ..Default::default()
            }),
        );
        assert!(run(&snap, &mut AiState::new()).fled.contains(&10));
    }

    #[test]
    fn test_flee_spreads_across_safe_depots() {
        let mut snap = world(5000);
        snap.insert(Entity::new_building(2, ME, "refinery", pos(200, 3000), 900, 0));
        snap.insert(Entity::new_building(3, ME, "refinery", pos(3000, 200), 900, 0));
        snap.insert(worker(0, None, None));
        snap.insert(
            Entity::new_unit(12, ME, "harvester", pos(1520, 1500), 500),
        );
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1600, 1600), 50));
        let out = run(&snap, &mut AiState::new());
        let targets: BTreeSet<_> = out
            .commands
            .iter()
            .filter_map(|c| match c {
                AiCommand::Move { target, .. } => Some((target.x, target.y)),
                _ => None,
            })
            .collect();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_conscripted_worker_never_flees() {
        let mut snap = world(5000);
        snap.insert(worker(0, Some(50), Some(999)));
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1550, 1500), 50));
        let mut state = AiState::new();
        state.harvester.conscripted.insert(10);
        assert!(run(&snap, &mut state).commands.is_empty());
    }
}
