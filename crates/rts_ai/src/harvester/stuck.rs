//! Stuck worker recovery.
//!
//! A worker counts as stuck when the movement layer reports a long run of
//! no-progress ticks toward its node with no move order, or when it is
//! seeking a node it has not reached yet but is not moving. Time spent stuck
//! maps onto five escalating recovery levels; the tier caps how far a worker
//! can escalate.
//!
//! Workers idling at a depot past a short window are treated separately to
//! break docking deadlocks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::{AiCommand, MoveMode};
use crate::context::AiContext;
use crate::math::{ratio, units, Fixed, Vec2Fixed};
use crate::state::{AiState, HarvesterAiState, StuckState};
use crate::world::{Entity, EntityId};

/// Escalating recovery tactics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StuckLevel {
    /// Small sideways step.
    Nudge = 1,
    /// Switch to a nearby node.
    Retarget = 2,
    /// Blacklist the node and go anywhere else.
    Relocate = 3,
    /// Head back to a depot.
    Retreat = 4,
    /// Long blacklist plus the most drastic recovery available.
    Emergency = 5,
}

impl StuckLevel {
    /// All levels in escalation order.
    pub const ALL: [Self; 5] = [
        Self::Nudge,
        Self::Retarget,
        Self::Relocate,
        Self::Retreat,
        Self::Emergency,
    ];

    /// Level for a 1-based index.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1..=5 => Some(Self::ALL[usize::from(index - 1)]),
            _ => None,
        }
    }

    /// 1-based index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Level reached after being stuck for `duration` ticks, capped at `cap`.
///
/// Monotone in `duration`. `None` below the first threshold.
#[must_use]
pub fn level_for_duration(duration: u64, thresholds: &[u64; 5], cap: u8) -> Option<StuckLevel> {
    let reached = thresholds.iter().take_while(|t| duration >= **t).count();
    let reached = u8::try_from(reached).unwrap_or(5);
    StuckLevel::from_index(reached.min(cap))
}

/// Whether `worker` is stuck this tick.
#[must_use]
pub fn is_stuck(ctx: &AiContext<'_>, worker: &Entity) -> bool {
    let cfg = &ctx.config.stuck;
    let Some(unit) = worker.unit.as_ref() else {
        return false;
    };
    let Some(node) = unit.harvest_target else {
        return false;
    };
    if unit.stuck_ticks >= cfg.stuck_tick_threshold && unit.move_target.is_none() {
        return true;
    }
    let seeking = unit.delivery_target.is_none();
    let epsilon = ratio(i64::from(cfg.velocity_epsilon_milli), 1000);
    let slow = unit.velocity.length() < epsilon;
    let away = ctx
        .snapshot
        .get(node)
        .is_some_and(|n| !worker.position.within(n.position, units(cfg.harvest_range)));
    seeking && slow && away
}

/// Recover every stuck worker not in `excluded`.
pub fn resolve_stuck(ctx: &AiContext<'_>, state: &mut AiState, excluded: &BTreeSet<EntityId>) -> Vec<AiCommand> {
    let cfg = &ctx.config.stuck;
    let now = ctx.tick();
    let cap = ctx.profile.max_stuck_level;
    let hs = &mut state.harvester;
    let mut commands = Vec::new();

    for worker in &ctx.view.harvesters {
        if excluded.contains(&worker.id) || hs.conscripted.contains(&worker.id) {
            continue;
        }
        if !is_stuck(ctx, worker) {
            hs.stuck_states.remove(&worker.id);
            continue;
        }

        let mut record = hs.stuck_states.get(&worker.id).copied().unwrap_or(StuckState {
            since: now,
            consecutive: 0,
            last_recovery_tick: None,
            last_level: None,
        });
        record.consecutive = record.consecutive.saturating_add(1);

        let Some(level) = level_for_duration(now.saturating_sub(record.since), &cfg.level_thresholds, cap)
        else {
            hs.stuck_states.insert(worker.id, record);
            continue;
        };
        let escalating = record.last_level.map_or(true, |last| level > last);
        let cooling = record
            .last_recovery_tick
            .is_some_and(|t| now.saturating_sub(t) < cfg.recovery_cooldown);
        if cooling && !escalating {
            hs.stuck_states.insert(worker.id, record);
            continue;
        }

        if let Some(command) = recover(ctx, hs, worker, level) {
            commands.push(command);
        }
        debug!(
            faction = %ctx.faction,
            tick = now,
            worker = worker.id,
            level = level.index(),
            stuck_for = now.saturating_sub(record.since),
            "stuck recovery"
        );

        if level == StuckLevel::Emergency {
            hs.stuck_states.remove(&worker.id);
        } else {
            record.last_recovery_tick = Some(now);
            record.last_level = Some(level);
            hs.stuck_states.insert(worker.id, record);
        }
    }
    commands
}

fn recover(ctx: &AiContext<'_>, hs: &mut HarvesterAiState, worker: &Entity, level: StuckLevel) -> Option<AiCommand> {
    let cfg = &ctx.config.stuck;
    let now = ctx.tick();
    let node = worker.unit.as_ref().and_then(|u| u.harvest_target);
    let gather = |n: &Entity| AiCommand::move_unit(worker.id, n.position, MoveMode::Gather(n.id));

    match level {
        StuckLevel::Nudge => Some(nudge(ctx, worker)),
        StuckLevel::Retarget => Some(
            alternate_node(ctx, hs, worker, node, Some(units(cfg.detour_radius)))
                .map_or_else(|| nudge(ctx, worker), gather),
        ),
        StuckLevel::Relocate => {
            if let Some(n) = node {
                hs.blacklist(n, now, cfg.blacklist_ticks);
            }
            alternate_node(ctx, hs, worker, node, None)
                .map(gather)
                .or_else(|| retreat_to_depot(ctx, worker))
        }
        StuckLevel::Retreat => retreat_to_depot(ctx, worker).or_else(|| retreat_to_base(ctx, worker)),
        StuckLevel::Emergency => {
            if let Some(n) = node {
                hs.blacklist(n, now, cfg.blacklist_ticks.saturating_mul(2));
            }
            info!(
                faction = %ctx.faction,
                tick = now,
                worker = worker.id,
                ?node,
                "stuck emergency"
            );
            alternate_node(ctx, hs, worker, node, None)
                .map(gather)
                .or_else(|| retreat_to_depot(ctx, worker))
                .or_else(|| retreat_to_base(ctx, worker))
        }
    }
}

/// Sideways step relative to the worker's heading.
///
/// The side alternates by id parity so two workers wedged against each
/// other step apart.
fn nudge(ctx: &AiContext<'_>, worker: &Entity) -> AiCommand {
    let unit = worker.unit.as_ref();
    let node_pos = unit
        .and_then(|u| u.harvest_target)
        .and_then(|n| ctx.snapshot.get(n))
        .map(|n| n.position);
    let mut heading = node_pos.map_or(Vec2Fixed::ZERO, |p| (p - worker.position).normalize());
    if heading == Vec2Fixed::ZERO {
        heading = unit.map_or(Vec2Fixed::ZERO, |u| u.velocity.normalize());
    }
    if heading == Vec2Fixed::ZERO {
        heading = Vec2Fixed::from_units(1, 0);
    }
    let mut side = heading.perpendicular();
    if worker.id % 2 == 1 {
        side = Vec2Fixed::ZERO - side;
    }
    let target = ctx
        .snapshot
        .map
        .clamp(worker.position + side.scale(units(ctx.config.stuck.nudge_distance)));
    AiCommand::move_unit(worker.id, target, MoveMode::Normal)
}

/// Nearest usable node other than `current`, optionally within `radius`.
fn alternate_node<'a>(
    ctx: &AiContext<'a>,
    hs: &HarvesterAiState,
    worker: &Entity,
    current: Option<EntityId>,
    radius: Option<Fixed>,
) -> Option<&'a Entity> {
    let now = ctx.tick();
    ctx.snapshot
        .resources()
        .filter(|n| Some(n.id) != current)
        .filter(|n| !hs.is_blacklisted(n.id, now))
        .filter(|n| radius.map_or(true, |r| worker.position.within(n.position, r)))
        .min_by_key(|n| (worker.position.distance_squared(n.position), n.id))
}

fn nearest_depot<'a>(ctx: &AiContext<'a>, position: Vec2Fixed, except: Option<EntityId>) -> Option<&'a Entity> {
    ctx.depots()
        .filter(|d| Some(d.id) != except)
        .min_by_key(|d| (position.distance_squared(d.position), d.id))
}

fn retreat_to_depot(ctx: &AiContext<'_>, worker: &Entity) -> Option<AiCommand> {
    nearest_depot(ctx, worker.position, None)
        .map(|d| AiCommand::move_unit(worker.id, d.position, MoveMode::Return(d.id)))
}

fn retreat_to_base(ctx: &AiContext<'_>, worker: &Entity) -> Option<AiCommand> {
    ctx.view
        .base_center
        .map(|c| AiCommand::move_unit(worker.id, c, MoveMode::Normal))
}

/// Unstick workers idling at a depot.
///
/// Loaded workers are sent to another depot, empty ones to the nearest
/// usable node.
pub fn break_depot_deadlocks(
    ctx: &AiContext<'_>,
    state: &mut AiState,
    excluded: &BTreeSet<EntityId>,
) -> Vec<AiCommand> {
    let hcfg = &ctx.config.harvester;
    let epsilon = ratio(i64::from(ctx.config.stuck.velocity_epsilon_milli), 1000);
    let now = ctx.tick();
    let dock = units(hcfg.dock_radius);
    let hs = &mut state.harvester;
    let mut commands = Vec::new();

    for worker in &ctx.view.harvesters {
        if excluded.contains(&worker.id) || hs.conscripted.contains(&worker.id) {
            continue;
        }
        let Some(unit) = worker.unit.as_ref() else {
            continue;
        };
        let depot = nearest_depot(ctx, worker.position, None).filter(|d| worker.position.within(d.position, dock));
        let idle = unit.move_target.is_none() && unit.velocity.length() < epsilon;
        let Some(depot) = depot.filter(|_| idle) else {
            hs.depot_idle_since.remove(&worker.id);
            continue;
        };

        let since = *hs.depot_idle_since.entry(worker.id).or_insert(now);
        if now.saturating_sub(since) < hcfg.depot_idle_ticks {
            continue;
        }

        let command = if unit.cargo > 0 {
            nearest_depot(ctx, worker.position, Some(depot.id))
                .map(|d| AiCommand::move_unit(worker.id, d.position, MoveMode::Return(d.id)))
        } else {
            alternate_node(ctx, hs, worker, None, None)
                .map(|n| AiCommand::move_unit(worker.id, n.position, MoveMode::Gather(n.id)))
        };
        if let Some(command) = command {
            debug!(
                faction = %ctx.faction,
                tick = now,
                worker = worker.id,
                depot = depot.id,
                "depot deadlock broken"
            );
            commands.push(command);
            hs.depot_idle_since.insert(worker.id, now);
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{FactionEconomy, MapBounds, UnitState, WorldSnapshot};

    const ME: FactionId = FactionId(1);
    const THRESHOLDS: [u64; 5] = [20, 60, 120, 200, 320];

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world(tick: u64, difficulty: Difficulty) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(tick, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(1000, difficulty));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(500, 500), 1000, 0));
        snap.insert(Entity::new_building(2, ME, "refinery", pos(700, 500), 900, 0));
        snap.insert(Entity::new_resource(100, "ore", pos(1500, 500), 1000));
        snap.insert(Entity::new_resource(101, "ore", pos(1600, 700), 1000));
        snap
    }

    fn stuck_worker(id: EntityId) -> Entity {
        Entity::new_unit(id, ME, "harvester", pos(1200, 500), 500).with_unit_state(UnitState {
            harvest_target: Some(100),
            stuck_ticks: 40,
            ..Default::default()
        })
    }

    fn run(snap: &WorldSnapshot, state: &mut AiState) -> Vec<AiCommand> {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        resolve_stuck(&ctx, state, &BTreeSet::new())
    }

    fn stuck_since(state: &mut AiState, worker: EntityId, since: u64) {
        state.harvester.stuck_states.insert(
            worker,
            StuckState {
                since,
                consecutive: 1,
                last_recovery_tick: None,
                last_level: None,
            },
        );
    }

    #[test]
    fn test_level_for_duration_monotone_and_capped() {
        assert_eq!(level_for_duration(0, &THRESHOLDS, 5), None);
        assert_eq!(level_for_duration(20, &THRESHOLDS, 5), Some(StuckLevel::Nudge));
        assert_eq!(level_for_duration(119, &THRESHOLDS, 5), Some(StuckLevel::Retarget));
        assert_eq!(level_for_duration(1000, &THRESHOLDS, 5), Some(StuckLevel::Emergency));
        assert_eq!(level_for_duration(1000, &THRESHOLDS, 2), Some(StuckLevel::Retarget));
        let mut last = None;
        for d in 0..400 {
            let level = level_for_duration(d, &THRESHOLDS, 5);
            assert!(level >= last);
            last = level;
        }
    }

    #[test]
    fn test_stuck_detection() {
        let snap = world(100, Difficulty::Hard);
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(&snap);
        let ctx = AiContext::new(&snap, &grid, &rules, &config, ME, 0).unwrap();

        assert!(is_stuck(&ctx, &stuck_worker(10)));
        let mut moving = stuck_worker(10);
        if let Some(u) = moving.unit.as_mut() {
            u.stuck_ticks = 0;
            u.velocity = pos(2, 0);
        }
        assert!(!is_stuck(&ctx, &moving));
        let mut at_node = stuck_worker(10);
        at_node.position = pos(1480, 500);
        if let Some(u) = at_node.unit.as_mut() {
            u.stuck_ticks = 0;
        }
        assert!(!is_stuck(&ctx, &at_node));
    }

    #[test]
    fn test_first_sighting_starts_clock() {
        let mut snap = world(100, Difficulty::Hard);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        assert!(run(&snap, &mut state).is_empty());
        assert_eq!(state.harvester.stuck_states[&10].since, 100);
    }

    #[test]
    fn test_nudge_is_sideways() {
        let mut snap = world(130, Difficulty::Hard);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        stuck_since(&mut state, 10, 100);
        let cmds = run(&snap, &mut state);
        match &cmds[..] {
            [AiCommand::Move { target, mode: MoveMode::Normal, .. }] => {
                assert_eq!(target.x, Fixed::from_num(1200));
                assert_ne!(target.y, Fixed::from_num(500));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_retarget_within_detour() {
        let mut snap = world(170, Difficulty::Hard);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        stuck_since(&mut state, 10, 100);
        let cmds = run(&snap, &mut state);
        assert_eq!(cmds, vec![AiCommand::move_unit(10, pos(1600, 700), MoveMode::Gather(101))]);
    }

    #[test]
    fn test_relocate_blacklists_node() {
        let mut snap = world(230, Difficulty::Hard);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        stuck_since(&mut state, 10, 100);
        run(&snap, &mut state);
        assert!(state.harvester.is_blacklisted(100, 230));
        assert!(!state.harvester.is_blacklisted(100, 830));
    }

    #[test]
    fn test_emergency_double_blacklist_and_reset() {
        let mut snap = world(500, Difficulty::Hard);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        stuck_since(&mut state, 10, 100);
        let cmds = run(&snap, &mut state);
        assert_eq!(cmds.len(), 1);
        assert!(state.harvester.is_blacklisted(100, 1699));
        assert!(!state.harvester.stuck_states.contains_key(&10));
    }

    #[test]
    fn test_easy_tier_never_relocates() {
        let mut snap = world(500, Difficulty::Easy);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        stuck_since(&mut state, 10, 100);
        run(&snap, &mut state);
        assert_eq!(state.harvester.stuck_states[&10].last_level, Some(StuckLevel::Retarget));
        assert!(state.harvester.blacklisted_ore.is_empty());
    }

    #[test]
    fn test_cooldown_blocks_repeat_of_same_level() {
        let mut snap = world(130, Difficulty::Hard);
        snap.insert(stuck_worker(10));
        let mut state = AiState::new();
        stuck_since(&mut state, 10, 100);
        assert_eq!(run(&snap, &mut state).len(), 1);
        snap.tick = 135;
        assert!(run(&snap, &mut state).is_empty());
    }

    #[test]
    fn test_depot_deadlock_sends_empty_worker_to_ore() {
        let mut snap = world(200, Difficulty::Hard);
        snap.insert(Entity::new_unit(10, ME, "harvester", pos(720, 520), 500));
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let mut state = AiState::new();
        state.harvester.depot_idle_since.insert(10, 100);
        let grid = SpatialGrid::from_snapshot(&snap);
        let ctx = AiContext::new(&snap, &grid, &rules, &config, ME, 0).unwrap();
        let cmds = break_depot_deadlocks(&ctx, &mut state, &BTreeSet::new());
        assert_eq!(cmds, vec![AiCommand::move_unit(10, pos(1500, 500), MoveMode::Gather(100))]);
    }
}
