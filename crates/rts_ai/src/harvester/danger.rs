//! Danger map over a coarse grid.
//!
//! Cells gain danger from visible hostile units, from workers being attacked
//! inside them, and from workers dying there. Values decay linearly and cells
//! are dropped once they reach zero or go unreinforced for too long.

use std::collections::BTreeMap;

use tracing::debug;

use crate::context::AiContext;
use crate::math::Vec2Fixed;
use crate::state::{AiState, HarvesterDeath, ZoneKey};
use crate::world::EntityId;

/// Grid cell containing `pos`.
#[must_use]
pub fn zone_of(pos: Vec2Fixed, cell_size: i32) -> ZoneKey {
    let cell = cell_size.max(1);
    let x: i32 = pos.x.floor().to_num();
    let y: i32 = pos.y.floor().to_num();
    (x.div_euclid(cell), y.div_euclid(cell))
}

/// Current danger at a world position.
#[must_use]
pub fn danger_near(ctx: &AiContext<'_>, state: &AiState, pos: Vec2Fixed) -> i32 {
    let cfg = &ctx.config.harvester;
    state.harvester.danger_at(
        zone_of(pos, cfg.danger_cell_size),
        ctx.tick(),
        cfg.danger_decay_per_100,
    )
}

/// Record workers that vanished since the last tick as deaths.
pub fn track_worker_losses(ctx: &AiContext<'_>, state: &mut AiState) {
    let cfg = &ctx.config.harvester;
    let now = ctx.tick();
    let current: BTreeMap<EntityId, Vec2Fixed> = ctx
        .view
        .harvesters
        .iter()
        .map(|w| (w.id, w.position))
        .collect();

    let lost: Vec<(EntityId, Vec2Fixed)> = state
        .harvester
        .last_known
        .iter()
        .filter(|(id, _)| !current.contains_key(id))
        .map(|(id, pos)| (*id, *pos))
        .collect();

    for (worker, position) in lost {
        let zone = zone_of(position, cfg.danger_cell_size);
        state
            .harvester
            .add_danger(zone, cfg.danger_death, now, cfg.danger_decay_per_100);
        state.harvester.deaths.push(HarvesterDeath {
            position,
            tick: now,
            zone,
        });
        state.harvester.forget_worker(worker);
        debug!(
            faction = %ctx.faction,
            tick = now,
            worker,
            zone_x = zone.0,
            zone_y = zone.1,
            "worker lost"
        );
    }
    state.harvester.last_known = current;
}

/// Reinforce cells from this tick's observations and purge stale memory.
///
/// Presence and attacks raise a cell to a floor rather than stacking, so a
/// parked enemy does not grow danger without bound. Remembered deaths keep
/// their cell at the presence floor until they expire.
pub fn refresh_danger_map(ctx: &AiContext<'_>, state: &mut AiState) {
    let cfg = &ctx.config.harvester;
    let now = ctx.tick();
    let decay = cfg.danger_decay_per_100;
    let cell = cfg.danger_cell_size;

    let mut presence: BTreeMap<ZoneKey, i32> = BTreeMap::new();
    for enemy in &ctx.view.enemy_units {
        if ctx.rules.is_harvester(&enemy.key) {
            continue;
        }
        *presence.entry(zone_of(enemy.position, cell)).or_default() += 1;
    }
    for (zone, count) in presence {
        let floor = cfg.danger_enemy_presence.saturating_mul(count);
        state.harvester.raise_danger(zone, floor, now, decay);
    }

    for worker_id in state.harvesters_under_attack.clone() {
        if let Some(worker) = ctx.snapshot.get_alive(worker_id) {
            state
                .harvester
                .raise_danger(zone_of(worker.position, cell), cfg.danger_attack, now, decay);
        }
    }

    let death_zones: Vec<ZoneKey> = state
        .harvester
        .deaths
        .iter()
        .filter(|d| now.saturating_sub(d.tick) <= cfg.death_memory_ticks)
        .map(|d| d.zone)
        .collect();
    for zone in death_zones {
        state
            .harvester
            .raise_danger(zone, cfg.danger_enemy_presence, now, decay);
    }

    state
        .harvester
        .purge_expired(now, cfg.danger_memory_ticks, cfg.death_memory_ticks, decay);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{Entity, FactionEconomy, MapBounds, WorldSnapshot};

    const ME: FactionId = FactionId(1);
    const THEM: FactionId = FactionId(2);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world(tick: u64) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(tick, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(1000, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(100, 100), 1000, 0));
        snap
    }

    fn with_ctx(snap: &WorldSnapshot, f: impl FnOnce(&AiContext<'_>)) {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        f(&ctx);
    }

    #[test]
    fn test_zone_of_floors_negative() {
        assert_eq!(zone_of(pos(0, 0), 200), (0, 0));
        assert_eq!(zone_of(pos(399, 200), 200), (1, 1));
        assert_eq!(zone_of(pos(-1, -201), 200), (-1, -2));
    }

    #[test]
    fn test_vanished_worker_recorded_as_death() {
        let mut snap = world(10);
        snap.insert(Entity::new_unit(5, ME, "harvester", pos(450, 450), 500));
        let mut state = AiState::new();
        with_ctx(&snap, |ctx| track_worker_losses(ctx, &mut state));
        assert!(state.harvester.deaths.is_empty());
        assert!(state.harvester.last_known.contains_key(&5));

        let snap = world(20);
        with_ctx(&snap, |ctx| track_worker_losses(ctx, &mut state));
        assert_eq!(state.harvester.deaths.len(), 1);
        assert_eq!(state.harvester.deaths[0].zone, (2, 2));
        assert_eq!(state.harvester.danger_at((2, 2), 20, 10), 40);
        assert!(state.harvester.last_known.is_empty());
    }

    #[test]
    fn test_presence_raises_without_stacking() {
        let mut snap = world(100);
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(1010, 1010), 50));
        let mut state = AiState::new();
        with_ctx(&snap, |ctx| refresh_danger_map(ctx, &mut state));
        with_ctx(&snap, |ctx| refresh_danger_map(ctx, &mut state));
        assert_eq!(state.harvester.danger_at((5, 5), 100, 10), 15);
    }

    #[test]
    fn test_enemy_workers_are_not_danger() {
        let mut snap = world(100);
        snap.insert(Entity::new_unit(50, THEM, "harvester", pos(1010, 1010), 500));
        let mut state = AiState::new();
        with_ctx(&snap, |ctx| refresh_danger_map(ctx, &mut state));
        assert!(state.harvester.danger_map.is_empty());
    }

    #[test]
    fn test_attacked_worker_marks_its_cell() {
        let mut snap = world(100);
        snap.insert(Entity::new_unit(5, ME, "harvester", pos(650, 250), 500));
        let mut state = AiState::new();
        state.harvesters_under_attack = vec![5];
        with_ctx(&snap, |ctx| refresh_danger_map(ctx, &mut state));
        assert_eq!(state.harvester.danger_at((3, 1), 100, 10), 25);
    }
}
