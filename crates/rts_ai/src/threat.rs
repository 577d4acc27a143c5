//! Threat detection around the base and the worker fleet.
//!
//! Purely derived from the snapshot every tick; nothing is cached.

use std::collections::BTreeSet;

use tracing::trace;

use crate::context::AiContext;
use crate::math::units;
use crate::world::EntityId;

/// Result of one threat scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreatReport {
    /// Enemy units near the base, in id order.
    pub threats_near_base: Vec<EntityId>,
    /// Own workers under attack, in id order.
    pub harvesters_under_attack: Vec<EntityId>,
}

/// Scan for enemies near the base and workers in trouble.
#[must_use]
pub fn detect_threats(ctx: &AiContext<'_>) -> ThreatReport {
    let cfg = &ctx.config.threat;
    let is_enemy_unit = |id: &EntityId| {
        ctx.snapshot
            .get_alive(*id)
            .is_some_and(|e| e.is_unit() && e.is_enemy_of(ctx.faction))
    };

    let mut threats = BTreeSet::new();
    if let Some(center) = ctx.view.base_center {
        threats.extend(
            ctx.spatial
                .query_radius(center, units(cfg.base_radius))
                .into_iter()
                .filter(is_enemy_unit),
        );
    }
    for building in &ctx.view.own_buildings {
        threats.extend(
            ctx.spatial
                .query_radius(building.position, units(cfg.building_radius))
                .into_iter()
                .filter(is_enemy_unit),
        );
    }

    let proximity = units(cfg.harvester_proximity);
    let harvesters_under_attack = ctx
        .view
        .harvesters
        .iter()
        .filter(|worker| {
            let attacked = worker
                .unit
                .as_ref()
                .and_then(|u| u.last_attacker)
                .is_some_and(|attacker| ctx.is_live_enemy(attacker));
            attacked
                || ctx
                    .spatial
                    .nearest(worker.position, Some(proximity), &|id| is_enemy_unit(&id))
                    .is_some()
        })
        .map(|worker| worker.id)
        .collect();

    let report = ThreatReport {
        threats_near_base: threats.into_iter().collect(),
        harvesters_under_attack,
    };
    trace!(
        faction = %ctx.faction,
        tick = ctx.tick(),
        threats = report.threats_near_base.len(),
        workers_attacked = report.harvesters_under_attack.len(),
        "threat scan"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::math::Vec2Fixed;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{Entity, FactionEconomy, MapBounds, UnitState, WorldSnapshot};

    const ME: FactionId = FactionId(1);
    const THEM: FactionId = FactionId(2);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn base() -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(100, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(1000, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(1000, 1000), 1000, 0));
        snap.insert(Entity::new_building(2, ME, "power", pos(1800, 1000), 500, 0));
        snap
    }

    fn scan(snap: &WorldSnapshot) -> ThreatReport {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        detect_threats(&ctx)
    }

    #[test]
    fn test_enemy_near_base_center() {
        let mut snap = base();
        snap.insert(Entity::new_unit(10, THEM, "rifle", pos(1300, 1000), 50));
        assert_eq!(scan(&snap).threats_near_base, vec![10]);
    }

    #[test]
    fn test_enemy_near_outlying_building() {
        let mut snap = base();
        // 800 from base center, 100 from the power plant.
        snap.insert(Entity::new_unit(11, THEM, "rifle", pos(1800, 1100), 50));
        assert_eq!(scan(&snap).threats_near_base, vec![11]);
    }

    #[test]
    fn test_threats_are_deduplicated() {
        let mut snap = base();
        snap.insert(Entity::new_building(3, ME, "barracks", pos(1100, 1000), 500, 0));
        snap.insert(Entity::new_unit(12, THEM, "rifle", pos(1050, 1000), 50));
        assert_eq!(scan(&snap).threats_near_base, vec![12]);
    }

    #[test]
    fn test_distant_enemy_is_not_a_threat() {
        let mut snap = base();
        snap.insert(Entity::new_unit(13, THEM, "rifle", pos(3500, 3500), 50));
        assert!(scan(&snap).threats_near_base.is_empty());
    }

    #[test]
    fn test_harvester_with_live_attacker() {
        let mut snap = base();
        snap.insert(Entity::new_unit(20, THEM, "rifle", pos(3000, 3000), 50));
        snap.insert(
            Entity::new_unit(21, ME, "harvester", pos(2500, 2500), 500).with_unit_state(UnitState {
                last_attacker: Some(20),
                ..Default::default()
            }),
        );
        assert_eq!(scan(&snap).harvesters_under_attack, vec![21]);
    }

    #[test]
    fn test_harvester_with_enemy_nearby() {
        let mut snap = base();
        snap.insert(Entity::new_unit(30, THEM, "rifle", pos(2600, 2500), 50));
        snap.insert(Entity::new_unit(31, ME, "harvester", pos(2500, 2500), 500));
        assert_eq!(scan(&snap).harvesters_under_attack, vec![31]);
    }

    #[test]
    fn test_dead_attacker_does_not_count() {
        let mut snap = base();
        snap.insert(Entity::new_unit(40, THEM, "rifle", pos(3900, 3900), 50).with_health(0));
        snap.insert(
            Entity::new_unit(41, ME, "harvester", pos(2500, 2500), 500).with_unit_state(UnitState {
                last_attacker: Some(40),
                ..Default::default()
            }),
        );
        assert!(scan(&snap).harvesters_under_attack.is_empty());
    }
}
