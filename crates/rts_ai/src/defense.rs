//! Base defense while the strategy is [`Strategy::Defend`].
//!
//! A heavy attack recalls the whole army, dissolving attack and harass groups.
//! Otherwise only units that are idle, unassigned, or already close to home
//! are pulled in. Each defender engages the threat nearest to it; units
//! already fighting a threat keep their target.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::command::AiCommand;
use crate::context::AiContext;
use crate::math::units;
use crate::state::{AiState, Strategy};
use crate::world::{Entity, EntityId};

/// Defense orders for this tick.
pub fn handle_defense(ctx: &AiContext<'_>, state: &mut AiState) -> Vec<AiCommand> {
    if state.strategy != Strategy::Defend {
        return Vec::new();
    }
    let threats: Vec<&Entity> = state
        .threats_near_base
        .iter()
        .filter_map(|id| ctx.snapshot.get_alive(*id))
        .collect();
    if threats.is_empty() {
        return Vec::new();
    }
    let threat_ids: BTreeSet<EntityId> = threats.iter().map(|t| t.id).collect();

    let cfg = &ctx.config.threat;
    let heavy = threats.len() >= cfg.heavy_attack_threats;
    if heavy && !(state.attack_group.is_empty() && state.harass_group.is_empty()) {
        info!(
            faction = %ctx.faction,
            tick = ctx.tick(),
            threats = threats.len(),
            "heavy attack, recalling army"
        );
        state.attack_group.clear();
        state.harass_group.clear();
    }

    let pull_radius = units(cfg.defense_pull_radius);
    let defenders: Vec<&Entity> = ctx
        .view
        .combat_units
        .iter()
        .copied()
        .filter(|unit| {
            if heavy {
                return true;
            }
            let idle = unit.unit.as_ref().is_some_and(|u| u.is_idle());
            let unassigned =
                !state.attack_group.contains(&unit.id) && !state.harass_group.contains(&unit.id);
            let near_home = ctx
                .view
                .base_center
                .is_some_and(|c| unit.position.within(c, pull_radius));
            idle || unassigned || near_home
        })
        .collect();

    let mut orders: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
    for defender in &defenders {
        let engaged = defender
            .unit
            .as_ref()
            .and_then(|u| u.combat_target)
            .is_some_and(|t| threat_ids.contains(&t));
        if engaged {
            continue;
        }
        let nearest = threats
            .iter()
            .min_by_key(|t| (defender.position.distance_squared(t.position), t.id));
        if let Some(target) = nearest {
            orders.entry(target.id).or_default().push(defender.id);
        }
    }

    state.defense_group = defenders.iter().map(|d| d.id).collect();
    debug!(
        faction = %ctx.faction,
        tick = ctx.tick(),
        defenders = state.defense_group.len(),
        threats = threats.len(),
        "defending base"
    );

    orders
        .into_iter()
        .map(|(target, unit_ids)| AiCommand::Attack { unit_ids, target })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::math::Vec2Fixed;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{FactionEconomy, MapBounds, UnitState, WorldSnapshot};

    const ME: FactionId = FactionId(1);
    const THEM: FactionId = FactionId(2);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world() -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(100, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(1000, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(500, 500), 1000, 0));
        snap
    }

    fn run(snap: &WorldSnapshot, state: &mut AiState) -> Vec<AiCommand> {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        handle_defense(&ctx, state)
    }

    fn busy(id: EntityId, at: Vec2Fixed) -> Entity {
        Entity::new_unit(id, ME, "rifle", at, 50).with_unit_state(UnitState {
            move_target: Some(pos(3000, 3000)),
            ..Default::default()
        })
    }

    #[test]
    fn test_no_orders_outside_defend() {
        let mut snap = world();
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(550, 500), 50));
        snap.insert(Entity::new_unit(10, ME, "rifle", pos(600, 600), 50));
        let mut state = AiState::new();
        state.threats_near_base = vec![50];
        assert!(run(&snap, &mut state).is_empty());
    }

    #[test]
    fn test_each_defender_takes_nearest_threat() {
        let mut snap = world();
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(400, 500), 50));
        snap.insert(Entity::new_unit(51, THEM, "rifle", pos(700, 500), 50));
        snap.insert(Entity::new_unit(10, ME, "rifle", pos(380, 500), 50));
        snap.insert(Entity::new_unit(11, ME, "rifle", pos(720, 500), 50));
        let mut state = AiState::new();
        state.strategy = Strategy::Defend;
        state.threats_near_base = vec![50, 51];
        let cmds = run(&snap, &mut state);
        assert_eq!(
            cmds,
            vec![
                AiCommand::Attack { unit_ids: vec![10], target: 50 },
                AiCommand::Attack { unit_ids: vec![11], target: 51 },
            ]
        );
        assert_eq!(state.defense_group.len(), 2);
    }

    #[test]
    fn test_distant_attack_group_stays_out() {
        let mut snap = world();
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(450, 500), 50));
        snap.insert(busy(10, pos(3500, 3500)));
        snap.insert(Entity::new_unit(11, ME, "rifle", pos(520, 500), 50));
        let mut state = AiState::new();
        state.strategy = Strategy::Defend;
        state.threats_near_base = vec![50];
        state.attack_group.insert(10);
        let cmds = run(&snap, &mut state);
        assert_eq!(cmds, vec![AiCommand::Attack { unit_ids: vec![11], target: 50 }]);
        assert!(state.attack_group.contains(&10));
    }

    #[test]
    fn test_heavy_attack_recalls_army() {
        let mut snap = world();
        for i in 0..5 {
            snap.insert(Entity::new_unit(50 + i, THEM, "rifle", pos(450, 450 + 10 * i as i32), 50));
        }
        snap.insert(busy(10, pos(3500, 3500)));
        let mut state = AiState::new();
        state.strategy = Strategy::Defend;
        state.threats_near_base = (50..55).collect();
        state.attack_group.insert(10);
        let cmds = run(&snap, &mut state);
        assert!(state.attack_group.is_empty());
        assert!(cmds.iter().any(|c| c.unit_ids().contains(&10)));
    }

    #[test]
    fn test_engaged_defender_keeps_target() {
        let mut snap = world();
        snap.insert(Entity::new_unit(50, THEM, "rifle", pos(450, 500), 50));
        snap.insert(Entity::new_unit(51, THEM, "rifle", pos(520, 500), 50));
        snap.insert(Entity::new_unit(10, ME, "rifle", pos(520, 500), 50).with_unit_state(UnitState {
            combat_target: Some(50),
            ..Default::default()
        }));
        let mut state = AiState::new();
        state.strategy = Strategy::Defend;
        state.threats_near_base = vec![50, 51];
        assert!(run(&snap, &mut state).is_empty());
    }
}
