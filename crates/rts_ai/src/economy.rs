//! Economic planner: build order and unit production.
//!
//! One building order in flight at a time, walked from a priority list where
//! repeated keys ask for additional copies. Unit production is gated by a
//! credit threshold and idle queues; at most one order per queue per tick.
//!
//! Credits are treated as a running budget within a tick so the planner never
//! commits more than the faction holds.

use tracing::debug;

use crate::command::AiCommand;
use crate::context::AiContext;
use crate::rules::{ArmorClass, BuildingRole, ProductionCategory};
use crate::state::{AiState, Strategy};

/// Next building from the build order, if it can be started now.
#[must_use]
pub fn next_building(ctx: &AiContext<'_>, state: &AiState, budget: i32) -> Option<String> {
    let order = &ctx.config.economy.build_order;
    let frugal = matches!(state.strategy, Strategy::Attack | Strategy::AllIn)
        && budget < ctx.config.economy.abundant_wealth;

    for (i, key) in order.iter().enumerate() {
        let required = order[..=i].iter().filter(|k| *k == key).count();
        let owned = ctx.view.own_buildings.iter().filter(|b| &b.key == key).count();
        if owned >= required {
            continue;
        }
        let Some(rules) = ctx.rules.building(key) else {
            continue;
        };
        if frugal && rules.role.is_economic() {
            continue;
        }
        if !ctx.rules.prerequisites_met(key, &ctx.view.built_keys) || budget < rules.cost {
            return None;
        }
        return Some(key.clone());
    }
    None
}

/// Pick a combat unit from `options`, countering heavy armor when seen.
#[must_use]
pub fn choose_unit(
    ctx: &AiContext<'_>,
    state: &AiState,
    options: &[String],
    budget: i32,
) -> Option<String> {
    let affordable: Vec<_> = options
        .iter()
        .filter_map(|key| ctx.rules.unit(key))
        .filter(|u| {
            u.combat && u.cost <= budget && ctx.rules.prerequisites_met(&u.key, &ctx.view.built_keys)
        })
        .collect();

    let counter = state.enemy_intel.dominant_armor == Some(ArmorClass::Heavy);
    affordable
        .iter()
        .find(|u| counter && u.anti_armor)
        .or_else(|| affordable.first())
        .map(|u| u.key.clone())
}

/// Production orders for this tick.
#[must_use]
pub fn plan_economy(ctx: &AiContext<'_>, state: &AiState) -> Vec<AiCommand> {
    let cfg = &ctx.config.economy;
    let queues = &ctx.economy.queues;
    let mut budget = ctx.economy.credits;
    let mut commands = Vec::new();
    let has_role = |role| ctx.own_buildings_with_role(role).any(|b| b.is_complete());

    if has_role(BuildingRole::Main)
        && queues.is_idle(ProductionCategory::Building)
        && ctx.economy.ready_to_place.is_none()
    {
        if let Some(key) = next_building(ctx, state, budget) {
            budget -= ctx.rules.cost_of(&key).unwrap_or(0);
            debug!(faction = %ctx.faction, tick = ctx.tick(), %key, "queue building");
            commands.push(AiCommand::StartProduction {
                category: ProductionCategory::Building,
                key,
            });
        }
    }

    let vehicles_ready = has_role(BuildingRole::HeavyProduction)
        && queues.is_idle(ProductionCategory::Vehicle);
    let mut vehicle_queued = false;

    let refineries = ctx.own_buildings_with_role(BuildingRole::Refinery).count();
    let wanted_harvesters = refineries * cfg.harvesters_per_refinery;
    if vehicles_ready && ctx.view.harvesters.len() < wanted_harvesters {
        let harvester = ctx
            .rules
            .units()
            .find(|u| u.harvester && ctx.rules.prerequisites_met(&u.key, &ctx.view.built_keys));
        if let Some(unit) = harvester.filter(|u| u.cost <= budget) {
            budget -= unit.cost;
            vehicle_queued = true;
            debug!(faction = %ctx.faction, tick = ctx.tick(), key = %unit.key, "queue harvester");
            commands.push(AiCommand::StartProduction {
                category: ProductionCategory::Vehicle,
                key: unit.key.clone(),
            });
        }
    }

    if budget <= cfg.unit_production_threshold {
        return commands;
    }

    if has_role(BuildingRole::Production) && queues.is_idle(ProductionCategory::Infantry) {
        if let Some(key) = choose_unit(ctx, state, &cfg.infantry_options, budget) {
            budget -= ctx.rules.cost_of(&key).unwrap_or(0);
            commands.push(AiCommand::StartProduction {
                category: ProductionCategory::Infantry,
                key,
            });
        }
    }

    if vehicles_ready && !vehicle_queued && budget > cfg.unit_production_threshold {
        if let Some(key) = choose_unit(ctx, state, &cfg.vehicle_options, budget) {
            commands.push(AiCommand::StartProduction {
                category: ProductionCategory::Vehicle,
                key,
            });
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::math::Vec2Fixed;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{Entity, FactionEconomy, MapBounds, WorldSnapshot};

    const ME: FactionId = FactionId(1);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn snapshot(credits: i32, buildings: &[&str]) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(1000, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(credits, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(500, 500), 1000, 0));
        for (i, key) in buildings.iter().enumerate() {
            let id = 10 + i as u64;
            snap.insert(Entity::new_building(id, ME, *key, pos(600 + 100 * i as i32, 500), 500, 0));
        }
        snap
    }

    fn plan(snap: &WorldSnapshot, state: &AiState) -> Vec<AiCommand> {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        plan_economy(&ctx, state)
    }

    fn building_orders(cmds: &[AiCommand]) -> Vec<&str> {
        cmds.iter()
            .filter_map(|c| match c {
                AiCommand::StartProduction {
                    category: ProductionCategory::Building,
                    key,
                } => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_build_order_item() {
        let snap = snapshot(1000, &[]);
        assert_eq!(building_orders(&plan(&snap, &AiState::new())), vec!["power"]);
    }

    #[test]
    fn test_skips_built_items() {
        let snap = snapshot(2000, &["power"]);
        assert_eq!(building_orders(&plan(&snap, &AiState::new())), vec!["refinery"]);
    }

    #[test]
    fn test_insufficient_funds_waits() {
        let snap = snapshot(100, &["power"]);
        assert!(building_orders(&plan(&snap, &AiState::new())).is_empty());
    }

    #[test]
    fn test_one_building_in_flight() {
        let mut snap = snapshot(5000, &[]);
        snap.factions.get_mut(&ME).unwrap().queues.building = Some("power".to_string());
        assert!(building_orders(&plan(&snap, &AiState::new())).is_empty());
    }

    #[test]
    fn test_attack_skips_economic_buildings_when_poor() {
        // Next item would be a second power plant; barracks is military.
        let snap = snapshot(1500, &["power", "refinery"]);
        let mut state = AiState::new();
        state.strategy = Strategy::Attack;
        assert_eq!(building_orders(&plan(&snap, &state)), vec!["barracks"]);
    }

    #[test]
    fn test_infantry_when_rich() {
        let snap = snapshot(5000, &["power", "refinery", "barracks", "power"]);
        let cmds = plan(&snap, &AiState::new());
        assert!(cmds.iter().any(|c| matches!(
            c,
            AiCommand::StartProduction { category: ProductionCategory::Infantry, key } if key == "rifle"
        )));
    }

    #[test]
    fn test_counter_heavy_armor() {
        let snap = snapshot(5000, &["power", "refinery", "barracks", "power"]);
        let mut state = AiState::new();
        state.enemy_intel.dominant_armor = Some(ArmorClass::Heavy);
        let cmds = plan(&snap, &state);
        assert!(cmds.iter().any(|c| matches!(
            c,
            AiCommand::StartProduction { category: ProductionCategory::Infantry, key } if key == "rocket"
        )));
    }

    #[test]
    fn test_harvester_before_combat_vehicles() {
        let snap = snapshot(5000, &["power", "refinery", "barracks", "power", "factory"]);
        let cmds = plan(&snap, &AiState::new());
        assert!(cmds.iter().any(|c| matches!(
            c,
            AiCommand::StartProduction { category: ProductionCategory::Vehicle, key } if key == "harvester"
        )));
        let vehicles = cmds
            .iter()
            .filter(|c| matches!(c, AiCommand::StartProduction { category: ProductionCategory::Vehicle, .. }))
            .count();
        assert_eq!(vehicles, 1);
    }
}
