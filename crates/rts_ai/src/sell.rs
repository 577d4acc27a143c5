//! Building liquidation.
//!
//! Emergency sales happen when credits are critically low while the base is
//! under threat; the least critical mature building goes first and the last
//! production structure is never sold. Independently, a depot with no
//! resources left nearby is sold while another depot remains. At most one
//! sale per tick, with a cooldown between sales.

use tracing::info;

use crate::command::AiCommand;
use crate::context::AiContext;
use crate::math::units;
use crate::rules::BuildingRole;
use crate::state::AiState;
use crate::world::Entity;

/// Sale order for a role; lower sells first.
#[must_use]
pub const fn sell_rank(role: BuildingRole) -> u8 {
    match role {
        BuildingRole::Defense => 0,
        BuildingRole::Tech | BuildingRole::Power => 1,
        BuildingRole::Refinery => 2,
        BuildingRole::Production | BuildingRole::HeavyProduction => 3,
        // The economy planner needs a main building to queue anything.
        BuildingRole::Main => 4,
    }
}

fn is_mature(ctx: &AiContext<'_>, building: &Entity) -> bool {
    building.building.is_some_and(|b| {
        !b.under_construction && ctx.tick().saturating_sub(b.built_tick) >= ctx.config.sell.grace_ticks
    })
}

/// Pick the building to sell in a credit emergency.
#[must_use]
pub fn emergency_candidate<'a>(ctx: &AiContext<'a>) -> Option<&'a Entity> {
    let production = ctx
        .view
        .own_buildings
        .iter()
        .filter(|b| b.is_complete() && ctx.role_of(b).is_some_and(BuildingRole::is_production))
        .count();
    ctx.view
        .own_buildings
        .iter()
        .copied()
        .filter(|b| is_mature(ctx, b))
        .filter_map(|b| ctx.role_of(b).map(|role| (role, b)))
        .filter(|(role, _)| !(role.is_production() && production <= 1))
        .min_by_key(|(role, b)| (sell_rank(*role), b.id))
        .map(|(_, b)| b)
}

/// A mature depot with no resource node in reach, if another finished depot
/// remains.
#[must_use]
pub fn redundant_refinery<'a>(ctx: &AiContext<'a>) -> Option<&'a Entity> {
    let refineries: Vec<&Entity> = ctx
        .own_buildings_with_role(BuildingRole::Refinery)
        .filter(|r| r.is_complete())
        .collect();
    if refineries.len() < 2 {
        return None;
    }
    let reach = units(ctx.config.sell.redundant_refinery_radius);
    refineries
        .into_iter()
        .filter(|r| is_mature(ctx, r))
        .find(|r| !ctx.snapshot.resources().any(|n| n.position.within(r.position, reach)))
}

/// Sell orders for this tick (zero or one).
pub fn advise_sell(ctx: &AiContext<'_>, state: &mut AiState) -> Vec<AiCommand> {
    let cfg = &ctx.config.sell;
    let now = ctx.tick();
    if state
        .last_sell_tick
        .is_some_and(|t| now.saturating_sub(t) < cfg.cooldown_ticks)
    {
        return Vec::new();
    }

    let emergency = ctx.economy.credits < cfg.critical_credits && !state.threats_near_base.is_empty();
    let (building, reason) = if let Some(b) = emergency.then(|| emergency_candidate(ctx)).flatten() {
        (b, "credit emergency")
    } else if let Some(b) = redundant_refinery(ctx) {
        (b, "redundant depot")
    } else {
        return Vec::new();
    };

    state.last_sell_tick = Some(now);
    info!(
        faction = %ctx.faction,
        tick = now,
        building = building.id,
        key = %building.key,
        credits = ctx.economy.credits,
        reason,
        "selling building"
    );
    vec![AiCommand::SellBuilding { building: building.id }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::math::Vec2Fixed;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{BuildingState, FactionEconomy, MapBounds, WorldSnapshot};

    const ME: FactionId = FactionId(1);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world(credits: i32) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(5000, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(credits, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(500, 500), 1000, 0));
        snap
    }

    fn run(snap: &WorldSnapshot, state: &mut AiState) -> Vec<AiCommand> {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        advise_sell(&ctx, state)
    }

    fn unfinished(id: u64, key: &str, at: Vec2Fixed) -> Entity {
        let mut site = Entity::new_building(id, ME, key, at, 500, 100);
        site.building = Some(BuildingState {
            built_tick: 100,
            under_construction: true,
        });
        site
    }

    fn threatened() -> AiState {
        let mut state = AiState::new();
        state.threats_near_base = vec![99];
        state
    }

    #[test]
    fn test_emergency_sells_least_critical() {
        let mut snap = world(0);
        snap.insert(Entity::new_building(2, ME, "power", pos(600, 500), 300, 100));
        snap.insert(Entity::new_building(3, ME, "turret", pos(700, 500), 300, 100));
        let mut state = threatened();
        assert_eq!(run(&snap, &mut state), vec![AiCommand::SellBuilding { building: 3 }]);
        assert_eq!(state.last_sell_tick, Some(5000));
    }

    #[test]
    fn test_young_building_protected() {
        let mut snap = world(0);
        snap.insert(Entity::new_building(2, ME, "power", pos(600, 500), 300, 4500));
        assert!(run(&snap, &mut threatened()).is_empty());
    }

    #[test]
    fn test_last_production_structure_protected() {
        let snap = world(0);
        assert!(run(&snap, &mut threatened()).is_empty());
    }

    #[test]
    fn test_no_emergency_without_threat() {
        let mut snap = world(0);
        snap.insert(Entity::new_building(2, ME, "power", pos(600, 500), 300, 100));
        assert!(run(&snap, &mut AiState::new()).is_empty());
    }

    #[test]
    fn test_cooldown_between_sales() {
        let mut snap = world(0);
        snap.insert(Entity::new_building(2, ME, "power", pos(600, 500), 300, 100));
        let mut state = threatened();
        state.last_sell_tick = Some(4800);
        assert!(run(&snap, &mut state).is_empty());
    }

    #[test]
    fn test_redundant_refinery_sold() {
        let mut snap = world(5000);
        snap.insert(Entity::new_resource(100, "ore", pos(800, 500), 1000));
        snap.insert(Entity::new_building(2, ME, "refinery", pos(700, 500), 900, 100));
        snap.insert(Entity::new_building(3, ME, "refinery", pos(3500, 3500), 900, 100));
        assert_eq!(
            run(&snap, &mut AiState::new()),
            vec![AiCommand::SellBuilding { building: 3 }]
        );
    }

    #[test]
    fn test_only_refinery_kept() {
        let mut snap = world(5000);
        snap.insert(Entity::new_building(3, ME, "refinery", pos(3500, 3500), 900, 100));
        assert!(run(&snap, &mut AiState::new()).is_empty());
    }

    #[test]
    fn test_unfinished_barracks_does_not_expose_conyard() {
        let mut snap = world(0);
        snap.insert(unfinished(2, "barracks", pos(600, 500)));
        assert!(run(&snap, &mut threatened()).is_empty());
    }

    #[test]
    fn test_conyard_outlasts_barracks() {
        let mut snap = world(0);
        snap.insert(Entity::new_building(2, ME, "barracks", pos(600, 500), 500, 100));
        assert_eq!(
            run(&snap, &mut threatened()),
            vec![AiCommand::SellBuilding { building: 2 }]
        );
    }

    #[test]
    fn test_main_ranked_last() {
        assert!(sell_rank(BuildingRole::Main) > sell_rank(BuildingRole::Production));
        assert!(sell_rank(BuildingRole::Main) > sell_rank(BuildingRole::HeavyProduction));
    }

    #[test]
    fn test_unfinished_refinery_does_not_count_as_remaining() {
        let mut snap = world(5000);
        snap.insert(Entity::new_resource(100, "ore", pos(800, 500), 1000));
        snap.insert(unfinished(2, "refinery", pos(700, 500)));
        snap.insert(Entity::new_building(3, ME, "refinery", pos(3500, 3500), 900, 100));
        assert!(run(&snap, &mut AiState::new()).is_empty());
    }
}
