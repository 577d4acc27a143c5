//! Strategy state machine.
//!
//! Defend pre-empts everything: any threat near the base switches to it on the
//! spot without touching the cooldown clock. Every other transition waits for
//! the cooldown. Priority when calm: all-in override, attack, harass, buildup.
//! Once threats clear, defend lingers until the cooldown runs out; groups
//! formed before the raid keep their orders meanwhile (see
//! [`crate::combat::groups_active`]).

use std::cmp::Reverse;

use tracing::info;

use crate::context::AiContext;
use crate::rules::BuildingRole;
use crate::state::{AiState, Strategy};
use crate::world::EntityId;

/// Whether sustained desperation authorises an all-in.
#[must_use]
pub fn all_in_authorised(ctx: &AiContext<'_>, state: &AiState) -> bool {
    let cfg = &ctx.config.strategy;
    let now = ctx.tick();
    let sustained = state
        .high_desperation_since
        .is_some_and(|since| now.saturating_sub(since) >= cfg.all_in_sustain_ticks);
    let quiet = match state.last_combat_tick {
        None => true,
        Some(t) => now.saturating_sub(t) >= cfg.all_in_sustain_ticks,
    };
    sustained && quiet && ctx.view.enemies_exist()
}

/// Fastest, lightest combat units first, capped at `cap`.
#[must_use]
pub fn pick_harass_group(ctx: &AiContext<'_>, cap: usize) -> Vec<EntityId> {
    let mut candidates: Vec<_> = ctx
        .view
        .combat_units
        .iter()
        .map(|unit| {
            let (speed, armor) = ctx
                .rules
                .unit(&unit.key)
                .map_or((0, Default::default()), |r| (r.speed, r.armor));
            (Reverse(speed), armor, unit.id)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().take(cap).map(|(_, _, id)| id).collect()
}

/// Choose the strategy for this tick and form groups on transitions.
pub fn select_strategy(ctx: &AiContext<'_>, state: &mut AiState) {
    let now = ctx.tick();
    if !state.threats_near_base.is_empty() {
        if state.set_strategy(Strategy::Defend, now) {
            info!(
                faction = %ctx.faction,
                tick = now,
                threats = state.threats_near_base.len(),
                "strategy -> defend"
            );
        }
        return;
    }

    let cfg = &ctx.config.strategy;
    if !state.cooldown_elapsed(now, cfg.cooldown_ticks) {
        return;
    }

    let combat = ctx.view.combat_units.len();
    let has_role = |role: BuildingRole| ctx.own_buildings_with_role(role).any(|b| b.is_complete());
    let enemies = ctx.view.enemies_exist();

    let next = if all_in_authorised(ctx, state) {
        Strategy::AllIn
    } else if combat >= cfg.attack_unit_threshold && has_role(BuildingRole::HeavyProduction) && enemies {
        Strategy::Attack
    } else if combat >= cfg.harass_unit_threshold
        && (has_role(BuildingRole::Production) || has_role(BuildingRole::HeavyProduction))
        && enemies
    {
        Strategy::Harass
    } else {
        Strategy::Buildup
    };

    let previous = state.strategy;
    if !state.set_strategy(next, now) {
        return;
    }

    match next {
        Strategy::Attack | Strategy::AllIn => {
            state.attack_group = ctx.view.combat_units.iter().map(|u| u.id).collect();
            state.harass_group.clear();
        }
        Strategy::Harass => {
            state.harass_group = pick_harass_group(ctx, cfg.harass_group_cap).into_iter().collect();
            state.attack_group.clear();
        }
        Strategy::Buildup | Strategy::Defend => {
            state.attack_group.clear();
            state.harass_group.clear();
        }
    }
    state.defense_group.clear();

    info!(
        faction = %ctx.faction,
        tick = now,
        from = previous.name(),
        to = next.name(),
        combat_units = combat,
        desperation = state.desperation_score,
        "strategy changed"
    );
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
    const THEM: FactionId = FactionId(2);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world(tick: u64, rifles: u64, jeeps: u64, factory: bool) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(tick, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(1000, Difficulty::Hard));
        snap.factions.insert(THEM, FactionEconomy::new(1000, Difficulty::Hard));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(500, 500), 1000, 0));
        snap.insert(Entity::new_building(2, ME, "barracks", pos(600, 500), 500, 0));
        if factory {
            snap.insert(Entity::new_building(3, ME, "factory", pos(500, 650), 800, 0));
        }
        for i in 0..rifles {
            snap.insert(Entity::new_unit(100 + i, ME, "rifle", pos(700, 700), 50));
        }
        for i in 0..jeeps {
            snap.insert(Entity::new_unit(200 + i, ME, "jeep", pos(700, 720), 80));
        }
        snap.insert(Entity::new_building(900, THEM, "factory", pos(3500, 3500), 800, 0));
        snap
    }

    fn run(snap: &WorldSnapshot, state: &mut AiState) {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let ctx = AiContext::new(snap, &grid, &rules, &config, ME, 0).unwrap();
        select_strategy(&ctx, state);
    }

    #[test]
    fn test_threat_forces_defend_during_cooldown() {
        let snap = world(10, 0, 0, false);
        let mut state = AiState::new();
        state.threats_near_base = vec![42];
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Defend);
        assert_eq!(state.last_strategy_change, 0);
    }

    #[test]
    fn test_cooldown_blocks_attack() {
        let snap = world(100, 6, 0, true);
        let mut state = AiState::new();
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Buildup);
    }

    #[test]
    fn test_attack_after_cooldown() {
        let snap = world(400, 6, 0, true);
        let mut state = AiState::new();
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Attack);
        assert_eq!(state.attack_group.len(), 6);
        assert_eq!(state.last_strategy_change, 400);
    }

    #[test]
    fn test_attack_needs_heavy_production() {
        let snap = world(400, 6, 0, false);
        let mut state = AiState::new();
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Harass);
    }

    #[test]
    fn test_harass_group_prefers_fast_units() {
        let snap = world(400, 3, 2, false);
        let mut state = AiState::new();
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Harass);
        let group: Vec<_> = state.harass_group.iter().copied().collect();
        assert_eq!(group.len(), 4);
        assert!(group.contains(&200) && group.contains(&201));
    }

    #[test]
    fn test_defend_clears_when_threat_leaves() {
        let snap = world(400, 0, 0, false);
        let mut state = AiState::new();
        state.strategy = Strategy::Defend;
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Buildup);
    }

    #[test]
    fn test_all_in_after_sustained_desperation() {
        let snap = world(5000, 1, 0, false);
        let mut state = AiState::new();
        state.high_desperation_since = Some(1000);
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::AllIn);
    }

    #[test]
    fn test_recent_combat_blocks_all_in() {
        let snap = world(5000, 1, 0, false);
        let mut state = AiState::new();
        state.high_desperation_since = Some(1000);
        state.last_combat_tick = Some(4900);
        run(&snap, &mut state);
        assert_eq!(state.strategy, Strategy::Buildup);
    }
}
