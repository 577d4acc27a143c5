//! Per-tick orchestration.
//!
//! [`compute_ai_actions`] runs every component for one faction in a fixed
//! order and returns the combined command list. [`AiDirector`] is the host
//! side: it owns the state table, rules, tunables and base seed, and runs
//! every AI faction on each tick.
//!
//! The pipeline for one faction:
//!
//! 1. Bail out if the faction has no economy or is eliminated.
//! 2. Drop dead group members, scan threats, refresh intel and loss memory.
//! 3. Score desperation, then pick the strategy.
//! 4. Economy, defense, offense, workers, placement, liquidation.
//! 5. Deduplicate so no unit gets two attack or two flee orders.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::combat::{conscript_workers, coordinate_combat, groups_active};
use crate::command::{AiCommand, MoveMode};
use crate::config::AiConfig;
use crate::context::{invocation_seed, AiContext};
use crate::defense::handle_defense;
use crate::desperation::{track_engagement, update_desperation};
use crate::economy::plan_economy;
use crate::factions::FactionId;
use crate::harvester::{manage_harvesters, track_worker_losses};
use crate::intel::{discover_enemy_base, refresh_intel};
use crate::placement::plan_placement;
use crate::rules::RulesTable;
use crate::sell::advise_sell;
use crate::spatial::{SpatialGrid, SpatialQuery};
use crate::state::{AiState, AiStateTable, Strategy};
use crate::strategy::select_strategy;
use crate::threat::detect_threats;
use crate::world::{EntityId, WorldSnapshot};

/// Decide one faction's commands for this tick.
///
/// `state` is the faction's own persistent memory and is updated in place.
/// The RNG seed is derived from `base_seed`, the faction and the tick, so the
/// result does not depend on which other factions run or in what order.
pub fn compute_ai_actions(
    snapshot: &WorldSnapshot,
    spatial: &dyn SpatialQuery,
    rules: &RulesTable,
    config: &AiConfig,
    faction: FactionId,
    state: &mut AiState,
    base_seed: u64,
) -> Vec<AiCommand> {
    let seed = invocation_seed(base_seed, faction, snapshot.tick);
    let Some(mut ctx) = AiContext::new(snapshot, spatial, rules, config, faction, seed) else {
        debug!(%faction, tick = snapshot.tick, "no economic state, skipping");
        return Vec::new();
    };
    if ctx.view.is_eliminated() {
        debug!(%faction, tick = snapshot.tick, "faction eliminated, skipping");
        return Vec::new();
    }

    state.refresh_groups(snapshot, faction);
    let report = detect_threats(&ctx);
    state.threats_near_base = report.threats_near_base;
    state.harvesters_under_attack = report.harvesters_under_attack;
    refresh_intel(&ctx, state);
    discover_enemy_base(&ctx, state);
    track_worker_losses(&ctx, state);
    track_engagement(&ctx, state);

    let band = update_desperation(&ctx, state);
    select_strategy(&ctx, state);
    if state.strategy != Strategy::Defend {
        state.defense_group.clear();
    }
    if state.strategy != Strategy::AllIn {
        state.harvester.conscripted.clear();
    }

    let mut commands = plan_economy(&ctx, state);
    commands.extend(handle_defense(&ctx, state));
    if groups_active(state) {
        commands.extend(coordinate_combat(&ctx, state));
    }
    commands.extend(conscript_workers(&ctx, state));
    commands.extend(manage_harvesters(&ctx, state, band));
    commands.extend(plan_placement(&mut ctx));
    commands.extend(advise_sell(&ctx, state));

    let commands = dedupe_orders(commands);
    trace!(
        %faction,
        tick = snapshot.tick,
        strategy = state.strategy.name(),
        commands = commands.len(),
        "ai tick"
    );
    commands
}

/// Keep the first attack and the first flee order per unit; drop commands
/// left without units.
#[must_use]
pub fn dedupe_orders(commands: Vec<AiCommand>) -> Vec<AiCommand> {
    let mut attacking: BTreeSet<EntityId> = BTreeSet::new();
    let mut fleeing: BTreeSet<EntityId> = BTreeSet::new();
    commands
        .into_iter()
        .filter_map(|mut command| {
            match &mut command {
                AiCommand::Attack { unit_ids, .. } => {
                    unit_ids.retain(|id| attacking.insert(*id));
                    if unit_ids.is_empty() {
                        return None;
                    }
                }
                AiCommand::Move {
                    unit_ids,
                    mode: MoveMode::Flee,
                    ..
                } => {
                    unit_ids.retain(|id| fleeing.insert(*id));
                    if unit_ids.is_empty() {
                        return None;
                    }
                }
                AiCommand::Move { unit_ids, .. } => {
                    if unit_ids.is_empty() {
                        return None;
                    }
                }
                _ => {}
            }
            Some(command)
        })
        .collect()
}

/// Host-side driver for every AI faction.
#[derive(Debug, Clone)]
pub struct AiDirector {
    config: AiConfig,
    rules: RulesTable,
    seed: u64,
    states: AiStateTable,
}

impl AiDirector {
    /// Create a director with empty state.
    #[must_use]
    pub fn new(config: AiConfig, rules: RulesTable, seed: u64) -> Self {
        Self {
            config,
            rules,
            seed,
            states: AiStateTable::new(),
        }
    }

    /// Run every AI-controlled faction on `snapshot`, in faction id order.
    pub fn run_tick(&mut self, snapshot: &WorldSnapshot) -> BTreeMap<FactionId, Vec<AiCommand>> {
        let grid = SpatialGrid::from_snapshot(snapshot);
        let factions: Vec<FactionId> = snapshot
            .factions
            .iter()
            .filter(|(_, eco)| eco.is_ai)
            .map(|(id, _)| *id)
            .collect();

        factions
            .into_iter()
            .map(|faction| {
                let state = self.states.get_or_create(faction);
                let commands = compute_ai_actions(
                    snapshot,
                    &grid,
                    &self.rules,
                    &self.config,
                    faction,
                    state,
                    self.seed,
                );
                (faction, commands)
            })
            .collect()
    }

    /// Run a single faction against a caller-provided spatial index.
    pub fn run_faction(
        &mut self,
        snapshot: &WorldSnapshot,
        spatial: &dyn SpatialQuery,
        faction: FactionId,
    ) -> Vec<AiCommand> {
        let state = self.states.get_or_create(faction);
        compute_ai_actions(snapshot, spatial, &self.rules, &self.config, faction, state, self.seed)
    }

    /// Forget everything about one faction.
    pub fn reset(&mut self, faction: FactionId) {
        self.states.reset(faction);
    }

    /// Forget every faction.
    pub fn reset_all(&mut self) {
        self.states.reset_all();
    }

    /// State of one faction, if it has run.
    #[must_use]
    pub fn state(&self, faction: FactionId) -> Option<&AiState> {
        self.states.get(faction)
    }

    /// All per-faction state.
    #[must_use]
    pub fn states(&self) -> &AiStateTable {
        &self.states
    }

    /// Tunables in use.
    #[must_use]
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Rules in use.
    #[must_use]
    pub fn rules(&self) -> &RulesTable {
        &self.rules
    }

    /// Base seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Difficulty;
    use crate::math::Vec2Fixed;
    use crate::world::{Entity, FactionEconomy, MapBounds};

    const ME: FactionId = FactionId(1);
    const THEM: FactionId = FactionId(2);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn skirmish(tick: u64) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(tick, MapBounds::default());
        snap.factions.insert(ME, FactionEconomy::new(3000, Difficulty::Hard));
        snap.factions.insert(THEM, FactionEconomy::new(3000, Difficulty::Medium));
        snap.insert(Entity::new_building(1, ME, "conyard", pos(400, 400), 1000, 0));
        snap.insert(Entity::new_building(2, THEM, "conyard", pos(3600, 3600), 1000, 0));
        snap.insert(Entity::new_resource(100, "ore", pos(800, 400), 5000));
        snap.insert(Entity::new_resource(101, "ore", pos(3200, 3600), 5000));
        snap
    }

    #[test]
    fn test_unknown_faction_is_noop() {
        let snap = skirmish(0);
        let grid = SpatialGrid::from_snapshot(&snap);
        let mut state = AiState::new();
        let cmds = compute_ai_actions(
            &snap,
            &grid,
            &RulesTable::standard(),
            &AiConfig::default(),
            FactionId(9),
            &mut state,
            0,
        );
        assert!(cmds.is_empty());
    }

    #[test]
    fn test_eliminated_faction_is_noop() {
        let mut snap = skirmish(0);
        snap.factions.insert(FactionId(3), FactionEconomy::new(5000, Difficulty::Hard));
        let grid = SpatialGrid::from_snapshot(&snap);
        let mut state = AiState::new();
        let cmds = compute_ai_actions(
            &snap,
            &grid,
            &RulesTable::standard(),
            &AiConfig::default(),
            FactionId(3),
            &mut state,
            0,
        );
        assert!(cmds.is_empty());
    }

    #[test]
    fn test_director_runs_ai_factions_in_order() {
        let mut snap = skirmish(0);
        if let Some(eco) = snap.factions.get_mut(&THEM) {
            eco.is_ai = false;
        }
        let mut director = AiDirector::new(AiConfig::default(), RulesTable::standard(), 1);
        let out = director.run_tick(&snap);
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![ME]);
        assert!(director.state(ME).is_some());
        assert!(director.state(THEM).is_none());
    }

    #[test]
    fn test_director_reset() {
        let snap = skirmish(0);
        let mut director = AiDirector::new(AiConfig::default(), RulesTable::standard(), 1);
        director.run_tick(&snap);
        assert_eq!(director.states().len(), 2);
        director.reset(ME);
        assert!(director.state(ME).is_none());
        director.reset_all();
        assert!(director.states().is_empty());
    }

    #[test]
    fn test_same_inputs_same_outputs() {
        let snap = skirmish(400);
        let mut a = AiDirector::new(AiConfig::default(), RulesTable::standard(), 9);
        let mut b = AiDirector::new(AiConfig::default(), RulesTable::standard(), 9);
        assert_eq!(a.run_tick(&snap), b.run_tick(&snap));
        assert_eq!(a.state(ME), b.state(ME));
    }

    #[test]
    fn test_dedupe_keeps_first_attack_per_unit() {
        let cmds = vec![
            AiCommand::Attack { unit_ids: vec![1, 2], target: 50 },
            AiCommand::Attack { unit_ids: vec![2, 3], target: 51 },
            AiCommand::Attack { unit_ids: vec![1], target: 52 },
            AiCommand::move_unit(4, pos(0, 0), MoveMode::Flee),
            AiCommand::move_unit(4, pos(9, 9), MoveMode::Flee),
        ];
        assert_eq!(
            dedupe_orders(cmds),
            vec![
                AiCommand::Attack { unit_ids: vec![1, 2], target: 50 },
                AiCommand::Attack { unit_ids: vec![3], target: 51 },
                AiCommand::move_unit(4, pos(0, 0), MoveMode::Flee),
            ]
        );
    }
}
