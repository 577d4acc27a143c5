//! Headless scenario runner.
//!
//! Drives an [`AiDirector`] over a scripted world. There is no movement or
//! combat simulation: scripted events stand in for the world changing, and a
//! small intent reducer books production, placement and sales so the AI sees
//! the consequences of its economic decisions.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rts_ai::command::AiCommand;
use rts_ai::config::AiConfig;
use rts_ai::engine::AiDirector;
use rts_ai::factions::FactionId;
use rts_ai::math::Vec2Fixed;
use rts_ai::rules::{BuildingRole, ProductionCategory, RulesTable};
use rts_ai::state::Strategy;
use rts_ai::world::{Entity, EntityId, WorldSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::protocol::Response;
use crate::scenario::{Scenario, ScriptedEvent};

/// Health given to produced units.
const PRODUCED_UNIT_HP: u32 = 100;
/// Offset from the producing building where new units appear.
const SPAWN_OFFSET: i32 = 80;
/// Percentage of cost refunded on sale.
const SELL_REFUND_PERCENT: i32 = 50;

/// Per-faction tallies for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionSummary {
    /// Commands issued.
    pub commands: u64,
    /// Strategy switches observed.
    pub strategy_changes: u32,
    /// Strategy at the end of the run.
    pub final_strategy: Strategy,
    /// Desperation at the end of the run.
    pub final_desperation: u8,
    /// Credits at the end of the run.
    pub final_credits: i32,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Base seed.
    pub seed: u64,
    /// Ticks run.
    pub ticks: u64,
    /// Commands across all factions.
    pub total_commands: u64,
    /// Final command-stream hash.
    pub hash: u64,
    /// Per-faction tallies keyed by faction id.
    pub factions: BTreeMap<u8, FactionSummary>,
}

/// Steps a scenario tick by tick.
pub struct ScenarioRunner {
    scenario_name: String,
    snapshot: WorldSnapshot,
    director: AiDirector,
    events: Vec<ScriptedEvent>,
    next_event: usize,
    hash: u64,
    ticks_run: u64,
    summaries: BTreeMap<u8, FactionSummary>,
}

impl ScenarioRunner {
    /// Build the initial world from `scenario`.
    #[must_use]
    pub fn new(scenario: &Scenario, config: AiConfig, rules: RulesTable, seed: u64) -> Self {
        let mut events = scenario.events.clone();
        // Stable sort keeps same-tick events in script order.
        events.sort_by_key(|e| e.tick);
        Self {
            scenario_name: scenario.name.clone(),
            snapshot: scenario.build_snapshot(),
            director: AiDirector::new(config, rules, seed),
            events,
            next_event: 0,
            hash: 0,
            ticks_run: 0,
            summaries: BTreeMap::new(),
        }
    }

    /// Current world.
    #[must_use]
    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.snapshot
    }

    /// The director driving the AI factions.
    #[must_use]
    pub fn director(&self) -> &AiDirector {
        &self.director
    }

    /// Running hash of every command issued so far.
    #[must_use]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Message announcing the run.
    #[must_use]
    pub fn ready(&self) -> Response {
        Response::Ready {
            version: env!("CARGO_PKG_VERSION").to_string(),
            scenario: self.scenario_name.clone(),
            seed: self.director.seed(),
            tick: self.snapshot.tick,
        }
    }

    /// Advance one tick: apply due events, run every AI faction, book the
    /// resulting intents, then move the clock. Returns the messages the tick
    /// produced.
    pub fn step(&mut self) -> Vec<Response> {
        let tick = self.snapshot.tick;
        self.complete_production();
        self.apply_due_events(tick);

        let before: BTreeMap<FactionId, Strategy> = self
            .director
            .states()
            .iter()
            .map(|(f, s)| (*f, s.strategy))
            .collect();

        let orders = self.director.run_tick(&self.snapshot);
        let mut responses = Vec::new();

        for (faction, commands) in orders {
            self.hash = fold_hash(self.hash, tick, faction, &commands);
            let summary = self.summaries.entry(faction.index()).or_default();
            summary.commands += commands.len() as u64;

            if let Some(state) = self.director.state(faction) {
                let from = before.get(&faction).copied().unwrap_or_default();
                if from != state.strategy {
                    summary.strategy_changes += 1;
                    debug!(faction = %faction, tick, from = from.name(), to = state.strategy.name(), "Strategy changed");
                    responses.push(Response::Strategy {
                        tick,
                        faction: faction.index(),
                        from,
                        to: state.strategy,
                        desperation: state.desperation_score,
                    });
                }
            }

            self.reduce(faction, &commands);
            if !commands.is_empty() {
                responses.push(Response::Commands {
                    tick,
                    faction: faction.index(),
                    commands,
                });
            }
        }

        self.snapshot.tick += 1;
        self.ticks_run += 1;
        responses
    }

    /// Run `ticks` ticks, handing every message to `sink`.
    pub fn run<F>(&mut self, ticks: u64, mut sink: F) -> RunSummary
    where
        F: FnMut(&Response),
    {
        sink(&self.ready());
        for _ in 0..ticks {
            for response in self.step() {
                sink(&response);
            }
        }
        let summary = self.summary();
        sink(&Response::Summary {
            ticks: summary.ticks,
            commands: summary.total_commands,
            hash: summary.hash,
        });
        info!(
            scenario = %summary.scenario,
            seed = summary.seed,
            ticks = summary.ticks,
            commands = summary.total_commands,
            hash = summary.hash,
            "Run complete"
        );
        summary
    }

    /// Tallies so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut factions = self.summaries.clone();
        for (id, summary) in &mut factions {
            let faction = FactionId::new(*id);
            if let Some(state) = self.director.state(faction) {
                summary.final_strategy = state.strategy;
                summary.final_desperation = state.desperation_score;
            }
            if let Some(eco) = self.snapshot.economy(faction) {
                summary.final_credits = eco.credits;
            }
        }
        RunSummary {
            scenario: self.scenario_name.clone(),
            seed: self.director.seed(),
            ticks: self.ticks_run,
            total_commands: factions.values().map(|f| f.commands).sum(),
            hash: self.hash,
            factions,
        }
    }

    fn apply_due_events(&mut self, tick: u64) {
        while let Some(event) = self.events.get(self.next_event) {
            if event.tick > tick {
                break;
            }
            debug!(tick, event = ?event.action, "Applying scripted event");
            event.action.apply(&mut self.snapshot);
            self.next_event += 1;
        }
    }

    /// Finish whatever was queued last tick. Buildings wait for placement;
    /// units appear next to a production building.
    fn complete_production(&mut self) {
        let factions: Vec<FactionId> = self.snapshot.factions.keys().copied().collect();
        for faction in factions {
            for category in [
                ProductionCategory::Building,
                ProductionCategory::Infantry,
                ProductionCategory::Vehicle,
            ] {
                let Some(eco) = self.snapshot.factions.get_mut(&faction) else {
                    continue;
                };
                let slot = eco.queues.slot_mut(category);
                let Some(key) = slot.clone() else {
                    continue;
                };
                if category == ProductionCategory::Building {
                    if eco.ready_to_place.is_none() {
                        *slot = None;
                        eco.ready_to_place = Some(key);
                    }
                    continue;
                }
                *slot = None;
                if let Some(at) = self.spawn_point(faction) {
                    let id = self.next_entity_id();
                    self.snapshot
                        .insert(Entity::new_unit(id, faction, key.as_str(), at, PRODUCED_UNIT_HP));
                }
            }
        }
    }

    fn spawn_point(&self, faction: FactionId) -> Option<Vec2Fixed> {
        let rules = self.director.rules();
        let owned: Vec<&Entity> = self
            .snapshot
            .owned_by(faction)
            .filter(|e| e.is_building() && e.is_complete())
            .collect();
        let producer = owned
            .iter()
            .find(|e| rules.building_role(&e.key) == Some(BuildingRole::Production))
            .or_else(|| owned.first())?;
        Some(producer.position + Vec2Fixed::from_units(SPAWN_OFFSET, SPAWN_OFFSET))
    }

    fn next_entity_id(&self) -> EntityId {
        self.snapshot.entities.keys().next_back().map_or(1, |id| id + 1)
    }

    /// Book the side effects of `commands` on the world.
    fn reduce(&mut self, faction: FactionId, commands: &[AiCommand]) {
        let tick = self.snapshot.tick;
        for command in commands {
            match command {
                AiCommand::StartProduction { category, key } => {
                    let cost = self.director.rules().cost_of(key).unwrap_or(0);
                    if let Some(eco) = self.snapshot.factions.get_mut(&faction) {
                        let slot = eco.queues.slot_mut(*category);
                        if slot.is_none() && eco.credits >= cost {
                            eco.credits -= cost;
                            *slot = Some(key.clone());
                        }
                    }
                }
                AiCommand::CancelProduction { category } => {
                    if let Some(eco) = self.snapshot.factions.get_mut(&faction) {
                        if let Some(key) = eco.queues.slot_mut(*category).take() {
                            eco.credits += self.director.rules().cost_of(&key).unwrap_or(0);
                        }
                    }
                }
                AiCommand::PlaceBuilding { key, position } => {
                    let ready = self
                        .snapshot
                        .economy(faction)
                        .and_then(|eco| eco.ready_to_place.as_deref())
                        == Some(key.as_str());
                    if ready {
                        let id = self.next_entity_id();
                        self.snapshot.insert(Entity::new_building(
                            id,
                            faction,
                            key.as_str(),
                            *position,
                            crate::scenario::BUILDING_HP,
                            tick,
                        ));
                        if let Some(eco) = self.snapshot.factions.get_mut(&faction) {
                            eco.ready_to_place = None;
                        }
                    }
                }
                AiCommand::SellBuilding { building } => {
                    let refund = match self.snapshot.entities.get_mut(building) {
                        Some(entity) if entity.is_owned_by(faction) && !entity.dead => {
                            entity.dead = true;
                            self.director.rules().cost_of(&entity.key).unwrap_or(0) * SELL_REFUND_PERCENT / 100
                        }
                        _ => 0,
                    };
                    if let Some(eco) = self.snapshot.factions.get_mut(&faction) {
                        eco.credits += refund;
                    }
                }
                AiCommand::Move { unit_ids, target, .. } => {
                    for id in unit_ids {
                        if let Some(unit) = self.snapshot.entities.get_mut(id).and_then(|e| e.unit.as_mut()) {
                            unit.move_target = Some(*target);
                            unit.combat_target = None;
                        }
                    }
                }
                AiCommand::Attack { unit_ids, target } => {
                    for id in unit_ids {
                        if let Some(unit) = self.snapshot.entities.get_mut(id).and_then(|e| e.unit.as_mut()) {
                            unit.combat_target = Some(*target);
                        }
                    }
                }
            }
        }
    }
}

/// Fold one faction's batch into the running hash.
fn fold_hash(prev: u64, tick: u64, faction: FactionId, commands: &[AiCommand]) -> u64 {
    let mut hasher = DefaultHasher::new();
    prev.hash(&mut hasher);
    tick.hash(&mut hasher);
    faction.hash(&mut hasher);
    commands.hash(&mut hasher);
    hasher.finish()
}

/// Run `scenario` for `ticks` ticks and return only the summary.
#[must_use]
pub fn run_scenario(scenario: &Scenario, config: AiConfig, rules: RulesTable, seed: u64, ticks: u64) -> RunSummary {
    let mut runner = ScenarioRunner::new(scenario, config, rules, seed);
    runner.run(ticks, |_| {})
}
