//! Per-faction persistent AI memory.
//!
//! The world snapshot carries no AI memory, so everything the AI needs to
//! remember between ticks lives in an [`AiState`]. The host owns one
//! [`AiStateTable`] and lends a single faction's state to each invocation;
//! nothing here is global.
//!
//! Groups store entity ids only. Every invocation re-resolves them against
//! the current snapshot and drops ids that died or changed hands.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::factions::FactionId;
use crate::harvester::stuck::StuckLevel;
use crate::math::Vec2Fixed;
use crate::rules::ArmorClass;
use crate::world::{EntityId, WorldSnapshot};

/// Faction-level macro mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Strategy {
    /// Grow the economy and army.
    #[default]
    Buildup,
    /// Raid with a small fast group.
    Harass,
    /// Push the main army at the enemy.
    Attack,
    /// Respond to enemies at the base.
    Defend,
    /// Throw everything at the enemy.
    AllIn,
}

impl Strategy {
    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Buildup => "buildup",
            Self::Harass => "harass",
            Self::Attack => "attack",
            Self::Defend => "defend",
            Self::AllIn => "all_in",
        }
    }

    /// Whether the combat coordinator drives groups in this mode.
    #[must_use]
    pub const fn is_offensive(self) -> bool {
        matches!(self, Self::Harass | Self::Attack | Self::AllIn)
    }
}

/// Per-worker risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum RiskRole {
    /// Avoids anything dangerous.
    Safe,
    /// Default behaviour.
    #[default]
    Standard,
    /// Accepts moderate danger for better nodes.
    Opportunist,
    /// Accepts high danger; used when the economy is failing.
    RiskTaker,
}

/// What the AI has seen of the enemy army.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnemyIntel {
    /// Count of each enemy unit key.
    pub unit_counts: BTreeMap<String, u32>,
    /// Most common armor class among enemy units.
    pub dominant_armor: Option<ArmorClass>,
    /// Tick of the last refresh.
    pub last_update: Option<u64>,
}

/// Grid cell key of the danger map.
pub type ZoneKey = (i32, i32);

/// Danger recorded for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DangerZone {
    /// Danger at `last_update`.
    pub value: i32,
    /// Tick the value was last reinforced.
    pub last_update: u64,
}

impl DangerZone {
    /// Value after linear decay up to `now`.
    #[must_use]
    pub fn decayed(&self, now: u64, decay_per_100: i32) -> i32 {
        let elapsed = i64::try_from(now.saturating_sub(self.last_update)).unwrap_or(i64::MAX);
        let lost = elapsed.saturating_mul(i64::from(decay_per_100)) / 100;
        let remaining = i64::from(self.value).saturating_sub(lost).max(0);
        i32::try_from(remaining).unwrap_or(i32::MAX)
    }
}

/// Stuck bookkeeping for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckState {
    /// First tick the worker was seen stuck in the current episode.
    pub since: u64,
    /// Consecutive invocations the worker has been seen stuck.
    pub consecutive: u32,
    /// Tick of the last recovery command.
    pub last_recovery_tick: Option<u64>,
    /// Level of the last recovery command.
    pub last_level: Option<StuckLevel>,
}

/// A remembered worker death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvesterDeath {
    /// Last known position.
    pub position: Vec2Fixed,
    /// Tick the death was noticed.
    pub tick: u64,
    /// Danger map cell of the position.
    pub zone: ZoneKey,
}

/// Worker-management memory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HarvesterAiState {
    /// Danger per grid cell.
    pub danger_map: BTreeMap<ZoneKey, DangerZone>,
    /// Risk role per worker.
    pub roles: BTreeMap<EntityId, RiskRole>,
    /// Workers claiming each resource node.
    pub ore_claims: BTreeMap<EntityId, Vec<EntityId>>,
    /// Workers queued at each depot.
    pub refinery_queue: BTreeMap<EntityId, Vec<EntityId>>,
    /// Resource nodes avoided until the given tick (exclusive).
    pub blacklisted_ore: BTreeMap<EntityId, u64>,
    /// Stuck bookkeeping per worker.
    pub stuck_states: BTreeMap<EntityId, StuckState>,
    /// First tick each worker was seen idle at a depot.
    pub depot_idle_since: BTreeMap<EntityId, u64>,
    /// Recent worker deaths.
    pub deaths: Vec<HarvesterDeath>,
    /// Last seen position of each own worker.
    pub last_known: BTreeMap<EntityId, Vec2Fixed>,
    /// Tick of the last fleet pass.
    pub last_fleet_tick: Option<u64>,
    /// Round-robin cursor for spreading flee destinations.
    pub flee_rotation: usize,
    /// Workers sent on suicide attacks.
    pub conscripted: BTreeSet<EntityId>,
}

impl HarvesterAiState {
    /// Avoid `ore` for `duration` ticks from `now`. Never shortens an existing entry.
    pub fn blacklist(&mut self, ore: EntityId, now: u64, duration: u64) {
        let until = now.saturating_add(duration);
        let entry = self.blacklisted_ore.entry(ore).or_insert(until);
        *entry = (*entry).max(until);
    }

    /// Whether `ore` is avoided at `now`.
    #[must_use]
    pub fn is_blacklisted(&self, ore: EntityId, now: u64) -> bool {
        self.blacklisted_ore.get(&ore).is_some_and(|until| now < *until)
    }

    /// Effective danger of a cell at `now`.
    #[must_use]
    pub fn danger_at(&self, zone: ZoneKey, now: u64, decay_per_100: i32) -> i32 {
        self.danger_map
            .get(&zone)
            .map_or(0, |z| z.decayed(now, decay_per_100))
    }

    /// Add danger to a cell, decaying the old value first.
    pub fn add_danger(&mut self, zone: ZoneKey, amount: i32, now: u64, decay_per_100: i32) {
        let current = self.danger_at(zone, now, decay_per_100);
        self.danger_map.insert(
            zone,
            DangerZone {
                value: current.saturating_add(amount),
                last_update: now,
            },
        );
    }

    /// Raise a cell to at least `floor`. Never lowers it.
    pub fn raise_danger(&mut self, zone: ZoneKey, floor: i32, now: u64, decay_per_100: i32) {
        if self.danger_at(zone, now, decay_per_100) < floor {
            self.danger_map.insert(
                zone,
                DangerZone {
                    value: floor,
                    last_update: now,
                },
            );
        }
    }

    /// Drop expired blacklist entries, danger cells and death records.
    pub fn purge_expired(&mut self, now: u64, danger_memory: u64, death_memory: u64, decay_per_100: i32) {
        self.blacklisted_ore.retain(|_, until| now < *until);
        self.danger_map.retain(|_, zone| {
            now.saturating_sub(zone.last_update) <= danger_memory
                && zone.decayed(now, decay_per_100) > 0
        });
        self.deaths
            .retain(|death| now.saturating_sub(death.tick) <= death_memory);
    }

    /// Forget a worker everywhere it may be referenced.
    pub fn forget_worker(&mut self, worker: EntityId) {
        self.roles.remove(&worker);
        self.stuck_states.remove(&worker);
        self.depot_idle_since.remove(&worker);
        self.last_known.remove(&worker);
        self.conscripted.remove(&worker);
        for claims in self.ore_claims.values_mut() {
            claims.retain(|id| *id != worker);
        }
        for queue in self.refinery_queue.values_mut() {
            queue.retain(|id| *id != worker);
        }
    }
}

/// Everything the AI remembers about one faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiState {
    /// Current macro mode.
    pub strategy: Strategy,
    /// Tick of the last non-defend strategy change.
    pub last_strategy_change: u64,
    /// Units committed to the main attack.
    pub attack_group: BTreeSet<EntityId>,
    /// Units committed to harassment.
    pub harass_group: BTreeSet<EntityId>,
    /// Units committed to base defense.
    pub defense_group: BTreeSet<EntityId>,
    /// Enemies near the base this tick.
    pub threats_near_base: Vec<EntityId>,
    /// Own workers under attack this tick.
    pub harvesters_under_attack: Vec<EntityId>,
    /// Last known enemy production center; never cleared.
    pub enemy_base_location: Option<Vec2Fixed>,
    /// Economic desperation, 0-100.
    pub desperation_score: u8,
    /// Observed enemy composition.
    pub enemy_intel: EnemyIntel,
    /// Tick of the last building sale.
    pub last_sell_tick: Option<u64>,
    /// Start of the current run of high desperation.
    pub high_desperation_since: Option<u64>,
    /// Last tick any own unit was fighting.
    pub last_combat_tick: Option<u64>,
    /// Worker-management memory.
    pub harvester: HarvesterAiState,
}

impl Default for AiState {
    fn default() -> Self {
        Self::new()
    }
}

impl AiState {
    /// Fresh state in buildup.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategy: Strategy::Buildup,
            last_strategy_change: 0,
            attack_group: BTreeSet::new(),
            harass_group: BTreeSet::new(),
            defense_group: BTreeSet::new(),
            threats_near_base: Vec::new(),
            harvesters_under_attack: Vec::new(),
            enemy_base_location: None,
            desperation_score: 0,
            enemy_intel: EnemyIntel::default(),
            last_sell_tick: None,
            high_desperation_since: None,
            last_combat_tick: None,
            harvester: HarvesterAiState::default(),
        }
    }

    /// Whether `cooldown` ticks have passed since the last strategy change.
    #[must_use]
    pub fn cooldown_elapsed(&self, now: u64, cooldown: u64) -> bool {
        now.saturating_sub(self.last_strategy_change) >= cooldown
    }

    /// Switch strategy. Returns whether it changed.
    ///
    /// Entering defend leaves `last_strategy_change` alone, so the cooldown
    /// keeps counting from the last deliberate change.
    pub fn set_strategy(&mut self, strategy: Strategy, now: u64) -> bool {
        if self.strategy == strategy {
            return false;
        }
        self.strategy = strategy;
        if strategy != Strategy::Defend {
            self.last_strategy_change = self.last_strategy_change.max(now);
        }
        true
    }

    /// Drop group members that died or are no longer ours.
    pub fn refresh_groups(&mut self, snapshot: &WorldSnapshot, faction: FactionId) {
        let keep = |id: &EntityId| {
            snapshot
                .get_alive(*id)
                .is_some_and(|e| e.is_owned_by(faction) && e.is_unit())
        };
        self.attack_group.retain(|id| keep(id));
        self.harass_group.retain(|id| keep(id));
        self.defense_group.retain(|id| keep(id));
    }
}

/// AI state for every faction, owned by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiStateTable {
    states: BTreeMap<FactionId, AiState>,
}

impl AiStateTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `faction`, created on first use.
    pub fn get_or_create(&mut self, faction: FactionId) -> &mut AiState {
        self.states.entry(faction).or_default()
    }

    /// State for `faction`, if any.
    #[must_use]
    pub fn get(&self, faction: FactionId) -> Option<&AiState> {
        self.states.get(&faction)
    }

    /// Forget one faction (match restart).
    pub fn reset(&mut self, faction: FactionId) {
        self.states.remove(&faction);
    }

    /// Forget every faction.
    pub fn reset_all(&mut self) {
        self.states.clear();
    }

    /// Number of tracked factions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no faction is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Every tracked state, in faction order.
    pub fn iter(&self) -> impl Iterator<Item = (&FactionId, &AiState)> {
        self.states.iter()
    }

    /// Mutable access to every tracked state, in faction order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&FactionId, &mut AiState)> {
        self.states.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Entity, MapBounds};

    #[test]
    fn test_blacklist_round_trip() {
        let mut h = HarvesterAiState::default();
        h.blacklist(7, 100, 50);
        assert!(h.is_blacklisted(7, 149));
        assert!(!h.is_blacklisted(7, 150));
    }

    #[test]
    fn test_blacklist_never_shortens() {
        let mut h = HarvesterAiState::default();
        h.blacklist(7, 100, 200);
        h.blacklist(7, 110, 10);
        assert!(h.is_blacklisted(7, 250));
    }

    #[test]
    fn test_purge_expired_blacklist() {
        let mut h = HarvesterAiState::default();
        h.blacklist(1, 0, 10);
        h.blacklist(2, 0, 100);
        h.purge_expired(10, 1000, 1000, 0);
        assert!(!h.blacklisted_ore.contains_key(&1));
        assert!(h.blacklisted_ore.contains_key(&2));
    }

    #[test]
    fn test_danger_decays_and_purges() {
        let mut h = HarvesterAiState::default();
        h.add_danger((0, 0), 50, 0, 10);
        assert_eq!(h.danger_at((0, 0), 100, 10), 40);
        h.add_danger((0, 0), 5, 100, 10);
        assert_eq!(h.danger_at((0, 0), 100, 10), 45);
        h.purge_expired(10_000, 900, 900, 10);
        assert!(h.danger_map.is_empty());
    }

    #[test]
    fn test_defend_does_not_advance_cooldown_clock() {
        let mut state = AiState::new();
        state.set_strategy(Strategy::Harass, 400);
        assert!(state.set_strategy(Strategy::Defend, 500));
        assert_eq!(state.last_strategy_change, 400);
        assert!(state.set_strategy(Strategy::Buildup, 800));
        assert_eq!(state.last_strategy_change, 800);
    }

    #[test]
    fn test_last_change_only_moves_forward() {
        let mut state = AiState::new();
        state.set_strategy(Strategy::Attack, 500);
        state.set_strategy(Strategy::Buildup, 300);
        assert_eq!(state.last_strategy_change, 500);
    }

    #[test]
    fn test_refresh_groups_drops_dead_and_foreign() {
        let me = FactionId(1);
        let mut snap = WorldSnapshot::new(0, MapBounds::default());
        snap.insert(Entity::new_unit(1, me, "rifle", Vec2Fixed::ZERO, 10));
        snap.insert(Entity::new_unit(2, me, "rifle", Vec2Fixed::ZERO, 10).with_health(0));
        snap.insert(Entity::new_unit(3, FactionId(2), "rifle", Vec2Fixed::ZERO, 10));

        let mut state = AiState::new();
        state.attack_group.extend([1, 2, 3, 4]);
        state.refresh_groups(&snap, me);
        assert_eq!(state.attack_group.iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_state_table_lazy_create_and_reset() {
        let mut table = AiStateTable::new();
        assert!(table.get(FactionId(1)).is_none());
        assert_eq!(table.get_or_create(FactionId(1)).strategy, Strategy::Buildup);
        table.get_or_create(FactionId(2)).strategy = Strategy::Attack;
        table.reset(FactionId(2));
        assert_eq!(table.len(), 1);
        table.reset_all();
        assert!(table.is_empty());
    }

    #[test]
    fn test_forget_worker_clears_claims() {
        let mut h = HarvesterAiState::default();
        h.ore_claims.insert(10, vec![1, 2]);
        h.refinery_queue.insert(20, vec![1]);
        h.roles.insert(1, RiskRole::Safe);
        h.forget_worker(1);
        assert_eq!(h.ore_claims[&10], vec![2]);
        assert!(h.refinery_queue[&20].is_empty());
        assert!(!h.roles.contains_key(&1));
    }
}
