//! Test fixtures and helpers.
//!
//! [`WorldBuilder`] assembles snapshots with auto-assigned ids so tests can
//! describe a situation in a few lines, and [`run_ai`] runs one faction
//! against it with the standard rules and default tunables.

use fixed::types::I32F32;
use rts_ai::command::AiCommand;
use rts_ai::config::{AiConfig, Difficulty};
use rts_ai::engine::compute_ai_actions;
use rts_ai::factions::FactionId;
use rts_ai::math::Vec2Fixed;
use rts_ai::rules::RulesTable;
use rts_ai::spatial::SpatialGrid;
use rts_ai::state::AiState;
use rts_ai::world::{BuildingState, Entity, EntityId, FactionEconomy, MapBounds, UnitState, WorldSnapshot};

/// Default health for units placed by the builder.
pub const UNIT_HP: u32 = 100;
/// Default health for buildings placed by the builder.
pub const BUILDING_HP: u32 = 1000;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real decision code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Position from whole world units.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_units(x, y)
}

/// Fluent snapshot builder.
///
/// Ids are handed out in insertion order starting at 1, so the id of every
/// entity is predictable from the order of the builder calls.
#[derive(Debug, Clone)]
pub struct WorldBuilder {
    snapshot: WorldSnapshot,
    next_id: EntityId,
}

impl WorldBuilder {
    /// Empty world at `tick` on the default map.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            snapshot: WorldSnapshot::new(tick, MapBounds::default()),
            next_id: 1,
        }
    }

    /// Use a different map size.
    #[must_use]
    pub fn map(mut self, width: i32, height: i32) -> Self {
        self.snapshot.map = MapBounds::new(width, height);
        self
    }

    /// Id the next added entity will get.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Add an AI faction.
    #[must_use]
    pub fn ai_faction(mut self, faction: FactionId, credits: i32, difficulty: Difficulty) -> Self {
        self.snapshot
            .factions
            .insert(faction, FactionEconomy::new(credits, difficulty));
        self
    }

    /// Add a human-controlled faction.
    #[must_use]
    pub fn human_faction(mut self, faction: FactionId, credits: i32) -> Self {
        let mut economy = FactionEconomy::new(credits, Difficulty::Medium);
        economy.is_ai = false;
        self.snapshot.factions.insert(faction, economy);
        self
    }

    /// Mark a building as waiting to be placed.
    #[must_use]
    pub fn ready_to_place(mut self, faction: FactionId, key: &str) -> Self {
        if let Some(eco) = self.snapshot.factions.get_mut(&faction) {
            eco.ready_to_place = Some(key.to_string());
        }
        self
    }

    /// Adjust a faction's economy in place.
    #[must_use]
    pub fn economy(mut self, faction: FactionId, edit: impl FnOnce(&mut FactionEconomy)) -> Self {
        if let Some(eco) = self.snapshot.factions.get_mut(&faction) {
            edit(eco);
        }
        self
    }

    fn take_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a pre-built entity, keeping its id.
    #[must_use]
    pub fn entity(mut self, entity: Entity) -> Self {
        self.next_id = self.next_id.max(entity.id + 1);
        self.snapshot.insert(entity);
        self
    }

    /// Completed building built at tick 0.
    #[must_use]
    pub fn building(self, owner: FactionId, key: &str, x: i32, y: i32) -> Self {
        self.building_built_at(owner, key, x, y, 0)
    }

    /// Completed building finished at `built_tick`.
    #[must_use]
    pub fn building_built_at(mut self, owner: FactionId, key: &str, x: i32, y: i32, built_tick: u64) -> Self {
        let id = self.take_id();
        self.snapshot
            .insert(Entity::new_building(id, owner, key, pos(x, y), BUILDING_HP, built_tick));
        self
    }

    /// Building still under construction.
    #[must_use]
    pub fn construction_site(mut self, owner: FactionId, key: &str, x: i32, y: i32) -> Self {
        let id = self.take_id();
        let mut entity = Entity::new_building(id, owner, key, pos(x, y), BUILDING_HP, self.snapshot.tick);
        entity.building = Some(BuildingState {
            built_tick: self.snapshot.tick,
            under_construction: true,
        });
        self.snapshot.insert(entity);
        self
    }

    /// Idle unit at full health.
    #[must_use]
    pub fn unit(self, owner: FactionId, key: &str, x: i32, y: i32) -> Self {
        self.unit_with(owner, key, x, y, |_| {})
    }

    /// Unit whose state is adjusted by `edit`.
    #[must_use]
    pub fn unit_with(
        mut self,
        owner: FactionId,
        key: &str,
        x: i32,
        y: i32,
        edit: impl FnOnce(&mut UnitState),
    ) -> Self {
        let id = self.take_id();
        let mut state = UnitState::default();
        edit(&mut state);
        self.snapshot
            .insert(Entity::new_unit(id, owner, key, pos(x, y), UNIT_HP).with_unit_state(state));
        self
    }

    /// `count` idle units in a row along x, `spacing` apart.
    #[must_use]
    pub fn squad(mut self, owner: FactionId, key: &str, count: usize, x: i32, y: i32, spacing: i32) -> Self {
        let mut offset = 0;
        for _ in 0..count {
            self = self.unit(owner, key, x + offset, y);
            offset += spacing;
        }
        self
    }

    /// Resource node.
    #[must_use]
    pub fn resource(mut self, x: i32, y: i32, amount: i32) -> Self {
        let id = self.take_id();
        self.snapshot.insert(Entity::new_resource(id, "ore", pos(x, y), amount));
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> WorldSnapshot {
        self.snapshot
    }
}

/// Two-faction skirmish: an AI base in the north-west and an enemy base in
/// the south-east, each with a refinery, a few workers and a small army.
#[must_use]
pub fn skirmish(tick: u64, difficulty: Difficulty) -> WorldSnapshot {
    let me = FactionId::new(1);
    let them = FactionId::new(2);
    WorldBuilder::new(tick)
        .ai_faction(me, 2500, difficulty)
        .ai_faction(them, 2500, Difficulty::Medium)
        .building(me, "conyard", 400, 400)
        .building(me, "power", 520, 400)
        .building(me, "refinery", 400, 560)
        .building(me, "barracks", 560, 560)
        .building(me, "factory", 680, 400)
        .building(them, "conyard", 3600, 3600)
        .building(them, "power", 3480, 3600)
        .building(them, "refinery", 3600, 3440)
        .building(them, "barracks", 3440, 3440)
        .resource(700, 800, 8000)
        .resource(900, 600, 8000)
        .resource(3300, 3200, 8000)
        .resource(2000, 2000, 12000)
        .squad(me, "harvester", 3, 450, 650, 40)
        .squad(me, "rifle", 4, 600, 700, 30)
        .squad(me, "light_tank", 2, 700, 700, 40)
        .squad(them, "harvester", 2, 3500, 3300, 40)
        .squad(them, "rifle", 5, 3300, 3400, 30)
        .build()
}

/// Run one faction with the standard rules and default tunables.
pub fn run_ai(snapshot: &WorldSnapshot, faction: FactionId, state: &mut AiState, seed: u64) -> Vec<AiCommand> {
    run_ai_with(snapshot, faction, state, seed, &AiConfig::default())
}

/// Run one faction with the standard rules and custom tunables.
pub fn run_ai_with(
    snapshot: &WorldSnapshot,
    faction: FactionId,
    state: &mut AiState,
    seed: u64,
    config: &AiConfig,
) -> Vec<AiCommand> {
    let grid = SpatialGrid::from_snapshot(snapshot);
    compute_ai_actions(snapshot, &grid, &RulesTable::standard(), config, faction, state, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_sequential_ids() {
        let me = FactionId::new(1);
        let world = WorldBuilder::new(0)
            .ai_faction(me, 100, Difficulty::Easy)
            .building(me, "conyard", 100, 100)
            .unit(me, "rifle", 200, 200)
            .resource(300, 300, 50)
            .build();
        assert_eq!(world.get(1).map(|e| e.key.as_str()), Some("conyard"));
        assert_eq!(world.get(2).map(|e| e.key.as_str()), Some("rifle"));
        assert!(world.get(3).is_some_and(Entity::is_live_resource));
    }

    #[test]
    fn test_entity_keeps_its_id() {
        let me = FactionId::new(1);
        let builder = WorldBuilder::new(0).entity(Entity::new_unit(40, me, "rifle", pos(0, 0), 10));
        assert_eq!(builder.next_id(), 41);
    }

    #[test]
    fn test_human_faction_not_ai() {
        let world = WorldBuilder::new(0).human_faction(FactionId::new(3), 0).build();
        assert!(world.factions.values().all(|e| !e.is_ai));
    }

    #[test]
    fn test_construction_site_incomplete() {
        let me = FactionId::new(1);
        let world = WorldBuilder::new(50)
            .ai_faction(me, 0, Difficulty::Hard)
            .construction_site(me, "power", 0, 0)
            .build();
        assert!(world.get(1).is_some_and(|e| !e.is_complete()));
    }

    #[test]
    fn test_skirmish_holds_buildup_during_cooldown() {
        let world = skirmish(100, Difficulty::Hard);
        let mut state = AiState::new();
        let _ = run_ai(&world, FactionId::new(1), &mut state, 7);
        assert_eq!(state.strategy, rts_ai::state::Strategy::Buildup);
    }
}
