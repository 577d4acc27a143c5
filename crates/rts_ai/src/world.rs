//! Immutable world snapshot consumed by the AI.
//!
//! The simulation host builds one [`WorldSnapshot`] per tick and hands it to
//! every AI faction. Nothing in this crate mutates it; all AI memory lives in
//! [`crate::state::AiState`].
//!
//! Entities are stored in a `BTreeMap` so every scan walks them in ascending
//! id order, which keeps decisions reproducible across hosts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Difficulty;
use crate::factions::FactionId;
use crate::math::{Fixed, Vec2Fixed};
use crate::rules::ProductionCategory;

/// Unique identifier for entities.
pub type EntityId = u64;

/// Broad entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Mobile unit.
    Unit,
    /// Static structure.
    Building,
    /// Harvestable resource node.
    Resource,
}

/// Health of a damageable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if health is depleted.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            (self.current.min(self.max) * 100) / self.max
        }
    }

    /// Fraction of health missing, in `[0, 1]`.
    #[must_use]
    pub fn missing_fraction(&self) -> Fixed {
        if self.max == 0 {
            return Fixed::ZERO;
        }
        let missing = self.max.saturating_sub(self.current);
        Fixed::from_num(missing) / Fixed::from_num(self.max)
    }
}

/// Per-unit dynamic state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitState {
    /// Entity the unit is currently attacking.
    pub combat_target: Option<EntityId>,
    /// Point the unit is currently moving to.
    pub move_target: Option<Vec2Fixed>,
    /// Current velocity (units per tick).
    pub velocity: Vec2Fixed,
    /// Carried resources (harvesters only).
    pub cargo: i32,
    /// Resource node the unit is gathering from.
    pub harvest_target: Option<EntityId>,
    /// Depot the unit is delivering to.
    pub delivery_target: Option<EntityId>,
    /// Entity that most recently damaged this unit.
    pub last_attacker: Option<EntityId>,
    /// Tick of the most recent damage taken.
    pub last_damage_tick: Option<u64>,
    /// Consecutive ticks the movement layer saw no path progress.
    pub stuck_ticks: u32,
}

impl UnitState {
    /// Whether the unit has neither a target nor a destination.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.combat_target.is_none() && self.move_target.is_none()
    }

    /// Whether the unit took damage within `window` ticks of `now`.
    #[must_use]
    pub fn damaged_recently(&self, now: u64, window: u64) -> bool {
        self.last_damage_tick
            .is_some_and(|t| now.saturating_sub(t) <= window)
    }
}

/// Per-building state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildingState {
    /// Tick the building was placed.
    pub built_tick: u64,
    /// Whether the structure is still being raised.
    pub under_construction: bool,
}

/// Per-resource-node state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remaining harvestable amount.
    pub amount: i32,
}

/// An entity in the world snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique id.
    pub id: EntityId,
    /// Owning faction; `None` for neutral entities such as resources.
    pub owner: Option<FactionId>,
    /// Broad category.
    pub kind: EntityKind,
    /// Subtype key into the rules table.
    pub key: String,
    /// World position (center of the footprint for buildings).
    pub position: Vec2Fixed,
    /// Health.
    pub health: Health,
    /// Set by the simulation once the entity has been destroyed this tick.
    pub dead: bool,
    /// Unit-only state.
    pub unit: Option<UnitState>,
    /// Building-only state.
    pub building: Option<BuildingState>,
    /// Resource-only state.
    pub resource: Option<ResourceState>,
}

impl Entity {
    /// Create a unit entity.
    #[must_use]
    pub fn new_unit(
        id: EntityId,
        owner: FactionId,
        key: impl Into<String>,
        position: Vec2Fixed,
        max_health: u32,
    ) -> Self {
        Self {
            id,
            owner: Some(owner),
            kind: EntityKind::Unit,
            key: key.into(),
            position,
            health: Health::new(max_health),
            dead: false,
            unit: Some(UnitState::default()),
            building: None,
            resource: None,
        }
    }

    /// Create a building entity.
    #[must_use]
    pub fn new_building(
        id: EntityId,
        owner: FactionId,
        key: impl Into<String>,
        position: Vec2Fixed,
        max_health: u32,
        built_tick: u64,
    ) -> Self {
        Self {
            id,
            owner: Some(owner),
            kind: EntityKind::Building,
            key: key.into(),
            position,
            health: Health::new(max_health),
            dead: false,
            unit: None,
            building: Some(BuildingState {
                built_tick,
                under_construction: false,
            }),
            resource: None,
        }
    }

    /// Create a neutral resource node.
    #[must_use]
    pub fn new_resource(id: EntityId, key: impl Into<String>, position: Vec2Fixed, amount: i32) -> Self {
        Self {
            id,
            owner: None,
            kind: EntityKind::Resource,
            key: key.into(),
            position,
            health: Health::new(1),
            dead: false,
            unit: None,
            building: None,
            resource: Some(ResourceState { amount }),
        }
    }

    /// Whether the entity is still in play.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.dead && !self.health.is_dead()
    }

    /// Whether the entity belongs to `faction`.
    #[must_use]
    pub fn is_owned_by(&self, faction: FactionId) -> bool {
        self.owner == Some(faction)
    }

    /// Whether the entity belongs to some faction other than `faction`.
    #[must_use]
    pub fn is_enemy_of(&self, faction: FactionId) -> bool {
        matches!(self.owner, Some(owner) if owner != faction)
    }

    /// Whether this is a unit.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.kind == EntityKind::Unit
    }

    /// Whether this is a building.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.kind == EntityKind::Building
    }

    /// Whether this is a resource node with something left in it.
    #[must_use]
    pub fn is_live_resource(&self) -> bool {
        self.kind == EntityKind::Resource
            && !self.dead
            && self.resource.is_some_and(|r| r.amount > 0)
    }

    /// Whether a building has finished construction. Non-buildings count as complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !matches!(self.building, Some(b) if b.under_construction)
    }

    /// Builder: attach a unit state.
    #[must_use]
    pub fn with_unit_state(mut self, state: UnitState) -> Self {
        self.unit = Some(state);
        self
    }

    /// Builder: set current health.
    #[must_use]
    pub fn with_health(mut self, current: u32) -> Self {
        self.health.current = current.min(self.health.max);
        self
    }
}

/// Items currently in a faction's production queues.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductionQueues {
    /// Building under production.
    pub building: Option<String>,
    /// Infantry under production.
    pub infantry: Option<String>,
    /// Vehicle under production.
    pub vehicle: Option<String>,
}

impl ProductionQueues {
    /// Item in the given queue.
    #[must_use]
    pub fn current(&self, category: ProductionCategory) -> Option<&str> {
        match category {
            ProductionCategory::Building => self.building.as_deref(),
            ProductionCategory::Infantry => self.infantry.as_deref(),
            ProductionCategory::Vehicle => self.vehicle.as_deref(),
        }
    }

    /// Mutable slot for the given queue, for host-side reducers.
    pub fn slot_mut(&mut self, category: ProductionCategory) -> &mut Option<String> {
        match category {
            ProductionCategory::Building => &mut self.building,
            ProductionCategory::Infantry => &mut self.infantry,
            ProductionCategory::Vehicle => &mut self.vehicle,
        }
    }

    /// Whether the given queue is empty.
    #[must_use]
    pub fn is_idle(&self, category: ProductionCategory) -> bool {
        self.current(category).is_none()
    }
}

/// Economic state of one faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionEconomy {
    /// Spendable credits.
    pub credits: i32,
    /// Credits gained per minute (rolling estimate from the host).
    pub income_rate: i32,
    /// Credits spent per minute (rolling estimate from the host).
    pub expense_rate: i32,
    /// Production queues.
    pub queues: ProductionQueues,
    /// Finished building waiting to be placed.
    pub ready_to_place: Option<String>,
    /// AI skill tier for this faction.
    pub difficulty: Difficulty,
    /// Whether the AI controls this faction.
    pub is_ai: bool,
}

impl FactionEconomy {
    /// Create an economy with the given credits.
    #[must_use]
    pub fn new(credits: i32, difficulty: Difficulty) -> Self {
        Self {
            credits,
            income_rate: 0,
            expense_rate: 0,
            queues: ProductionQueues::default(),
            ready_to_place: None,
            difficulty,
            is_ai: true,
        }
    }
}

/// Playable map rectangle, anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Width in world units.
    pub width: i32,
    /// Height in world units.
    pub height: i32,
}

impl MapBounds {
    /// Create map bounds.
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether `pos` lies inside the map.
    #[must_use]
    pub fn contains(&self, pos: Vec2Fixed) -> bool {
        pos.x >= Fixed::ZERO
            && pos.y >= Fixed::ZERO
            && pos.x <= Fixed::from_num(self.width)
            && pos.y <= Fixed::from_num(self.height)
    }

    /// Clamp a position onto the map.
    #[must_use]
    pub fn clamp(&self, pos: Vec2Fixed) -> Vec2Fixed {
        pos.clamp(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_units(self.width, self.height),
        )
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self::new(4096, 4096)
    }
}

/// Read-only view of the world for one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Simulation tick this snapshot was taken at.
    pub tick: u64,
    /// Map bounds.
    pub map: MapBounds,
    /// All entities keyed by id.
    pub entities: BTreeMap<EntityId, Entity>,
    /// Economic state of every faction.
    pub factions: BTreeMap<FactionId, FactionEconomy>,
}

impl WorldSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new(tick: u64, map: MapBounds) -> Self {
        Self {
            tick,
            map,
            entities: BTreeMap::new(),
            factions: BTreeMap::new(),
        }
    }

    /// Insert or replace an entity.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up an entity by id, only if it is still alive.
    #[must_use]
    pub fn get_alive(&self, id: EntityId) -> Option<&Entity> {
        self.get(id).filter(|e| e.is_alive())
    }

    /// Economic state of a faction.
    #[must_use]
    pub fn economy(&self, faction: FactionId) -> Option<&FactionEconomy> {
        self.factions.get(&faction)
    }

    /// All live entities in id order.
    pub fn live_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_alive())
    }

    /// Live entities owned by `faction`.
    pub fn owned_by(&self, faction: FactionId) -> impl Iterator<Item = &Entity> {
        self.live_entities().filter(move |e| e.is_owned_by(faction))
    }

    /// Live entities owned by anyone other than `faction`.
    pub fn enemies_of(&self, faction: FactionId) -> impl Iterator<Item = &Entity> {
        self.live_entities().filter(move |e| e.is_enemy_of(faction))
    }

    /// Resource nodes with something left in them.
    pub fn resources(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_live_resource())
    }

    /// Factions other than `faction`.
    pub fn opponents_of(&self, faction: FactionId) -> impl Iterator<Item = (&FactionId, &FactionEconomy)> {
        self.factions.iter().filter(move |(id, _)| **id != faction)
    }
}
