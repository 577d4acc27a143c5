//! Scenario loading and configuration.
//!
//! Scenarios define the world the AI is run against: map size, faction
//! setups with starting buildings and units, ore fields, and a script of
//! timed events that stand in for the simulation (credits changing, units
//! dying, raids arriving).

use std::path::Path;

use rts_ai::config::Difficulty;
use rts_ai::error::AiError;
use rts_ai::factions::FactionId;
use rts_ai::math::Vec2Fixed;
use rts_ai::world::{Entity, EntityId, FactionEconomy, MapBounds, WorldSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default health of scenario units.
const UNIT_HP: u32 = 100;
/// Default health of scenario buildings.
pub(crate) const BUILDING_HP: u32 = 1000;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// AI config or rules could not be loaded.
    #[error(transparent)]
    Ai(#[from] AiError),
    /// Two factions share an id.
    #[error("Duplicate faction id {0} in scenario")]
    DuplicateFaction(u8),
    /// An event names a faction the scenario does not define.
    #[error("Event at tick {tick} references unknown faction {faction}")]
    UnknownFaction {
        /// Tick of the offending event.
        tick: u64,
        /// Faction id it referenced.
        faction: u8,
    },
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map dimensions (width, height) in world units.
    pub map_size: (i32, i32),
    /// Tick the first snapshot is stamped with.
    #[serde(default)]
    pub start_tick: u64,
    /// Faction setups.
    pub factions: Vec<FactionSetup>,
    /// Ore fields.
    #[serde(default)]
    pub ore_nodes: Vec<OreNode>,
    /// Timed world changes.
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Resolve a scenario by file path or built-in name.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "skirmish_1v1" => Ok(Self::skirmish_1v1()),
            "raid" => Ok(Self::raid()),
            path => Self::load(path),
        }
    }

    /// Check faction ids are unique and events reference known factions.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut seen = std::collections::BTreeSet::new();
        for faction in &self.factions {
            if !seen.insert(faction.id) {
                return Err(ScenarioError::DuplicateFaction(faction.id));
            }
        }
        for event in &self.events {
            if let Some(faction) = event.action.faction() {
                if !seen.contains(&faction) {
                    return Err(ScenarioError::UnknownFaction {
                        tick: event.tick,
                        faction,
                    });
                }
            }
        }
        Ok(())
    }

    /// Standard 1v1: two AI bases in opposite corners and a contested center.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        Self {
            name: "Standard 1v1 Skirmish".to_string(),
            description: "Two AI bases in opposite corners with a contested ore field".to_string(),
            map_size: (4096, 4096),
            start_tick: 0,
            factions: vec![
                FactionSetup::corner_base(1, Difficulty::Hard, (400, 400)),
                FactionSetup::corner_base(2, Difficulty::Medium, (3600, 3600)),
            ],
            ore_nodes: vec![
                OreNode::new(800, 700, 6000),
                OreNode::new(700, 900, 6000),
                OreNode::new(3300, 3400, 6000),
                OreNode::new(3400, 3200, 6000),
                OreNode::new(2048, 2048, 15000), // Contested center
            ],
            events: vec![
                ScriptedEvent::at(1200, EventAction::SetCredits { faction: 1, credits: 400 }),
                ScriptedEvent::at(1200, EventAction::SetCredits { faction: 2, credits: 3000 }),
            ],
        }
    }

    /// A 1v1 where the second faction raids the first one's workers.
    #[must_use]
    pub fn raid() -> Self {
        let mut scenario = Self::skirmish_1v1();
        scenario.name = "Worker raid".to_string();
        scenario.description = "Enemy light tanks arrive among faction 1's harvesters".to_string();
        for (tick, x) in [(600, 760), (600, 800), (900, 720)] {
            scenario.events.push(ScriptedEvent::at(
                tick,
                EventAction::SpawnUnit {
                    faction: 2,
                    kind: "light_tank".to_string(),
                    x,
                    y: 760,
                },
            ));
        }
        scenario
    }

    /// Build the initial snapshot. Ids are assigned faction by faction:
    /// buildings, then units, then ore nodes.
    #[must_use]
    pub fn build_snapshot(&self) -> WorldSnapshot {
        let (width, height) = self.map_size;
        let mut snapshot = WorldSnapshot::new(self.start_tick, MapBounds::new(width, height));
        let mut next_id: EntityId = 1;

        for setup in &self.factions {
            let faction = FactionId::new(setup.id);
            let mut economy = FactionEconomy::new(setup.credits, setup.difficulty);
            economy.is_ai = setup.ai;
            snapshot.factions.insert(faction, economy);

            for building in &setup.starting_buildings {
                snapshot.insert(Entity::new_building(
                    next_id,
                    faction,
                    building.kind.as_str(),
                    Vec2Fixed::from_units(building.x, building.y),
                    BUILDING_HP,
                    self.start_tick,
                ));
                next_id += 1;
            }
            for placement in &setup.starting_units {
                for i in 0..placement.count {
                    let offset = i32::try_from(i).unwrap_or(0) * 24;
                    snapshot.insert(Entity::new_unit(
                        next_id,
                        faction,
                        placement.kind.as_str(),
                        Vec2Fixed::from_units(placement.x + offset, placement.y),
                        UNIT_HP,
                    ));
                    next_id += 1;
                }
            }
        }

        for node in &self.ore_nodes {
            snapshot.insert(Entity::new_resource(
                next_id,
                "ore",
                Vec2Fixed::from_units(node.x, node.y),
                node.amount,
            ));
            next_id += 1;
        }

        debug!(
            scenario = %self.name,
            entities = snapshot.entities.len(),
            factions = snapshot.factions.len(),
            "Built scenario snapshot"
        );
        snapshot
    }
}

/// One faction's starting setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactionSetup {
    /// Faction id.
    pub id: u8,
    /// AI tier.
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    /// Whether the AI drives this faction.
    #[serde(default = "default_true")]
    pub ai: bool,
    /// Starting credits.
    pub credits: i32,
    /// Starting buildings.
    #[serde(default)]
    pub starting_buildings: Vec<BuildingPlacement>,
    /// Starting units.
    #[serde(default)]
    pub starting_units: Vec<UnitPlacement>,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

fn default_true() -> bool {
    true
}

impl FactionSetup {
    /// Conyard, power, refinery and barracks with two harvesters and a
    /// squad of rifles around `origin`.
    #[must_use]
    pub fn corner_base(id: u8, difficulty: Difficulty, origin: (i32, i32)) -> Self {
        let (x, y) = origin;
        // Mirror the layout for bases in the lower-right half.
        let dir = if x > 2048 { -1 } else { 1 };
        Self {
            id,
            difficulty,
            ai: true,
            credits: 2500,
            starting_buildings: vec![
                BuildingPlacement::new("conyard", x, y),
                BuildingPlacement::new("power", x + dir * 140, y),
                BuildingPlacement::new("refinery", x, y + dir * 160),
                BuildingPlacement::new("barracks", x + dir * 160, y + dir * 160),
            ],
            starting_units: vec![
                UnitPlacement::new("harvester", x + dir * 60, y + dir * 260, 2),
                UnitPlacement::new("rifle", x + dir * 260, y + dir * 60, 3),
            ],
        }
    }
}

/// A group of identical units placed in a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit key.
    pub kind: String,
    /// X of the first unit.
    pub x: i32,
    /// Y of every unit.
    pub y: i32,
    /// How many.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl UnitPlacement {
    /// Create a placement.
    #[must_use]
    pub fn new(kind: &str, x: i32, y: i32, count: u32) -> Self {
        Self {
            kind: kind.to_string(),
            x,
            y,
            count,
        }
    }
}

/// A starting building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building key.
    pub kind: String,
    /// Center x.
    pub x: i32,
    /// Center y.
    pub y: i32,
}

impl BuildingPlacement {
    /// Create a placement.
    #[must_use]
    pub fn new(kind: &str, x: i32, y: i32) -> Self {
        Self {
            kind: kind.to_string(),
            x,
            y,
        }
    }
}

/// An ore field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OreNode {
    /// Center x.
    pub x: i32,
    /// Center y.
    pub y: i32,
    /// Harvestable amount.
    pub amount: i32,
}

impl OreNode {
    /// Create a node.
    #[must_use]
    pub fn new(x: i32, y: i32, amount: i32) -> Self {
        Self { x, y, amount }
    }
}

/// A world change applied at the start of `tick`, before the AI runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedEvent {
    /// Tick the change takes effect.
    pub tick: u64,
    /// What happens.
    pub action: EventAction,
}

impl ScriptedEvent {
    /// Event at `tick`.
    #[must_use]
    pub fn at(tick: u64, action: EventAction) -> Self {
        Self { tick, action }
    }
}

/// Scripted world changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventAction {
    /// Overwrite a faction's credits.
    SetCredits {
        /// Faction id.
        faction: u8,
        /// New balance.
        credits: i32,
    },
    /// Add a unit.
    SpawnUnit {
        /// Owner.
        faction: u8,
        /// Unit key.
        kind: String,
        /// X.
        x: i32,
        /// Y.
        y: i32,
    },
    /// Add a completed building.
    SpawnBuilding {
        /// Owner.
        faction: u8,
        /// Building key.
        kind: String,
        /// X.
        x: i32,
        /// Y.
        y: i32,
    },
    /// Mark an entity destroyed.
    Destroy {
        /// Entity id.
        entity: EntityId,
    },
    /// Record a hit on a unit.
    Damage {
        /// Victim.
        target: EntityId,
        /// Attacker.
        attacker: EntityId,
        /// Health lost.
        amount: u32,
    },
    /// A building finished production and waits for a site.
    ReadyToPlace {
        /// Owner.
        faction: u8,
        /// Building key.
        kind: String,
    },
}

impl EventAction {
    /// Faction the action refers to, if any.
    #[must_use]
    pub fn faction(&self) -> Option<u8> {
        match self {
            Self::SetCredits { faction, .. }
            | Self::SpawnUnit { faction, .. }
            | Self::SpawnBuilding { faction, .. }
            | Self::ReadyToPlace { faction, .. } => Some(*faction),
            Self::Destroy { .. } | Self::Damage { .. } => None,
        }
    }

    /// Apply to `snapshot`. New entities take the next free id.
    pub fn apply(&self, snapshot: &mut WorldSnapshot) {
        let next_id = snapshot.entities.keys().next_back().map_or(1, |id| id + 1);
        let tick = snapshot.tick;
        match self {
            Self::SetCredits { faction, credits } => {
                if let Some(eco) = snapshot.factions.get_mut(&FactionId::new(*faction)) {
                    eco.credits = *credits;
                }
            }
            Self::SpawnUnit { faction, kind, x, y } => {
                snapshot.insert(Entity::new_unit(
                    next_id,
                    FactionId::new(*faction),
                    kind.as_str(),
                    Vec2Fixed::from_units(*x, *y),
                    UNIT_HP,
                ));
            }
            Self::SpawnBuilding { faction, kind, x, y } => {
                snapshot.insert(Entity::new_building(
                    next_id,
                    FactionId::new(*faction),
                    kind.as_str(),
                    Vec2Fixed::from_units(*x, *y),
                    BUILDING_HP,
                    tick,
                ));
            }
            Self::Destroy { entity } => {
                if let Some(e) = snapshot.entities.get_mut(entity) {
                    e.dead = true;
                }
            }
            Self::Damage {
                target,
                attacker,
                amount,
            } => {
                if let Some(e) = snapshot.entities.get_mut(target) {
                    e.health.current = e.health.current.saturating_sub(*amount);
                    if let Some(unit) = e.unit.as_mut() {
                        unit.last_attacker = Some(*attacker);
                        unit.last_damage_tick = Some(tick);
                    }
                }
            }
            Self::ReadyToPlace { faction, kind } => {
                if let Some(eco) = snapshot.factions.get_mut(&FactionId::new(*faction)) {
                    eco.ready_to_place = Some(kind.clone());
                }
            }
        }
    }
}
