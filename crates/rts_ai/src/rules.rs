//! Static game rules consulted by the AI.
//!
//! Costs, prerequisites and per-type classification for every unit and
//! building key. The table is read-only from the AI's point of view and is
//! normally loaded once from RON.
//!
//! # Example RON
//!
//! ```ron
//! RulesFile(
//!     units: [
//!         UnitRules(key: "rifle", cost: 100, category: Infantry,
//!                   prerequisites: ["barracks"], combat: true, speed: 2),
//!     ],
//!     buildings: [
//!         BuildingRules(key: "barracks", cost: 500, role: Production,
//!                       prerequisites: ["power"], footprint: (2, 2)),
//!     ],
//! )
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

/// Production queue a unit or building comes out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductionCategory {
    /// Structures, produced by the main base and then placed.
    Building,
    /// Foot soldiers.
    Infantry,
    /// Ground vehicles, including harvesters.
    Vehicle,
}

/// Armor class for targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum ArmorClass {
    /// Light armor - infantry, scouts.
    #[default]
    Light,
    /// Medium armor - vehicles, standard units.
    Medium,
    /// Heavy armor - tanks, heavy units.
    Heavy,
    /// Buildings and structures.
    Building,
}

/// What a building contributes to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingRole {
    /// Construction yard; produces buildings.
    Main,
    /// Infantry production.
    Production,
    /// Vehicle production.
    HeavyProduction,
    /// Resource delivery point.
    Refinery,
    /// Power supply.
    Power,
    /// Tech unlocks.
    Tech,
    /// Turrets and other static defense.
    Defense,
}

impl BuildingRole {
    /// Whether this role produces units or buildings.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Main | Self::Production | Self::HeavyProduction)
    }

    /// Whether this role is economic rather than military.
    #[must_use]
    pub const fn is_economic(self) -> bool {
        matches!(self, Self::Refinery | Self::Power | Self::Tech)
    }

    /// Which unit queue, if any, this building feeds.
    #[must_use]
    pub const fn unit_category(self) -> Option<ProductionCategory> {
        match self {
            Self::Production => Some(ProductionCategory::Infantry),
            Self::HeavyProduction => Some(ProductionCategory::Vehicle),
            _ => None,
        }
    }
}

/// Rules for one unit type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRules {
    /// Subtype key.
    pub key: String,
    /// Credit cost.
    pub cost: i32,
    /// Queue the unit is produced from.
    pub category: ProductionCategory,
    /// Buildings that must exist before this unit can be produced.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Whether the unit can fight.
    #[serde(default)]
    pub combat: bool,
    /// Whether the unit gathers resources.
    #[serde(default)]
    pub harvester: bool,
    /// Whether the unit can deploy into a new base.
    #[serde(default)]
    pub can_expand: bool,
    /// Movement speed in world units per tick.
    #[serde(default = "default_speed")]
    pub speed: i32,
    /// Armor class.
    #[serde(default)]
    pub armor: ArmorClass,
    /// Whether the unit's weapon is effective against heavy armor.
    #[serde(default)]
    pub anti_armor: bool,
    /// Maximum cargo for harvesters.
    #[serde(default)]
    pub cargo_capacity: i32,
}

/// Rules for one building type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingRules {
    /// Subtype key.
    pub key: String,
    /// Credit cost.
    pub cost: i32,
    /// Role in the base.
    pub role: BuildingRole,
    /// Buildings that must exist before this one can be started.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Footprint in placement tiles (width, height).
    #[serde(default = "default_footprint")]
    pub footprint: (u32, u32),
    /// Whether new structures may be placed around this one.
    #[serde(default = "default_true")]
    pub provides_build_area: bool,
}

const fn default_speed() -> i32 {
    2
}

const fn default_footprint() -> (u32, u32) {
    (2, 2)
}

const fn default_true() -> bool {
    true
}

/// On-disk layout of a rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    /// Unit definitions.
    #[serde(default)]
    pub units: Vec<UnitRules>,
    /// Building definitions.
    #[serde(default)]
    pub buildings: Vec<BuildingRules>,
}

/// Lookup table of all unit and building rules.
#[derive(Debug, Clone, Default)]
pub struct RulesTable {
    units: BTreeMap<String, UnitRules>,
    buildings: BTreeMap<String, BuildingRules>,
}

impl RulesTable {
    /// Build a table from parsed file contents.
    #[must_use]
    pub fn from_file_data(file: RulesFile) -> Self {
        Self {
            units: file.units.into_iter().map(|u| (u.key.clone(), u)).collect(),
            buildings: file
                .buildings
                .into_iter()
                .map(|b| (b.key.clone(), b))
                .collect(),
        }
    }

    /// Load a rules table from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AiError::RulesNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let file: RulesFile = ron::from_str(&contents).map_err(|e| AiError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_file_data(file))
    }

    /// Parse a rules table from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let file: RulesFile = ron::from_str(ron).map_err(|e| AiError::Parse {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_file_data(file))
    }

    /// Built-in rules for the standard skirmish ruleset.
    #[must_use]
    pub fn standard() -> Self {
        let unit = |key: &str, cost, category, prereqs: &[&str]| UnitRules {
            key: key.to_string(),
            cost,
            category,
            prerequisites: prereqs.iter().map(|s| (*s).to_string()).collect(),
            combat: true,
            harvester: false,
            can_expand: false,
            speed: 2,
            armor: ArmorClass::Light,
            anti_armor: false,
            cargo_capacity: 0,
        };
        let building = |key: &str, cost, role, prereqs: &[&str], footprint| BuildingRules {
            key: key.to_string(),
            cost,
            role,
            prerequisites: prereqs.iter().map(|s| (*s).to_string()).collect(),
            footprint,
            provides_build_area: true,
        };

        use ProductionCategory::{Infantry, Vehicle};
        let units = vec![
            unit("rifle", 100, Infantry, &["barracks"]),
            UnitRules {
                anti_armor: true,
                ..unit("rocket", 300, Infantry, &["barracks"])
            },
            UnitRules {
                speed: 5,
                ..unit("jeep", 400, Vehicle, &["factory"])
            },
            UnitRules {
                speed: 4,
                armor: ArmorClass::Medium,
                ..unit("light_tank", 700, Vehicle, &["factory"])
            },
            UnitRules {
                speed: 3,
                armor: ArmorClass::Heavy,
                anti_armor: true,
                ..unit("heavy_tank", 1100, Vehicle, &["factory", "tech"])
            },
            UnitRules {
                combat: false,
                harvester: true,
                speed: 3,
                armor: ArmorClass::Heavy,
                cargo_capacity: 500,
                ..unit("harvester", 1100, Vehicle, &["factory", "refinery"])
            },
            UnitRules {
                combat: false,
                can_expand: true,
                speed: 2,
                armor: ArmorClass::Heavy,
                ..unit("mcv", 2500, Vehicle, &["factory", "tech"])
            },
        ];

        let buildings = vec![
            building("conyard", 3000, BuildingRole::Main, &[], (3, 3)),
            building("power", 300, BuildingRole::Power, &[], (2, 2)),
            building("refinery", 1000, BuildingRole::Refinery, &["power"], (3, 2)),
            building("barracks", 500, BuildingRole::Production, &["power"], (2, 2)),
            building(
                "factory",
                1500,
                BuildingRole::HeavyProduction,
                &["refinery"],
                (3, 3),
            ),
            building("tech", 1500, BuildingRole::Tech, &["factory"], (2, 2)),
            BuildingRules {
                provides_build_area: false,
                ..building("turret", 600, BuildingRole::Defense, &["barracks"], (1, 1))
            },
        ];

        Self::from_file_data(RulesFile { units, buildings })
    }

    /// Rules for a unit key.
    #[must_use]
    pub fn unit(&self, key: &str) -> Option<&UnitRules> {
        self.units.get(key)
    }

    /// Rules for a building key.
    #[must_use]
    pub fn building(&self, key: &str) -> Option<&BuildingRules> {
        self.buildings.get(key)
    }

    /// All unit rules in key order.
    pub fn units(&self) -> impl Iterator<Item = &UnitRules> {
        self.units.values()
    }

    /// All building rules in key order.
    pub fn buildings(&self) -> impl Iterator<Item = &BuildingRules> {
        self.buildings.values()
    }

    /// Cost of any unit or building key.
    #[must_use]
    pub fn cost_of(&self, key: &str) -> Option<i32> {
        self.unit(key)
            .map(|u| u.cost)
            .or_else(|| self.building(key).map(|b| b.cost))
    }

    /// Whether a unit key is combat-capable.
    #[must_use]
    pub fn is_combat_unit(&self, key: &str) -> bool {
        self.unit(key).is_some_and(|u| u.combat)
    }

    /// Whether a unit key is a resource gatherer.
    #[must_use]
    pub fn is_harvester(&self, key: &str) -> bool {
        self.unit(key).is_some_and(|u| u.harvester)
    }

    /// Role of a building key.
    #[must_use]
    pub fn building_role(&self, key: &str) -> Option<BuildingRole> {
        self.building(key).map(|b| b.role)
    }

    /// Armor class of any key; buildings are always [`ArmorClass::Building`].
    #[must_use]
    pub fn armor_of(&self, key: &str) -> ArmorClass {
        if self.building(key).is_some() {
            return ArmorClass::Building;
        }
        self.unit(key).map(|u| u.armor).unwrap_or_default()
    }

    /// Whether every prerequisite of `key` is present in `built`.
    #[must_use]
    pub fn prerequisites_met(&self, key: &str, built: &BTreeSet<String>) -> bool {
        let prereqs = match (self.unit(key), self.building(key)) {
            (Some(u), _) => &u.prerequisites,
            (None, Some(b)) => &b.prerequisites,
            (None, None) => return false,
        };
        prereqs.iter().all(|p| built.contains(p))
    }

    /// First building key with the given role.
    #[must_use]
    pub fn first_building_with_role(&self, role: BuildingRole) -> Option<&BuildingRules> {
        self.buildings().find(|b| b.role == role)
    }
}
