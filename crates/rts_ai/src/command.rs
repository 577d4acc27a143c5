//! Intent commands emitted by the AI.
//!
//! Commands describe what the AI wants, never how it happens. The host's
//! reducer validates and applies them against its own authoritative state.

use serde::{Deserialize, Serialize};

use crate::math::Vec2Fixed;
use crate::rules::ProductionCategory;
use crate::world::EntityId;

/// How a move order should be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveMode {
    /// Plain move.
    Normal,
    /// Move, engaging anything met on the way.
    AttackMove,
    /// Retreat; the reducer must drop any delivery or docking target.
    Flee,
    /// Go gather from a resource node.
    Gather(EntityId),
    /// Go deliver to a depot.
    Return(EntityId),
}

/// A single AI intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AiCommand {
    /// Move units to a point.
    Move {
        /// Units to move.
        unit_ids: Vec<EntityId>,
        /// Destination.
        target: Vec2Fixed,
        /// Move flavour.
        mode: MoveMode,
    },
    /// Attack a specific entity.
    Attack {
        /// Attacking units.
        unit_ids: Vec<EntityId>,
        /// Entity to attack.
        target: EntityId,
    },
    /// Queue a unit or building.
    StartProduction {
        /// Queue to use.
        category: ProductionCategory,
        /// Rules key of the item.
        key: String,
    },
    /// Place a finished building.
    PlaceBuilding {
        /// Rules key of the building.
        key: String,
        /// Center of the footprint.
        position: Vec2Fixed,
    },
    /// Cancel whatever is in a queue.
    CancelProduction {
        /// Queue to clear.
        category: ProductionCategory,
    },
    /// Sell a building.
    SellBuilding {
        /// Building to sell.
        building: EntityId,
    },
}

impl AiCommand {
    /// Single-unit move.
    #[must_use]
    pub fn move_unit(unit: EntityId, target: Vec2Fixed, mode: MoveMode) -> Self {
        Self::Move {
            unit_ids: vec![unit],
            target,
            mode,
        }
    }

    /// Single-unit attack.
    #[must_use]
    pub fn attack(unit: EntityId, target: EntityId) -> Self {
        Self::Attack {
            unit_ids: vec![unit],
            target,
        }
    }

    /// Units this command gives orders to.
    #[must_use]
    pub fn unit_ids(&self) -> &[EntityId] {
        match self {
            Self::Move { unit_ids, .. } | Self::Attack { unit_ids, .. } => unit_ids,
            _ => &[],
        }
    }

    /// Whether this is a flee move.
    #[must_use]
    pub fn is_flee(&self) -> bool {
        matches!(
            self,
            Self::Move {
                mode: MoveMode::Flee,
                ..
            }
        )
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::StartProduction { .. } => "start_production",
            Self::PlaceBuilding { .. } => "place_building",
            Self::CancelProduction { .. } => "cancel_production",
            Self::SellBuilding { .. } => "sell_building",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_ids() {
        let cmd = AiCommand::attack(4, 9);
        assert_eq!(cmd.unit_ids(), &[4]);
        let sell = AiCommand::SellBuilding { building: 3 };
        assert!(sell.unit_ids().is_empty());
    }

    #[test]
    fn test_is_flee() {
        assert!(AiCommand::move_unit(1, Vec2Fixed::ZERO, MoveMode::Flee).is_flee());
        assert!(!AiCommand::move_unit(1, Vec2Fixed::ZERO, MoveMode::Normal).is_flee());
    }

    #[test]
    fn test_kind_names() {
        let cmd = AiCommand::CancelProduction {
            category: ProductionCategory::Building,
        };
        assert_eq!(cmd.kind(), "cancel_production");
        assert_eq!(AiCommand::attack(1, 2).kind(), "attack");
    }
}
