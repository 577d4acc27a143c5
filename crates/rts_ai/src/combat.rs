//! Combat coordination for attack and harass groups.
//!
//! Target scoring combines four terms:
//!
//! - base value: buildings score higher than units and are ranked by a fixed
//!   priority list; harassing groups add a bonus for enemy workers,
//! - a bonus proportional to the target's missing health,
//! - a penalty proportional to the distance from the group centroid,
//! - a bonus per allied unit already attacking the target (focus fire).
//!
//! The leash rejects targets further than the pursuit limit from the group
//! centroid while a closer one exists. A unit is only re-ordered when it has
//! no live target or when the best target beats its current one by more than
//! the retarget margin, so orders stay stable between ticks.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::command::{AiCommand, MoveMode};
use crate::context::AiContext;
use crate::math::{centroid, units, Fixed, Vec2Fixed};
use crate::state::{AiState, Strategy};
use crate::world::{Entity, EntityId};

/// A candidate target with its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredTarget {
    /// Target entity.
    pub id: EntityId,
    /// Target position.
    pub position: Vec2Fixed,
    /// Total score.
    pub score: Fixed,
    /// Allied units already attacking it.
    pub focus: usize,
    /// Distance from the group centroid.
    pub distance: Fixed,
}

/// Count own units targeting each entity.
#[must_use]
pub fn focus_counts(ctx: &AiContext<'_>) -> BTreeMap<EntityId, usize> {
    let mut counts = BTreeMap::new();
    for unit in &ctx.view.own_units {
        if let Some(target) = unit.unit.as_ref().and_then(|u| u.combat_target) {
            *counts.entry(target).or_insert(0) += 1;
        }
    }
    counts
}

/// Score one enemy as seen from a group at `origin`.
#[must_use]
pub fn score_target(
    ctx: &AiContext<'_>,
    target: &Entity,
    origin: Vec2Fixed,
    focus: usize,
    harassing: bool,
) -> ScoredTarget {
    let cfg = &ctx.config.combat;

    let base = if target.is_building() {
        let priority = &cfg.building_priority;
        let rank_bonus = priority
            .iter()
            .position(|k| *k == target.key)
            .map_or(0, |i| {
                let steps = i32::try_from(priority.len() - i).unwrap_or(0);
                steps * cfg.building_rank_step
            });
        cfg.building_base_score + rank_bonus
    } else if harassing && ctx.rules.is_harvester(&target.key) {
        cfg.unit_base_score + cfg.harass_harvester_bonus
    } else {
        cfg.unit_base_score
    };

    let distance = origin.distance(target.position);
    let wounded = units(cfg.wounded_bonus) * target.health.missing_fraction();
    let penalty = distance * units(cfg.distance_penalty_per_100) / units(100);
    let focus_score = if ctx.profile.focus_fire {
        units(cfg.focus_bonus) * Fixed::from_num(focus)
    } else {
        Fixed::ZERO
    };

    ScoredTarget {
        id: target.id,
        position: target.position,
        score: units(base) + wounded - penalty + focus_score,
        focus,
        distance,
    }
}

/// Score every visible enemy, best first.
///
/// Ties go to the target more allies already attack, then the lower id.
#[must_use]
pub fn rank_targets(ctx: &AiContext<'_>, origin: Vec2Fixed, harassing: bool) -> Vec<ScoredTarget> {
    let focus = focus_counts(ctx);
    let mut ranked: Vec<ScoredTarget> = ctx
        .view
        .enemy_units
        .iter()
        .chain(&ctx.view.enemy_buildings)
        .map(|e| score_target(ctx, e, origin, focus.get(&e.id).copied().unwrap_or(0), harassing))
        .collect();
    ranked.sort_by_key(|t| (Reverse(t.score), Reverse(t.focus), t.id));
    ranked
}

/// Best target, honouring the leash when the tier enables it.
#[must_use]
pub fn select_target<'t>(ctx: &AiContext<'_>, ranked: &'t [ScoredTarget]) -> Option<&'t ScoredTarget> {
    if ctx.profile.leash {
        let leash = units(ctx.config.combat.leash_distance);
        if let Some(within) = ranked.iter().find(|t| t.distance <= leash) {
            return Some(within);
        }
    }
    ranked.first()
}

/// Orders for one group. `members` must be live own units.
#[must_use]
pub fn command_group(
    ctx: &AiContext<'_>,
    members: &[&Entity],
    harassing: bool,
    fallback: Option<Vec2Fixed>,
) -> Vec<AiCommand> {
    let Some(center) = centroid(members.iter().map(|m| m.position)) else {
        return Vec::new();
    };
    let ranked = rank_targets(ctx, center, harassing);
    let Some(best) = select_target(ctx, &ranked) else {
        // Nothing visible: march on the remembered base.
        let Some(target) = fallback else {
            return Vec::new();
        };
        let idle: Vec<EntityId> = members
            .iter()
            .filter(|m| m.unit.as_ref().is_some_and(|u| u.is_idle()))
            .map(|m| m.id)
            .collect();
        if idle.is_empty() {
            return Vec::new();
        }
        return vec![AiCommand::Move {
            unit_ids: idle,
            target,
            mode: MoveMode::AttackMove,
        }];
    };

    let margin = units(ctx.config.combat.retarget_margin);
    let straggler = units(ctx.config.combat.straggler_distance);
    let mut attackers = Vec::new();
    let mut movers = Vec::new();

    for member in members {
        let Some(unit) = member.unit.as_ref() else {
            continue;
        };
        let current = unit.combat_target.filter(|t| ctx.is_live_enemy(*t));
        let needs_order = match current {
            None => true,
            Some(t) if t == best.id => false,
            Some(t) => {
                let current_score = ranked
                    .iter()
                    .find(|s| s.id == t)
                    .map_or(Fixed::MIN, |s| s.score);
                best.score.saturating_sub(current_score) > margin
            }
        };
        if !needs_order {
            continue;
        }
        if unit.is_idle() && !member.position.within(center, straggler) {
            movers.push(member.id);
        } else {
            attackers.push(member.id);
        }
    }

    debug!(
        faction = %ctx.faction,
        tick = ctx.tick(),
        target = best.id,
        score = %best.score,
        attackers = attackers.len(),
        regrouping = movers.len(),
        "group target"
    );

    let mut commands = Vec::new();
    if !attackers.is_empty() {
        commands.push(AiCommand::Attack {
            unit_ids: attackers,
            target: best.id,
        });
    }
    if !movers.is_empty() {
        commands.push(AiCommand::Move {
            unit_ids: movers,
            target: best.position,
            mode: MoveMode::AttackMove,
        });
    }
    commands
}

fn resolve<'a>(ctx: &AiContext<'a>, ids: impl IntoIterator<Item = EntityId>) -> Vec<&'a Entity> {
    ids.into_iter()
        .filter_map(|id| ctx.snapshot.get_alive(id))
        .filter(|e| e.is_owned_by(ctx.faction) && e.is_unit())
        .collect()
}

/// Whether groups get orders this tick: in an offensive strategy, or while a
/// threat-free defend waits out the cooldown with groups still formed.
#[must_use]
pub fn groups_active(state: &AiState) -> bool {
    state.strategy.is_offensive()
        || (state.strategy == Strategy::Defend && state.threats_near_base.is_empty())
}

/// Drive attack and harass groups for offensive strategies. A lingering
/// defend keeps already-formed groups moving but absorbs no new members.
pub fn coordinate_combat(ctx: &AiContext<'_>, state: &mut AiState) -> Vec<AiCommand> {
    let cfg = &ctx.config.combat;
    let mut commands = Vec::new();

    match state.strategy {
        Strategy::Attack => {
            let absorbed: Vec<EntityId> = ctx
                .view
                .combat_units
                .iter()
                .filter(|u| !state.harass_group.contains(&u.id))
                .filter(|u| u.unit.as_ref().is_some_and(|s| s.is_idle()))
                .map(|u| u.id)
                .collect();
            state.attack_group.extend(absorbed);
        }
        Strategy::AllIn => {
            state
                .attack_group
                .extend(ctx.view.combat_units.iter().map(|u| u.id));
        }
        _ => {}
    }

    let lingering = state.strategy == Strategy::Defend && state.threats_near_base.is_empty();

    if lingering || matches!(state.strategy, Strategy::Attack | Strategy::AllIn) {
        let min = if state.strategy == Strategy::AllIn {
            1
        } else {
            cfg.min_attack_group
        };
        let members = resolve(ctx, state.attack_group.iter().copied());
        if members.len() >= min {
            commands.extend(command_group(ctx, &members, false, state.enemy_base_location));
        }
    }

    if lingering || state.strategy == Strategy::Harass {
        let members = resolve(ctx, state.harass_group.iter().copied());
        if members.len() >= cfg.min_harass_group {
            commands.extend(command_group(ctx, &members, true, state.enemy_base_location));
        }
    }

    commands
}

/// Send workers at the enemy when an all-in has no army left.
pub fn conscript_workers(ctx: &AiContext<'_>, state: &mut AiState) -> Vec<AiCommand> {
    if state.strategy != Strategy::AllIn || !ctx.view.combat_units.is_empty() {
        return Vec::new();
    }
    let workers: Vec<&Entity> = ctx.view.harvesters.clone();
    if workers.is_empty() {
        return Vec::new();
    }
    let newly = workers
        .iter()
        .filter(|w| !state.harvester.conscripted.contains(&w.id))
        .count();
    state
        .harvester
        .conscripted
        .extend(workers.iter().map(|w| w.id));
    if newly > 0 {
        info!(
            faction = %ctx.faction,
            tick = ctx.tick(),
            workers = newly,
            "conscripting workers for all-in"
        );
    }
    command_group(ctx, &workers, false, state.enemy_base_location)
}
