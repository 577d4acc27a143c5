//! Low-frequency worker fleet coordination.
//!
//! Assigns risk roles, spreads workers across resource nodes under a per-node
//! cap, and rebalances depot queues. Skipped entirely on tiers without
//! fleet coordination.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::command::{AiCommand, MoveMode};
use crate::config::{HarvesterConfig, RiskBand};
use crate::context::AiContext;
use crate::harvester::danger::danger_near;
use crate::math::units;
use crate::state::{AiState, RiskRole};
use crate::world::{Entity, EntityId};

/// Classify a worker from its health, load and the faction's desperation.
#[must_use]
pub fn assign_role(cfg: &HarvesterConfig, health_pct: u32, cargo_pct: i32, desperation: u8) -> RiskRole {
    if health_pct < cfg.safe_health_pct {
        RiskRole::Safe
    } else if desperation >= cfg.risk_desperation && cargo_pct < cfg.risk_cargo_pct {
        RiskRole::RiskTaker
    } else if desperation >= cfg.opportunist_desperation {
        RiskRole::Opportunist
    } else {
        RiskRole::Standard
    }
}

/// Highest danger a worker in `role` accepts at a resource node.
#[must_use]
pub fn get_role_max_danger(role: RiskRole, band: RiskBand) -> i32 {
    let base = band.max_danger;
    match role {
        RiskRole::Safe => base / 3,
        RiskRole::Standard => base,
        RiskRole::Opportunist => base.saturating_mul(3) / 2,
        RiskRole::RiskTaker => base.saturating_mul(2),
    }
}

fn cargo_pct(ctx: &AiContext<'_>, worker: &Entity) -> i32 {
    let capacity = ctx.cargo_capacity(worker);
    if capacity <= 0 {
        return 0;
    }
    let cargo = worker.unit.as_ref().map_or(0, |u| u.cargo);
    (cargo.max(0).saturating_mul(100) / capacity).min(100)
}

/// Best resource node for a worker, honouring claims, blacklist and danger.
#[must_use]
pub fn best_node<'a>(
    ctx: &AiContext<'a>,
    state: &AiState,
    worker: &Entity,
    max_danger: i32,
    claims: &BTreeMap<EntityId, Vec<EntityId>>,
) -> Option<&'a Entity> {
    let cfg = &ctx.config.harvester;
    let now = ctx.tick();
    ctx.snapshot
        .resources()
        .filter(|node| !state.harvester.is_blacklisted(node.id, now))
        .filter(|node| claims.get(&node.id).map_or(0, Vec::len) < cfg.ore_capacity)
        .filter_map(|node| {
            let danger = danger_near(ctx, state, node.position);
            (danger <= max_danger).then(|| {
                let score = worker.position.distance(node.position)
                    + units(danger.saturating_mul(cfg.danger_distance_weight));
                (score, node.id, node)
            })
        })
        .min_by_key(|(score, id, _)| (*score, *id))
        .map(|(_, _, node)| node)
}

/// Run one fleet pass if due.
pub fn coordinate_fleet(
    ctx: &AiContext<'_>,
    state: &mut AiState,
    band: RiskBand,
    excluded: &BTreeSet<EntityId>,
) -> Vec<AiCommand> {
    if !ctx.profile.fleet_coordination {
        return Vec::new();
    }
    let cfg = &ctx.config.harvester;
    let now = ctx.tick();
    if state
        .harvester
        .last_fleet_tick
        .is_some_and(|last| now.saturating_sub(last) < cfg.fleet_interval)
    {
        return Vec::new();
    }
    state.harvester.last_fleet_tick = Some(now);

    let workers: Vec<&Entity> = ctx
        .view
        .harvesters
        .iter()
        .copied()
        .filter(|w| !excluded.contains(&w.id) && !state.harvester.conscripted.contains(&w.id))
        .collect();

    let desperation = state.desperation_score;
    for worker in &workers {
        let role = assign_role(cfg, worker.health.percentage(), cargo_pct(ctx, worker), desperation);
        state.harvester.roles.insert(worker.id, role);
    }

    let mut commands = assign_nodes(ctx, state, &workers, band);
    commands.extend(rebalance_depots(ctx, state, &workers));
    commands
}

fn assign_nodes(ctx: &AiContext<'_>, state: &mut AiState, workers: &[&Entity], band: RiskBand) -> Vec<AiCommand> {
    let cfg = &ctx.config.harvester;
    let now = ctx.tick();
    let mut claims: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
    let mut needing = Vec::new();

    for worker in workers {
        let Some(unit) = worker.unit.as_ref() else {
            continue;
        };
        if unit.delivery_target.is_some() {
            continue;
        }
        let current = unit
            .harvest_target
            .filter(|node| ctx.snapshot.get(*node).is_some_and(Entity::is_live_resource))
            .filter(|node| !state.harvester.is_blacklisted(*node, now));
        match current {
            Some(node) if claims.get(&node).map_or(0, Vec::len) < cfg.ore_capacity => {
                claims.entry(node).or_default().push(worker.id);
            }
            _ => needing.push(*worker),
        }
    }

    let mut commands = Vec::new();
    for worker in needing {
        let role = state.harvester.roles.get(&worker.id).copied().unwrap_or_default();
        let max_danger = get_role_max_danger(role, band);
        let Some(node) = best_node(ctx, state, worker, max_danger, &claims) else {
            continue;
        };
        claims.entry(node.id).or_default().push(worker.id);
        debug!(
            faction = %ctx.faction,
            tick = now,
            worker = worker.id,
            node = node.id,
            ?role,
            "worker assigned to node"
        );
        commands.push(AiCommand::move_unit(worker.id, node.position, MoveMode::Gather(node.id)));
    }
    state.harvester.ore_claims = claims;
    commands
}

fn rebalance_depots(ctx: &AiContext<'_>, state: &mut AiState, workers: &[&Entity]) -> Vec<AiCommand> {
    let capacity = ctx.profile.refinery_queue_capacity.max(1);
    let depots: Vec<&Entity> = ctx.depots().collect();

    let mut queues: BTreeMap<EntityId, Vec<&Entity>> = depots.iter().map(|d| (d.id, Vec::new())).collect();
    for worker in workers {
        let target = worker.unit.as_ref().and_then(|u| u.delivery_target);
        if let Some(queue) = target.and_then(|t| queues.get_mut(&t)) {
            queue.push(*worker);
        }
    }

    let mut loads: BTreeMap<EntityId, usize> = queues.iter().map(|(id, q)| (*id, q.len().min(capacity))).collect();
    let mut commands = Vec::new();

    for depot in &depots {
        let Some(queue) = queues.get_mut(&depot.id) else {
            continue;
        };
        if queue.len() <= capacity {
            continue;
        }
        queue.sort_by_key(|w| (w.position.distance_squared(depot.position), w.id));
        for worker in queue.split_off(capacity) {
            let alternate = depots
                .iter()
                .filter(|d| d.id != depot.id)
                .filter(|d| loads.get(&d.id).copied().unwrap_or(0) < capacity)
                .min_by_key(|d| {
                    (
                        loads.get(&d.id).copied().unwrap_or(0),
                        worker.position.distance_squared(d.position),
                        d.id,
                    )
                });
            let Some(alternate) = alternate else {
                continue;
            };
            *loads.entry(alternate.id).or_default() += 1;
            debug!(
                faction = %ctx.faction,
                tick = ctx.tick(),
                worker = worker.id,
                from = depot.id,
                to = alternate.id,
                "depot queue rebalanced"
            );
            commands.push(AiCommand::move_unit(
                worker.id,
                alternate.position,
                MoveMode::Return(alternate.id),
            ));
        }
    }

    state.harvester.refinery_queue = queues
        .into_iter()
        .map(|(id, q)| (id, q.into_iter().map(|w| w.id).collect()))
        .collect();
    commands
}
