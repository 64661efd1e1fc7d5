use std::collections::{HashMap, HashSet};

use ordered_float::OrderedFloat;

use crate::config::ConflateConfig;
use crate::entity::{Entity, Identity};
use crate::error::ConflateError;
use crate::matcher::conflate_by_refs;
use crate::matrix::{extend_matrix, DistanceMatrix};
use crate::metrics::{DefaultMetrics, Metrics};
use crate::model::{point_distance, Conflation};
use crate::reconcile::{conflate_uniq, merge_deleted_created, merge_remaining_parts, Side};

/// Conflate two snapshots with the built-in metrics.
///
/// Deleted afters take no part in matching but still serve as
/// `before_at_now` of the befores sharing their identity.
pub fn conflate(
    befores: Vec<Entity>,
    afters: Vec<Entity>,
    config: &ConflateConfig,
) -> Result<Vec<Conflation>, ConflateError> {
    conflate_with_metrics(&DefaultMetrics::from_config(config), befores, afters, config)
}

/// [`conflate`], then fuse lone delete/create pairs of the same identity.
pub fn conflate_with_simplification(
    befores: Vec<Entity>,
    afters: Vec<Entity>,
    config: &ConflateConfig,
) -> Result<Vec<Conflation>, ConflateError> {
    Ok(merge_deleted_created(conflate(befores, afters, config)?))
}

/// Conflate two snapshots with caller-supplied metrics.
pub fn conflate_with_metrics<M: Metrics + ?Sized>(
    metrics: &M,
    befores: Vec<Entity>,
    afters: Vec<Entity>,
    config: &ConflateConfig,
) -> Result<Vec<Conflation>, ConflateError> {
    config.validate()?;

    let projection = config.projection();
    let (befores, afters) = if projection.is_planar() {
        (befores, afters)
    } else {
        let project = |entities: Vec<Entity>| -> Vec<Entity> {
            entities
                .into_iter()
                .map(|e| e.with_projection(projection))
                .collect()
        };
        (project(befores), project(afters))
    };

    // Last version seen wins.
    let after_index: HashMap<Identity, Entity> =
        afters.iter().map(|a| (a.identity(), a.clone())).collect();
    let befores = dedup(befores);
    let afters = dedup(afters.into_iter().filter(|a| !a.deleted).collect());
    log::debug!(
        "conflating {} before(s) against {} live after(s)",
        befores.len(),
        afters.len()
    );

    let by_refs = conflate_by_refs(metrics, befores, afters, &after_index);
    let (by_distance, befores, afters) =
        conflate_core(metrics, by_refs.befores, by_refs.afters, &after_index, config)?;

    let by_distance = conflate_uniq(by_distance);
    let (by_distance, befores) = merge_remaining_parts(by_distance, befores, Side::Before);
    let (by_distance, afters) = merge_remaining_parts(by_distance, afters, Side::After);

    log::debug!(
        "{} reference match(es), {} distance match(es), {} deleted, {} created",
        by_refs.matched.len(),
        by_distance.len(),
        befores.len(),
        afters.len()
    );

    let mut result = by_refs.matched;
    result.extend(by_distance);
    result.extend(befores.into_iter().map(|before| {
        let before_at_now = after_index.get(&before.identity()).cloned();
        Conflation::Deleted {
            before,
            before_at_now,
        }
    }));
    result.extend(afters.into_iter().map(|after| Conflation::Created { after }));
    Ok(result)
}

/// Drop entities whose (kind, id, geometry) was already seen; first wins.
fn dedup(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    entities.into_iter().filter(|e| seen.insert(e.key())).collect()
}

// ---------------------------------------------------------------------------
// Working sets
// ---------------------------------------------------------------------------

/// Slot-addressed working collection. Removal leaves a hole so indices held
/// by the matrix stay valid.
#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Option<Entity>>,
    live: usize,
}

impl Arena {
    fn new(entities: Vec<Entity>) -> Self {
        Self {
            live: entities.len(),
            slots: entities.into_iter().map(Some).collect(),
        }
    }

    fn insert(&mut self, entity: Entity) -> usize {
        self.slots.push(Some(entity));
        self.live += 1;
        self.slots.len() - 1
    }

    fn get(&self, slot: usize) -> Option<&Entity> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn take(&mut self, slot: usize) -> Option<Entity> {
        let entity = self.slots.get_mut(slot)?.take()?;
        self.live -= 1;
        Some(entity)
    }

    fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn entries(&self) -> Vec<(usize, &Entity)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
            .collect()
    }

    fn into_entities(self) -> Vec<Entity> {
        self.slots.into_iter().flatten().collect()
    }
}

// ---------------------------------------------------------------------------
// Greedy matching
// ---------------------------------------------------------------------------

/// Repeatedly accept the cheapest pair, feed its geometric remainders back
/// in as new candidates, and stop when nothing is left to pair.
fn conflate_core<M: Metrics + ?Sized>(
    metrics: &M,
    befores: Vec<Entity>,
    afters: Vec<Entity>,
    after_index: &HashMap<Identity, Entity>,
    config: &ConflateConfig,
) -> Result<(Vec<Conflation>, Vec<Entity>, Vec<Entity>), ConflateError> {
    let mut befores = Arena::new(befores);
    let mut afters = Arena::new(afters);

    let mut matrix = DistanceMatrix::new();
    extend_matrix(&mut matrix, metrics, &befores.entries(), &afters.entries(), config);
    log::debug!("initial distance matrix has {} entries", matrix.len());

    let mut paired = Vec::new();
    let mut iterations = 0usize;
    while !matrix.is_empty() && !befores.is_empty() && !afters.is_empty() {
        if config.max_iterations.is_some_and(|max| iterations >= max) {
            log::warn!(
                "iteration budget of {iterations} reached with {} candidate pair(s) left; remaining entities stay unmatched",
                matrix.len()
            );
            break;
        }
        iterations += 1;

        let (bi, ai) = select_min(&matrix, &befores, &afters)?;
        let candidate = matrix
            .remove(&(bi, ai))
            .ok_or_else(|| ConflateError::Invariant(format!("selected pair ({bi}, {ai}) vanished")))?;
        let before = befores
            .take(bi)
            .ok_or_else(|| ConflateError::Invariant(format!("before slot {bi} is empty")))?;
        let after = afters
            .take(ai)
            .ok_or_else(|| ConflateError::Invariant(format!("after slot {ai} is empty")))?;
        matrix.retain(|&(b, a), _| b != bi && a != ai);

        log::trace!(
            "matched {before} -> {after} (tags {:.6}, geometry {:.6})",
            candidate.cost.tags,
            candidate.cost.geometry
        );

        // Remainders re-enter the pool under the identity they came from.
        let new_before = candidate
            .remaining_before
            .map(|g| befores.insert(before.with_geometry(g)));
        let new_after = candidate
            .remaining_after
            .map(|g| afters.insert(after.with_geometry(g)));

        if new_before.is_some() || new_after.is_some() {
            let before_entries = befores.entries();
            let after_entries = afters.entries();
            let (fresh_befores, old_befores): (Vec<_>, Vec<_>) =
                before_entries.into_iter().partition(|(i, _)| Some(*i) == new_before);
            let (fresh_afters, old_afters): (Vec<_>, Vec<_>) =
                after_entries.into_iter().partition(|(i, _)| Some(*i) == new_after);

            extend_matrix(&mut matrix, metrics, &fresh_befores, &fresh_afters, config);
            extend_matrix(&mut matrix, metrics, &fresh_befores, &old_afters, config);
            extend_matrix(&mut matrix, metrics, &old_befores, &fresh_afters, config);
        }

        let before_at_now = after_index.get(&before.identity()).cloned();
        let distance = point_distance(&before, &after);
        paired.push(Conflation::Matched {
            before,
            before_at_now,
            after,
            distance,
        });
    }

    Ok((paired, befores.into_entities(), afters.into_entities()))
}

/// Cheapest entry. Ties go to the smallest (before identity, after
/// identity), then to the earliest slots.
fn select_min(
    matrix: &DistanceMatrix,
    befores: &Arena,
    afters: &Arena,
) -> Result<(usize, usize), ConflateError> {
    let mut best: Option<(OrderedFloat<f64>, Identity, Identity, usize, usize)> = None;
    for (&(bi, ai), candidate) in matrix {
        let before = befores.get(bi).ok_or_else(|| {
            ConflateError::Invariant(format!("matrix references removed before slot {bi}"))
        })?;
        let after = afters.get(ai).ok_or_else(|| {
            ConflateError::Invariant(format!("matrix references removed after slot {ai}"))
        })?;

        let key = (
            OrderedFloat(candidate.cost.total()),
            before.identity(),
            after.identity(),
            bi,
            ai,
        );
        if best.as_ref().map_or(true, |current| key < *current) {
            best = Some(key);
        }
    }

    best.map(|(_, _, _, bi, ai)| (bi, ai))
        .ok_or_else(|| ConflateError::Invariant("no candidate in a non-empty matrix".into()))
}
