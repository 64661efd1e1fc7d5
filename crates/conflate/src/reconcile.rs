use std::collections::HashMap;

use crate::entity::{Entity, Identity};
use crate::model::Conflation;

/// Which slot of a record a pass works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

impl Side {
    fn entity<'a>(&self, conflation: &'a Conflation) -> Option<&'a Entity> {
        match self {
            Self::Before => conflation.before(),
            Self::After => conflation.after(),
        }
    }

    fn entity_mut<'a>(&self, conflation: &'a mut Conflation) -> Option<&'a mut Entity> {
        match self {
            Self::Before => conflation.before_mut(),
            Self::After => conflation.after_mut(),
        }
    }
}

// ---------------------------------------------------------------------------
// Uniqueness
// ---------------------------------------------------------------------------

/// Collapse matches sharing the same (before identity, after identity) into
/// one whose geometries are the union of the parts. First appearance order
/// is kept; one-sided records pass through.
pub fn conflate_uniq(paired: Vec<Conflation>) -> Vec<Conflation> {
    let mut out: Vec<Conflation> = Vec::with_capacity(paired.len());
    let mut index: HashMap<(Identity, Identity), usize> = HashMap::new();

    for conflation in paired {
        match conflation {
            Conflation::Matched {
                before,
                before_at_now,
                after,
                distance,
            } => {
                let key = (before.identity(), after.identity());
                match index.get(&key) {
                    Some(&slot) => {
                        if let Conflation::Matched {
                            before: sum_before,
                            after: sum_after,
                            distance: sum_distance,
                            ..
                        } = &mut out[slot]
                        {
                            *sum_before = union_entity(sum_before, &before);
                            *sum_after = union_entity(sum_after, &after);
                            *sum_distance = closest(*sum_distance, distance);
                        }
                    }
                    None => {
                        index.insert(key, out.len());
                        out.push(Conflation::Matched {
                            before,
                            before_at_now,
                            after,
                            distance,
                        });
                    }
                }
            }
            other => out.push(other),
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Remainder re-attachment
// ---------------------------------------------------------------------------

/// Fold leftover parts back into the record holding the same identity on
/// `side`, when exactly one record does. Returns the records and the
/// leftovers that stay unmatched.
pub fn merge_remaining_parts(
    mut paired: Vec<Conflation>,
    remaining: Vec<Entity>,
    side: Side,
) -> (Vec<Conflation>, Vec<Entity>) {
    let mut groups: HashMap<Identity, Vec<usize>> = HashMap::new();
    for (slot, conflation) in paired.iter().enumerate() {
        if let Some(entity) = side.entity(conflation) {
            groups.entry(entity.identity()).or_default().push(slot);
        }
    }

    let mut left = Vec::new();
    for part in remaining {
        let slot = match groups.get(&part.identity()) {
            Some(slots) if slots.len() == 1 => slots[0],
            _ => {
                left.push(part);
                continue;
            }
        };

        if let Some(entity) = side.entity_mut(&mut paired[slot]) {
            *entity = union_entity(entity, &part);
        }
    }

    (paired, left)
}

// ---------------------------------------------------------------------------
// Delete + create stitching
// ---------------------------------------------------------------------------

/// Fuse a lone deletion and a lone creation of the same identity into one
/// transition. Fused records are appended after the untouched ones.
pub fn merge_deleted_created(records: Vec<Conflation>) -> Vec<Conflation> {
    let mut deleted: HashMap<Identity, Vec<usize>> = HashMap::new();
    let mut created: HashMap<Identity, Vec<usize>> = HashMap::new();
    let mut order: Vec<Identity> = Vec::new();

    for (slot, record) in records.iter().enumerate() {
        match record {
            Conflation::Deleted { before, .. } => {
                let group = deleted.entry(before.identity()).or_default();
                if group.is_empty() {
                    order.push(before.identity());
                }
                group.push(slot);
            }
            Conflation::Created { after } => {
                created.entry(after.identity()).or_default().push(slot);
            }
            Conflation::Matched { .. } => {}
        }
    }

    let pairs: Vec<(usize, usize)> = order
        .iter()
        .filter_map(|identity| match (deleted.get(identity), created.get(identity)) {
            (Some(d), Some(c)) if d.len() == 1 && c.len() == 1 => Some((d[0], c[0])),
            _ => None,
        })
        .collect();

    if pairs.is_empty() {
        return records;
    }
    log::debug!("stitching {} delete/create pair(s)", pairs.len());

    let mut slots: Vec<Option<Conflation>> = records.into_iter().map(Some).collect();
    let mut fused = Vec::with_capacity(pairs.len());
    for (d, c) in pairs {
        let deletion = slots[d].take();
        let creation = slots[c].take();
        if let (
            Some(Conflation::Deleted {
                before,
                before_at_now,
            }),
            Some(Conflation::Created { after }),
        ) = (deletion, creation)
        {
            fused.push(Conflation::matched(before, before_at_now, after));
        }
    }

    slots.into_iter().flatten().chain(fused).collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `target` with its geometry unioned with the geometry of `part`.
fn union_entity(target: &Entity, part: &Entity) -> Entity {
    match (target.geometry(), part.geometry()) {
        (Some(t), Some(p)) => target.with_geometry(t.union(p)),
        (None, Some(p)) => target.with_geometry(p.clone()),
        _ => target.clone(),
    }
}

/// `None` stands for "touching", so it wins.
fn closest(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectKind;
    use crate::geometry::Geometry;

    fn way(id: i64, coords: &[[f64; 2]]) -> Entity {
        Entity::new(ObjectKind::Way, id, "").with_geometry(Geometry::LineString(coords.to_vec()))
    }

    fn matched(before: Entity, after: Entity) -> Conflation {
        Conflation::Matched {
            before,
            before_at_now: None,
            after,
            distance: None,
        }
    }

    fn ids(records: &[Conflation]) -> Vec<(Option<i64>, Option<i64>)> {
        records
            .iter()
            .map(|c| (c.before().map(|e| e.id), c.after().map(|e| e.id)))
            .collect()
    }

    #[test]
    fn uniq_merges_parts_of_the_same_pair() {
        let paired = vec![
            matched(way(1, &[[0.0, 0.0], [0.0, 1.0]]), way(2, &[[0.0, 0.0], [0.0, 1.0]])),
            matched(way(1, &[[0.0, 1.0], [0.0, 2.0]]), way(2, &[[0.0, 1.0], [0.0, 2.0]])),
            matched(way(1, &[[0.0, 2.0], [0.0, 3.0]]), way(3, &[[0.0, 2.0], [0.0, 3.0]])),
        ];
        let out = conflate_uniq(paired);
        assert_eq!(ids(&out), vec![(Some(1), Some(2)), (Some(1), Some(3))]);
        let whole = Geometry::LineString(vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]]);
        assert_eq!(out[0].before().and_then(Entity::geometry), Some(&whole));
        assert_eq!(out[0].after().and_then(Entity::geometry), Some(&whole));
    }

    #[test]
    fn uniq_is_idempotent() {
        let paired = vec![
            matched(way(1, &[[0.0, 0.0], [0.0, 1.0]]), way(2, &[[0.0, 0.0], [0.0, 1.0]])),
            matched(way(1, &[[0.0, 1.0], [0.0, 2.0]]), way(2, &[[0.0, 1.0], [0.0, 2.0]])),
        ];
        let once = conflate_uniq(paired);
        let twice = conflate_uniq(once.clone());
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(
            once[0].before().and_then(Entity::geometry),
            twice[0].before().and_then(Entity::geometry)
        );
    }

    #[test]
    fn remaining_parts_join_their_unique_match() {
        let paired = vec![matched(way(1, &[[0.0, 0.0], [0.0, 1.0]]), way(1, &[[0.0, 0.0], [0.0, 1.0]]))];
        let leftovers = vec![way(1, &[[0.0, 1.0], [0.0, 2.0]]), way(5, &[[9.0, 9.0], [9.0, 10.0]])];
        let (paired, left) = merge_remaining_parts(paired, leftovers, Side::Before);

        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, 5);
        assert_eq!(
            paired[0].before().and_then(Entity::geometry),
            Some(&Geometry::LineString(vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]]))
        );
        // The other side is untouched.
        assert_eq!(
            paired[0].after().and_then(Entity::geometry),
            Some(&Geometry::LineString(vec![[0.0, 0.0], [0.0, 1.0]]))
        );
    }

    #[test]
    fn remaining_parts_skip_ambiguous_identities() {
        let paired = vec![
            matched(way(1, &[[0.0, 0.0], [0.0, 1.0]]), way(2, &[[0.0, 0.0], [0.0, 1.0]])),
            matched(way(1, &[[0.0, 1.0], [0.0, 2.0]]), way(3, &[[0.0, 1.0], [0.0, 2.0]])),
        ];
        let leftovers = vec![way(1, &[[0.0, 2.0], [0.0, 3.0]])];
        let (_, left) = merge_remaining_parts(paired, leftovers, Side::Before);
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn remaining_after_parts_use_after_identity() {
        let paired = vec![matched(way(1, &[[0.0, 0.0], [0.0, 1.0]]), way(7, &[[0.0, 0.0], [0.0, 1.0]]))];
        let leftovers = vec![way(7, &[[0.0, 1.0], [0.0, 2.0]])];
        let (paired, left) = merge_remaining_parts(paired, leftovers, Side::After);
        assert!(left.is_empty());
        assert_eq!(
            paired[0].after().and_then(Entity::geometry),
            Some(&Geometry::LineString(vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]]))
        );
    }

    #[test]
    fn deleted_and_created_same_identity_fuse() {
        let records = vec![
            matched(way(4, &[[5.0, 5.0], [5.0, 6.0]]), way(4, &[[5.0, 5.0], [5.0, 6.0]])),
            Conflation::Deleted {
                before: way(1, &[[0.0, 0.0], [0.0, 1.0]]),
                before_at_now: None,
            },
            Conflation::Created {
                after: way(1, &[[0.0, 0.0], [0.0, 1.0]]),
            },
            Conflation::Created {
                after: way(2, &[[3.0, 0.0], [3.0, 1.0]]),
            },
        ];
        let out = merge_deleted_created(records);
        assert_eq!(
            ids(&out),
            vec![(Some(4), Some(4)), (None, Some(2)), (Some(1), Some(1))]
        );
        assert!(out[2].is_matched());
    }

    #[test]
    fn no_fusion_when_a_group_is_ambiguous() {
        let records = vec![
            Conflation::Deleted {
                before: way(1, &[[0.0, 0.0], [0.0, 1.0]]),
                before_at_now: None,
            },
            Conflation::Created {
                after: way(1, &[[0.0, 0.0], [0.0, 1.0]]),
            },
            Conflation::Created {
                after: way(1, &[[0.0, 5.0], [0.0, 6.0]]),
            },
        ];
        let out = merge_deleted_created(records);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| !c.is_matched()));
    }
}
