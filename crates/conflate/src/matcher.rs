use std::collections::{BTreeMap, HashMap};

use crate::entity::{Entity, Identity};
use crate::metrics::{Metrics, RefKey};
use crate::model::Conflation;

/// Output of an exact pass: the matches plus whatever is left on each side.
#[derive(Debug)]
pub struct PairMatchOutput {
    pub matched: Vec<Conflation>,
    pub befores: Vec<Entity>,
    pub afters: Vec<Entity>,
}

/// Match befores and afters sharing a reference key that is unique on both
/// sides. Keys are visited in sorted order.
pub fn conflate_by_refs<M: Metrics + ?Sized>(
    metrics: &M,
    befores: Vec<Entity>,
    afters: Vec<Entity>,
    after_index: &HashMap<Identity, Entity>,
) -> PairMatchOutput {
    let before_refs = unique_refs(metrics, &befores);
    let after_refs = unique_refs(metrics, &afters);

    let pairs: Vec<(usize, usize)> = before_refs
        .iter()
        .filter_map(|(key, bi)| after_refs.get(key).map(|ai| (*bi, *ai)))
        .collect();

    if pairs.is_empty() {
        return PairMatchOutput {
            matched: Vec::new(),
            befores,
            afters,
        };
    }

    let mut befores: Vec<Option<Entity>> = befores.into_iter().map(Some).collect();
    let mut afters: Vec<Option<Entity>> = afters.into_iter().map(Some).collect();

    let matched = pairs
        .into_iter()
        .filter_map(|(bi, ai)| {
            let before = befores[bi].take()?;
            let after = afters[ai].take()?;
            let before_at_now = after_index.get(&before.identity()).cloned();
            Some(Conflation::Matched {
                before,
                before_at_now,
                after,
                distance: None,
            })
        })
        .collect::<Vec<_>>();

    log::debug!("matched {} pair(s) by reference", matched.len());

    PairMatchOutput {
        matched,
        befores: befores.into_iter().flatten().collect(),
        afters: afters.into_iter().flatten().collect(),
    }
}

/// Reference key → index, for non-empty keys held by exactly one entity.
fn unique_refs<M: Metrics + ?Sized>(metrics: &M, entities: &[Entity]) -> BTreeMap<RefKey, usize> {
    let mut groups: BTreeMap<RefKey, Vec<usize>> = BTreeMap::new();
    for (i, entity) in entities.iter().enumerate() {
        let key = metrics.refs(&entity.tags);
        if !key.is_empty() {
            groups.entry(key).or_default().push(i);
        }
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() == 1)
        .map(|(key, group)| (key, group[0]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflateConfig;
    use crate::entity::ObjectKind;
    use crate::metrics::DefaultMetrics;

    fn entity(id: i64, tags: &[(&str, &str)]) -> Entity {
        Entity::new(ObjectKind::Node, id, r#"{"type":"Point","coordinates":[0,0]}"#)
            .with_tags(tags.iter().copied())
    }

    fn run(befores: Vec<Entity>, afters: Vec<Entity>) -> PairMatchOutput {
        let index = afters.iter().map(|a| (a.identity(), a.clone())).collect();
        let metrics = DefaultMetrics::from_config(&ConflateConfig::new(1.0));
        conflate_by_refs(&metrics, befores, afters, &index)
    }

    #[test]
    fn matches_shared_unique_ref_despite_other_tags() {
        let out = run(
            vec![entity(1, &[("ref", "a"), ("foo", "a")])],
            vec![entity(9, &[("ref", "a"), ("foo", "b")])],
        );
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].before().map(|e| e.id), Some(1));
        assert_eq!(out.matched[0].after().map(|e| e.id), Some(9));
        assert!(out.matched[0].before_at_now().is_none());
        assert!(out.befores.is_empty());
        assert!(out.afters.is_empty());
    }

    #[test]
    fn before_at_now_uses_identity_lookup() {
        let out = run(vec![entity(1, &[("ref", "a")])], vec![entity(1, &[("ref", "a")])]);
        assert_eq!(out.matched[0].before_at_now().map(|e| e.id), Some(1));
    }

    #[test]
    fn different_refs_do_not_match() {
        let out = run(vec![entity(1, &[("ref", "a")])], vec![entity(1, &[("ref", "b")])]);
        assert!(out.matched.is_empty());
        assert_eq!(out.befores.len(), 1);
        assert_eq!(out.afters.len(), 1);
    }

    #[test]
    fn ambiguous_refs_are_skipped() {
        let out = run(
            vec![entity(1, &[("ref", "a")]), entity(2, &[("ref", "a")])],
            vec![entity(3, &[("ref", "a")])],
        );
        assert!(out.matched.is_empty());
        assert_eq!(out.befores.len(), 2);
        assert_eq!(out.afters.len(), 1);
    }

    #[test]
    fn no_ref_tags_are_ignored() {
        let out = run(vec![entity(1, &[("highway", "a")])], vec![entity(1, &[("highway", "a")])]);
        assert!(out.matched.is_empty());
    }

    #[test]
    fn matches_come_out_in_key_order_and_keep_leftover_order() {
        let out = run(
            vec![
                entity(1, &[("ref", "b")]),
                entity(2, &[("highway", "x")]),
                entity(3, &[("ref", "a")]),
                entity(4, &[("highway", "y")]),
            ],
            vec![entity(10, &[("ref", "a")]), entity(11, &[("ref", "b")])],
        );
        let ids: Vec<i64> = out.matched.iter().filter_map(|c| c.before().map(|e| e.id)).collect();
        assert_eq!(ids, vec![3, 1]);
        let left: Vec<i64> = out.befores.iter().map(|e| e.id).collect();
        assert_eq!(left, vec![2, 4]);
    }
}
