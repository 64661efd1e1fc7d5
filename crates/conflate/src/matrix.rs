use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ConflateConfig;
use crate::entity::Entity;
use crate::geometry::Geometry;
use crate::metrics::{GeomDistance, Metrics};

// ---------------------------------------------------------------------------
// Cost
// ---------------------------------------------------------------------------

/// Match cost of a (before, after) pair. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cost {
    pub tags: f64,
    pub geometry: f64,
    /// 0 for the same identity, the configured epsilon otherwise.
    pub identity: f64,
}

impl Cost {
    pub fn total(&self) -> f64 {
        self.tags + self.geometry + self.identity
    }
}

/// A matrix entry: the cost plus what would be left over on each side.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub cost: Cost,
    pub remaining_before: Option<Geometry>,
    pub remaining_after: Option<Geometry>,
}

/// Entries keyed by (before index, after index).
pub type DistanceMatrix = BTreeMap<(usize, usize), Candidate>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Pairwise costs of every compatible (before, after) combination. Keys
/// index into `befores` and `afters`.
pub fn conflate_matrix<M: Metrics + ?Sized>(
    metrics: &M,
    befores: &[Entity],
    afters: &[Entity],
    config: &ConflateConfig,
) -> DistanceMatrix {
    let befores: Vec<(usize, &Entity)> = befores.iter().enumerate().collect();
    let afters: Vec<(usize, &Entity)> = afters.iter().enumerate().collect();
    let mut matrix = DistanceMatrix::new();
    extend_matrix(&mut matrix, metrics, &befores, &afters, config);
    matrix
}

/// Add the entries of `befores × afters` to `matrix`, keyed by the given
/// indices.
pub(crate) fn extend_matrix<M: Metrics + ?Sized>(
    matrix: &mut DistanceMatrix,
    metrics: &M,
    befores: &[(usize, &Entity)],
    afters: &[(usize, &Entity)],
    config: &ConflateConfig,
) {
    // On a 1x1 matrix of areas, tags alone decide.
    let single_pair = befores.len() == 1 && afters.len() == 1;

    for &(bi, before) in befores {
        let Some(before_geometry) = before.geometry() else {
            continue;
        };

        for &(ai, after) in afters {
            let Some(after_geometry) = after.geometry() else {
                continue;
            };

            let Some(tags) = metrics.tag_distance(&before.tags, &after.tags) else {
                continue;
            };

            let geometry = if before_geometry == after_geometry
                || (single_pair && before_geometry.dimension() == 2 && after_geometry.dimension() == 2)
            {
                GeomDistance::full(0.0)
            } else {
                match metrics.geom_distance(before_geometry, after_geometry, config.demi_distance) {
                    Some(g) => g,
                    None => continue,
                }
            };

            let identity = if before.identity() == after.identity() {
                0.0
            } else {
                config.identity_epsilon
            };

            matrix.insert(
                (bi, ai),
                Candidate {
                    cost: Cost {
                        tags,
                        geometry: geometry.cost,
                        identity,
                    },
                    remaining_before: geometry.remaining_before,
                    remaining_after: geometry.remaining_after,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectKind;
    use crate::metrics::DefaultMetrics;

    const SQUARE: &str = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#;
    const FAR_SQUARE: &str = r#"{"type":"Polygon","coordinates":[[[50,0],[51,0],[51,1],[50,1],[50,0]]]}"#;

    fn entity(id: i64, geom: &str, tags: &[(&str, &str)]) -> Entity {
        Entity::new(ObjectKind::Node, id, geom).with_tags(tags.iter().copied())
    }

    fn point(x: f64, y: f64) -> String {
        format!(r#"{{"type":"Point","coordinates":[{x},{y}]}}"#)
    }

    fn build(befores: &[Entity], afters: &[Entity]) -> DistanceMatrix {
        let config = ConflateConfig::new(1.0);
        conflate_matrix(&DefaultMetrics::from_config(&config), befores, afters, &config)
    }

    #[test]
    fn exact_geometry_and_tags_cost_nothing() {
        let befores = [entity(1, &point(0.0, 0.0), &[("amenity", "bicycle_parking")])];
        let afters = [entity(1, &point(0.0, 0.0), &[("amenity", "bicycle_parking")])];
        let matrix = build(&befores, &afters);
        assert_eq!(matrix.len(), 1);
        let c = &matrix[&(0, 0)];
        assert_eq!(c.cost.tags, 0.0);
        assert_eq!(c.cost.geometry, 0.0);
        assert_eq!(c.cost.identity, 0.0);
        assert_eq!(c.cost.total(), 0.0);
    }

    #[test]
    fn incomparable_tags_leave_no_entry() {
        let befores = [entity(1, &point(0.0, 0.0), &[("amenity", "bicycle_parking")])];
        let afters = [entity(1, &point(0.0, 0.0), &[("amenity", "parking")])];
        assert!(build(&befores, &afters).is_empty());
    }

    #[test]
    fn too_far_leaves_no_entry() {
        let befores = [entity(1, &point(0.0, 0.0), &[("amenity", "bicycle_parking")])];
        let afters = [entity(1, &point(0.0, 2.0), &[("amenity", "bicycle_parking")])];
        assert!(build(&befores, &afters).is_empty());
    }

    #[test]
    fn missing_geometry_is_skipped() {
        let befores = [entity(1, "not geojson", &[("highway", "a")])];
        let afters = [entity(1, &point(0.0, 0.0), &[("highway", "a")])];
        assert!(build(&befores, &afters).is_empty());
        assert!(build(&afters, &befores).is_empty());
    }

    #[test]
    fn other_identity_pays_epsilon() {
        let befores = [entity(1, &point(0.0, 0.0), &[("highway", "a")])];
        let afters = [
            entity(1, &point(0.0, 0.5), &[("highway", "a")]),
            entity(2, &point(0.0, 0.5), &[("highway", "a")]),
        ];
        let matrix = build(&befores, &afters);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[&(0, 0)].cost.identity, 0.0);
        assert_eq!(matrix[&(0, 1)].cost.identity, 0.000_001);
        assert!(matrix[&(0, 0)].cost.total() < matrix[&(0, 1)].cost.total());
    }

    #[test]
    fn single_area_pair_skips_geometry_comparison() {
        let befores = [entity(1, SQUARE, &[("building", "yes")])];
        let afters = [entity(1, FAR_SQUARE, &[("building", "yes")])];
        let matrix = build(&befores, &afters);
        assert_eq!(matrix[&(0, 0)].cost.geometry, 0.0);

        // With a second candidate the shortcut no longer applies.
        let afters = [
            entity(1, FAR_SQUARE, &[("building", "yes")]),
            entity(2, SQUARE, &[("building", "yes")]),
        ];
        let matrix = build(&befores, &afters);
        assert!(!matrix.contains_key(&(0, 0)));
        assert!(matrix.contains_key(&(0, 1)));
    }
}
