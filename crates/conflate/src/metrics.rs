use crate::config::{ConflateConfig, RefRules, TagRules};
use crate::entity::Tags;
use crate::geometry::Geometry;

/// Exact-match reference key. Empty means "no reference".
pub type RefKey = Tags;

/// Outcome of comparing two geometries that may correspond.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomDistance {
    /// Smaller is closer.
    pub cost: f64,
    /// Part of the before geometry not accounted for by the after geometry.
    pub remaining_before: Option<Geometry>,
    /// Part of the after geometry not accounted for by the before geometry.
    pub remaining_after: Option<Geometry>,
}

impl GeomDistance {
    /// Full correspondence at the given cost.
    pub fn full(cost: f64) -> Self {
        Self {
            cost,
            remaining_before: None,
            remaining_after: None,
        }
    }
}

/// The scoring functions the engine is parameterized over.
pub trait Metrics {
    /// Reference key extracted from tags.
    fn refs(&self, tags: &Tags) -> RefKey;

    /// `None` when the tag sets are not comparable. Otherwise a non-negative
    /// score, 0 for effectively identical tags.
    fn tag_distance(&self, before: &Tags, after: &Tags) -> Option<f64>;

    /// `None` when the geometries cannot correspond within `demi_distance`.
    fn geom_distance(
        &self,
        before: &Geometry,
        after: &Geometry,
        demi_distance: f64,
    ) -> Option<GeomDistance>;
}

/// Built-in metrics, configured from [`ConflateConfig`].
#[derive(Debug, Clone, Default)]
pub struct DefaultMetrics {
    pub tags: TagRules,
    pub refs: RefRules,
}

impl DefaultMetrics {
    pub fn from_config(config: &ConflateConfig) -> Self {
        Self {
            tags: config.tags.clone(),
            refs: config.refs.clone(),
        }
    }
}

impl Metrics for DefaultMetrics {
    fn refs(&self, tags: &Tags) -> RefKey {
        crate::refs::ref_key(&self.refs, tags)
    }

    fn tag_distance(&self, before: &Tags, after: &Tags) -> Option<f64> {
        crate::tags::tags_distance(&self.tags, before, after)
    }

    fn geom_distance(
        &self,
        before: &Geometry,
        after: &Geometry,
        demi_distance: f64,
    ) -> Option<GeomDistance> {
        crate::distance::geom_distance(before, after, demi_distance)
    }
}
