use serde::Serialize;

use crate::entity::Entity;

// ---------------------------------------------------------------------------
// Conflation records
// ---------------------------------------------------------------------------

/// What happened to an object between the two snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Conflation {
    /// `before` became `after`. `before_at_now` is the latest known state of
    /// the before identity, looked up independently of the match.
    Matched {
        before: Entity,
        before_at_now: Option<Entity>,
        after: Entity,
        /// Planar distance between the two geometries, `None` when they touch.
        #[serde(skip_serializing_if = "Option::is_none")]
        distance: Option<f64>,
    },
    /// `before` has no counterpart after the change.
    Deleted {
        before: Entity,
        before_at_now: Option<Entity>,
    },
    /// `after` has no counterpart before the change.
    Created { after: Entity },
}

impl Conflation {
    /// A two-sided record, with the diagnostic distance computed from the
    /// two geometries.
    pub fn matched(before: Entity, before_at_now: Option<Entity>, after: Entity) -> Self {
        let distance = point_distance(&before, &after);
        Self::Matched {
            before,
            before_at_now,
            after,
            distance,
        }
    }

    pub fn before(&self) -> Option<&Entity> {
        match self {
            Self::Matched { before, .. } | Self::Deleted { before, .. } => Some(before),
            Self::Created { .. } => None,
        }
    }

    pub fn before_at_now(&self) -> Option<&Entity> {
        match self {
            Self::Matched { before_at_now, .. } | Self::Deleted { before_at_now, .. } => {
                before_at_now.as_ref()
            }
            Self::Created { .. } => None,
        }
    }

    pub fn after(&self) -> Option<&Entity> {
        match self {
            Self::Matched { after, .. } | Self::Created { after } => Some(after),
            Self::Deleted { .. } => None,
        }
    }

    pub fn distance(&self) -> Option<f64> {
        match self {
            Self::Matched { distance, .. } => *distance,
            _ => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    pub(crate) fn before_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Self::Matched { before, .. } | Self::Deleted { before, .. } => Some(before),
            Self::Created { .. } => None,
        }
    }

    pub(crate) fn after_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Self::Matched { after, .. } | Self::Created { after } => Some(after),
            Self::Deleted { .. } => None,
        }
    }
}

/// Diagnostic distance between two geometries; `None` when either is
/// missing or the distance is exactly zero.
pub(crate) fn point_distance(before: &Entity, after: &Entity) -> Option<f64> {
    match (before.geometry(), after.geometry()) {
        (Some(b), Some(a)) => Some(b.distance(a)).filter(|d| *d != 0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectKind;

    fn node(id: i64, x: f64) -> Entity {
        Entity::new(ObjectKind::Node, id, format!(r#"{{"type":"Point","coordinates":[{x},0]}}"#))
    }

    #[test]
    fn accessors_follow_the_shape() {
        let matched = Conflation::matched(node(1, 0.0), Some(node(1, 5.0)), node(2, 3.0));
        assert_eq!(matched.before().map(Entity::identity), Some(node(1, 0.0).identity()));
        assert_eq!(matched.after().map(|e| e.id), Some(2));
        assert_eq!(matched.before_at_now().map(|e| e.id), Some(1));
        assert_eq!(matched.distance(), Some(3.0));
        assert!(matched.is_matched());

        let deleted = Conflation::Deleted {
            before: node(1, 0.0),
            before_at_now: None,
        };
        assert!(deleted.after().is_none());
        assert!(deleted.distance().is_none());

        let created = Conflation::Created { after: node(3, 0.0) };
        assert!(created.before().is_none());
        assert!(created.before_at_now().is_none());
    }

    #[test]
    fn touching_geometries_have_no_distance() {
        let matched = Conflation::matched(node(1, 0.0), None, node(1, 0.0));
        assert_eq!(matched.distance(), None);
    }

    #[test]
    fn serializes_with_status_tag() {
        let created = Conflation::Created { after: node(3, 0.0) };
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["after"]["id"], 3);
        assert_eq!(json["after"]["kind"], "node");
    }
}
