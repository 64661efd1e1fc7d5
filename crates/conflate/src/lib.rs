//! `lochist-conflate`: before/after conflation of OpenStreetMap objects.
//!
//! Pure engine crate: receives two snapshots of tagged geometries, returns
//! which objects became which, including splits, merges, deletions and
//! creations. No CLI or IO dependencies.

pub mod config;
pub mod distance;
pub mod engine;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod matcher;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod projection;
pub mod reconcile;
pub mod refs;
pub mod summary;
pub mod tags;

pub use config::ConflateConfig;
pub use engine::{conflate, conflate_with_metrics, conflate_with_simplification};
pub use entity::{Entity, Identity, ObjectKind};
pub use error::ConflateError;
pub use matrix::conflate_matrix;
pub use metrics::{DefaultMetrics, Metrics};
pub use model::Conflation;
pub use projection::Projection;
pub use summary::{compute_summary, ConflationSummary};
