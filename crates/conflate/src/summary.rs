use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::entity::Identity;
use crate::model::Conflation;

/// Counts over a conflation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflationSummary {
    pub total: usize,
    pub matched: usize,
    pub deleted: usize,
    pub created: usize,
    /// Before identities matched to more than one after identity.
    pub splits: usize,
    /// After identities matched from more than one before identity.
    pub merges: usize,
}

pub fn compute_summary(records: &[Conflation]) -> ConflationSummary {
    let mut matched = 0;
    let mut deleted = 0;
    let mut created = 0;
    let mut afters_of: HashMap<Identity, HashSet<Identity>> = HashMap::new();
    let mut befores_of: HashMap<Identity, HashSet<Identity>> = HashMap::new();

    for record in records {
        match record {
            Conflation::Matched { before, after, .. } => {
                matched += 1;
                afters_of
                    .entry(before.identity())
                    .or_default()
                    .insert(after.identity());
                befores_of
                    .entry(after.identity())
                    .or_default()
                    .insert(before.identity());
            }
            Conflation::Deleted { .. } => deleted += 1,
            Conflation::Created { .. } => created += 1,
        }
    }

    ConflationSummary {
        total: records.len(),
        matched,
        deleted,
        created,
        splits: afters_of.values().filter(|s| s.len() > 1).count(),
        merges: befores_of.values().filter(|s| s.len() > 1).count(),
    }
}
