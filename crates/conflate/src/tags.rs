use crate::config::TagRules;
use crate::entity::Tags;

/// Distance between the tags of a before object and an after object.
///
/// `None` when the objects are not comparable: no primary key on one side,
/// no primary key in common, or a common primary key with different values.
/// Otherwise the mean per-key distance over the before tags; tags only
/// present on the after side are free.
pub fn tags_distance(rules: &TagRules, before: &Tags, after: &Tags) -> Option<f64> {
    let is_primary = |k: &String| rules.primary_keys.iter().any(|p| p == k);

    let mut shared_primary = false;
    let mut before_has_primary = false;
    for (k, v) in before.iter().filter(|(k, _)| is_primary(*k)) {
        before_has_primary = true;
        if let Some(after_value) = after.get(k) {
            if normalize(v) != normalize(after_value) {
                return None;
            }
            shared_primary = true;
        }
    }
    if !before_has_primary || !shared_primary {
        return None;
    }

    let scored: Vec<(&String, &String)> = before
        .iter()
        .filter(|(k, _)| !rules.ignored_keys.iter().any(|i| i == *k))
        .collect();
    if scored.is_empty() {
        return Some(0.0);
    }

    let total: f64 = scored
        .iter()
        .map(|(k, v)| match after.get(*k) {
            None => 1.0,
            Some(after_value) => value_distance(v, after_value),
        })
        .sum();

    Some(total / scored.len() as f64)
}

/// Values are `;`-separated lists; element order does not matter.
fn normalize(value: &str) -> String {
    let mut parts: Vec<&str> = value.split(';').map(str::trim).filter(|p| !p.is_empty()).collect();
    parts.sort_unstable();
    parts.join(";")
}

fn value_distance(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a == b {
        return 0.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    levenshtein_distance(&a, &b) as f64 / longest as f64
}

/// Minimum number of single-character insertions, deletions and
/// substitutions turning `a` into `b`.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
