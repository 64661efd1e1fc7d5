use crate::config::RefRules;
use crate::entity::Tags;
use crate::metrics::RefKey;

/// The reference tags of an object: keys listed in `rules.keys` or starting
/// with one of `rules.prefixes`.
pub fn ref_key(rules: &RefRules, tags: &Tags) -> RefKey {
    tags.iter()
        .filter(|(k, v)| {
            !v.is_empty()
                && (rules.keys.iter().any(|r| r == *k)
                    || rules.prefixes.iter().any(|p| k.starts_with(p.as_str())))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn picks_ref_and_prefixed_keys() {
        let rules = RefRules::default();
        let key = ref_key(
            &rules,
            &tags(&[("ref", "A1"), ("ref:FR:SIREN", "123"), ("name", "x"), ("reference", "no")]),
        );
        assert_eq!(key, tags(&[("ref", "A1"), ("ref:FR:SIREN", "123")]));
    }

    #[test]
    fn no_reference_tags_is_empty() {
        let rules = RefRules::default();
        assert!(ref_key(&rules, &tags(&[("highway", "residential")])).is_empty());
        assert!(ref_key(&rules, &tags(&[("ref", "")])).is_empty());
    }

    #[test]
    fn custom_keys() {
        let rules = RefRules {
            keys: vec!["wikidata".into()],
            prefixes: vec![],
        };
        let key = ref_key(&rules, &tags(&[("wikidata", "Q1"), ("ref", "A1")]));
        assert_eq!(key, tags(&[("wikidata", "Q1")]));
    }
}
