use std::path::Path;

use serde::Deserialize;

use crate::error::ConflateError;
use crate::projection::Projection;

/// Tie-break bonus added to cross-identity pairs.
pub const DEFAULT_IDENTITY_EPSILON: f64 = 0.000_001;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ConflateConfig {
    /// Maximum attachment distance, in the units of the projected coordinates.
    pub demi_distance: f64,
    /// EPSG code of the metric system longitude/latitude input is projected
    /// to before measuring. `None` measures the coordinates as given.
    #[serde(default)]
    pub srid: Option<u32>,
    #[serde(default = "default_identity_epsilon")]
    pub identity_epsilon: f64,
    /// Upper bound on greedy iterations. `None` runs until the matrix is exhausted.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub tags: TagRules,
    #[serde(default)]
    pub refs: RefRules,
}

fn default_identity_epsilon() -> f64 {
    DEFAULT_IDENTITY_EPSILON
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Rules driving the default tag distance.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRules {
    /// Keys naming the main category of an object. Objects sharing no
    /// primary key, or disagreeing on one, are never comparable.
    #[serde(default = "default_primary_keys")]
    pub primary_keys: Vec<String>,
    /// Keys left out of the comparison entirely.
    #[serde(default = "default_ignored_keys")]
    pub ignored_keys: Vec<String>,
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            primary_keys: default_primary_keys(),
            ignored_keys: default_ignored_keys(),
        }
    }
}

fn default_primary_keys() -> Vec<String> {
    [
        "aerialway",
        "aeroway",
        "amenity",
        "barrier",
        "boundary",
        "building",
        "craft",
        "emergency",
        "healthcare",
        "highway",
        "historic",
        "landuse",
        "leisure",
        "man_made",
        "natural",
        "office",
        "place",
        "power",
        "public_transport",
        "railway",
        "shop",
        "sport",
        "tourism",
        "waterway",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_ignored_keys() -> Vec<String> {
    ["source", "note", "fixme", "created_by"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Refs
// ---------------------------------------------------------------------------

/// Which tags make up the exact-match reference key.
#[derive(Debug, Clone, Deserialize)]
pub struct RefRules {
    #[serde(default = "default_ref_keys")]
    pub keys: Vec<String>,
    #[serde(default = "default_ref_prefixes")]
    pub prefixes: Vec<String>,
}

impl Default for RefRules {
    fn default() -> Self {
        Self {
            keys: default_ref_keys(),
            prefixes: default_ref_prefixes(),
        }
    }
}

fn default_ref_keys() -> Vec<String> {
    vec!["ref".into()]
}

fn default_ref_prefixes() -> Vec<String> {
    vec!["ref:".into()]
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ConflateConfig {
    pub fn new(demi_distance: f64) -> Self {
        Self {
            demi_distance,
            srid: None,
            identity_epsilon: DEFAULT_IDENTITY_EPSILON,
            max_iterations: None,
            tags: TagRules::default(),
            refs: RefRules::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ConflateError> {
        let config: ConflateConfig =
            toml::from_str(input).map_err(|e| ConflateError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConflateError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ConflateError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    /// Projection named by `srid`; planar when unset or unsupported.
    pub fn projection(&self) -> Projection {
        self.srid
            .and_then(Projection::from_srid)
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConflateError> {
        if !self.demi_distance.is_finite() || self.demi_distance <= 0.0 {
            return Err(ConflateError::ConfigValidation(format!(
                "demi_distance must be a positive finite number, got {}",
                self.demi_distance
            )));
        }

        if !self.identity_epsilon.is_finite() || self.identity_epsilon < 0.0 {
            return Err(ConflateError::ConfigValidation(format!(
                "identity_epsilon must be a non-negative finite number, got {}",
                self.identity_epsilon
            )));
        }

        if let Some(srid) = self.srid {
            if Projection::from_srid(srid).is_none() {
                return Err(ConflateError::ConfigValidation(format!(
                    "unsupported srid {srid}"
                )));
            }
        }

        if self.max_iterations == Some(0) {
            return Err(ConflateError::ConfigValidation(
                "max_iterations must be at least 1 when set".into(),
            ));
        }

        if let Some(empty) = self.refs.prefixes.iter().find(|p| p.is_empty()) {
            return Err(ConflateError::ConfigValidation(format!(
                "refs.prefixes must not contain an empty prefix ({empty:?} would match every tag)"
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
demi_distance = 200.0
srid = 2154
identity_epsilon = 0.0001
max_iterations = 5000

[tags]
primary_keys = ["amenity", "highway"]
ignored_keys = ["source"]

[refs]
keys = ["ref", "wikidata"]
prefixes = ["ref:"]
"#;

    #[test]
    fn parse_full_config() {
        let config = ConflateConfig::from_toml(FULL).unwrap();
        assert_eq!(config.demi_distance, 200.0);
        assert_eq!(config.srid, Some(2154));
        assert_eq!(config.projection(), Projection::Lambert93);
        assert_eq!(config.identity_epsilon, 0.0001);
        assert_eq!(config.max_iterations, Some(5000));
        assert_eq!(config.tags.primary_keys, vec!["amenity", "highway"]);
        assert_eq!(config.tags.ignored_keys, vec!["source"]);
        assert_eq!(config.refs.keys, vec!["ref", "wikidata"]);
    }

    #[test]
    fn parse_minimal_config_uses_defaults() {
        let config = ConflateConfig::from_toml("demi_distance = 1.0").unwrap();
        assert_eq!(config.identity_epsilon, DEFAULT_IDENTITY_EPSILON);
        assert!(config.max_iterations.is_none());
        assert_eq!(config.projection(), Projection::Planar);
        assert!(config.tags.primary_keys.iter().any(|k| k == "highway"));
        assert_eq!(config.refs.keys, vec!["ref"]);
        assert_eq!(config.refs.prefixes, vec!["ref:"]);
    }

    #[test]
    fn reject_missing_demi_distance() {
        let err = ConflateConfig::from_toml("identity_epsilon = 0.1").unwrap_err();
        assert!(matches!(err, ConflateError::ConfigParse(_)));
    }

    #[test]
    fn reject_non_positive_demi_distance() {
        let err = ConflateConfig::from_toml("demi_distance = 0.0").unwrap_err();
        assert!(err.to_string().contains("demi_distance"));

        let err = ConflateConfig::new(f64::NAN).validate().unwrap_err();
        assert!(err.to_string().contains("demi_distance"));
    }

    #[test]
    fn reject_negative_epsilon() {
        let err = ConflateConfig::from_toml("demi_distance = 1.0\nidentity_epsilon = -1.0")
            .unwrap_err();
        assert!(err.to_string().contains("identity_epsilon"));
    }

    #[test]
    fn reject_unsupported_srid() {
        let err = ConflateConfig::from_toml("demi_distance = 1.0\nsrid = 27700").unwrap_err();
        assert!(matches!(err, ConflateError::ConfigValidation(_)));
        assert!(err.to_string().contains("27700"));
    }

    #[test]
    fn reject_zero_iteration_budget() {
        let err =
            ConflateConfig::from_toml("demi_distance = 1.0\nmax_iterations = 0").unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn reject_empty_ref_prefix() {
        let input = "demi_distance = 1.0\n[refs]\nprefixes = [\"\"]";
        let err = ConflateConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("refs.prefixes"));
    }

    #[test]
    fn load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflate.toml");
        std::fs::write(&path, FULL).unwrap();
        let config = ConflateConfig::from_path(&path).unwrap();
        assert_eq!(config.max_iterations, Some(5000));

        let missing = dir.path().join("missing.toml");
        let err = ConflateConfig::from_path(&missing).unwrap_err();
        assert!(matches!(err, ConflateError::Io(_)));
    }
}
