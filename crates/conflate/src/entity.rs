use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::projection::Projection;

pub type Tags = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Node,
    Way,
    Relation,
}

impl ObjectKind {
    pub fn initial(&self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Way => write!(f, "way"),
            Self::Relation => write!(f, "relation"),
        }
    }
}

/// Identity of an object across versions: (kind, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identity {
    pub kind: ObjectKind,
    pub id: i64,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.initial(), self.id)
    }
}

/// Set-membership key: identity plus serialized geometry. Version is not
/// part of it, so two versions with byte-identical geometry collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: ObjectKind,
    pub id: i64,
    pub geom: String,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One version of an object, as observed in one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    /// Logical-history object this version belongs to; 0 when unassigned.
    pub locha_id: i64,
    pub kind: ObjectKind,
    pub id: i64,
    pub version: u32,
    pub deleted: bool,
    pub author: String,
    pub created: Option<DateTime<Utc>>,
    pub tags: Tags,
    pub members: Option<Vec<i64>>,
    geom: String,
    #[serde(skip)]
    projection: Projection,
    #[serde(skip)]
    geometry: OnceCell<Option<Geometry>>,
}

impl Entity {
    /// A version-1, non-deleted entity with no tags. `geom` is GeoJSON.
    pub fn new(kind: ObjectKind, id: i64, geom: impl Into<String>) -> Self {
        Self {
            locha_id: 0,
            kind,
            id,
            version: 1,
            deleted: false,
            author: String::new(),
            created: None,
            tags: Tags::new(),
            members: None,
            geom: geom.into(),
            projection: Projection::Planar,
            geometry: OnceCell::new(),
        }
    }

    pub fn with_locha_id(mut self, locha_id: i64) -> Self {
        self.locha_id = locha_id;
        self
    }

    /// Decode `geom` (longitude/latitude) into `projection` coordinates.
    /// Drops any geometry decoded so far.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        if self.projection != projection {
            self.projection = projection;
            self.geometry = OnceCell::new();
        }
        self
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_members(mut self, members: Vec<i64>) -> Self {
        self.members = Some(members);
        self
    }

    pub fn with_tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags = tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Copy of this entity carrying another geometry (a remainder or union
    /// part), given in projected coordinates.
    pub fn with_geometry(&self, geometry: Geometry) -> Self {
        let mut copy = self.clone();
        copy.geom = geometry.unproject(&self.projection).to_geojson();
        copy.geometry = OnceCell::with_value(Some(geometry));
        copy
    }

    pub fn identity(&self) -> Identity {
        Identity {
            kind: self.kind,
            id: self.id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            kind: self.kind,
            id: self.id,
            geom: self.geom.clone(),
        }
    }

    /// Serialized GeoJSON geometry.
    pub fn geom(&self) -> &str {
        &self.geom
    }

    /// Parsed and projected geometry, decoded on first access. `None` when
    /// undecodable.
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry
            .get_or_init(|| Geometry::parse(&self.geom)?.project(&self.projection))
            .as_ref()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}", self.kind.initial(), self.id, self.version)
    }
}
