//! Planar GeoJSON geometry.
//!
//! All measurements are Euclidean in the coordinate units. Entities decode
//! through a [`Projection`] first, so with a metric projection the units are
//! meters.

use serde::{Deserialize, Serialize};

use crate::projection::Projection;

pub type Coord = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
}

/// A straight piece of a line or polygon ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Coord,
    pub end: Coord,
}

impl Segment {
    pub fn length(&self) -> f64 {
        dist(self.start, self.end)
    }

    /// Point at parameter `t` along the segment. Exact at both ends.
    pub fn at(&self, t: f64) -> Coord {
        if t <= 0.0 {
            self.start
        } else if t >= 1.0 {
            self.end
        } else {
            [
                self.start[0] + t * (self.end[0] - self.start[0]),
                self.start[1] + t * (self.end[1] - self.start[1]),
            ]
        }
    }
}

impl Geometry {
    /// Decode a GeoJSON geometry. Anything undecodable or degenerate is `None`.
    pub fn parse(src: &str) -> Option<Geometry> {
        match serde_json::from_str::<Geometry>(src) {
            Ok(geometry) if geometry.is_valid() => Some(geometry),
            Ok(_) => {
                log::debug!("rejecting degenerate geometry {src}");
                None
            }
            Err(e) => {
                log::debug!("cannot decode geometry {src}: {e}");
                None
            }
        }
    }

    /// Geometry in `projection` coordinates; `None` when a coordinate falls
    /// outside the projection's domain.
    pub fn project(&self, projection: &Projection) -> Option<Geometry> {
        if projection.is_planar() {
            return Some(self.clone());
        }
        let projected = self.map_coords(|c| projection.forward(c));
        if projected.is_valid() {
            Some(projected)
        } else {
            log::debug!("geometry falls outside {projection:?}");
            None
        }
    }

    /// Back to longitude/latitude from `projection` coordinates.
    pub fn unproject(&self, projection: &Projection) -> Geometry {
        if projection.is_planar() {
            return self.clone();
        }
        self.map_coords(|c| projection.inverse(c))
    }

    pub fn map_coords(&self, f: impl Fn(Coord) -> Coord) -> Geometry {
        let line = |l: &Vec<Coord>| l.iter().map(|c| f(*c)).collect::<Vec<_>>();
        let lines = |ls: &Vec<Vec<Coord>>| ls.iter().map(line).collect::<Vec<_>>();
        match self {
            Self::Point(c) => Self::Point(f(*c)),
            Self::MultiPoint(cs) => Self::MultiPoint(line(cs)),
            Self::LineString(l) => Self::LineString(line(l)),
            Self::MultiLineString(ls) => Self::MultiLineString(lines(ls)),
            Self::Polygon(p) => Self::Polygon(lines(p)),
            Self::MultiPolygon(ps) => Self::MultiPolygon(ps.iter().map(lines).collect()),
        }
    }

    pub fn to_geojson(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        let finite = |c: &Coord| c[0].is_finite() && c[1].is_finite();
        let line_ok = |l: &Vec<Coord>| l.len() >= 2 && l.iter().all(finite);
        let ring_ok = |r: &Vec<Coord>| r.len() >= 4 && r.first() == r.last() && r.iter().all(finite);
        let polygon_ok = |p: &Vec<Vec<Coord>>| !p.is_empty() && p.iter().all(ring_ok);

        match self {
            Self::Point(c) => finite(c),
            Self::MultiPoint(cs) => !cs.is_empty() && cs.iter().all(finite),
            Self::LineString(l) => line_ok(l),
            Self::MultiLineString(ls) => !ls.is_empty() && ls.iter().all(line_ok),
            Self::Polygon(p) => polygon_ok(p),
            Self::MultiPolygon(ps) => !ps.is_empty() && ps.iter().all(polygon_ok),
        }
    }

    /// 0 for points, 1 for lines, 2 for areas.
    pub fn dimension(&self) -> u8 {
        match self {
            Self::Point(_) | Self::MultiPoint(_) => 0,
            Self::LineString(_) | Self::MultiLineString(_) => 1,
            Self::Polygon(_) | Self::MultiPolygon(_) => 2,
        }
    }

    /// All vertices, in order.
    pub fn coords(&self) -> Vec<Coord> {
        match self {
            Self::Point(c) => vec![*c],
            Self::MultiPoint(cs) | Self::LineString(cs) => cs.clone(),
            Self::MultiLineString(ls) | Self::Polygon(ls) => ls.concat(),
            Self::MultiPolygon(ps) => ps.iter().flat_map(|p| p.concat()).collect(),
        }
    }

    /// Line parts of a 1-dimensional geometry, rings of a 2-dimensional one.
    pub fn paths(&self) -> Vec<&[Coord]> {
        match self {
            Self::Point(_) | Self::MultiPoint(_) => Vec::new(),
            Self::LineString(l) => vec![l.as_slice()],
            Self::MultiLineString(ls) | Self::Polygon(ls) => ls.iter().map(Vec::as_slice).collect(),
            Self::MultiPolygon(ps) => ps.iter().flatten().map(Vec::as_slice).collect(),
        }
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.paths()
            .into_iter()
            .flat_map(|path| {
                path.windows(2).map(|w| Segment {
                    start: w[0],
                    end: w[1],
                })
            })
            .collect()
    }

    /// Total length of the lines (or ring perimeters).
    pub fn length(&self) -> f64 {
        self.segments().iter().map(Segment::length).sum()
    }

    fn polygons(&self) -> Vec<&[Vec<Coord>]> {
        match self {
            Self::Polygon(p) => vec![p.as_slice()],
            Self::MultiPolygon(ps) => ps.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        }
    }

    fn contains_coord(&self, c: Coord) -> bool {
        self.polygons().into_iter().any(|p| polygon_contains(p, c))
    }

    /// Minimum planar distance; 0 when the geometries touch, cross or nest.
    pub fn distance(&self, other: &Geometry) -> f64 {
        if other.coords().into_iter().any(|c| self.contains_coord(c))
            || self.coords().into_iter().any(|c| other.contains_coord(c))
        {
            return 0.0;
        }

        let left = primitives(self);
        let right = primitives(other);
        let mut best = f64::INFINITY;
        for a in &left {
            for b in &right {
                best = best.min(a.distance(b));
                if best == 0.0 {
                    return 0.0;
                }
            }
        }
        best
    }

    /// Geometric union of two parts of the same object.
    ///
    /// Same-dimension operands have their components merged; line parts
    /// meeting end to end are chained into a single line. A lower-dimension
    /// operand is absorbed by a higher-dimension one.
    pub fn union(&self, other: &Geometry) -> Geometry {
        match self.dimension().cmp(&other.dimension()) {
            std::cmp::Ordering::Greater => self.clone(),
            std::cmp::Ordering::Less => other.clone(),
            std::cmp::Ordering::Equal => match self.dimension() {
                0 => {
                    let mut points = self.coords();
                    for c in other.coords() {
                        if !points.contains(&c) {
                            points.push(c);
                        }
                    }
                    if points.len() == 1 {
                        Self::Point(points[0])
                    } else {
                        Self::MultiPoint(points)
                    }
                }
                1 => {
                    let parts = self
                        .paths()
                        .into_iter()
                        .chain(other.paths())
                        .map(<[Coord]>::to_vec)
                        .collect();
                    // Both operands have at least one part.
                    Self::from_lines(chain_lines(parts)).unwrap_or_else(|| self.clone())
                }
                _ => {
                    let mut polygons: Vec<Vec<Vec<Coord>>> =
                        self.polygons().into_iter().map(<[Vec<Coord>]>::to_vec).collect();
                    for p in other.polygons() {
                        if !polygons.iter().any(|q| q.as_slice() == p) {
                            polygons.push(p.to_vec());
                        }
                    }
                    if polygons.len() == 1 {
                        Self::Polygon(polygons.remove(0))
                    } else {
                        Self::MultiPolygon(polygons)
                    }
                }
            },
        }
    }

    /// Build a line geometry from parts: `None` when empty, a `LineString`
    /// for a single part.
    pub fn from_lines(mut parts: Vec<Vec<Coord>>) -> Option<Geometry> {
        parts.retain(|p| p.len() >= 2);
        match parts.len() {
            0 => None,
            1 => Some(Self::LineString(parts.remove(0))),
            _ => Some(Self::MultiLineString(parts)),
        }
    }
}

// ---------------------------------------------------------------------------
// Line chaining
// ---------------------------------------------------------------------------

fn chain_lines(mut parts: Vec<Vec<Coord>>) -> Vec<Vec<Coord>> {
    // Exact duplicates (either direction) collapse.
    let mut unique: Vec<Vec<Coord>> = Vec::with_capacity(parts.len());
    for part in parts.drain(..) {
        let reversed: Vec<Coord> = part.iter().rev().copied().collect();
        if !unique.iter().any(|u| *u == part || *u == reversed) {
            unique.push(part);
        }
    }
    let mut parts = unique;

    loop {
        let mut joined = false;
        'search: for i in 0..parts.len() {
            for j in 0..parts.len() {
                if i == j {
                    continue;
                }
                if let Some(merged) = join(&parts[i], &parts[j]) {
                    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
                    parts.remove(hi);
                    parts[lo] = merged;
                    joined = true;
                    break 'search;
                }
            }
        }
        if !joined {
            return parts;
        }
    }
}

fn join(a: &[Coord], b: &[Coord]) -> Option<Vec<Coord>> {
    let (a_first, a_last) = (a.first()?, a.last()?);
    let (b_first, b_last) = (b.first()?, b.last()?);
    if a_first == a_last || b_first == b_last {
        return None;
    }

    if a_last == b_first {
        Some(a.iter().chain(&b[1..]).copied().collect())
    } else if b_last == a_first {
        Some(b.iter().chain(&a[1..]).copied().collect())
    } else if a_last == b_last {
        Some(a.iter().chain(b.iter().rev().skip(1)).copied().collect())
    } else if a_first == b_first {
        Some(b.iter().rev().chain(&a[1..]).copied().collect())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Primitive distances
// ---------------------------------------------------------------------------

enum Primitive {
    Point(Coord),
    Segment(Segment),
}

impl Primitive {
    fn distance(&self, other: &Primitive) -> f64 {
        match (self, other) {
            (Self::Point(a), Self::Point(b)) => dist(*a, *b),
            (Self::Point(p), Self::Segment(s)) | (Self::Segment(s), Self::Point(p)) => {
                point_segment_distance(*p, s)
            }
            (Self::Segment(a), Self::Segment(b)) => segment_segment_distance(a, b),
        }
    }
}

fn primitives(geometry: &Geometry) -> Vec<Primitive> {
    if geometry.dimension() == 0 {
        geometry.coords().into_iter().map(Primitive::Point).collect()
    } else {
        geometry.segments().into_iter().map(Primitive::Segment).collect()
    }
}

pub(crate) fn dist(a: Coord, b: Coord) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn cross(o: Coord, a: Coord, b: Coord) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

pub(crate) fn point_segment_distance(p: Coord, s: &Segment) -> f64 {
    let dx = s.end[0] - s.start[0];
    let dy = s.end[1] - s.start[1];
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return dist(p, s.start);
    }
    let t = (((p[0] - s.start[0]) * dx + (p[1] - s.start[1]) * dy) / len2).clamp(0.0, 1.0);
    dist(p, s.at(t))
}

fn on_segment(p: Coord, s: &Segment) -> bool {
    p[0] >= s.start[0].min(s.end[0])
        && p[0] <= s.start[0].max(s.end[0])
        && p[1] >= s.start[1].min(s.end[1])
        && p[1] <= s.start[1].max(s.end[1])
}

fn segments_intersect(a: &Segment, b: &Segment) -> bool {
    let d1 = cross(b.start, b.end, a.start);
    let d2 = cross(b.start, b.end, a.end);
    let d3 = cross(a.start, a.end, b.start);
    let d4 = cross(a.start, a.end, b.end);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(a.start, b))
        || (d2 == 0.0 && on_segment(a.end, b))
        || (d3 == 0.0 && on_segment(b.start, a))
        || (d4 == 0.0 && on_segment(b.end, a))
}

fn segment_segment_distance(a: &Segment, b: &Segment) -> f64 {
    if segments_intersect(a, b) {
        return 0.0;
    }
    point_segment_distance(a.start, b)
        .min(point_segment_distance(a.end, b))
        .min(point_segment_distance(b.start, a))
        .min(point_segment_distance(b.end, a))
}

fn ring_contains(ring: &[Coord], c: Coord) -> bool {
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a[1] > c[1]) != (b[1] > c[1]) {
            let x = a[0] + (c[1] - a[1]) / (b[1] - a[1]) * (b[0] - a[0]);
            if c[0] < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn polygon_contains(polygon: &[Vec<Coord>], c: Coord) -> bool {
    match polygon.split_first() {
        Some((outer, holes)) => ring_contains(outer, c) && !holes.iter().any(|h| ring_contains(h, c)),
        None => false,
    }
}
