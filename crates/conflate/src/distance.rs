//! Default geometry distance with remainder computation.
//!
//! For lines, the part of one geometry "accounted for" by the other is the
//! set of its points whose orthogonal projection lands inside one of the
//! other geometry's segments, no further than `demi_distance` away. Both
//! conditions are linear along a segment, so each segment pair yields one
//! parameter interval and the computation is exact.

use crate::geometry::{dist, Coord, Geometry, Segment};
use crate::metrics::GeomDistance;

/// Uncovered pieces shorter than this share of `demi_distance` are noise.
const REMAINDER_MIN_SHARE: f64 = 0.01;

/// Interval ends this close to a segment end snap onto it.
const SNAP: f64 = 1e-9;

pub fn geom_distance(before: &Geometry, after: &Geometry, demi_distance: f64) -> Option<GeomDistance> {
    if before.dimension() != after.dimension() {
        return None;
    }
    match before.dimension() {
        0 => points_distance(before, after, demi_distance),
        1 => lines_distance(before, after, demi_distance),
        _ => areas_distance(before, after, demi_distance),
    }
}

fn points_distance(before: &Geometry, after: &Geometry, demi_distance: f64) -> Option<GeomDistance> {
    let h = hausdorff(&before.coords(), &after.coords());
    if h > demi_distance {
        return None;
    }
    Some(GeomDistance::full(h / demi_distance))
}

fn lines_distance(before: &Geometry, after: &Geometry, demi_distance: f64) -> Option<GeomDistance> {
    let forward = coverage(before, after, demi_distance);
    let backward = coverage(after, before, demi_distance);
    if forward.covered <= 0.0 || backward.covered <= 0.0 {
        return None;
    }

    let cost = uncovered_share(&forward, &backward) + before.distance(after) / demi_distance;
    let min_piece = demi_distance * REMAINDER_MIN_SHARE;
    Some(GeomDistance {
        cost,
        remaining_before: forward.remainder(min_piece),
        remaining_after: backward.remainder(min_piece),
    })
}

fn areas_distance(before: &Geometry, after: &Geometry, demi_distance: f64) -> Option<GeomDistance> {
    let d = before.distance(after);
    if d > demi_distance {
        return None;
    }
    let forward = coverage(before, after, demi_distance);
    let backward = coverage(after, before, demi_distance);
    Some(GeomDistance::full(
        uncovered_share(&forward, &backward) + d / demi_distance,
    ))
}

fn hausdorff(a: &[Coord], b: &[Coord]) -> f64 {
    let directed = |from: &[Coord], to: &[Coord]| {
        from.iter()
            .map(|p| to.iter().map(|q| dist(*p, *q)).fold(f64::INFINITY, f64::min))
            .fold(0.0, f64::max)
    };
    directed(a, b).max(directed(b, a))
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

struct Coverage {
    covered: f64,
    total: f64,
    uncovered: Vec<Vec<Coord>>,
}

impl Coverage {
    fn remainder(&self, min_piece: f64) -> Option<Geometry> {
        let pieces = self
            .uncovered
            .iter()
            .filter(|piece| path_length(piece) > min_piece)
            .cloned()
            .collect();
        Geometry::from_lines(pieces)
    }
}

fn uncovered_share(forward: &Coverage, backward: &Coverage) -> f64 {
    let total = forward.total + backward.total;
    if total <= 0.0 {
        return 0.0;
    }
    let uncovered = (forward.total - forward.covered).max(0.0) + (backward.total - backward.covered).max(0.0);
    uncovered / total
}

fn path_length(path: &[Coord]) -> f64 {
    path.windows(2).map(|w| dist(w[0], w[1])).sum()
}

/// How much of `target` is accounted for by `by`, and the pieces that are not.
fn coverage(target: &Geometry, by: &Geometry, demi_distance: f64) -> Coverage {
    let by_segments: Vec<Segment> = by.segments().into_iter().filter(|s| s.length() > 0.0).collect();

    let mut covered = 0.0;
    let mut uncovered = Vec::new();

    for path in target.paths() {
        let mut open: Option<Vec<Coord>> = None;

        for w in path.windows(2) {
            let segment = Segment {
                start: w[0],
                end: w[1],
            };
            let length = segment.length();
            if length == 0.0 {
                continue;
            }

            let intervals = merge_intervals(
                by_segments
                    .iter()
                    .filter_map(|b| accounted_interval(&segment, b, demi_distance))
                    .collect(),
            );
            covered += intervals.iter().map(|(s, e)| e - s).sum::<f64>() * length;

            let gaps = complement(&intervals);
            if gaps.first().map_or(true, |(s, _)| *s > 0.0) {
                uncovered.extend(open.take());
            }
            for (s, e) in gaps {
                let (from, to) = (segment.at(s), segment.at(e));
                match open.as_mut() {
                    Some(piece) if s == 0.0 && piece.last() == Some(&from) => piece.push(to),
                    _ => {
                        uncovered.extend(open.take());
                        open = Some(vec![from, to]);
                    }
                }
                if e < 1.0 {
                    uncovered.extend(open.take());
                }
            }
        }
        uncovered.extend(open.take());
    }

    Coverage {
        covered,
        total: target.length(),
        uncovered,
    }
}

/// Parameter range along `a` whose points project inside `b` within `max_offset`.
fn accounted_interval(a: &Segment, b: &Segment, max_offset: f64) -> Option<(f64, f64)> {
    let d = [b.end[0] - b.start[0], b.end[1] - b.start[1]];
    let len2 = d[0] * d[0] + d[1] * d[1];
    let len = len2.sqrt();

    let along = |p: Coord| ((p[0] - b.start[0]) * d[0] + (p[1] - b.start[1]) * d[1]) / len2;
    let offset = |p: Coord| (d[0] * (p[1] - b.start[1]) - d[1] * (p[0] - b.start[0])) / len;

    let (lo_u, hi_u) = linear_range(along(a.start), along(a.end), 0.0, 1.0)?;
    let (lo_o, hi_o) = linear_range(offset(a.start), offset(a.end), -max_offset, max_offset)?;

    let mut lo = lo_u.max(lo_o);
    let mut hi = hi_u.min(hi_o);
    if lo < SNAP {
        lo = 0.0;
    }
    if hi > 1.0 - SNAP {
        hi = 1.0;
    }
    (lo < hi).then_some((lo, hi))
}

/// Values of `t` in [0, 1] for which `f0 + t * (f1 - f0)` lies in [lo, hi].
fn linear_range(f0: f64, f1: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    let slope = f1 - f0;
    if slope == 0.0 {
        return (lo <= f0 && f0 <= hi).then_some((0.0, 1.0));
    }
    let (mut a, mut b) = ((lo - f0) / slope, (hi - f0) / slope);
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    let (a, b) = (a.max(0.0), b.min(1.0));
    (a < b).then_some((a, b))
}

fn merge_intervals(mut intervals: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    intervals.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(intervals.len());
    for (s, e) in intervals {
        match merged.last_mut() {
            Some(last) if s <= last.1 + SNAP => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }
    merged
}

fn complement(intervals: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut gaps = Vec::new();
    let mut cursor = 0.0;
    for &(s, e) in intervals {
        if s > cursor {
            gaps.push((cursor, s));
        }
        cursor = cursor.max(e);
    }
    if cursor < 1.0 {
        gaps.push((cursor, 1.0));
    }
    gaps
}
