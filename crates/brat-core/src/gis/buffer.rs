//! Round-capped buffers as polygons.
//!
//! A line buffer is the union of one capsule per line segment; a point
//! buffer is a regular polygon approximating the circle.
use std::f64::consts::{FRAC_PI_2, PI};

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Point, Polygon};

/// Circle of `radius` around `p` with `4 * quadrant_segments` vertices.
pub fn buffer_point(p: Point<f64>, radius: f64, quadrant_segments: usize) -> Polygon<f64> {
    let n = 4 * quadrant_segments.max(1);
    let ring: Vec<Coord<f64>> = (0..n)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / n as f64;
            Coord { x: p.x() + radius * t.cos(), y: p.y() + radius * t.sin() }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Capsule (stadium) around the segment `a → b`.
fn capsule(a: Coord<f64>, b: Coord<f64>, radius: f64, quadrant_segments: usize) -> Polygon<f64> {
    if a == b {
        return buffer_point(Point::from(a), radius, quadrant_segments);
    }
    let q = quadrant_segments.max(1);
    let theta = (b.y - a.y).atan2(b.x - a.x);
    let arc = |c: Coord<f64>, from: f64| {
        (0..=2 * q).map(move |i| {
            let t = from + PI * i as f64 / (2 * q) as f64;
            Coord { x: c.x + radius * t.cos(), y: c.y + radius * t.sin() }
        })
    };
    // Counter-clockwise: cap around b, then cap around a.
    let ring: Vec<Coord<f64>> = arc(b, theta - FRAC_PI_2).chain(arc(a, theta + FRAC_PI_2)).collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Round-capped buffer of `line` at `radius`.
pub fn buffer_line(line: &LineString<f64>, radius: f64, quadrant_segments: usize) -> MultiPolygon<f64> {
    let mut pieces = line.lines().map(|seg| capsule(seg.start, seg.end, radius, quadrant_segments));
    let Some(first) = pieces.next() else {
        return match line.0.first() {
            Some(&c) => MultiPolygon::new(vec![buffer_point(Point::from(c), radius, quadrant_segments)]),
            None => MultiPolygon::new(vec![]),
        };
    };
    pieces.fold(MultiPolygon::new(vec![first]), |acc, cap| acc.union(&MultiPolygon::new(vec![cap])))
}
