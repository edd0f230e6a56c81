//! Vector overlay: crossings, clipping, class polygons and area tabulation.
use std::collections::BTreeMap;

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Rect};

use super::{multipart_to_singlepart, LineLayer, PolygonLayer};
use crate::error::{BratError, Result};
use crate::network::{AttrValue, ReachId};
use crate::raster::CategoricalRaster;
use crate::zonal::Zone;

/// Polygons covering every cell of one class.
#[derive(Debug, Clone)]
pub struct ClassPolygon {
    pub class: String,
    pub polygons: MultiPolygon<f64>,
}

/// Area of one zone falling inside one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneClassArea {
    pub id: ReachId,
    pub class: String,
    pub area: f64,
}

/// Every point where `line` meets any of `others`, in no particular order.
/// Collinear overlaps contribute both overlap ends.
pub fn line_crossings(line: &LineString<f64>, others: &[LineString<f64>]) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    let Some(bbox) = line.bounding_rect() else {
        return out;
    };
    for other in others {
        match other.bounding_rect() {
            Some(ob) if ob.intersects(&bbox) => {}
            _ => continue,
        }
        for a in line.lines() {
            for b in other.lines() {
                match line_intersection(a, b) {
                    Some(LineIntersection::SinglePoint { intersection, .. }) => out.push(intersection),
                    Some(LineIntersection::Collinear { intersection }) => {
                        out.push(intersection.start);
                        out.push(intersection.end);
                    }
                    None => {}
                }
            }
        }
    }
    out
}

/// Point intersection of two line sets, exploded to distinct single points.
pub fn crossing_points(lines: &[LineString<f64>], features: &LineLayer) -> Vec<Point<f64>> {
    let mut seen: Vec<Coord<f64>> = Vec::new();
    for line in lines {
        for c in line_crossings(line, &features.lines) {
            if !seen.contains(&c) {
                seen.push(c);
            }
        }
    }
    seen.into_iter().map(Point::from).collect()
}

/// Portions of `layer` inside `boundary`, as single-part lines.
pub fn clip_lines(layer: &LineLayer, boundary: &PolygonLayer) -> LineLayer {
    let clipped = boundary.polygons.clip(&layer.to_multi(), false);
    LineLayer::new(
        format!("{}_clip", layer.name),
        layer.spatial_reference.clone(),
        multipart_to_singlepart(clipped),
    )
}

/// Convert a categorical raster into one polygon set per value of
/// `class_field` (matched case-insensitively). Each polygon is a row run
/// of same-class cells; runs never overlap.
pub fn raster_to_polygons(raster: &CategoricalRaster, class_field: &str) -> Result<Vec<ClassPolygon>> {
    let grid = &raster.raster;
    grid.validate()?;
    let key = raster.find_field(class_field).ok_or_else(|| BratError::MissingLookupField {
        raster: grid.name.clone(),
        field: class_field.to_string(),
    })?;
    let label_of = |v: f32| -> Option<String> {
        if v.is_nan() {
            return None;
        }
        match raster.table.get(&(v.round() as i64))?.get(&key)? {
            AttrValue::Text(s) => Some(s.clone()),
            AttrValue::Int(i) => Some(i.to_string()),
            AttrValue::Float(f) => Some(f.to_string()),
        }
    };

    let mut runs: BTreeMap<String, Vec<Rect<f64>>> = BTreeMap::new();
    let cs = grid.cell_size;
    for r in 0..grid.height {
        let y0 = grid.min_y + r as f64 * cs;
        let mut c = 0;
        while c < grid.width {
            let Some(label) = label_of(grid.get(r, c)) else {
                c += 1;
                continue;
            };
            let start = c;
            while c + 1 < grid.width && label_of(grid.get(r, c + 1)).as_deref() == Some(label.as_str()) {
                c += 1;
            }
            let x0 = grid.min_x + start as f64 * cs;
            let x1 = grid.min_x + (c + 1) as f64 * cs;
            runs.entry(label).or_default().push(Rect::new((x0, y0), (x1, y0 + cs)));
            c += 1;
        }
    }

    Ok(runs
        .into_iter()
        .map(|(class, rects)| ClassPolygon {
            class,
            polygons: MultiPolygon::new(rects.into_iter().map(|r| r.to_polygon()).collect()),
        })
        .collect())
}

/// Area of every zone inside every class polygon set. Pairs with no
/// overlap are omitted.
pub fn tabulate_intersection(zones: &[Zone], classes: &[ClassPolygon]) -> Vec<ZoneClassArea> {
    let class_boxes: Vec<Option<Rect<f64>>> = classes.iter().map(|c| c.polygons.bounding_rect()).collect();
    let mut out = Vec::new();
    for zone in zones {
        let Some(zb) = zone.bounds() else { continue };
        for (class, cb) in classes.iter().zip(&class_boxes) {
            match cb {
                Some(cb) if cb.intersects(&zb) => {}
                _ => continue,
            }
            let area = zone.polygon.intersection(&class.polygons).unsigned_area();
            if area > 0.0 {
                out.push(ZoneClassArea { id: zone.id, class: class.class.clone(), area });
            }
        }
    }
    out
}
