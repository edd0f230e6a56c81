use std::collections::BTreeMap;

use geo::{Coord, Point, Rect};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BratError, Result};
use crate::network::{AttrValue, SpatialReference};

/// A 2D raster storing cell values as f32, row-major.
/// Row 0 is the southern edge; `NaN` marks nodata.
/// Coordinate math uses f64; cell values use f32.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    pub name: String,
    /// Row-major cell values; nodata is `NaN` (serialized as `null`).
    #[serde(serialize_with = "nan_as_null", deserialize_with = "null_as_nan")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub min_y: f64,
    /// Square cell edge length in CRS units (metres for projected inputs).
    pub cell_size: f64,
    pub spatial_reference: SpatialReference,
}

impl Raster {
    /// Create a new Raster filled with the given value.
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        min_x: f64,
        min_y: f64,
        cell_size: f64,
        spatial_reference: SpatialReference,
        fill: f32,
    ) -> Self {
        Self {
            name: name.into(),
            data: vec![fill; width * height],
            width,
            height,
            min_x,
            min_y,
            cell_size,
            spatial_reference,
        }
    }

    /// Empty grid covering `env`, every cell set to `fill`.
    pub fn from_env(name: impl Into<String>, env: &RasterEnv, fill: f32) -> Self {
        let (width, height) = env.dimensions();
        let min = env.extent.min();
        Self::new(name, width, height, min.x, min.y, env.cell_size, env.spatial_reference.clone(), fill)
    }

    /// Same grid geometry as `self`, new name and values.
    pub fn with_data(&self, name: impl Into<String>, data: Vec<f32>) -> Result<Self> {
        let name = name.into();
        if data.len() != self.width * self.height {
            return Err(BratError::InvalidRaster {
                name,
                reason: format!("{} values for a {}x{} grid", data.len(), self.width, self.height),
            });
        }
        Ok(Self {
            name,
            data,
            width: self.width,
            height: self.height,
            min_x: self.min_x,
            min_y: self.min_y,
            cell_size: self.cell_size,
            spatial_reference: self.spatial_reference.clone(),
        })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    pub fn max_x(&self) -> f64 {
        self.min_x + self.width as f64 * self.cell_size
    }

    pub fn max_y(&self) -> f64 {
        self.min_y + self.height as f64 * self.cell_size
    }

    pub fn extent(&self) -> Rect<f64> {
        Rect::new((self.min_x, self.min_y), (self.max_x(), self.max_y()))
    }

    /// Cell area in squared CRS units.
    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// Centre of cell `(row, col)`.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.min_x + (col as f64 + 0.5) * self.cell_size,
            y: self.min_y + (row as f64 + 0.5) * self.cell_size,
        }
    }

    /// Cell containing `p`, or None outside the grid.
    pub fn cell_at(&self, p: Point<f64>) -> Option<(usize, usize)> {
        let fx = (p.x() - self.min_x) / self.cell_size;
        let fy = (p.y() - self.min_y) / self.cell_size;
        if fx < 0.0 || fy < 0.0 || fx >= self.width as f64 || fy >= self.height as f64 {
            return None;
        }
        Some((fy as usize, fx as usize))
    }

    /// Row/column ranges of cells whose centres may fall inside `rect`.
    pub fn window(&self, rect: &Rect<f64>) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let clamp = |v: f64, n: usize| -> usize { v.max(0.0).min(n as f64) as usize };
        let c0 = clamp(((rect.min().x - self.min_x) / self.cell_size - 0.5).floor(), self.width);
        let c1 = clamp(((rect.max().x - self.min_x) / self.cell_size + 0.5).ceil(), self.width);
        let r0 = clamp(((rect.min().y - self.min_y) / self.cell_size - 0.5).floor(), self.height);
        let r1 = clamp(((rect.max().y - self.min_y) / self.cell_size + 0.5).ceil(), self.height);
        (r0..r1, c0..c1)
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().cloned().filter(|v| !v.is_nan()).fold(f32::NEG_INFINITY, f32::max)
    }

    /// Structural sanity check before any zonal or hydrology operation.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(BratError::InvalidRaster { name: self.name.clone(), reason });
        if self.width == 0 || self.height == 0 {
            return fail(format!("empty grid {}x{}", self.width, self.height));
        }
        if self.data.len() != self.width * self.height {
            return fail(format!("{} values for a {}x{} grid", self.data.len(), self.width, self.height));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return fail(format!("cell size {} is not positive", self.cell_size));
        }
        Ok(())
    }

    /// 3×3 focal mean ignoring nodata, masked back to this raster's data cells.
    ///
    /// Edge cells average whatever neighbours exist; nodata cells stay nodata.
    pub fn focal_mean_3x3(&self) -> Result<Raster> {
        self.validate()?;
        let mut out = vec![f32::NAN; self.data.len()];
        for r in 0..self.height {
            for c in 0..self.width {
                if self.get(r, c).is_nan() {
                    continue;
                }
                let mut sum = 0.0f64;
                let mut n = 0u32;
                for nr in r.saturating_sub(1)..=(r + 1).min(self.height - 1) {
                    for nc in c.saturating_sub(1)..=(c + 1).min(self.width - 1) {
                        let v = self.get(nr, nc);
                        if !v.is_nan() {
                            sum += v as f64;
                            n += 1;
                        }
                    }
                }
                out[r * self.width + c] = (sum / n as f64) as f32;
            }
        }
        self.with_data(format!("{}_smoothed", self.name), out)
    }
}

/// Explicit processing environment for raster-producing operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterEnv {
    pub extent: Rect<f64>,
    pub cell_size: f64,
    pub spatial_reference: SpatialReference,
}

impl RasterEnv {
    /// Environment around `rect`, grown by `pad` on every side.
    pub fn around(rect: Rect<f64>, pad: f64, cell_size: f64, spatial_reference: SpatialReference) -> Self {
        let min = rect.min();
        let max = rect.max();
        Self {
            extent: Rect::new((min.x - pad, min.y - pad), (max.x + pad, max.y + pad)),
            cell_size,
            spatial_reference,
        }
    }

    /// Grid dimensions; at least one cell in each direction.
    pub fn dimensions(&self) -> (usize, usize) {
        let w = (self.extent.width() / self.cell_size).ceil().max(1.0) as usize;
        let h = (self.extent.height() / self.cell_size).ceil().max(1.0) as usize;
        (w, h)
    }
}

/// Integer class raster with an attribute table keyed by class value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalRaster {
    pub raster: Raster,
    pub table: BTreeMap<i64, BTreeMap<String, AttrValue>>,
}

impl CategoricalRaster {
    /// Actual name of `field` in the table, matched case-insensitively.
    pub fn find_field(&self, field: &str) -> Option<String> {
        self.table
            .values()
            .flat_map(|row| row.keys())
            .find(|k| k.eq_ignore_ascii_case(field))
            .cloned()
    }

    /// Replace each class value by the numeric `field` of its table row.
    /// Classes without a numeric value become nodata.
    pub fn lookup(&self, field: &str) -> Result<Raster> {
        self.raster.validate()?;
        let key = self.find_field(field).ok_or_else(|| BratError::MissingLookupField {
            raster: self.raster.name.clone(),
            field: field.to_string(),
        })?;
        let data = self
            .raster
            .data
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    return f32::NAN;
                }
                self.table
                    .get(&(v.round() as i64))
                    .and_then(|row| row.get(&key))
                    .and_then(AttrValue::as_f64)
                    .map_or(f32::NAN, |x| x as f32)
            })
            .collect();
        self.raster.with_data(format!("{}_{}", self.raster.name, key), data)
    }
}

fn nan_as_null<S: Serializer>(data: &[f32], s: S) -> std::result::Result<S::Ok, S::Error> {
    let opt: Vec<Option<f32>> = data.iter().map(|&v| if v.is_nan() { None } else { Some(v) }).collect();
    opt.serialize(s)
}

fn null_as_nan<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f32>, D::Error> {
    let opt: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(opt.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(w: usize, h: usize) -> Raster {
        Raster::new("t", w, h, 100.0, 200.0, 10.0, SpatialReference::projected("UTM"), 0.0)
    }

    #[test]
    fn cell_at_and_center_agree() {
        let r = grid(4, 3);
        let c = r.cell_center(2, 1);
        assert_eq!(r.cell_at(Point::from(c)), Some((2, 1)));
        assert!(r.cell_at(Point::new(99.0, 205.0)).is_none());
        assert!(r.cell_at(Point::new(140.0, 205.0)).is_none());
    }

    #[test]
    fn mismatched_data_length_is_rejected() {
        let r = grid(3, 3);
        assert!(matches!(r.with_data("short", vec![0.0; 8]), Err(BratError::InvalidRaster { .. })));
        let mut bad = grid(3, 3);
        bad.data.pop();
        assert!(bad.focal_mean_3x3().is_err());
    }

    #[test]
    fn focal_mean_keeps_nodata_mask() {
        let mut r = grid(3, 3);
        for i in 0..9 {
            r.data[i] = i as f32;
        }
        r.data[0] = f32::NAN;
        let s = r.focal_mean_3x3().unwrap();
        assert!(s.get(0, 0).is_nan());
        // Centre: mean of 1..=8 (cell 0 is nodata).
        assert!((s.get(1, 1) - 4.5).abs() < 1e-6);
    }

    #[test]
    fn lookup_maps_codes_and_blanks_unknown_classes() {
        let mut r = grid(2, 1);
        r.data = vec![1.0, 2.0];
        let mut table = BTreeMap::new();
        table.insert(1, BTreeMap::from([("VEG_CODE".to_string(), AttrValue::Int(4))]));
        let cat = CategoricalRaster { raster: r, table };
        let out = cat.lookup("veg_code").unwrap();
        assert_eq!(out.data[0], 4.0);
        assert!(out.data[1].is_nan());
        assert!(matches!(cat.lookup("LU_CODE"), Err(BratError::MissingLookupField { .. })));
    }

    #[test]
    fn nodata_survives_json_round_trip() {
        let mut r = grid(2, 1);
        r.data[1] = f32::NAN;
        let json = serde_json::to_string(&r).unwrap();
        let back: Raster = serde_json::from_str(&json).unwrap();
        assert!(back.data[1].is_nan());
        assert_eq!(back.data[0], 0.0);
    }

    #[test]
    fn env_dimensions_round_up() {
        let env = RasterEnv::around(
            Rect::new((0.0, 0.0), (12.0, 0.0)),
            0.0,
            5.0,
            SpatialReference::projected("UTM"),
        );
        assert_eq!(env.dimensions(), (3, 1));
    }
}
