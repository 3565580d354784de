//! Axis-aligned bounding boxes.
//!
//! Boxes are held as doubles in memory and serialized as 32-bit floats.
//! Serialization rounds outward: min ordinates step to the next
//! representable f32 strictly below the value, max ordinates strictly
//! above. A stored box therefore contains every coordinate it was
//! computed from. Geodetic boxes live in Earth-centered unit-sphere
//! space and are always 3D.

use crate::error::{GeobinError, Result};
use crate::flags::GeomFlags;
use crate::point_array::{Coord, PointArray};

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
    pub mmin: f64,
    pub mmax: f64,
    /// Z range is meaningful (always true for geodetic boxes)
    pub has_z: bool,
    /// M range is meaningful
    pub has_m: bool,
    /// Ranges are Earth-centered unit-sphere coordinates
    pub geodetic: bool,
}

impl BoundingBox {
    /// Degenerate box covering a single coordinate.
    pub fn from_coord(c: Coord, flags: GeomFlags) -> Self {
        let mut bbox = Self {
            xmin: c.x,
            xmax: c.x,
            ymin: c.y,
            ymax: c.y,
            zmin: c.z,
            zmax: c.z,
            mmin: c.m,
            mmax: c.m,
            has_z: flags.z,
            has_m: flags.m,
            geodetic: false,
        };
        if flags.geodetic {
            bbox = Self::from_coord_geodetic(c);
        }
        bbox
    }

    fn from_coord_geodetic(c: Coord) -> Self {
        let (x, y, z) = unit_sphere(c.x, c.y);
        Self {
            xmin: x,
            xmax: x,
            ymin: y,
            ymax: y,
            zmin: z,
            zmax: z,
            mmin: 0.0,
            mmax: 0.0,
            has_z: true,
            has_m: false,
            geodetic: true,
        }
    }

    /// Grow to cover `c`.
    pub fn expand_to(&mut self, c: Coord) {
        if self.geodetic {
            let (x, y, z) = unit_sphere(c.x, c.y);
            self.xmin = self.xmin.min(x);
            self.xmax = self.xmax.max(x);
            self.ymin = self.ymin.min(y);
            self.ymax = self.ymax.max(y);
            self.zmin = self.zmin.min(z);
            self.zmax = self.zmax.max(z);
            return;
        }
        self.xmin = self.xmin.min(c.x);
        self.xmax = self.xmax.max(c.x);
        self.ymin = self.ymin.min(c.y);
        self.ymax = self.ymax.max(c.y);
        if self.has_z {
            self.zmin = self.zmin.min(c.z);
            self.zmax = self.zmax.max(c.z);
        }
        if self.has_m {
            self.mmin = self.mmin.min(c.m);
            self.mmax = self.mmax.max(c.m);
        }
    }

    /// Grow to cover every coordinate of `pa`.
    pub fn expand_to_array(&mut self, pa: &PointArray<'_>) {
        for c in pa.iter() {
            self.expand_to(c);
        }
    }

    /// Merge another box of the same shape.
    pub fn merge(&mut self, other: &BoundingBox) {
        self.xmin = self.xmin.min(other.xmin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymin = self.ymin.min(other.ymin);
        self.ymax = self.ymax.max(other.ymax);
        if self.has_z {
            self.zmin = self.zmin.min(other.zmin);
            self.zmax = self.zmax.max(other.zmax);
        }
        if self.has_m {
            self.mmin = self.mmin.min(other.mmin);
            self.mmax = self.mmax.max(other.mmax);
        }
    }

    /// Number of serialized dimensions: x, y, then z and m as flagged;
    /// geodetic boxes are x, y, z.
    pub fn ndims(&self) -> usize {
        if self.geodetic {
            3
        } else {
            2 + usize::from(self.has_z) + usize::from(self.has_m)
        }
    }

    /// True when `c` lies inside the box (inclusive). Geodetic boxes are
    /// tested in unit-sphere space.
    pub fn contains_coord(&self, c: Coord) -> bool {
        if self.geodetic {
            let (x, y, z) = unit_sphere(c.x, c.y);
            return self.xmin <= x
                && x <= self.xmax
                && self.ymin <= y
                && y <= self.ymax
                && self.zmin <= z
                && z <= self.zmax;
        }
        let mut inside =
            self.xmin <= c.x && c.x <= self.xmax && self.ymin <= c.y && c.y <= self.ymax;
        if self.has_z {
            inside = inside && self.zmin <= c.z && c.z <= self.zmax;
        }
        if self.has_m {
            inside = inside && self.mmin <= c.m && c.m <= self.mmax;
        }
        inside
    }

    /// The box as it reads back after serialization: every min stepped to
    /// the next f32 below, every max to the next f32 above.
    pub fn rounded(&self) -> Self {
        let mut r = *self;
        r.xmin = f64::from(next_float_down(self.xmin));
        r.xmax = f64::from(next_float_up(self.xmax));
        r.ymin = f64::from(next_float_down(self.ymin));
        r.ymax = f64::from(next_float_up(self.ymax));
        if self.has_z || self.geodetic {
            r.zmin = f64::from(next_float_down(self.zmin));
            r.zmax = f64::from(next_float_up(self.zmax));
        }
        if self.has_m {
            r.mmin = f64::from(next_float_down(self.mmin));
            r.mmax = f64::from(next_float_up(self.mmax));
        }
        r
    }

    /// Serialize as outward-rounded f32 pairs, min then max per
    /// dimension, native byte order.
    pub(crate) fn write_native(&self, out: &mut Vec<u8>) {
        let mut put = |min: f64, max: f64| {
            out.extend_from_slice(&next_float_down(min).to_ne_bytes());
            out.extend_from_slice(&next_float_up(max).to_ne_bytes());
        };
        put(self.xmin, self.xmax);
        put(self.ymin, self.ymax);
        if self.has_z || self.geodetic {
            put(self.zmin, self.zmax);
        }
        if self.has_m && !self.geodetic {
            put(self.mmin, self.mmax);
        }
    }

    /// Read back a box serialized by [`Self::write_native`].
    pub(crate) fn read_native(bytes: &[u8], flags: GeomFlags) -> Result<Self> {
        let ndims = flags.box_ndims();
        if bytes.len() < ndims * 8 {
            return Err(GeobinError::Truncated(bytes.len()));
        }
        let f = |i: usize| {
            f64::from(f32::from_ne_bytes(
                bytes[i * 4..i * 4 + 4].try_into().expect("4-byte slice"),
            ))
        };
        let mut bbox = Self {
            xmin: f(0),
            xmax: f(1),
            ymin: f(2),
            ymax: f(3),
            zmin: 0.0,
            zmax: 0.0,
            mmin: 0.0,
            mmax: 0.0,
            has_z: flags.z || flags.geodetic,
            has_m: flags.m && !flags.geodetic,
            geodetic: flags.geodetic,
        };
        let mut at = 4;
        if bbox.has_z {
            bbox.zmin = f(at);
            bbox.zmax = f(at + 1);
            at += 2;
        }
        if bbox.has_m {
            bbox.mmin = f(at);
            bbox.mmax = f(at + 1);
        }
        Ok(bbox)
    }
}

/// lon/lat degrees to a point on the unit sphere.
fn unit_sphere(lon_deg: f64, lat_deg: f64) -> (f64, f64, f64) {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    (lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

fn f32_step_up(f: f32) -> f32 {
    if f.is_nan() || f == f32::INFINITY {
        return f;
    }
    if f == 0.0 {
        return f32::from_bits(1);
    }
    if f > 0.0 {
        f32::from_bits(f.to_bits() + 1)
    } else {
        f32::from_bits(f.to_bits() - 1)
    }
}

fn f32_step_down(f: f32) -> f32 {
    -f32_step_up(-f)
}

/// Largest f32 strictly below `d` (clamped at the f32 range edge).
pub(crate) fn next_float_down(d: f64) -> f32 {
    if d.is_nan() {
        return f32::NAN;
    }
    if d <= f64::from(f32::MIN) {
        return f32::MIN;
    }
    let f = d as f32;
    if f64::from(f) < d { f } else { f32_step_down(f) }
}

/// Smallest f32 strictly above `d` (clamped at the f32 range edge).
pub(crate) fn next_float_up(d: f64) -> f32 {
    if d.is_nan() {
        return f32::NAN;
    }
    if d >= f64::from(f32::MAX) {
        return f32::MAX;
    }
    let f = d as f32;
    if f64::from(f) > d { f } else { f32_step_up(f) }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outward_rounding_is_strict() {
        // exactly representable values still step outward
        assert!(f64::from(next_float_up(10.0)) > 10.0);
        assert!(f64::from(next_float_down(10.0)) < 10.0);
        assert!(f64::from(next_float_up(0.0)) > 0.0);
        assert!(f64::from(next_float_down(0.0)) < 0.0);
        assert!(f64::from(next_float_up(-5.5)) > -5.5);
        assert!(f64::from(next_float_down(-5.5)) < -5.5);
        // one ulp, not more
        assert_eq!(next_float_up(10.0), f32_step_up(10.0));
    }

    #[test]
    fn rounding_clamps_at_range_edge() {
        assert_eq!(next_float_up(f64::from(f32::MAX) * 2.0), f32::MAX);
        assert_eq!(next_float_down(f64::from(f32::MIN) * 2.0), f32::MIN);
    }

    #[test]
    fn serialized_box_contains_source() {
        let flags = GeomFlags::xyz();
        let mut bbox = BoundingBox::from_coord(Coord::xyz(0.1, 0.2, 0.3), flags);
        bbox.expand_to(Coord::xyz(10.0, 5.0, -3.0));

        let mut bytes = Vec::new();
        bbox.write_native(&mut bytes);
        assert_eq!(bytes.len(), 24);
        let back = BoundingBox::read_native(&bytes, flags).unwrap();
        assert_eq!(back, bbox.rounded());
        assert!(back.contains_coord(Coord::xyz(0.1, 0.2, 0.3)));
        assert!(back.contains_coord(Coord::xyz(10.0, 5.0, -3.0)));
        assert!(back.xmin < bbox.xmin && back.xmax > bbox.xmax);
    }

    #[test]
    fn geodetic_box_is_3d() {
        let flags = GeomFlags {
            geodetic: true,
            ..GeomFlags::default()
        };
        let mut bbox = BoundingBox::from_coord(Coord::xy(0.0, 0.0), flags);
        bbox.expand_to(Coord::xy(90.0, 0.0));
        assert_eq!(bbox.ndims(), 3);
        // lon 0 -> (1,0,0), lon 90 -> (0,1,0)
        assert!((bbox.xmax - 1.0).abs() < 1e-12);
        assert!((bbox.ymax - 1.0).abs() < 1e-12);
        assert!(bbox.contains_coord(Coord::xy(45.0, 0.0)));
    }
}
