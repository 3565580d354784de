//! WKB writer.

use log::trace;
use scroll::IOwrite;

use crate::error::{GeobinError, Result};
use crate::geometry::{Geometry, GeometryKind, GeometryType};
use crate::gs2::MAX_DEPTH;
use crate::nurbs::NurbsCurve;
use crate::point_array::{Coord, PointArray};
use crate::wkb::wkb_common::{WkbByteOrder, WkbDialect, WkbOptions, to_hex, type_code};

/// Serialize a geometry to WKB in the selected dialect and byte order.
///
/// The output is sized by [`wkb_size`] first and written into one
/// allocation; any divergence between the two passes is reported as
/// [`GeobinError::SizeMismatch`], which signals a sizer bug; a partial
/// buffer is never returned.
pub fn to_wkb(geom: &Geometry<'_>, opts: WkbOptions) -> Result<Vec<u8>> {
    let expected = wkb_size(geom, opts)?;
    trace!(
        "wkb encode {} as {:?} ({expected} bytes)",
        geom.type_name(),
        opts.dialect
    );
    let mut out = Vec::with_capacity(expected);
    let mut writer = Writer {
        out: &mut out,
        opts,
    };
    writer.geometry(geom, true, 0)?;
    if out.len() != expected {
        return Err(GeobinError::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// [`to_wkb`], hex-encoded: two ASCII characters per output byte.
pub fn to_hex_wkb(geom: &Geometry<'_>, opts: WkbOptions) -> Result<String> {
    Ok(to_hex(&to_wkb(geom, opts)?))
}

/// Exact size in bytes of the WKB this geometry will produce.
pub fn wkb_size(geom: &Geometry<'_>, opts: WkbOptions) -> Result<usize> {
    geom.check_consistent()?;
    geometry_size(geom, opts, true, 0)
}

/// Dimensions actually written for one header: SFSQL discards Z/M,
/// NURBS curves keep theirs in every dialect.
fn wire_dims(gtype: GeometryType, geom: &Geometry<'_>, dialect: WkbDialect) -> (bool, bool) {
    if dialect == WkbDialect::SfSql && gtype != GeometryType::NurbsCurve {
        (false, false)
    } else {
        (geom.flags.z, geom.flags.m)
    }
}

/// SRID goes on the wire only for the outer shell of an EXTENDED-variant
/// record, and only when not suppressed.
fn needs_srid(geom: &Geometry<'_>, opts: WkbOptions, outer: bool) -> bool {
    outer && opts.dialect == WkbDialect::Extended && geom.srid.is_some() && !opts.no_srid
}

fn nurbs_knot_count(curve: &NurbsCurve<'_>) -> Result<usize> {
    if let Some(k) = curve.knots() {
        return Ok(k.len());
    }
    let npoints = curve.points().npoints();
    if npoints == 0 {
        return Ok(0);
    }
    NurbsCurve::uniform_clamped_knots(npoints, curve.degree())
        .map(|k| k.len())
        .ok_or_else(|| {
            GeobinError::Nurbs(format!(
                "cannot synthesize knots for {npoints} control points at degree {}",
                curve.degree()
            ))
        })
}

fn geometry_size(
    geom: &Geometry<'_>,
    opts: WkbOptions,
    outer: bool,
    depth: usize,
) -> Result<usize> {
    if depth > MAX_DEPTH {
        return Err(GeobinError::NestingDepth(MAX_DEPTH));
    }
    let gtype = geom.geometry_type();
    let (z, m) = wire_dims(gtype, geom, opts.dialect);
    let point_size = (2 + usize::from(z) + usize::from(m)) * 8;
    let mut size = 1 + 4; // endian byte + type code
    if needs_srid(geom, opts, outer) {
        size += 4;
    }
    size += match &geom.kind {
        GeometryKind::Point(pa) => {
            if pa.is_empty() && opts.dialect != WkbDialect::Extended && outer {
                4 // npoints = 0 form
            } else {
                point_size // a coordinate, or NaN ordinates for empty
            }
        }
        GeometryKind::LineString(pa) | GeometryKind::CircularString(pa) => {
            4 + pa.npoints() as usize * point_size
        }
        GeometryKind::Triangle(ring) => {
            // a polygon body with exactly one ring
            if ring.is_empty() {
                4
            } else {
                4 + 4 + ring.npoints() as usize * point_size
            }
        }
        GeometryKind::Polygon(rings) => {
            4 + rings
                .iter()
                .map(|r| 4 + r.npoints() as usize * point_size)
                .sum::<usize>()
        }
        GeometryKind::Nurbs(curve) => {
            let per_weight: usize = match curve.weights() {
                Some(w) => w.iter().filter(|&&x| x != 1.0).count() * 8,
                None => 0,
            };
            let nknots = nurbs_knot_count(curve)?;
            // degree + npoints, then per control point an endian byte,
            // ordinates and a weight marker, then the knot vector
            4 + 4
                + curve.points().npoints() as usize * (1 + point_size + 1)
                + per_weight
                + 4
                + nknots * 8
        }
        GeometryKind::Collection(_, children) => {
            let mut sum = 4;
            for child in children {
                sum += geometry_size(child, opts, false, depth + 1)?;
            }
            sum
        }
    };
    Ok(size)
}

struct Writer<'o> {
    out: &'o mut Vec<u8>,
    opts: WkbOptions,
}

impl Writer<'_> {
    fn header(&mut self, geom: &Geometry<'_>, gtype: GeometryType, outer: bool) -> Result<()> {
        let (z, m) = wire_dims(gtype, geom, self.opts.dialect);
        let with_srid = needs_srid(geom, self.opts, outer);
        self.out
            .iowrite(WkbByteOrder::from(self.opts.endian) as u8)?;
        let code = type_code(gtype, z, m, self.opts.dialect, with_srid);
        self.out.iowrite_with(code, self.opts.endian)?;
        if with_srid {
            self.out
                .iowrite_with(geom.srid.expect("srid present"), self.opts.endian)?;
        }
        Ok(())
    }

    fn coord(&mut self, c: Coord, z: bool, m: bool) -> Result<()> {
        self.out.iowrite_with(c.x, self.opts.endian)?;
        self.out.iowrite_with(c.y, self.opts.endian)?;
        if z {
            self.out.iowrite_with(c.z, self.opts.endian)?;
        }
        if m {
            self.out.iowrite_with(c.m, self.opts.endian)?;
        }
        Ok(())
    }

    /// Coordinate run, bulk-copied when the source block already matches
    /// the requested dimensionality and byte order.
    fn point_run(&mut self, pa: &PointArray<'_>, z: bool, m: bool) -> Result<()> {
        if z == pa.has_z() && m == pa.has_m() && self.opts.endian == scroll::NATIVE {
            if let Some(bytes) = pa.native_bytes() {
                self.out.extend_from_slice(bytes);
                return Ok(());
            }
        }
        for c in pa.iter() {
            self.coord(c, z, m)?;
        }
        Ok(())
    }

    fn geometry(&mut self, geom: &Geometry<'_>, outer: bool, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(GeobinError::NestingDepth(MAX_DEPTH));
        }
        let gtype = geom.geometry_type();
        let (z, m) = wire_dims(gtype, geom, self.opts.dialect);
        self.header(geom, gtype, outer)?;
        match &geom.kind {
            GeometryKind::Point(pa) => {
                if pa.is_empty() {
                    if self.opts.dialect != WkbDialect::Extended && outer {
                        self.out.iowrite_with(0u32, self.opts.endian)?;
                    } else {
                        // POINT EMPTY spelled with NaN ordinates
                        self.coord(
                            Coord::xyzm(f64::NAN, f64::NAN, f64::NAN, f64::NAN),
                            z,
                            m,
                        )?;
                    }
                } else {
                    self.coord(pa.point(0).expect("one point"), z, m)?;
                }
            }
            GeometryKind::LineString(pa) | GeometryKind::CircularString(pa) => {
                self.out.iowrite_with(pa.npoints(), self.opts.endian)?;
                self.point_run(pa, z, m)?;
            }
            GeometryKind::Triangle(ring) => {
                if ring.is_empty() {
                    self.out.iowrite_with(0u32, self.opts.endian)?;
                } else {
                    self.out.iowrite_with(1u32, self.opts.endian)?;
                    self.out.iowrite_with(ring.npoints(), self.opts.endian)?;
                    self.point_run(ring, z, m)?;
                }
            }
            GeometryKind::Polygon(rings) => {
                self.out
                    .iowrite_with(rings.len() as u32, self.opts.endian)?;
                for ring in rings {
                    self.out.iowrite_with(ring.npoints(), self.opts.endian)?;
                    self.point_run(ring, z, m)?;
                }
            }
            GeometryKind::Nurbs(curve) => self.nurbs(curve, z, m)?,
            GeometryKind::Collection(_, children) => {
                self.out
                    .iowrite_with(children.len() as u32, self.opts.endian)?;
                for child in children {
                    self.geometry(child, false, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn nurbs(&mut self, curve: &NurbsCurve<'_>, z: bool, m: bool) -> Result<()> {
        let endian = self.opts.endian;
        self.out.iowrite_with(curve.degree(), endian)?;
        self.out.iowrite_with(curve.points().npoints(), endian)?;
        for i in 0..curve.points().npoints() {
            self.out.iowrite(WkbByteOrder::from(endian) as u8)?;
            self.coord(curve.points().point(i).expect("index in range"), z, m)?;
            // the default weight 1.0 is not spelled out
            let weight = curve.weights().map(|w| w[i as usize]);
            match weight {
                Some(w) if w != 1.0 => {
                    self.out.iowrite(1u8)?;
                    self.out.iowrite_with(w, endian)?;
                }
                _ => self.out.iowrite(0u8)?,
            }
        }
        // knots are never omitted on the wire: synthesize the clamped
        // uniform vector when the curve stores none
        let knots = match curve.knots() {
            Some(k) => k.to_vec(),
            None if curve.points().is_empty() => Vec::new(),
            None => NurbsCurve::uniform_clamped_knots(
                curve.points().npoints(),
                curve.degree(),
            )
            .ok_or_else(|| {
                GeobinError::Nurbs(format!(
                    "cannot synthesize knots for {} control points at degree {}",
                    curve.points().npoints(),
                    curve.degree()
                ))
            })?,
        };
        self.out.iowrite_with(knots.len() as u32, endian)?;
        for k in knots {
            self.out.iowrite_with(k, endian)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::CollectionType;

    fn xy(coords: Vec<f64>) -> PointArray<'static> {
        PointArray::from_coords(false, false, coords).unwrap()
    }

    fn point12() -> Geometry<'static> {
        Geometry::point(xy(vec![1.0, 2.0])).unwrap()
    }

    #[test]
    fn sfsql_hex_point() {
        let hex = to_hex_wkb(&point12(), WkbOptions::dialect(WkbDialect::SfSql).ndr()).unwrap();
        assert_eq!(hex, "0101000000000000000000F03F0000000000000040");
    }

    #[test]
    fn xdr_point() {
        let wkb = to_wkb(&point12(), WkbOptions::dialect(WkbDialect::SfSql).xdr()).unwrap();
        assert_eq!(wkb[0], 0x00);
        assert_eq!(&wkb[1..5], &[0, 0, 0, 1]);
        assert_eq!(&wkb[5..13], &1.0f64.to_be_bytes());
    }

    #[test]
    fn iso_type_codes_carry_dims() {
        let pt = Geometry::point(
            PointArray::from_coords(true, false, vec![1.0, 2.0, 3.0]).unwrap(),
        )
        .unwrap();
        let hex = to_hex_wkb(&pt, WkbOptions::dialect(WkbDialect::Iso).ndr()).unwrap();
        // 1001 = 0x3E9
        assert!(hex.starts_with("01E9030000"));
        // SFSQL drops the Z ordinate entirely
        let sfsql = to_wkb(&pt, WkbOptions::dialect(WkbDialect::SfSql).ndr()).unwrap();
        assert_eq!(sfsql.len(), 1 + 4 + 16);
    }

    #[test]
    fn extended_empty_point_is_nan() {
        let empty = Geometry::point(PointArray::empty(false, false)).unwrap();
        let wkb = to_wkb(&empty, WkbOptions::dialect(WkbDialect::Extended).ndr()).unwrap();
        assert_eq!(wkb.len(), 1 + 4 + 16);
        let x = f64::from_le_bytes(wkb[5..13].try_into().unwrap());
        assert!(x.is_nan());
        // ISO and SFSQL use the npoints = 0 form at top level
        let wkb = to_wkb(&empty, WkbOptions::dialect(WkbDialect::Iso).ndr()).unwrap();
        assert_eq!(&wkb[5..9], &[0, 0, 0, 0]);
        assert_eq!(wkb.len(), 9);
    }

    #[test]
    fn srid_only_on_outer_shell() {
        let children = vec![
            Geometry::line_string(xy(vec![0.0, 0.0, 1.0, 1.0])),
            Geometry::line_string(xy(vec![2.0, 2.0, 3.0, 3.0])),
        ];
        let mls = Geometry::collection(CollectionType::MultiLineString, children)
            .unwrap()
            .with_srid(Some(4326));
        let wkb = to_wkb(&mls, WkbOptions::dialect(WkbDialect::Extended).ndr()).unwrap();
        // outer code carries the SRID flag
        let code = u32::from_le_bytes(wkb[1..5].try_into().unwrap());
        assert_eq!(code, 0x2000_0005);
        assert_eq!(
            i32::from_le_bytes(wkb[5..9].try_into().unwrap()),
            4326
        );
        // children are plain LineString codes
        let child_code = u32::from_le_bytes(wkb[14..18].try_into().unwrap());
        assert_eq!(child_code, 2);
        // ISO never carries an SRID
        let iso = to_wkb(&mls, WkbOptions::dialect(WkbDialect::Iso).ndr()).unwrap();
        assert_eq!(u32::from_le_bytes(iso[1..5].try_into().unwrap()), 5);
        // suppression beats the dialect
        let suppressed = to_wkb(
            &mls,
            WkbOptions::dialect(WkbDialect::Extended).ndr().no_srid(),
        )
        .unwrap();
        assert_eq!(
            u32::from_le_bytes(suppressed[1..5].try_into().unwrap()),
            5
        );
        assert_eq!(suppressed.len(), wkb.len() - 4);
    }

    #[test]
    fn size_prediction_is_exact() {
        let ring = xy(vec![0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 0.0]);
        let geoms = vec![
            point12(),
            Geometry::line_string(xy(vec![0.0, 0.0, 10.0, 5.0])),
            Geometry::polygon(vec![ring.clone()]).unwrap(),
            Geometry::triangle(ring).unwrap(),
            Geometry::nurbs(
                Some(4326),
                None,
                2,
                xy(vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0]),
                Some(vec![1.0, 2.0, 1.0]),
                None,
            )
            .unwrap(),
        ];
        for geom in geoms {
            for dialect in [WkbDialect::SfSql, WkbDialect::Iso, WkbDialect::Extended] {
                for opts in [
                    WkbOptions::dialect(dialect).ndr(),
                    WkbOptions::dialect(dialect).xdr(),
                ] {
                    let wkb = to_wkb(&geom, opts).unwrap();
                    assert_eq!(
                        wkb.len(),
                        wkb_size(&geom, opts).unwrap(),
                        "size drift: {} {dialect:?}",
                        geom.type_name()
                    );
                }
            }
        }
    }

    #[test]
    fn hex_doubles_the_size() {
        let geom = point12();
        let opts = WkbOptions::dialect(WkbDialect::Iso).ndr();
        let bin = to_wkb(&geom, opts).unwrap();
        let hex = to_hex_wkb(&geom, opts).unwrap();
        assert_eq!(hex.len(), bin.len() * 2);
    }

    #[test]
    fn default_weights_not_emitted() {
        let all_default = Geometry::nurbs(
            None,
            None,
            2,
            xy(vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0]),
            Some(vec![1.0, 1.0, 1.0]),
            None,
        )
        .unwrap();
        let weighted = Geometry::nurbs(
            None,
            None,
            2,
            xy(vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0]),
            Some(vec![1.0, 2.0, 1.0]),
            None,
        )
        .unwrap();
        let opts = WkbOptions::dialect(WkbDialect::Iso).ndr();
        let plain = to_wkb(&all_default, opts).unwrap();
        let pulled = to_wkb(&weighted, opts).unwrap();
        assert_eq!(pulled.len(), plain.len() + 8);
    }
}
