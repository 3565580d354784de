//! WKB reader.
//!
//! One parser covers all three dialects: the type code tells us whether
//! dimensions arrive as ISO offsets or EXTENDED high bits, and whether
//! an SRID follows.

use log::trace;
use scroll::{Endian, Pread};

use crate::error::{GeobinError, Result};
use crate::geometry::{CollectionType, Geometry, GeometryType};
use crate::gs2::MAX_DEPTH;
use crate::point_array::PointArray;
use crate::wkb::wkb_common::{decode_type_code, from_hex};

/// Decode a WKB buffer (any dialect, either byte order) into an owned
/// geometry tree.
pub fn from_wkb(buf: &[u8]) -> Result<Geometry<'static>> {
    let mut parser = Parser { buf, at: 0 };
    let mut geom = parser.geometry(0)?;
    if parser.remaining() != 0 {
        return Err(GeobinError::GeometryFormat(format!(
            "{} trailing bytes after geometry",
            parser.remaining()
        )));
    }
    // the outer shell's SRID applies to every nested geometry
    let srid = geom.srid;
    geom.set_srid(srid);
    trace!("wkb decode {} srid={srid:?}", geom.type_name());
    Ok(geom)
}

/// Decode hex-encoded WKB.
pub fn from_hex_wkb(hex: &str) -> Result<Geometry<'static>> {
    from_wkb(&from_hex(hex)?)
}

struct Parser<'b> {
    buf: &'b [u8],
    at: usize,
}

impl Parser<'_> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.at
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.buf.gread::<u8>(&mut self.at)?)
    }

    fn u32(&mut self, endian: Endian) -> Result<u32> {
        Ok(self.buf.gread_with::<u32>(&mut self.at, endian)?)
    }

    fn i32(&mut self, endian: Endian) -> Result<i32> {
        Ok(self.buf.gread_with::<i32>(&mut self.at, endian)?)
    }

    fn f64(&mut self, endian: Endian) -> Result<f64> {
        Ok(self.buf.gread_with::<f64>(&mut self.at, endian)?)
    }

    fn byte_order(&mut self) -> Result<Endian> {
        match self.u8()? {
            0 => Ok(scroll::BE),
            1 => Ok(scroll::LE),
            other => Err(GeobinError::GeometryFormat(format!(
                "invalid byte-order marker {other:#04x}"
            ))),
        }
    }

    fn points(
        &mut self,
        npoints: u32,
        has_z: bool,
        has_m: bool,
        endian: Endian,
    ) -> Result<PointArray<'static>> {
        let dims = 2 + usize::from(has_z) + usize::from(has_m);
        let mut flat = Vec::with_capacity(npoints as usize * dims);
        for _ in 0..npoints {
            for _ in 0..dims {
                flat.push(self.f64(endian)?);
            }
        }
        PointArray::from_coords(has_z, has_m, flat)
    }

    fn geometry(&mut self, depth: usize) -> Result<Geometry<'static>> {
        if depth > MAX_DEPTH {
            return Err(GeobinError::NestingDepth(MAX_DEPTH));
        }
        let endian = self.byte_order()?;
        let info = decode_type_code(self.u32(endian)?)?;
        let srid = if info.has_srid {
            Some(self.i32(endian)?)
        } else {
            None
        };
        let (z, m) = (info.has_z, info.has_m);

        let geom = match info.gtype {
            GeometryType::Point => {
                // top-level empty points may use the npoints = 0 form;
                // nested ones always spell NaN ordinates
                if depth == 0 && self.remaining() == 4 {
                    let npoints = self.u32(endian)?;
                    if npoints != 0 {
                        return Err(GeobinError::GeometryFormat(format!(
                            "point with {npoints} coordinates"
                        )));
                    }
                    Geometry::point(PointArray::empty(z, m))?
                } else {
                    let pa = self.points(1, z, m, endian)?;
                    let c = pa.point(0).expect("one point");
                    let all_nan = c.x.is_nan()
                        && c.y.is_nan()
                        && (!z || c.z.is_nan())
                        && (!m || c.m.is_nan());
                    if all_nan {
                        Geometry::point(PointArray::empty(z, m))?
                    } else {
                        Geometry::point(pa)?
                    }
                }
            }
            GeometryType::LineString => {
                let npoints = self.u32(endian)?;
                Geometry::line_string(self.points(npoints, z, m, endian)?)
            }
            GeometryType::CircularString => {
                let npoints = self.u32(endian)?;
                Geometry::circular_string(self.points(npoints, z, m, endian)?)
            }
            GeometryType::Polygon | GeometryType::Triangle => {
                let nrings = self.u32(endian)?;
                let mut rings = Vec::with_capacity(nrings as usize);
                for _ in 0..nrings {
                    let npoints = self.u32(endian)?;
                    rings.push(self.points(npoints, z, m, endian)?);
                }
                if info.gtype == GeometryType::Triangle {
                    // serialized as a polygon with exactly one ring
                    match rings.len() {
                        0 => Geometry::triangle(PointArray::empty(z, m))?,
                        1 => Geometry::triangle(rings.pop().expect("one ring"))?,
                        n => {
                            return Err(GeobinError::GeometryFormat(format!(
                                "triangle with {n} rings"
                            )));
                        }
                    }
                } else {
                    Geometry::polygon(rings)?
                }
            }
            GeometryType::NurbsCurve => self.nurbs(srid, z, m, endian)?,
            other => {
                let ctype = CollectionType::from_geometry_type(other)
                    .expect("remaining types are containers");
                let ngeoms = self.u32(endian)?;
                let mut children = Vec::with_capacity(ngeoms as usize);
                for _ in 0..ngeoms {
                    children.push(self.geometry(depth + 1)?);
                }
                Geometry::collection(ctype, children)?
            }
        };
        Ok(geom.with_srid(srid))
    }

    fn nurbs(
        &mut self,
        srid: Option<i32>,
        z: bool,
        m: bool,
        endian: Endian,
    ) -> Result<Geometry<'static>> {
        let degree = self.u32(endian)?;
        let npoints = self.u32(endian)?;
        let dims = 2 + usize::from(z) + usize::from(m);
        let mut flat = Vec::with_capacity(npoints as usize * dims);
        let mut weights = Vec::with_capacity(npoints as usize);
        let mut any_weight = false;
        for _ in 0..npoints {
            // every control point carries its own byte-order marker
            let point_endian = self.byte_order()?;
            for _ in 0..dims {
                flat.push(self.f64(point_endian)?);
            }
            match self.u8()? {
                0 => weights.push(1.0),
                1 => {
                    any_weight = true;
                    weights.push(self.f64(point_endian)?);
                }
                other => {
                    return Err(GeobinError::GeometryFormat(format!(
                        "invalid weight marker {other:#04x}"
                    )));
                }
            }
        }
        let nknots = self.u32(endian)?;
        let knots = if nknots > 0 {
            let mut k = Vec::with_capacity(nknots as usize);
            for _ in 0..nknots {
                k.push(self.f64(endian)?);
            }
            Some(k)
        } else {
            None
        };
        let points = PointArray::from_coords(z, m, flat)?;
        Geometry::nurbs(
            srid,
            None,
            degree,
            points,
            any_weight.then_some(weights),
            knots,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::GeometryKind;
    use crate::point_array::Coord;
    use crate::wkb::wkb_common::{WkbDialect, WkbOptions};
    use crate::wkb::wkb_writer::{to_hex_wkb, to_wkb};

    fn xy(coords: Vec<f64>) -> PointArray<'static> {
        PointArray::from_coords(false, false, coords).unwrap()
    }

    #[test]
    fn decode_sfsql_point() {
        let geom = from_hex_wkb("0101000000000000000000F03F0000000000000040").unwrap();
        assert_eq!(geom.geometry_type(), GeometryType::Point);
        assert_eq!(geom.srid, None);
        let GeometryKind::Point(pa) = &geom.kind else {
            unreachable!()
        };
        assert_eq!(pa.point(0), Some(Coord::xy(1.0, 2.0)));
    }

    #[test]
    fn decode_postgis_fixtures() {
        // SELECT 'SRID=4326;LINESTRING (10 -20 100, 0 -0.5 101)'::geometry
        let geom = from_hex_wkb(
            "01020000A0E610000002000000000000000000244000000000000034C000000000000059400000000000000000000000000000E0BF0000000000405940",
        )
        .unwrap();
        assert_eq!(geom.srid, Some(4326));
        assert!(geom.flags.z && !geom.flags.m);
        let GeometryKind::LineString(pa) = &geom.kind else {
            unreachable!()
        };
        assert_eq!(pa.point(0), Some(Coord::xyz(10.0, -20.0, 100.0)));
        assert_eq!(pa.point(1), Some(Coord::xyz(0.0, -0.5, 101.0)));

        // SELECT 'CIRCULARSTRING(0 0,1 1,2 0)'::geometry
        let geom = from_hex_wkb(
            "01080000000300000000000000000000000000000000000000000000000000F03F000000000000F03F00000000000000400000000000000000",
        )
        .unwrap();
        assert_eq!(geom.geometry_type(), GeometryType::CircularString);
        assert_eq!(geom.num_points(), 3);
    }

    #[test]
    fn extended_fixture_roundtrips_bytewise() {
        // SELECT 'SRID=4326;MULTILINESTRING ((10 -20, 0 -0.5), (0 0, 2 0))'::geometry
        let fixture = "0105000020E610000002000000010200000002000000000000000000244000000000000034C00000000000000000000000000000E0BF0102000000020000000000000000000000000000000000000000000000000000400000000000000000";
        let geom = from_hex_wkb(fixture).unwrap();
        let again =
            to_hex_wkb(&geom, WkbOptions::dialect(WkbDialect::Extended).ndr()).unwrap();
        assert_eq!(again, fixture);
    }

    #[test]
    fn srid_inherited_on_decode() {
        let children = vec![
            Geometry::line_string(xy(vec![0.0, 0.0, 1.0, 1.0])),
            Geometry::line_string(xy(vec![2.0, 2.0, 3.0, 3.0])),
        ];
        let mls = Geometry::collection(CollectionType::MultiLineString, children)
            .unwrap()
            .with_srid(Some(4326));
        let wkb = to_wkb(&mls, WkbOptions::dialect(WkbDialect::Extended).ndr()).unwrap();
        let back = from_wkb(&wkb).unwrap();
        let GeometryKind::Collection(_, children) = &back.kind else {
            unreachable!()
        };
        assert!(children.iter().all(|c| c.srid == Some(4326)));
    }

    #[test]
    fn nan_point_decodes_empty() {
        let empty = Geometry::point(PointArray::empty(false, false)).unwrap();
        for dialect in [WkbDialect::SfSql, WkbDialect::Iso, WkbDialect::Extended] {
            let wkb = to_wkb(&empty, WkbOptions::dialect(dialect).ndr()).unwrap();
            let back = from_wkb(&wkb).unwrap();
            assert!(back.is_empty(), "{dialect:?} empty point lost");
            assert_eq!(back.geometry_type(), GeometryType::Point);
        }
    }

    #[test]
    fn nested_empty_point_roundtrips() {
        let gc = Geometry::collection(
            CollectionType::GeometryCollection,
            vec![
                Geometry::point(PointArray::empty(false, false)).unwrap(),
                Geometry::line_string(xy(vec![0.0, 0.0, 1.0, 1.0])),
            ],
        )
        .unwrap();
        for dialect in [WkbDialect::SfSql, WkbDialect::Iso, WkbDialect::Extended] {
            let wkb = to_wkb(&gc, WkbOptions::dialect(dialect).ndr()).unwrap();
            let back = from_wkb(&wkb).unwrap();
            let GeometryKind::Collection(_, children) = &back.kind else {
                unreachable!()
            };
            assert!(children[0].is_empty());
            assert!(!children[1].is_empty());
        }
    }

    #[test]
    fn nurbs_wire_roundtrip() {
        let curve = Geometry::nurbs(
            Some(4326),
            None,
            2,
            xy(vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0]),
            Some(vec![1.0, 2.0, 1.0]),
            Some(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        for opts in [
            WkbOptions::dialect(WkbDialect::Extended).ndr(),
            WkbOptions::dialect(WkbDialect::Extended).xdr(),
            WkbOptions::dialect(WkbDialect::Iso).ndr(),
        ] {
            let wkb = to_wkb(&curve, opts).unwrap();
            let back = from_wkb(&wkb).unwrap();
            if opts.dialect == WkbDialect::Extended {
                assert_eq!(back, curve);
            } else {
                // ISO drops the SRID but nothing else
                assert_eq!(back, curve.clone().with_srid(None));
            }
        }
    }

    #[test]
    fn synthesized_knots_arrive_on_the_wire() {
        let curve = Geometry::nurbs(
            None,
            None,
            2,
            xy(vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0, 3.0, 1.0]),
            None,
            None,
        )
        .unwrap();
        let wkb = to_wkb(&curve, WkbOptions::dialect(WkbDialect::Iso).ndr()).unwrap();
        let back = from_wkb(&wkb).unwrap();
        let GeometryKind::Nurbs(c) = &back.kind else {
            unreachable!()
        };
        assert_eq!(
            c.knots(),
            Some(&[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0][..])
        );
    }

    #[test]
    fn truncated_and_malformed_input() {
        assert!(from_wkb(&[]).is_err());
        assert!(from_wkb(&[0x02]).is_err()); // bad byte-order marker
        let ok = to_wkb(
            &Geometry::point(xy(vec![1.0, 2.0])).unwrap(),
            WkbOptions::default(),
        )
        .unwrap();
        assert!(from_wkb(&ok[..ok.len() - 1]).is_err());
        let mut trailing = ok;
        trailing.push(0);
        assert!(from_wkb(&trailing).is_err());
    }
}
