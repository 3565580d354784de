//! GS2 decoder.

use log::trace;

use crate::error::{GeobinError, Result};
use crate::flags::GeomFlags;
use crate::geometry::{CollectionType, Geometry, GeometryKind, GeometryType};
use crate::gs2::{Gs2Header, MAX_DEPTH};
use crate::nurbs::NurbsCurve;
use crate::point_array::PointArray;

/// Decode a GS2 record into an owned tree.
pub fn from_gs2(buf: &[u8]) -> Result<Geometry<'static>> {
    from_gs2_ref(buf).map(Geometry::into_owned)
}

/// Decode a GS2 record into a tree whose coordinate blocks reference the
/// record's payload (zero-copy). The result must not outlive `buf` and
/// must not be mutated in place; clone with [`Geometry::into_owned`]
/// first.
pub fn from_gs2_ref(buf: &[u8]) -> Result<Geometry<'_>> {
    let header = Gs2Header::parse(buf)?;
    let mut at = header.payload_offset;
    let mut geom = read_payload(buf, &mut at, header.flags, 0)?;
    if at != buf.len() {
        return Err(GeobinError::GeometryFormat(format!(
            "{} trailing bytes after payload",
            buf.len() - at
        )));
    }
    geom.set_srid(header.srid);
    geom.bbox = header.bbox(buf)?;
    trace!("gs2 decode {} srid={:?}", geom.type_name(), geom.srid);
    Ok(geom)
}

fn read_u32(buf: &[u8], at: &mut usize) -> Result<u32> {
    let end = *at + 4;
    if end > buf.len() {
        return Err(GeobinError::Truncated(*at));
    }
    let v = u32::from_ne_bytes(buf[*at..end].try_into().expect("4-byte slice"));
    *at = end;
    Ok(v)
}

fn read_f64_vec(buf: &[u8], at: &mut usize, count: usize) -> Result<Vec<f64>> {
    let end = *at + count * 8;
    if end > buf.len() {
        return Err(GeobinError::Truncated(*at));
    }
    let v = buf[*at..end]
        .chunks_exact(8)
        .map(|c| f64::from_ne_bytes(c.try_into().expect("8-byte chunk")))
        .collect();
    *at = end;
    Ok(v)
}

fn read_coords<'a>(
    buf: &'a [u8],
    at: &mut usize,
    flags: GeomFlags,
    npoints: u32,
) -> Result<PointArray<'a>> {
    let end = *at + npoints as usize * flags.point_size();
    if end > buf.len() {
        return Err(GeobinError::Truncated(*at));
    }
    let pa = PointArray::from_bytes(flags.z, flags.m, npoints, &buf[*at..end])?;
    *at = end;
    Ok(pa)
}

fn read_payload<'a>(
    buf: &'a [u8],
    at: &mut usize,
    flags: GeomFlags,
    depth: usize,
) -> Result<Geometry<'a>> {
    if depth > MAX_DEPTH {
        return Err(GeobinError::NestingDepth(MAX_DEPTH));
    }
    let code = read_u32(buf, at)?;
    let Some(gtype) = GeometryType::from_u32(code) else {
        return Err(GeobinError::UnsupportedType(code.to_string()));
    };

    let mut geom = match gtype {
        GeometryType::Point => {
            let npoints = read_u32(buf, at)?;
            if npoints > 1 {
                return Err(GeobinError::GeometryFormat(format!(
                    "point with {npoints} coordinates"
                )));
            }
            Geometry::point(read_coords(buf, at, flags, npoints)?)?
        }
        GeometryType::LineString => {
            let npoints = read_u32(buf, at)?;
            Geometry::line_string(read_coords(buf, at, flags, npoints)?)
        }
        GeometryType::CircularString => {
            let npoints = read_u32(buf, at)?;
            Geometry::circular_string(read_coords(buf, at, flags, npoints)?)
        }
        GeometryType::Triangle => {
            let npoints = read_u32(buf, at)?;
            Geometry::triangle(read_coords(buf, at, flags, npoints)?)?
        }
        GeometryType::Polygon => {
            let nrings = read_u32(buf, at)? as usize;
            let mut counts = Vec::with_capacity(nrings);
            for _ in 0..nrings {
                counts.push(read_u32(buf, at)?);
            }
            if nrings % 2 == 1 {
                read_u32(buf, at)?; // alignment pad
            }
            let mut rings = Vec::with_capacity(nrings);
            for npoints in counts {
                rings.push(read_coords(buf, at, flags, npoints)?);
            }
            Geometry::polygon(rings)?
        }
        GeometryType::NurbsCurve => {
            let npoints = read_u32(buf, at)?;
            let degree = read_u32(buf, at)?;
            let nweights = read_u32(buf, at)? as usize;
            let nknots = read_u32(buf, at)? as usize;
            let weights = if nweights > 0 {
                Some(read_f64_vec(buf, at, nweights)?)
            } else {
                None
            };
            let knots = if nknots > 0 {
                Some(read_f64_vec(buf, at, nknots)?)
            } else {
                None
            };
            let points = read_coords(buf, at, flags, npoints)?;
            Geometry {
                srid: None,
                flags,
                bbox: None,
                kind: GeometryKind::Nurbs(NurbsCurve::new(degree, points, weights, knots)?),
            }
        }
        other => {
            let ctype =
                CollectionType::from_geometry_type(other).expect("remaining types are containers");
            let ngeoms = read_u32(buf, at)? as usize;
            let mut children = Vec::with_capacity(ngeoms);
            for _ in 0..ngeoms {
                // children re-use the parent's flags; their payloads
                // carry only type and counts
                children.push(read_payload(buf, at, flags, depth + 1)?);
            }
            Geometry::collection(ctype, children)?
        }
    };
    geom.flags = flags;
    Ok(geom)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gs2::to_gs2;
    use crate::point_array::Coord;

    fn xy(coords: Vec<f64>) -> PointArray<'static> {
        PointArray::from_coords(false, false, coords).unwrap()
    }

    #[test]
    fn zero_copy_then_owned() {
        let line = Geometry::line_string(xy(vec![0.0, 0.0, 10.0, 5.0])).with_srid(Some(4326));
        let buf = to_gs2(&line).unwrap();
        let by_ref = from_gs2_ref(&buf).unwrap();
        assert_eq!(by_ref, line);
        let owned = by_ref.into_owned();
        drop(buf);
        assert_eq!(owned, line);
    }

    #[test]
    fn srid_inherited_by_children() {
        let children = vec![
            Geometry::line_string(xy(vec![0.0, 0.0, 1.0, 1.0])),
            Geometry::line_string(xy(vec![2.0, 2.0, 3.0, 3.0])),
        ];
        let mls = Geometry::collection(CollectionType::MultiLineString, children)
            .unwrap()
            .with_srid(Some(4326));
        let buf = to_gs2(&mls).unwrap();
        let back = from_gs2(&buf).unwrap();
        let GeometryKind::Collection(_, children) = &back.kind else {
            unreachable!()
        };
        assert!(children.iter().all(|c| c.srid == Some(4326)));
    }

    #[test]
    fn disallowed_child_reported_with_pair() {
        // hand-build a MultiPoint payload holding a LineString
        let line = Geometry::line_string(xy(vec![0.0, 0.0, 1.0, 1.0]));
        let gc =
            Geometry::collection(CollectionType::GeometryCollection, vec![line]).unwrap();
        let mut buf = to_gs2(&gc).unwrap();
        // patch the collection type word from GeometryCollection to MultiPoint
        let payload = buf.len() - 8 - 8 - 32;
        buf[payload..payload + 4]
            .copy_from_slice(&(GeometryType::MultiPoint as u32).to_ne_bytes());
        let err = from_gs2(&buf).unwrap_err();
        assert!(matches!(
            err,
            GeobinError::ChildType {
                parent: "MultiPoint",
                child: "LineString"
            }
        ));
    }

    #[test]
    fn empty_nurbs_keeps_dimensionality() {
        let curve = Geometry::nurbs(
            None,
            None,
            3,
            PointArray::empty(true, false),
            None,
            None,
        )
        .unwrap();
        let buf = to_gs2(&curve).unwrap();
        let back = from_gs2(&buf).unwrap();
        assert!(back.is_empty());
        assert!(back.flags.z);
        let GeometryKind::Nurbs(c) = &back.kind else {
            unreachable!()
        };
        assert!(c.points().has_z());
        assert_eq!(c.degree(), 3);
    }

    #[test]
    fn truncated_record_rejected() {
        let line = Geometry::line_string(xy(vec![0.0, 0.0, 10.0, 5.0]));
        let buf = to_gs2(&line).unwrap();
        // chop the buffer but keep the declared varsize intact
        assert!(from_gs2(&buf[..buf.len() - 8]).is_err());
    }

    #[test]
    fn stored_bbox_roundtrips_rounded() {
        let mut line = Geometry::line_string(xy(vec![0.0, 0.0, 10.0, 5.0]));
        line.ensure_bbox();
        let buf = to_gs2(&line).unwrap();
        let back = from_gs2(&buf).unwrap();
        let expected = line.bbox.unwrap().rounded();
        assert_eq!(back.bbox, Some(expected));
        assert!(back.bbox.unwrap().contains_coord(Coord::xy(10.0, 5.0)));
    }
}
