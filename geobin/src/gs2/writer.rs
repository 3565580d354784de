//! GS2 encoder.

use log::trace;

use crate::error::{GeobinError, Result};
use crate::flags::{self, EXT_SOLID};
use crate::geometry::{Geometry, GeometryKind};
use crate::gs2::size::{payload_size, required_size};
use crate::point_array::PointArray;

/// Serialize a geometry tree into a fresh GS2 record.
///
/// The buffer is sized by [`required_size`] up front; a final length
/// check turns any drift between sizer and writer into
/// [`GeobinError::SizeMismatch`] rather than a corrupt record. The
/// bounding box is written only when the tree carries one (see
/// [`Geometry::ensure_bbox`]).
pub fn to_gs2(geom: &Geometry<'_>) -> Result<Vec<u8>> {
    let expected = required_size(geom)?;
    if let Some(bbox) = &geom.bbox {
        if bbox.ndims() != geom.flags.box_ndims() || bbox.geodetic != geom.flags.geodetic {
            return Err(GeobinError::DimensionMismatch("bounding box"));
        }
    }
    trace!("gs2 encode {} ({expected} bytes)", geom.type_name());

    let mut out = Vec::with_capacity(expected);
    out.extend_from_slice(&(expected as u32).to_ne_bytes());
    out.extend_from_slice(&flags::pack_srid(geom.srid)?);
    out.push(flags::encode_gflags(geom.flags, geom.bbox.is_some()));
    if geom.flags.needs_extended() {
        let mut ext = 0u64;
        if geom.flags.solid {
            ext |= EXT_SOLID;
        }
        out.extend_from_slice(&ext.to_ne_bytes());
    }
    if let Some(bbox) = &geom.bbox {
        bbox.write_native(&mut out);
    }
    write_payload(geom, &mut out)?;

    if out.len() != expected {
        return Err(GeobinError::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_ne_bytes());
}

fn put_array(out: &mut Vec<u8>, type_code: u32, pa: &PointArray<'_>) {
    put_u32(out, type_code);
    put_u32(out, pa.npoints());
    pa.write_native(out);
}

fn write_payload(geom: &Geometry<'_>, out: &mut Vec<u8>) -> Result<()> {
    let code = geom.geometry_type() as u32;
    match &geom.kind {
        GeometryKind::Point(pa)
        | GeometryKind::LineString(pa)
        | GeometryKind::CircularString(pa)
        | GeometryKind::Triangle(pa) => put_array(out, code, pa),
        GeometryKind::Polygon(rings) => {
            put_u32(out, code);
            put_u32(out, rings.len() as u32);
            for ring in rings {
                put_u32(out, ring.npoints());
            }
            if rings.len() % 2 == 1 {
                put_u32(out, 0);
            }
            for ring in rings {
                ring.write_native(out);
            }
        }
        GeometryKind::Nurbs(curve) => {
            // npoints must stay at payload offset 4 for the emptiness probe
            put_u32(out, code);
            put_u32(out, curve.points().npoints());
            put_u32(out, curve.degree());
            let weights = curve.weights().unwrap_or(&[]);
            let knots = curve.knots().unwrap_or(&[]);
            put_u32(out, weights.len() as u32);
            put_u32(out, knots.len() as u32);
            for w in weights {
                out.extend_from_slice(&w.to_ne_bytes());
            }
            for k in knots {
                out.extend_from_slice(&k.to_ne_bytes());
            }
            curve.points().write_native(out);
        }
        GeometryKind::Collection(_, children) => {
            put_u32(out, code);
            put_u32(out, children.len() as u32);
            for child in children {
                // children carry no srid/size header; flags were checked
                // against the parent's
                write_payload(child, out)?;
            }
        }
    }
    Ok(())
}
