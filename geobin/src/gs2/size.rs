//! Byte-exact size prediction for GS2 records.

use crate::error::{GeobinError, Result};
use crate::geometry::{Geometry, GeometryKind};
use crate::gs2::MAX_DEPTH;
use crate::point_array::PointArray;

/// Exact number of bytes [`super::to_gs2`] will produce for `geom`. The
/// writer treats any divergence from this prediction as a fatal internal
/// error, so the arithmetic here is the layout's source of truth.
pub fn required_size(geom: &Geometry<'_>) -> Result<usize> {
    geom.check_consistent()?;
    let mut size = 8; // varsize + srid + gflags
    if geom.flags.needs_extended() {
        size += 8;
    }
    if geom.bbox.is_some() {
        size += 2 * geom.flags.box_ndims() * 4;
    }
    Ok(size + payload_size(geom, 0)?)
}

fn coord_block(pa: &PointArray<'_>) -> usize {
    pa.byte_len()
}

pub(crate) fn payload_size(geom: &Geometry<'_>, depth: usize) -> Result<usize> {
    if depth > MAX_DEPTH {
        return Err(GeobinError::NestingDepth(MAX_DEPTH));
    }
    let size = match &geom.kind {
        GeometryKind::Point(pa)
        | GeometryKind::LineString(pa)
        | GeometryKind::CircularString(pa)
        | GeometryKind::Triangle(pa) => 8 + coord_block(pa),
        GeometryKind::Polygon(rings) => {
            // a 4-byte pad keeps coordinate blocks 8-byte aligned when
            // the per-ring count array has odd length
            let pad = if rings.len() % 2 == 1 { 4 } else { 0 };
            8 + 4 * rings.len() + pad + rings.iter().map(coord_block).sum::<usize>()
        }
        GeometryKind::Nurbs(curve) => {
            let nweights = curve.weights().map_or(0, <[f64]>::len);
            let nknots = curve.knots().map_or(0, <[f64]>::len);
            20 + 8 * (nweights + nknots) + coord_block(curve.points())
        }
        GeometryKind::Collection(_, children) => {
            let mut size = 8;
            for child in children {
                size += payload_size(child, depth + 1)?;
            }
            size
        }
    };
    Ok(size)
}
