//! Header-only inspection of GS2 records: emptiness probe, stored-box
//! reads and the peek fast path, none of which build a geometry tree.

use log::trace;

use crate::bbox::BoundingBox;
use crate::error::{GeobinError, Result};
use crate::flags::GeomFlags;
use crate::geometry::GeometryType;
use crate::gs2::{Gs2Header, MAX_DEPTH, from_gs2_ref};
use crate::point_array::Coord;

/// True when the record holds no coordinates at all, decided by walking
/// the serialized payload. Relies on every payload keeping its count
/// word at offset 4.
pub fn is_empty(buf: &[u8]) -> Result<bool> {
    let header = Gs2Header::parse(buf)?;
    let (empty, _) = probe(buf, header.payload_offset, header.flags, 0)?;
    Ok(empty)
}

/// Walk one payload, returning its emptiness and the bytes it spans.
/// Short-circuits (with a meaningless span) as soon as a coordinate is
/// found.
fn probe(buf: &[u8], at: usize, flags: GeomFlags, depth: usize) -> Result<(bool, usize)> {
    if depth > MAX_DEPTH {
        return Err(GeobinError::NestingDepth(MAX_DEPTH));
    }
    let word = |i: usize| -> Result<u32> {
        let end = at + i * 4 + 4;
        if end > buf.len() {
            return Err(GeobinError::Truncated(buf.len()));
        }
        Ok(u32::from_ne_bytes(
            buf[end - 4..end].try_into().expect("4-byte slice"),
        ))
    };
    let code = word(0)?;
    let count = word(1)? as usize;
    let Some(gtype) = GeometryType::from_u32(code) else {
        return Err(GeobinError::UnsupportedType(code.to_string()));
    };
    let ps = flags.point_size();
    match gtype {
        GeometryType::Point
        | GeometryType::LineString
        | GeometryType::CircularString
        | GeometryType::Triangle => Ok((count == 0, 8 + count * ps)),
        GeometryType::Polygon => {
            let mut coords = 0usize;
            for ring in 0..count {
                coords += word(2 + ring)? as usize;
            }
            let pad = if count % 2 == 1 { 4 } else { 0 };
            Ok((coords == 0, 8 + 4 * count + pad + coords * ps))
        }
        GeometryType::NurbsCurve => {
            // [type][npoints][degree][nweights][nknots]
            let nweights = word(3)? as usize;
            let nknots = word(4)? as usize;
            Ok((count == 0, 20 + 8 * (nweights + nknots) + count * ps))
        }
        _ => {
            let mut span = 8usize;
            for _ in 0..count {
                let (child_empty, child_span) = probe(buf, at + span, flags, depth + 1)?;
                if !child_empty {
                    return Ok((false, 0));
                }
                span += child_span;
            }
            Ok((true, span))
        }
    }
}

/// The bounding box stored in the record's header, if any. Reads back
/// the outward-rounded f32 values widened to f64.
pub fn read_stored_bbox(buf: &[u8]) -> Result<Option<BoundingBox>> {
    let header = Gs2Header::parse(buf)?;
    header.bbox(buf)
}

/// Fast-path bounding box for trivial shapes, straight from the payload
/// bytes: a one-point Point, a two-point LineString, or either wrapped
/// in a single-member multi. Returns `None` whenever the record is
/// geodetic, already stores a box, or holds anything bigger; callers
/// fall back to [`read_stored_bbox`] or a full decode.
pub fn peek_bbox(buf: &[u8]) -> Result<Option<BoundingBox>> {
    let header = Gs2Header::parse(buf)?;
    if header.flags.geodetic || header.has_bbox {
        return Ok(None);
    }
    let flags = header.flags;
    let at = header.payload_offset;
    let word = |i: usize| -> Result<u32> {
        let end = at + i * 4 + 4;
        if end > buf.len() {
            return Err(GeobinError::Truncated(buf.len()));
        }
        Ok(u32::from_ne_bytes(
            buf[end - 4..end].try_into().expect("4-byte slice"),
        ))
    };
    let code = word(0)?;
    let count = word(1)?;
    let Some(gtype) = GeometryType::from_u32(code) else {
        return Err(GeobinError::UnsupportedType(code.to_string()));
    };
    let bbox = match (gtype, count) {
        (GeometryType::Point, 1) => Some(coords_bbox(buf, at + 8, 1, flags)?),
        (GeometryType::LineString, 2) => Some(coords_bbox(buf, at + 8, 2, flags)?),
        (GeometryType::MultiPoint, 1) => {
            // sole member must itself be a one-point Point
            if word(2)? == GeometryType::Point as u32 && word(3)? == 1 {
                Some(coords_bbox(buf, at + 16, 1, flags)?)
            } else {
                None
            }
        }
        (GeometryType::MultiLineString, 1) => {
            if word(2)? == GeometryType::LineString as u32 && word(3)? == 2 {
                Some(coords_bbox(buf, at + 16, 2, flags)?)
            } else {
                None
            }
        }
        _ => None,
    };
    if bbox.is_some() {
        trace!("peeked bbox for {}", gtype.name());
    }
    Ok(bbox)
}

fn coords_bbox(buf: &[u8], at: usize, npoints: usize, flags: GeomFlags) -> Result<BoundingBox> {
    let dims = flags.ndims();
    let end = at + npoints * dims * 8;
    if end > buf.len() {
        return Err(GeobinError::Truncated(buf.len()));
    }
    let ordinate = |p: usize, d: usize| {
        let o = at + (p * dims + d) * 8;
        f64::from_ne_bytes(buf[o..o + 8].try_into().expect("8-byte slice"))
    };
    let coord = |p: usize| Coord {
        x: ordinate(p, 0),
        y: ordinate(p, 1),
        z: if flags.z { ordinate(p, 2) } else { 0.0 },
        m: if flags.m {
            ordinate(p, 2 + usize::from(flags.z))
        } else {
            0.0
        },
    };
    let mut bbox = BoundingBox::from_coord(coord(0), flags);
    for p in 1..npoints {
        bbox.expand_to(coord(p));
    }
    Ok(bbox.rounded())
}

/// Bounding box of a record by the cheapest available route: the stored
/// header box, then the peek fast path, then a full decode and
/// recompute. `None` only for empty geometries. All routes return the
/// box as it would read back from a header (outward-rounded floats).
pub fn bbox_of(buf: &[u8]) -> Result<Option<BoundingBox>> {
    if let Some(bbox) = read_stored_bbox(buf)? {
        return Ok(Some(bbox));
    }
    if let Some(bbox) = peek_bbox(buf)? {
        return Ok(Some(bbox));
    }
    Ok(from_gs2_ref(buf)?.compute_bbox().map(|b| b.rounded()))
}
