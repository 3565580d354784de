//! GS2, the compact internal serialization.
//!
//! A GS2 record is a VARLENA-compatible buffer: a 4-byte total length, a
//! 3-byte packed SRID, one flags byte, then an optional 64-bit extended
//! flag word, an optional outward-rounded f32 bounding box, and the
//! recursive geometry payload in native byte order.
//!
//! ```
//! use geobin::{Geometry, PointArray};
//!
//! let line = Geometry::line_string(
//!     PointArray::from_coords(false, false, vec![0.0, 0.0, 10.0, 5.0]).unwrap(),
//! );
//! let buf = geobin::gs2::to_gs2(&line).unwrap();
//! let back = geobin::gs2::from_gs2(&buf).unwrap();
//! assert_eq!(back, line);
//! ```
//!
//! Decoding by reference ([`from_gs2_ref`]) yields a tree whose
//! coordinate blocks point into the record; it must not outlive the
//! buffer. [`from_gs2`] returns a detached tree.

mod peek;
mod reader;
mod size;
mod writer;

pub use peek::{bbox_of, is_empty, peek_bbox, read_stored_bbox};
pub use reader::{from_gs2, from_gs2_ref};
pub use size::required_size;
pub use writer::to_gs2;

use crate::bbox::BoundingBox;
use crate::error::{GeobinError, Result};
use crate::flags::{self, GeomFlags};

/// Maximum collection nesting accepted by the decoders.
pub const MAX_DEPTH: usize = 32;

/// Parsed fixed part of a GS2 record.
pub(crate) struct Gs2Header {
    pub srid: Option<i32>,
    pub flags: GeomFlags,
    pub has_bbox: bool,
    bbox_offset: usize,
    pub payload_offset: usize,
}

impl Gs2Header {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 12 {
            return Err(GeobinError::Truncated(buf.len()));
        }
        let varsize = u32::from_ne_bytes(buf[0..4].try_into().expect("4-byte slice")) as usize;
        if varsize != buf.len() {
            return Err(GeobinError::GeometryFormat(format!(
                "record declares {varsize} bytes, buffer holds {}",
                buf.len()
            )));
        }
        let srid = flags::unpack_srid([buf[4], buf[5], buf[6]]);
        let parsed = flags::decode_gflags(buf[7])?;
        let mut geom_flags = parsed.flags;

        let mut offset = 8;
        if parsed.has_extended {
            if buf.len() < offset + 8 {
                return Err(GeobinError::Truncated(buf.len()));
            }
            let ext = u64::from_ne_bytes(buf[8..16].try_into().expect("8-byte slice"));
            geom_flags.solid = ext & flags::EXT_SOLID != 0;
            offset += 8;
        }
        let bbox_offset = offset;
        if parsed.has_bbox {
            offset += 2 * geom_flags.box_ndims() * 4;
        }
        if buf.len() < offset + 8 {
            return Err(GeobinError::Truncated(buf.len()));
        }
        Ok(Self {
            srid,
            flags: geom_flags,
            has_bbox: parsed.has_bbox,
            bbox_offset,
            payload_offset: offset,
        })
    }

    pub(crate) fn bbox(&self, buf: &[u8]) -> Result<Option<BoundingBox>> {
        if !self.has_bbox {
            return Ok(None);
        }
        BoundingBox::read_native(&buf[self.bbox_offset..self.payload_offset], self.flags).map(Some)
    }
}
