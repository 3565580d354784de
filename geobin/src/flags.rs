//! Dimensionality flags and the GS2 header algebra.
//!
//! A serialized GS2 record spends a single byte on geometry flags. The
//! in-memory [`GeomFlags`] type is richer: it also tracks the SOLID bit,
//! which lives in the optional 64-bit extended-flags word on disk.

use crate::error::{GeobinError, Result};

/// Dimensionality and interpretation flags carried by every geometry.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct GeomFlags {
    /// Coordinates carry a Z ordinate
    pub z: bool,
    /// Coordinates carry an M ordinate
    pub m: bool,
    /// Coordinates are lon/lat on an ellipsoid; bounding boxes are
    /// computed in Earth-centered space and always 3D
    pub geodetic: bool,
    /// Closed surface encloses a volume (PolyhedralSurface/TIN only)
    pub solid: bool,
}

impl GeomFlags {
    pub fn xy() -> Self {
        Self::default()
    }

    pub fn xyz() -> Self {
        Self {
            z: true,
            ..Self::default()
        }
    }

    pub fn xym() -> Self {
        Self {
            m: true,
            ..Self::default()
        }
    }

    pub fn xyzm() -> Self {
        Self {
            z: true,
            m: true,
            ..Self::default()
        }
    }

    /// Number of ordinates per coordinate (2–4).
    pub fn ndims(self) -> usize {
        2 + usize::from(self.z) + usize::from(self.m)
    }

    /// Bytes occupied by one coordinate.
    pub fn point_size(self) -> usize {
        self.ndims() * 8
    }

    /// Dimensions of a bounding box for these flags. Geodetic boxes are
    /// Earth-centered and always 3D.
    pub fn box_ndims(self) -> usize {
        if self.geodetic { 3 } else { self.ndims() }
    }

    /// True when the extended 64-bit flag word must be serialized.
    pub fn needs_extended(self) -> bool {
        self.solid
    }
}

// gflags byte layout
const FLAG_Z: u8 = 0x01;
const FLAG_M: u8 = 0x02;
const FLAG_BBOX: u8 = 0x04;
const FLAG_GEODETIC: u8 = 0x08;
const FLAG_EXTENDED: u8 = 0x10;
const FLAG_VERSION_MASK: u8 = 0x60;
const FLAG_VERSION_SHIFT: u8 = 5;

/// Version value stored in the 2-bit field for this layout.
pub(crate) const GS2_VERSION: u8 = 1;

// extended flag word
pub(crate) const EXT_SOLID: u64 = 0x0000_0001;
#[allow(dead_code)]
pub(crate) const EXT_CHECKED_VALID: u64 = 0x0000_0002;
#[allow(dead_code)]
pub(crate) const EXT_IS_VALID: u64 = 0x0000_0004;
#[allow(dead_code)]
pub(crate) const EXT_HAS_HASH: u64 = 0x0000_0008;

/// Pack in-memory flags into the on-disk gflags byte.
pub(crate) fn encode_gflags(flags: GeomFlags, has_bbox: bool) -> u8 {
    let mut g = GS2_VERSION << FLAG_VERSION_SHIFT;
    if flags.z {
        g |= FLAG_Z;
    }
    if flags.m {
        g |= FLAG_M;
    }
    if has_bbox {
        g |= FLAG_BBOX;
    }
    if flags.geodetic {
        g |= FLAG_GEODETIC;
    }
    if flags.needs_extended() {
        g |= FLAG_EXTENDED;
    }
    g
}

/// gflags byte decoded into its parts. SOLID arrives later, from the
/// extended word, so `flags.solid` is always false here.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Gs2Flags {
    pub flags: GeomFlags,
    pub has_bbox: bool,
    pub has_extended: bool,
}

pub(crate) fn decode_gflags(g: u8) -> Result<Gs2Flags> {
    let version = (g & FLAG_VERSION_MASK) >> FLAG_VERSION_SHIFT;
    if version != GS2_VERSION {
        return Err(GeobinError::Version(version));
    }
    Ok(Gs2Flags {
        flags: GeomFlags {
            z: g & FLAG_Z != 0,
            m: g & FLAG_M != 0,
            geodetic: g & FLAG_GEODETIC != 0,
            solid: false,
        },
        has_bbox: g & FLAG_BBOX != 0,
        has_extended: g & FLAG_EXTENDED != 0,
    })
}

/// Bytes from the start of a GS2 record to its payload, as dictated by a
/// gflags byte: 8 (size + srid + gflags), the extended word when present,
/// and two floats per box dimension when a box is stored.
pub(crate) fn header_size(g: u8) -> Result<usize> {
    let parsed = decode_gflags(g)?;
    let mut size = 8;
    if parsed.has_extended {
        size += 8;
    }
    if parsed.has_bbox {
        size += 2 * parsed.flags.box_ndims() * 4;
    }
    Ok(size)
}

/// SRID values representable in the 3-byte header field: 21-bit two's
/// complement.
pub(crate) const SRID_MIN: i32 = -(1 << 20);
pub(crate) const SRID_MAX: i32 = (1 << 20) - 1;

/// Pack an optional SRID into 3 header bytes. `None` (unknown) is stored
/// as 0.
pub(crate) fn pack_srid(srid: Option<i32>) -> Result<[u8; 3]> {
    let s = srid.unwrap_or(0);
    if !(SRID_MIN..=SRID_MAX).contains(&s) {
        return Err(GeobinError::Srid(s));
    }
    let bits = (s as u32) & 0x001F_FFFF;
    Ok([(bits >> 16) as u8, (bits >> 8) as u8, bits as u8])
}

/// Recover the SRID from 3 header bytes, sign-extending from bit 20 and
/// remapping the on-disk 0 to "unknown".
pub(crate) fn unpack_srid(b: [u8; 3]) -> Option<i32> {
    let mut bits = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
    if bits == 0 {
        return None;
    }
    if bits & 0x0010_0000 != 0 {
        bits |= 0xFFE0_0000;
    }
    Some(bits as i32)
}
