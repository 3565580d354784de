//! Binary geometry codecs and a NURBS curve engine.
//!
//! geobin models simple-feature geometries (points through TINs, plus
//! NURBS curves) as an owned or buffer-borrowing tree and moves them
//! through two wire families:
//!
//! * [`wkb`]: Well-Known Binary in the SFSQL, ISO and extended
//!   dialects, either byte order, with a hex-encoded flavor.
//! * [`gs2`]: a compact VARLENA-compatible record with an inline
//!   outward-rounded bounding box and a zero-copy decode path, plus
//!   header-only probes (emptiness, bounding box peek) that never build
//!   a tree.
//!
//! ## Encoding and decoding
//!
//! ```
//! use geobin::wkb::{WkbDialect, WkbOptions};
//! use geobin::{Geometry, PointArray};
//!
//! let point = Geometry::point(
//!     PointArray::from_coords(false, false, vec![1.0, 2.0]).unwrap(),
//! )
//! .unwrap();
//! let hex = point
//!     .to_hex_wkb(WkbOptions::dialect(WkbDialect::SfSql).ndr())
//!     .unwrap();
//! assert_eq!(hex, "0101000000000000000000F03F0000000000000040");
//! ```
//!
//! ## NURBS curves
//!
//! ```
//! use geobin::{Geometry, PointArray};
//!
//! let curve = Geometry::nurbs(
//!     None,
//!     None,
//!     2,
//!     PointArray::from_coords(false, false, vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0]).unwrap(),
//!     None,
//!     None,
//! )
//! .unwrap();
//! let line = curve.nurbs_to_line_string(10).unwrap();
//! assert_eq!(line.num_points(), 11);
//! ```

mod bbox;
pub mod error;
mod flags;
mod geometry;
pub mod gs2;
mod nurbs;
mod point_array;
pub mod wkb;

pub use bbox::BoundingBox;
pub use error::{GeobinError, Result};
pub use flags::GeomFlags;
pub use geometry::{CollectionType, Geometry, GeometryKind, GeometryType};
pub use nurbs::{MAX_DEGREE, MAX_SEGMENTS, MIN_DEGREE, NurbsCurve};
pub use point_array::{Coord, PointArray};

// The wire formats assume 4-byte integers and 8-byte IEEE doubles.
const _: () = assert!(size_of::<u32>() == 4 && size_of::<f64>() == 8 && size_of::<f32>() == 4);
