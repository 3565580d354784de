//! Well-Known Binary (WKB) conversions.
//!
//! # Usage example:
//!
//! Decode hex WKB and re-encode it in the ISO dialect:
//!
//! ```
//! use geobin::wkb::{WkbDialect, WkbOptions, from_hex_wkb, to_hex_wkb};
//!
//! let geom = from_hex_wkb("0101000000000000000000F03F0000000000000040").unwrap();
//! let iso = to_hex_wkb(&geom, WkbOptions::dialect(WkbDialect::Iso).ndr()).unwrap();
//! assert_eq!(iso, "0101000000000000000000F03F0000000000000040");
//! ```

pub(crate) mod wkb_common;
pub(crate) mod wkb_reader;
pub(crate) mod wkb_writer;

pub use wkb_common::{WkbDialect, WkbOptions};
pub use wkb_reader::{from_hex_wkb, from_wkb};
pub use wkb_writer::{to_hex_wkb, to_wkb, wkb_size};

use crate::error::Result;
use crate::geometry::Geometry;

impl Geometry<'_> {
    /// Serialize to WKB (see [`to_wkb`]).
    pub fn to_wkb(&self, opts: WkbOptions) -> Result<Vec<u8>> {
        to_wkb(self, opts)
    }

    /// Serialize to hex-encoded WKB (see [`to_hex_wkb`]).
    pub fn to_hex_wkb(&self, opts: WkbOptions) -> Result<String> {
        to_hex_wkb(self, opts)
    }
}
