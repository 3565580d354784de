use crate::error::{GeobinError, Result};
use crate::geometry::GeometryType;

/// WKB dialect.
///
/// `SfSql` is the historical 2D form: the writer discards Z/M ordinates
/// and never carries an SRID, while the reader still accepts input with
/// dimension markers. `Iso` encodes dimensions as additive type-code
/// offsets. `Extended` uses high-bit flags and may embed an SRID.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum WkbDialect {
    SfSql,
    Iso,
    Extended,
}

/// Encoder options: exactly one dialect, at most one byte order (the
/// default is machine order), optional SRID suppression.
#[derive(Debug, Clone, Copy)]
pub struct WkbOptions {
    pub dialect: WkbDialect,
    pub endian: scroll::Endian,
    /// Suppress the SRID even when the dialect could carry it
    pub no_srid: bool,
}

impl Default for WkbOptions {
    fn default() -> Self {
        Self {
            dialect: WkbDialect::Extended,
            endian: scroll::NATIVE,
            no_srid: false,
        }
    }
}

impl WkbOptions {
    pub fn dialect(dialect: WkbDialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Little-endian output (NDR).
    pub fn ndr(mut self) -> Self {
        self.endian = scroll::LE;
        self
    }

    /// Big-endian output (XDR).
    pub fn xdr(mut self) -> Self {
        self.endian = scroll::BE;
        self
    }

    /// Never emit an SRID.
    pub fn no_srid(mut self) -> Self {
        self.no_srid = true;
        self
    }
}

pub(crate) enum WkbByteOrder {
    Xdr = 0, // Big Endian
    Ndr = 1, // Little Endian
}

impl From<scroll::Endian> for WkbByteOrder {
    fn from(endian: scroll::Endian) -> Self {
        match endian {
            scroll::BE => WkbByteOrder::Xdr,
            scroll::LE => WkbByteOrder::Ndr,
        }
    }
}

// Extended-variant type-code flags
pub(crate) const EWKB_Z_FLAG: u32 = 0x8000_0000;
pub(crate) const EWKB_M_FLAG: u32 = 0x4000_0000;
pub(crate) const EWKB_SRID_FLAG: u32 = 0x2000_0000;

/// Compute the on-wire type code for one geometry header.
///
/// NURBS curves always use the ISO dimension offsets, whatever the
/// dialect; the SRID presence flag stays a high bit.
pub(crate) fn type_code(
    gtype: GeometryType,
    has_z: bool,
    has_m: bool,
    dialect: WkbDialect,
    with_srid: bool,
) -> u32 {
    let mut code = gtype as u32;
    let iso_dims = dialect == WkbDialect::Iso || gtype == GeometryType::NurbsCurve;
    if iso_dims {
        if has_z {
            code += 1000;
        }
        if has_m {
            code += 2000;
        }
    } else if dialect == WkbDialect::Extended {
        if has_z {
            code |= EWKB_Z_FLAG;
        }
        if has_m {
            code |= EWKB_M_FLAG;
        }
    }
    if with_srid {
        code |= EWKB_SRID_FLAG;
    }
    code
}

/// A decoded type code, dialect-agnostic.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WkbTypeInfo {
    pub gtype: GeometryType,
    pub has_z: bool,
    pub has_m: bool,
    pub has_srid: bool,
}

pub(crate) fn decode_type_code(code: u32) -> Result<WkbTypeInfo> {
    let has_srid = code & EWKB_SRID_FLAG != 0;
    let mut has_z = code & EWKB_Z_FLAG != 0;
    let mut has_m = code & EWKB_M_FLAG != 0;
    let mut base = code & !(EWKB_Z_FLAG | EWKB_M_FLAG | EWKB_SRID_FLAG);
    if base >= 1000 {
        let dim = base / 1000;
        has_z |= matches!(dim, 1 | 3);
        has_m |= matches!(dim, 2 | 3);
        base %= 1000;
    }
    let Some(gtype) = GeometryType::from_u32(base) else {
        return Err(GeobinError::UnsupportedType(code.to_string()));
    };
    Ok(WkbTypeInfo {
        gtype,
        has_z,
        has_m,
        has_srid,
    })
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Hex-encode a WKB buffer: every byte becomes two ASCII characters, so
/// the output is exactly twice the binary size.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    out
}

/// Inverse of [`to_hex`]; accepts both cases.
pub(crate) fn from_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(GeobinError::GeometryFormat(
            "odd-length hex input".to_string(),
        ));
    }
    let nibble = |c: u8| -> Result<u8> {
        match c {
            b'0'..=b'9' => Ok(c - b'0'),
            b'A'..=b'F' => Ok(c - b'A' + 10),
            b'a'..=b'f' => Ok(c - b'a' + 10),
            _ => Err(GeobinError::GeometryFormat(format!(
                "invalid hex character `{}`",
                c as char
            ))),
        }
    };
    s.as_bytes()
        .chunks_exact(2)
        .map(|pair| Ok((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iso_offsets_and_extended_bits() {
        use GeometryType::Point;
        assert_eq!(type_code(Point, false, false, WkbDialect::SfSql, false), 1);
        // SFSQL never marks dimensions
        assert_eq!(type_code(Point, true, true, WkbDialect::SfSql, false), 1);
        assert_eq!(type_code(Point, true, false, WkbDialect::Iso, false), 1001);
        assert_eq!(type_code(Point, false, true, WkbDialect::Iso, false), 2001);
        assert_eq!(type_code(Point, true, true, WkbDialect::Iso, false), 3001);
        assert_eq!(
            type_code(Point, true, false, WkbDialect::Extended, true),
            0x8000_0000 | 0x2000_0000 | 1
        );
    }

    #[test]
    fn nurbs_always_iso_dims() {
        use GeometryType::NurbsCurve;
        for dialect in [WkbDialect::SfSql, WkbDialect::Iso, WkbDialect::Extended] {
            assert_eq!(type_code(NurbsCurve, true, false, dialect, false), 1018);
        }
        let code = type_code(NurbsCurve, true, true, WkbDialect::Extended, true);
        let info = decode_type_code(code).unwrap();
        assert_eq!(info.gtype, NurbsCurve);
        assert!(info.has_z && info.has_m && info.has_srid);
    }

    #[test]
    fn decode_both_dim_conventions() {
        let info = decode_type_code(1002).unwrap();
        assert_eq!(info.gtype, GeometryType::LineString);
        assert!(info.has_z && !info.has_m && !info.has_srid);
        let info = decode_type_code(0x4000_0002).unwrap();
        assert_eq!(info.gtype, GeometryType::LineString);
        assert!(!info.has_z && info.has_m);
        assert!(decode_type_code(99).is_err());
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0x01, 0xAB, 0x00, 0xFF];
        let s = to_hex(&bytes);
        assert_eq!(s, "01AB00FF");
        assert_eq!(from_hex(&s).unwrap(), bytes);
        assert_eq!(from_hex("01ab00ff").unwrap(), bytes);
        assert!(from_hex("01A").is_err());
        assert!(from_hex("0G").is_err());
    }
}
