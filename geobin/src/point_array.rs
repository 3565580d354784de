//! Contiguous coordinate storage.

use crate::error::{GeobinError, Result};

/// A coordinate with all four possible ordinates. Absent dimensions read
/// as 0.0.
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    pub fn xyzm(x: f64, y: f64, z: f64, m: f64) -> Self {
        Self { x, y, z, m }
    }
}

/// Coordinate bytes are either owned by the array or borrowed from a
/// serialized record (native-order doubles). A borrowed array must not
/// outlive its buffer; [`PointArray::into_owned`] breaks the tie.
#[derive(Clone, Debug)]
enum Coords<'a> {
    Owned(Vec<f64>),
    Borrowed(&'a [u8]),
}

/// Ordered coordinate sequence with fixed dimensionality.
#[derive(Clone, Debug)]
pub struct PointArray<'a> {
    npoints: u32,
    has_z: bool,
    has_m: bool,
    coords: Coords<'a>,
}

impl<'a> PointArray<'a> {
    /// New empty array with room for `capacity` points.
    pub fn with_capacity(has_z: bool, has_m: bool, capacity: usize) -> PointArray<'static> {
        PointArray {
            npoints: 0,
            has_z,
            has_m,
            coords: Coords::Owned(Vec::with_capacity(
                capacity * (2 + usize::from(has_z) + usize::from(has_m)),
            )),
        }
    }

    pub fn empty(has_z: bool, has_m: bool) -> PointArray<'static> {
        Self::with_capacity(has_z, has_m, 0)
    }

    /// Build from a flat ordinate vector (x,y[,z][,m] per point).
    pub fn from_coords(has_z: bool, has_m: bool, values: Vec<f64>) -> Result<PointArray<'static>> {
        let dims = 2 + usize::from(has_z) + usize::from(has_m);
        if values.len() % dims != 0 {
            return Err(GeobinError::GeometryFormat(format!(
                "{} ordinates do not fill {dims}-dimensional points",
                values.len()
            )));
        }
        Ok(PointArray {
            npoints: (values.len() / dims) as u32,
            has_z,
            has_m,
            coords: Coords::Owned(values),
        })
    }

    /// Borrow `npoints` coordinates from native-order bytes, e.g. the
    /// payload of a serialized record.
    pub fn from_bytes(
        has_z: bool,
        has_m: bool,
        npoints: u32,
        bytes: &'a [u8],
    ) -> Result<PointArray<'a>> {
        let dims = 2 + usize::from(has_z) + usize::from(has_m);
        let want = npoints as usize * dims * 8;
        if bytes.len() != want {
            return Err(GeobinError::Truncated(bytes.len().min(want)));
        }
        Ok(PointArray {
            npoints,
            has_z,
            has_m,
            coords: Coords::Borrowed(bytes),
        })
    }

    pub fn npoints(&self) -> u32 {
        self.npoints
    }

    pub fn is_empty(&self) -> bool {
        self.npoints == 0
    }

    pub fn has_z(&self) -> bool {
        self.has_z
    }

    pub fn has_m(&self) -> bool {
        self.has_m
    }

    /// Ordinates per point (2–4).
    pub fn dims(&self) -> usize {
        2 + usize::from(self.has_z) + usize::from(self.has_m)
    }

    /// Bytes per point.
    pub fn point_size(&self) -> usize {
        self.dims() * 8
    }

    fn ordinate(&self, flat_idx: usize) -> f64 {
        match &self.coords {
            Coords::Owned(v) => v[flat_idx],
            Coords::Borrowed(b) => {
                let at = flat_idx * 8;
                f64::from_ne_bytes(b[at..at + 8].try_into().expect("8-byte slice"))
            }
        }
    }

    /// Coordinate `i` as a 4D point; absent ordinates are zeroed.
    pub fn point(&self, i: u32) -> Option<Coord> {
        if i >= self.npoints {
            return None;
        }
        let base = i as usize * self.dims();
        let mut at = base;
        let x = self.ordinate(at);
        at += 1;
        let y = self.ordinate(at);
        at += 1;
        let z = if self.has_z {
            let z = self.ordinate(at);
            at += 1;
            z
        } else {
            0.0
        };
        let m = if self.has_m { self.ordinate(at) } else { 0.0 };
        Some(Coord { x, y, z, m })
    }

    /// Iterate all coordinates in order.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.npoints).map(|i| self.point(i).expect("index in range"))
    }

    /// Append a coordinate. A borrowed view is promoted to owned storage
    /// first; serialized buffers are never written through.
    pub fn push(&mut self, c: Coord) {
        let (has_z, has_m) = (self.has_z, self.has_m);
        let v = self.owned_mut();
        v.push(c.x);
        v.push(c.y);
        if has_z {
            v.push(c.z);
        }
        if has_m {
            v.push(c.m);
        }
        self.npoints += 1;
    }

    /// Bulk-append every coordinate of `other`. Dimensionalities must
    /// match exactly.
    pub fn append_from(&mut self, other: &PointArray<'_>) -> Result<()> {
        if self.has_z != other.has_z || self.has_m != other.has_m {
            return Err(GeobinError::DimensionMismatch("point array"));
        }
        match &other.coords {
            Coords::Owned(src) => {
                self.owned_mut().extend_from_slice(src);
            }
            Coords::Borrowed(bytes) => {
                let v = self.owned_mut();
                v.reserve(bytes.len() / 8);
                for chunk in bytes.chunks_exact(8) {
                    v.push(f64::from_ne_bytes(chunk.try_into().expect("8-byte chunk")));
                }
            }
        }
        self.npoints += other.npoints;
        Ok(())
    }

    fn owned_mut(&mut self) -> &mut Vec<f64> {
        let borrowed = match &self.coords {
            Coords::Borrowed(b) => Some(*b),
            Coords::Owned(_) => None,
        };
        if let Some(bytes) = borrowed {
            let mut v = Vec::with_capacity(bytes.len() / 8);
            for chunk in bytes.chunks_exact(8) {
                v.push(f64::from_ne_bytes(chunk.try_into().expect("8-byte chunk")));
            }
            self.coords = Coords::Owned(v);
        }
        match &mut self.coords {
            Coords::Owned(v) => v,
            Coords::Borrowed(_) => unreachable!(),
        }
    }

    /// Deep-copy any borrowed bytes, detaching from the source buffer.
    pub fn into_owned(mut self) -> PointArray<'static> {
        self.owned_mut();
        let Coords::Owned(v) = self.coords else {
            unreachable!()
        };
        PointArray {
            npoints: self.npoints,
            has_z: self.has_z,
            has_m: self.has_m,
            coords: Coords::Owned(v),
        }
    }

    /// Serialized size of the coordinate block in bytes.
    pub fn byte_len(&self) -> usize {
        self.npoints as usize * self.point_size()
    }

    /// Append the coordinate block to `out` as native-order doubles.
    pub(crate) fn write_native(&self, out: &mut Vec<u8>) {
        match &self.coords {
            Coords::Borrowed(bytes) => out.extend_from_slice(bytes),
            Coords::Owned(v) => {
                for d in v {
                    out.extend_from_slice(&d.to_ne_bytes());
                }
            }
        }
    }

    /// Raw native-order bytes when the block already lives in a buffer.
    /// Used for wholesale copies; owned blocks are written per double.
    pub(crate) fn native_bytes(&self) -> Option<&[u8]> {
        match &self.coords {
            Coords::Borrowed(bytes) => Some(bytes),
            Coords::Owned(_) => None,
        }
    }
}

/// Value equality, regardless of owned or borrowed storage.
impl PartialEq for PointArray<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.npoints == other.npoints
            && self.has_z == other.has_z
            && self.has_m == other.has_m
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn absent_dims_read_zero() {
        let pa = PointArray::from_coords(false, false, vec![1.0, 2.0]).unwrap();
        assert_eq!(pa.point(0), Some(Coord::xy(1.0, 2.0)));
        assert_eq!(pa.point(0).unwrap().z, 0.0);
        assert_eq!(pa.point(1), None);
    }

    #[test]
    fn borrowed_equals_owned() {
        let mut bytes = Vec::new();
        for d in [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&d.to_ne_bytes());
        }
        let by_ref = PointArray::from_bytes(true, false, 2, &bytes).unwrap();
        let owned = PointArray::from_coords(true, false, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(by_ref, owned);
        assert_eq!(by_ref.clone().into_owned(), owned);
    }

    #[test]
    fn ragged_coords_rejected() {
        assert!(PointArray::from_coords(false, false, vec![1.0, 2.0, 3.0]).is_err());
        assert!(PointArray::from_bytes(false, false, 2, &[0u8; 24]).is_err());
    }

    #[test]
    fn bulk_append_checks_dims() {
        let mut dst = PointArray::empty(true, false);
        let src2d = PointArray::from_coords(false, false, vec![1.0, 2.0]).unwrap();
        assert!(dst.append_from(&src2d).is_err());
        let src3d = PointArray::from_coords(true, false, vec![1.0, 2.0, 3.0]).unwrap();
        dst.append_from(&src3d).unwrap();
        assert_eq!(dst.npoints(), 1);
        assert_eq!(dst.point(0), Some(Coord::xyz(1.0, 2.0, 3.0)));
    }

    #[test]
    fn push_promotes_borrowed() {
        let bytes: Vec<u8> = [1.0f64, 2.0]
            .iter()
            .flat_map(|d| d.to_ne_bytes())
            .collect();
        let mut pa = PointArray::from_bytes(false, false, 1, &bytes).unwrap();
        pa.push(Coord::xy(3.0, 4.0));
        assert_eq!(pa.npoints(), 2);
        assert_eq!(pa.point(1), Some(Coord::xy(3.0, 4.0)));
    }
}
