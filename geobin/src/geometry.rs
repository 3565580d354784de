//! The in-memory geometry tree.

use crate::bbox::BoundingBox;
use crate::error::{GeobinError, Result};
use crate::flags::GeomFlags;
use crate::nurbs::NurbsCurve;
use crate::point_array::PointArray;

/// Numeric geometry type codes, shared by the GS2 payload grammar and the
/// WKB dialects (OGC 06-103r4 numbering; NURBS curves use a reserved
/// extension code).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u32)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
    CircularString = 8,
    CompoundCurve = 9,
    CurvePolygon = 10,
    MultiCurve = 11,
    MultiSurface = 12,
    PolyhedralSurface = 15,
    Tin = 16,
    Triangle = 17,
    NurbsCurve = 18,
}

impl GeometryType {
    pub fn from_u32(value: u32) -> Option<Self> {
        use GeometryType::*;
        Some(match value {
            1 => Point,
            2 => LineString,
            3 => Polygon,
            4 => MultiPoint,
            5 => MultiLineString,
            6 => MultiPolygon,
            7 => GeometryCollection,
            8 => CircularString,
            9 => CompoundCurve,
            10 => CurvePolygon,
            11 => MultiCurve,
            12 => MultiSurface,
            15 => PolyhedralSurface,
            16 => Tin,
            17 => Triangle,
            18 => NurbsCurve,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use GeometryType::*;
        match self {
            Point => "Point",
            LineString => "LineString",
            Polygon => "Polygon",
            MultiPoint => "MultiPoint",
            MultiLineString => "MultiLineString",
            MultiPolygon => "MultiPolygon",
            GeometryCollection => "GeometryCollection",
            CircularString => "CircularString",
            CompoundCurve => "CompoundCurve",
            CurvePolygon => "CurvePolygon",
            MultiCurve => "MultiCurve",
            MultiSurface => "MultiSurface",
            PolyhedralSurface => "PolyhedralSurface",
            Tin => "TIN",
            Triangle => "Triangle",
            NurbsCurve => "NurbsCurve",
        }
    }
}

/// Geometry types that contain other geometries.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum CollectionType {
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    MultiCurve,
    MultiSurface,
    CompoundCurve,
    CurvePolygon,
    GeometryCollection,
    PolyhedralSurface,
    Tin,
}

impl CollectionType {
    pub fn geometry_type(self) -> GeometryType {
        use CollectionType::*;
        match self {
            MultiPoint => GeometryType::MultiPoint,
            MultiLineString => GeometryType::MultiLineString,
            MultiPolygon => GeometryType::MultiPolygon,
            MultiCurve => GeometryType::MultiCurve,
            MultiSurface => GeometryType::MultiSurface,
            CompoundCurve => GeometryType::CompoundCurve,
            CurvePolygon => GeometryType::CurvePolygon,
            GeometryCollection => GeometryType::GeometryCollection,
            PolyhedralSurface => GeometryType::PolyhedralSurface,
            Tin => GeometryType::Tin,
        }
    }

    pub fn from_geometry_type(t: GeometryType) -> Option<Self> {
        use CollectionType::*;
        Some(match t {
            GeometryType::MultiPoint => MultiPoint,
            GeometryType::MultiLineString => MultiLineString,
            GeometryType::MultiPolygon => MultiPolygon,
            GeometryType::MultiCurve => MultiCurve,
            GeometryType::MultiSurface => MultiSurface,
            GeometryType::CompoundCurve => CompoundCurve,
            GeometryType::CurvePolygon => CurvePolygon,
            GeometryType::GeometryCollection => GeometryCollection,
            GeometryType::PolyhedralSurface => PolyhedralSurface,
            GeometryType::Tin => Tin,
            _ => return None,
        })
    }

    /// Child types this container admits.
    pub fn allows(self, child: GeometryType) -> bool {
        use GeometryType::*;
        match self {
            CollectionType::MultiPoint => child == Point,
            CollectionType::MultiLineString => child == LineString,
            CollectionType::MultiPolygon => matches!(child, Polygon | Triangle),
            CollectionType::MultiCurve | CollectionType::CurvePolygon => {
                matches!(child, LineString | CircularString | CompoundCurve)
            }
            CollectionType::MultiSurface => matches!(child, Polygon | CurvePolygon),
            CollectionType::CompoundCurve => matches!(child, LineString | CircularString),
            CollectionType::PolyhedralSurface => child == Polygon,
            CollectionType::Tin => child == Triangle,
            CollectionType::GeometryCollection => true,
        }
    }
}

/// Variant payloads of a geometry node.
#[derive(PartialEq, Clone, Debug)]
pub enum GeometryKind<'a> {
    /// 0 or 1 coordinate
    Point(PointArray<'a>),
    LineString(PointArray<'a>),
    CircularString(PointArray<'a>),
    /// Exactly one closed ring (first coordinate = last)
    Triangle(PointArray<'a>),
    /// Ring 0 is the outer ring
    Polygon(Vec<PointArray<'a>>),
    Nurbs(NurbsCurve<'a>),
    Collection(CollectionType, Vec<Geometry<'a>>),
}

/// A geometry node: SRID, flags, an optional cached bounding box and the
/// variant payload. Trees decoded by reference borrow coordinate bytes
/// from the source buffer; [`Geometry::into_owned`] detaches them.
#[derive(PartialEq, Clone, Debug)]
pub struct Geometry<'a> {
    pub srid: Option<i32>,
    pub flags: GeomFlags,
    pub bbox: Option<BoundingBox>,
    pub kind: GeometryKind<'a>,
}

impl<'a> Geometry<'a> {
    fn from_array(kind: fn(PointArray<'a>) -> GeometryKind<'a>, pa: PointArray<'a>) -> Self {
        let flags = GeomFlags {
            z: pa.has_z(),
            m: pa.has_m(),
            ..GeomFlags::default()
        };
        Geometry {
            srid: None,
            flags,
            bbox: None,
            kind: kind(pa),
        }
    }

    /// Point from an array of 0 or 1 coordinates.
    pub fn point(pa: PointArray<'a>) -> Result<Self> {
        if pa.npoints() > 1 {
            return Err(GeobinError::GeometryFormat(format!(
                "point with {} coordinates",
                pa.npoints()
            )));
        }
        Ok(Self::from_array(GeometryKind::Point, pa))
    }

    pub fn line_string(pa: PointArray<'a>) -> Self {
        Self::from_array(GeometryKind::LineString, pa)
    }

    pub fn circular_string(pa: PointArray<'a>) -> Self {
        Self::from_array(GeometryKind::CircularString, pa)
    }

    /// Triangle from its single closed ring.
    pub fn triangle(ring: PointArray<'a>) -> Result<Self> {
        if !ring.is_empty() {
            let first = ring.point(0).expect("non-empty ring");
            let last = ring.point(ring.npoints() - 1).expect("non-empty ring");
            if first != last {
                return Err(GeobinError::GeometryFormat(
                    "triangle ring is not closed".into(),
                ));
            }
        }
        Ok(Self::from_array(GeometryKind::Triangle, ring))
    }

    pub fn polygon(rings: Vec<PointArray<'a>>) -> Result<Self> {
        let (mut z, mut m) = (false, false);
        if let Some(outer) = rings.first() {
            z = outer.has_z();
            m = outer.has_m();
        }
        for ring in &rings {
            if ring.has_z() != z || ring.has_m() != m {
                return Err(GeobinError::DimensionMismatch("polygon ring"));
            }
        }
        Ok(Geometry {
            srid: None,
            flags: GeomFlags {
                z,
                m,
                ..GeomFlags::default()
            },
            bbox: None,
            kind: GeometryKind::Polygon(rings),
        })
    }

    /// Collection of `ctype` from fully built children. Child types must
    /// be admissible and dimensionalities must agree.
    pub fn collection(ctype: CollectionType, children: Vec<Geometry<'a>>) -> Result<Self> {
        let (mut z, mut m) = (false, false);
        if let Some(first) = children.first() {
            z = first.flags.z;
            m = first.flags.m;
        }
        for child in &children {
            if !ctype.allows(child.geometry_type()) {
                return Err(GeobinError::ChildType {
                    parent: ctype.geometry_type().name(),
                    child: child.geometry_type().name(),
                });
            }
            if child.flags.z != z || child.flags.m != m {
                return Err(GeobinError::DimensionMismatch("collection member"));
            }
        }
        Ok(Geometry {
            srid: None,
            flags: GeomFlags {
                z,
                m,
                ..GeomFlags::default()
            },
            bbox: None,
            kind: GeometryKind::Collection(ctype, children),
        })
    }

    /// NURBS curve geometry. Points are moved in; weights and knots are
    /// validated against the control-point count (see [`NurbsCurve::new`]).
    pub fn nurbs(
        srid: Option<i32>,
        bbox: Option<BoundingBox>,
        degree: u32,
        points: PointArray<'a>,
        weights: Option<Vec<f64>>,
        knots: Option<Vec<f64>>,
    ) -> Result<Self> {
        let flags = GeomFlags {
            z: points.has_z(),
            m: points.has_m(),
            ..GeomFlags::default()
        };
        let curve = NurbsCurve::new(degree, points, weights, knots)?;
        Ok(Geometry {
            srid,
            flags,
            bbox,
            kind: GeometryKind::Nurbs(curve),
        })
    }

    pub fn with_srid(mut self, srid: Option<i32>) -> Self {
        self.set_srid(srid);
        self
    }

    /// Set the SRID of this node and every child.
    pub fn set_srid(&mut self, srid: Option<i32>) {
        self.srid = srid;
        if let GeometryKind::Collection(_, children) = &mut self.kind {
            for child in children {
                child.set_srid(srid);
            }
        }
    }

    pub fn geometry_type(&self) -> GeometryType {
        match &self.kind {
            GeometryKind::Point(_) => GeometryType::Point,
            GeometryKind::LineString(_) => GeometryType::LineString,
            GeometryKind::CircularString(_) => GeometryType::CircularString,
            GeometryKind::Triangle(_) => GeometryType::Triangle,
            GeometryKind::Polygon(_) => GeometryType::Polygon,
            GeometryKind::Nurbs(_) => GeometryType::NurbsCurve,
            GeometryKind::Collection(ctype, _) => ctype.geometry_type(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.geometry_type().name()
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            GeometryKind::Point(pa)
            | GeometryKind::LineString(pa)
            | GeometryKind::CircularString(pa)
            | GeometryKind::Triangle(pa) => pa.is_empty(),
            GeometryKind::Polygon(rings) => rings.iter().all(PointArray::is_empty),
            GeometryKind::Nurbs(curve) => curve.points().is_empty(),
            GeometryKind::Collection(_, children) => children.iter().all(Geometry::is_empty),
        }
    }

    /// Total number of coordinates in the tree.
    pub fn num_points(&self) -> u64 {
        match &self.kind {
            GeometryKind::Point(pa)
            | GeometryKind::LineString(pa)
            | GeometryKind::CircularString(pa)
            | GeometryKind::Triangle(pa) => u64::from(pa.npoints()),
            GeometryKind::Polygon(rings) => {
                rings.iter().map(|r| u64::from(r.npoints())).sum()
            }
            GeometryKind::Nurbs(curve) => u64::from(curve.points().npoints()),
            GeometryKind::Collection(_, children) => {
                children.iter().map(Geometry::num_points).sum()
            }
        }
    }

    /// Verify that the dimensionality flags of every coordinate block in
    /// the tree agree with the geometry flags. Encoders call this before
    /// touching a buffer.
    pub fn check_consistent(&self) -> Result<()> {
        let check_pa = |pa: &PointArray<'_>| -> Result<()> {
            if pa.has_z() != self.flags.z || pa.has_m() != self.flags.m {
                return Err(GeobinError::DimensionMismatch(self.type_name()));
            }
            Ok(())
        };
        match &self.kind {
            GeometryKind::Point(pa)
            | GeometryKind::LineString(pa)
            | GeometryKind::CircularString(pa)
            | GeometryKind::Triangle(pa) => check_pa(pa),
            GeometryKind::Polygon(rings) => rings.iter().try_for_each(check_pa),
            GeometryKind::Nurbs(curve) => check_pa(curve.points()),
            GeometryKind::Collection(ctype, children) => {
                for child in children {
                    if !ctype.allows(child.geometry_type()) {
                        return Err(GeobinError::ChildType {
                            parent: ctype.geometry_type().name(),
                            child: child.geometry_type().name(),
                        });
                    }
                    if child.flags.z != self.flags.z || child.flags.m != self.flags.m {
                        return Err(GeobinError::DimensionMismatch(child.type_name()));
                    }
                    child.check_consistent()?;
                }
                Ok(())
            }
        }
    }

    /// Compute the bounding box of the tree; `None` when empty.
    pub fn compute_bbox(&self) -> Option<BoundingBox> {
        let mut acc: Option<BoundingBox> = None;
        self.fold_arrays(&mut |pa| {
            for c in pa.iter() {
                match &mut acc {
                    None => acc = Some(BoundingBox::from_coord(c, self.flags)),
                    Some(bbox) => bbox.expand_to(c),
                }
            }
        });
        acc
    }

    fn fold_arrays(&self, f: &mut impl FnMut(&PointArray<'a>)) {
        match &self.kind {
            GeometryKind::Point(pa)
            | GeometryKind::LineString(pa)
            | GeometryKind::CircularString(pa)
            | GeometryKind::Triangle(pa) => f(pa),
            GeometryKind::Polygon(rings) => rings.iter().for_each(&mut *f),
            GeometryKind::Nurbs(curve) => f(curve.points()),
            GeometryKind::Collection(_, children) => {
                for child in children {
                    child.fold_arrays(f);
                }
            }
        }
    }

    /// Cache the computed bounding box on this node (no-op when empty).
    pub fn ensure_bbox(&mut self) {
        if self.bbox.is_none() {
            self.bbox = self.compute_bbox();
        }
    }

    pub fn drop_bbox(&mut self) {
        self.bbox = None;
    }

    /// Deep-copy every borrowed buffer, yielding a tree independent of
    /// any serialized source.
    pub fn into_owned(self) -> Geometry<'static> {
        let kind = match self.kind {
            GeometryKind::Point(pa) => GeometryKind::Point(pa.into_owned()),
            GeometryKind::LineString(pa) => GeometryKind::LineString(pa.into_owned()),
            GeometryKind::CircularString(pa) => GeometryKind::CircularString(pa.into_owned()),
            GeometryKind::Triangle(pa) => GeometryKind::Triangle(pa.into_owned()),
            GeometryKind::Polygon(rings) => {
                GeometryKind::Polygon(rings.into_iter().map(PointArray::into_owned).collect())
            }
            GeometryKind::Nurbs(curve) => GeometryKind::Nurbs(curve.into_owned()),
            GeometryKind::Collection(ctype, children) => GeometryKind::Collection(
                ctype,
                children.into_iter().map(Geometry::into_owned).collect(),
            ),
        };
        Geometry {
            srid: self.srid,
            flags: self.flags,
            bbox: self.bbox,
            kind,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::point_array::Coord;

    fn pa(coords: &[(f64, f64)]) -> PointArray<'static> {
        let flat: Vec<f64> = coords.iter().flat_map(|&(x, y)| [x, y]).collect();
        PointArray::from_coords(false, false, flat).unwrap()
    }

    #[test]
    fn admissibility() {
        let pt = Geometry::point(pa(&[(1.0, 2.0)])).unwrap();
        let line = Geometry::line_string(pa(&[(0.0, 0.0), (1.0, 1.0)]));
        assert!(Geometry::collection(CollectionType::MultiPoint, vec![pt.clone()]).is_ok());
        let err = Geometry::collection(CollectionType::MultiPoint, vec![line.clone()]);
        assert!(matches!(
            err,
            Err(GeobinError::ChildType {
                parent: "MultiPoint",
                child: "LineString"
            })
        ));
        assert!(
            Geometry::collection(CollectionType::GeometryCollection, vec![pt, line]).is_ok()
        );
    }

    #[test]
    fn triangle_must_close() {
        let open = pa(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(Geometry::triangle(open).is_err());
        let closed = pa(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
        assert!(Geometry::triangle(closed).is_ok());
    }

    #[test]
    fn srid_propagates_to_children() {
        let children = vec![
            Geometry::line_string(pa(&[(0.0, 0.0), (1.0, 1.0)])),
            Geometry::line_string(pa(&[(2.0, 2.0), (3.0, 3.0)])),
        ];
        let mut mls = Geometry::collection(CollectionType::MultiLineString, children).unwrap();
        mls.set_srid(Some(4326));
        let GeometryKind::Collection(_, children) = &mls.kind else {
            unreachable!()
        };
        assert!(children.iter().all(|c| c.srid == Some(4326)));
    }

    #[test]
    fn emptiness_and_counts() {
        let empty_pt = Geometry::point(PointArray::empty(false, false)).unwrap();
        assert!(empty_pt.is_empty());
        let line = Geometry::line_string(pa(&[(0.0, 0.0), (1.0, 1.0)]));
        assert!(!line.is_empty());
        let gc = Geometry::collection(
            CollectionType::GeometryCollection,
            vec![empty_pt, line],
        )
        .unwrap();
        assert!(!gc.is_empty());
        assert_eq!(gc.num_points(), 2);
    }

    #[test]
    fn consistency_check_fails_loudly() {
        let mut geom = Geometry::line_string(pa(&[(0.0, 0.0), (1.0, 1.0)]));
        geom.flags.z = true; // flags now lie about the coordinate block
        assert!(matches!(
            geom.check_consistent(),
            Err(GeobinError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn bbox_covers_tree() {
        let mut geom = Geometry::line_string(pa(&[(0.0, 0.0), (10.0, 5.0)]));
        geom.ensure_bbox();
        let bbox = geom.bbox.unwrap();
        assert_eq!((bbox.xmin, bbox.xmax, bbox.ymin, bbox.ymax), (0.0, 10.0, 0.0, 5.0));
        assert!(bbox.contains_coord(Coord::xy(5.0, 2.5)));
    }
}
