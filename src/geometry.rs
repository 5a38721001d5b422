//! Geometry module: projection and buffering hooks used by the compilers.

use crate::types::{shape_to_wkt, DistanceUnit, Rect, Shape};

/// Geometry and projection capability.
///
/// CRS arguments are the raw `srsName`/layer projection strings. Every
/// method returns `None` when the transformation is not available, which
/// callers treat as "leave the input unchanged".
pub trait GeometryOps {
    fn reproject_shape(&self, shape: &Shape, from: &str, to: &str) -> Option<Shape>;
    fn reproject_rect(&self, rect: &Rect, from: &str, to: &str) -> Option<Rect>;

    fn buffer(&self, _shape: &Shape, _distance: f64) -> Option<Shape> {
        None
    }

    fn inches_per_unit(&self, unit: DistanceUnit) -> f64 {
        unit.inches_per_unit()
    }

    fn to_wkt(&self, shape: &Shape) -> String {
        shape_to_wkt(shape)
    }
}

/// Capability for deployments without a projection library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeometry;

impl GeometryOps for NoGeometry {
    fn reproject_shape(&self, _shape: &Shape, _from: &str, _to: &str) -> Option<Shape> {
        None
    }

    fn reproject_rect(&self, _rect: &Rect, _from: &str, _to: &str) -> Option<Rect> {
        None
    }
}

/// Copy of `shape` in `to`, or an unchanged copy when either CRS is unknown
/// or the capability cannot transform between them.
pub(crate) fn reprojected(ops: &dyn GeometryOps, shape: &Shape, from: Option<&str>, to: Option<&str>) -> Shape {
    match (from, to) {
        (Some(from), Some(to)) if !from.eq_ignore_ascii_case(to) => {
            ops.reproject_shape(shape, from, to).unwrap_or_else(|| shape.clone())
        }
        _ => shape.clone(),
    }
}

pub(crate) fn reprojected_rect(ops: &dyn GeometryOps, rect: &Rect, from: Option<&str>, to: Option<&str>) -> Rect {
    match (from, to) {
        (Some(from), Some(to)) if !from.eq_ignore_ascii_case(to) => {
            ops.reproject_rect(rect, from, to).unwrap_or(*rect)
        }
        _ => *rect,
    }
}
