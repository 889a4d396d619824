use bevy_math::{DVec3, Mat3, Mat4, Vec3};

use crate::{EPSILON, tolerance};

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStatus {
    Above,
    Below,
    Inside,
}

/// Plane in Hessian normal form: points `p` on the plane satisfy `normal.dot(p) == distance`.
/// The normal points out of the solid; the inside half-space is `normal.dot(p) <= distance`.
///
/// Construction and evaluation run in f64 so that the error stays at the f32
/// rounding of the stored fields, far from the origin too.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct BrushPlane {
    pub normal: Vec3,
    pub distance: f32,
}

impl BrushPlane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Plane through three points, oriented so that `(p1 - p0) x (p2 - p0)` is the normal.
    /// Returns None for collinear points.
    pub fn from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Option<Self> {
        let origin = p0.as_dvec3();
        let normal = (p1.as_dvec3() - origin).cross(p2.as_dvec3() - origin).normalize_or_zero();
        if normal.length_squared() < 0.5 {
            return None;
        }
        Some(Self::through(normal, origin))
    }

    /// Plane with `normal` through `point`. The distance is taken against the
    /// stored f32 normal so that `point` stays on the stored plane.
    pub(crate) fn through(normal: DVec3, point: DVec3) -> Self {
        let normal = normal.as_vec3();
        Self {
            normal,
            distance: normal.as_dvec3().dot(point) as f32,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (self.normal.as_dvec3().dot(point.as_dvec3()) - f64::from(self.distance)) as f32
    }

    /// Tolerance for classifying `point` against this plane.
    pub fn epsilon_at(&self, point: Vec3) -> f32 {
        tolerance(point.abs().max_element().max(self.distance.abs()))
    }

    pub fn point_status(&self, point: Vec3) -> PointStatus {
        let d = self.signed_distance(point);
        let epsilon = self.epsilon_at(point);
        if d > epsilon {
            PointStatus::Above
        } else if d < -epsilon {
            PointStatus::Below
        } else {
            PointStatus::Inside
        }
    }

    pub fn project_point(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_distance(point)
    }

    pub fn translated(&self, delta: Vec3) -> Self {
        Self {
            normal: self.normal,
            distance: (f64::from(self.distance) + self.normal.as_dvec3().dot(delta.as_dvec3())) as f32,
        }
    }

    /// Transforms the plane by an affine matrix, keeping the outward orientation
    /// for mirroring transforms.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        let point = transform.transform_point3(self.normal * self.distance);
        let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();
        let normal = (normal_matrix * self.normal).normalize_or_zero();
        Self::through(normal.as_dvec3(), point.as_dvec3())
    }

    /// Same plane within tolerance.
    pub fn is_equivalent(&self, other: &BrushPlane) -> bool {
        self.normal.dot(other.normal) > 1.0 - EPSILON
            && (self.distance - other.distance).abs() < tolerance(self.distance.abs().max(other.distance.abs()))
    }
}

/// Solve the intersection of three planes. Returns None if degenerate.
pub fn plane_triple_intersection(p1: &BrushPlane, p2: &BrushPlane, p3: &BrushPlane) -> Option<Vec3> {
    let n1 = p1.normal.as_dvec3();
    let n2 = p2.normal.as_dvec3();
    let n3 = p3.normal.as_dvec3();

    let det = n1.dot(n2.cross(n3));
    if det.abs() < f64::from(EPSILON) {
        return None;
    }

    let point = (n2.cross(n3) * f64::from(p1.distance)
        + n3.cross(n1) * f64::from(p2.distance)
        + n1.cross(n2) * f64::from(p3.distance))
        / det;
    Some(point.as_vec3())
}

/// Check if a point is inside (or on the boundary of) all half-spaces.
pub fn point_inside_all_planes<'a>(point: Vec3, planes: impl IntoIterator<Item = &'a BrushPlane>) -> bool {
    planes
        .into_iter()
        .all(|plane| plane.point_status(point) != PointStatus::Above)
}
