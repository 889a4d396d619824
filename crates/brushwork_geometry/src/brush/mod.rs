//! Convex brushes: a polyhedron plus one [`BrushFace`] per polyhedron face.
//!
//! Every mutator builds a complete candidate brush first and only replaces
//! `self` once the candidate is known to be valid, so a failed edit never
//! leaves a partially modified brush behind. The `can_*` pre-checks run the
//! same candidate construction and discard the result.

mod boundary;
mod vertices;

use bevy_math::Vec3;

use crate::polyhedron::{FaceId, Polyhedron};
use crate::{
    BBox3, BrushError, BrushFace, BrushFaceAttributes, BrushPlane, EPSILON, PointStatus, Polygon3, Segment3,
    TexCoordSystemKind, plane_triple_intersection, point_inside_all_planes, tolerance,
};

/// Tolerance for binding an input face to a polyhedron face.
const FACE_MATCH_TOLERANCE: f32 = 1e-2;

#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    polyhedron: Polyhedron,
    /// Index-aligned with the polyhedron faces.
    faces: Vec<BrushFace>,
}

impl Brush {
    /// Intersect the half-spaces of `faces`. Faces that do not contribute a
    /// polygon to the solid are dropped.
    pub fn from_faces(world_bounds: &BBox3, faces: Vec<BrushFace>) -> Result<Self, BrushError> {
        if faces.is_empty() {
            return Err(BrushError::EmptyInput);
        }
        if faces.len() < 4 {
            return Err(BrushError::Degenerate);
        }

        let planes: Vec<BrushPlane> = faces.iter().map(|f| *f.plane()).collect();
        let mut points: Vec<Vec3> = Vec::new();
        for i in 0..planes.len() {
            for j in (i + 1)..planes.len() {
                for k in (j + 1)..planes.len() {
                    let Some(point) = plane_triple_intersection(&planes[i], &planes[j], &planes[k]) else {
                        continue;
                    };
                    let epsilon = tolerance(point.abs().max_element());
                    if point_inside_all_planes(point, &planes) && points.iter().all(|p| p.distance(point) >= epsilon) {
                        points.push(point);
                    }
                }
            }
        }

        let polyhedron = Polyhedron::from_points(&points)?;
        if !world_bounds.contains(&polyhedron.bounds()) {
            return Err(BrushError::OutOfWorldBounds);
        }

        let mut bound = Vec::with_capacity(polyhedron.face_count());
        for f in 0..polyhedron.face_count() as FaceId {
            let normal = polyhedron.face_plane(f).normal;
            let positions = polyhedron.face_positions(f);
            let best = faces
                .iter()
                .filter(|face| {
                    positions.iter().all(|p| {
                        let plane = face.plane();
                        plane.signed_distance(*p).abs() <= FACE_MATCH_TOLERANCE + plane.epsilon_at(*p)
                    })
                })
                .max_by(|a, b| a.normal().dot(normal).total_cmp(&b.normal().dot(normal)))
                .ok_or(BrushError::Degenerate)?;
            bound.push(best.clone());
        }

        Ok(Self {
            polyhedron,
            faces: bound,
        })
    }

    /// Brush from an existing polyhedron, giving every face the same attributes.
    pub fn from_polyhedron(
        world_bounds: &BBox3,
        polyhedron: Polyhedron,
        attributes: &BrushFaceAttributes,
        kind: TexCoordSystemKind,
    ) -> Result<Self, BrushError> {
        if !world_bounds.contains(&polyhedron.bounds()) {
            return Err(BrushError::OutOfWorldBounds);
        }
        let faces = (0..polyhedron.face_count() as FaceId)
            .map(|f| {
                let points = polygon_points(&polyhedron.face_positions(f));
                BrushFace::with_kind(points, attributes.clone(), kind)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { polyhedron, faces })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn polyhedron(&self) -> &Polyhedron {
        &self.polyhedron
    }

    pub fn faces(&self) -> &[BrushFace] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> Option<&BrushFace> {
        self.faces.get(index)
    }

    /// Mutable access for attribute edits. Geometry of a face can only be
    /// changed through the brush.
    pub fn face_mut(&mut self, index: usize) -> Option<&mut BrushFace> {
        self.faces.get_mut(index)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.polyhedron.vertex_count()
    }

    pub fn edge_count(&self) -> usize {
        self.polyhedron.edge_count()
    }

    pub fn bounds(&self) -> BBox3 {
        self.polyhedron.bounds()
    }

    pub fn vertex_positions(&self) -> Vec<Vec3> {
        self.polyhedron.vertex_positions()
    }

    pub fn edges(&self) -> Vec<Segment3> {
        self.polyhedron.edge_segments()
    }

    pub fn face_polygons(&self) -> Vec<Polygon3> {
        self.polyhedron.face_polygons()
    }

    /// Vertex positions of a face in winding order.
    pub fn face_positions(&self, index: usize) -> Vec<Vec3> {
        self.polyhedron.face_positions(index as FaceId)
    }

    pub fn face_polygon(&self, index: usize) -> Polygon3 {
        self.polyhedron.face_polygon(index as FaceId)
    }

    pub fn face_center(&self, index: usize) -> Vec3 {
        self.face_polygon(index).center()
    }

    pub fn has_vertex(&self, position: Vec3) -> bool {
        self.polyhedron.has_vertex(position)
    }

    pub fn has_edge(&self, edge: &Segment3) -> bool {
        self.polyhedron.has_edge(edge)
    }

    pub fn has_face(&self, polygon: &Polygon3) -> bool {
        self.polyhedron.has_face(polygon)
    }

    pub fn find_face(&self, polygon: &Polygon3) -> Option<usize> {
        self.polyhedron.find_face(polygon).map(|f| f as usize)
    }

    /// Face whose normal matches `normal` within tolerance.
    pub fn find_face_by_normal(&self, normal: Vec3) -> Option<usize> {
        self.faces
            .iter()
            .position(|f| f.normal().dot(normal) >= 1.0 - EPSILON)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.polyhedron.contains_point(point)
    }

    pub fn contains(&self, other: &Brush) -> bool {
        self.polyhedron.contains(&other.polyhedron)
    }

    pub fn intersects(&self, other: &Brush) -> bool {
        self.polyhedron.intersects(&other.polyhedron)
    }

    /// Whether every vertex has integer coordinates.
    pub fn has_integer_vertices(&self) -> bool {
        self.polyhedron
            .vertices()
            .iter()
            .all(|v| v.position == v.position.round())
    }

    // ------------------------------------------------------------------
    // Rebuilding
    // ------------------------------------------------------------------

    /// Build the brush spanned by `points`. `pre_images[i]` is where input point
    /// `i` was before the edit, or None for a point that did not exist.
    ///
    /// Every new face inherits the attributes and texture projection of the old
    /// face whose plane holds most of its pre-image vertices; ties go to the old
    /// face whose normal is closest.
    pub(crate) fn rebuild_from_points(
        &self,
        world_bounds: &BBox3,
        points: &[Vec3],
        pre_images: &[Option<Vec3>],
    ) -> Result<Brush, BrushError> {
        let polyhedron = Polyhedron::from_points(points)?;
        if !world_bounds.contains(&polyhedron.bounds()) {
            return Err(BrushError::OutOfWorldBounds);
        }

        let mut faces = Vec::with_capacity(polyhedron.face_count());
        for f in 0..polyhedron.face_count() as FaceId {
            let new_plane = polyhedron.face_plane(f);
            let originals: Vec<Vec3> = polyhedron
                .face_vertices(f)
                .into_iter()
                .filter_map(|v| {
                    polyhedron.vertices()[v as usize]
                        .payload
                        .and_then(|source| pre_images.get(source).copied().flatten())
                })
                .collect();

            let best = (0..self.faces.len())
                .map(|i| {
                    let old_plane = self.polyhedron.face_plane(i as FaceId);
                    let overlap = originals
                        .iter()
                        .filter(|p| old_plane.point_status(**p) == PointStatus::Inside)
                        .count();
                    (i, overlap as f32 + old_plane.normal.dot(new_plane.normal) * 0.1)
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
                .ok_or(BrushError::Degenerate)?;

            let mut face = self.faces[best].clone();
            face.set_points(polygon_points(&polyhedron.face_positions(f)))?;
            faces.push(face);
        }

        Ok(Brush { polyhedron, faces })
    }
}

/// Three points of a convex polygon spanning the largest triangle fan piece,
/// in winding order so they reproduce the outward normal.
pub(crate) fn polygon_points(positions: &[Vec3]) -> [Vec3; 3] {
    let p0 = positions[0];
    let mut best = (1, 2);
    let mut best_area = f32::NEG_INFINITY;
    for k in 1..positions.len().saturating_sub(1) {
        let area = (positions[k] - p0).cross(positions[k + 1] - p0).length_squared();
        if area > best_area {
            best_area = area;
            best = (k, k + 1);
        }
    }
    [p0, positions[best.0], positions[best.1]]
}
