//! Vertex, edge and face handle edits.
//!
//! The edited brush is always the convex hull of the edited vertex set. What
//! the checks here add is the rule that a moved vertex must not tunnel through
//! the part of the brush that stays put.

use bevy_math::Vec3;

use super::Brush;
use crate::polyhedron::Polyhedron;
use crate::{
    BBox3, BrushError, BrushPlane, PointStatus, Polygon3, Segment3, polygon_vertices, segment_vertices,
    sort_and_dedup_vec3,
};

impl Brush {
    // ------------------------------------------------------------------
    // Vertices
    // ------------------------------------------------------------------

    pub fn can_move_vertices(&self, world_bounds: &BBox3, positions: &[Vec3], delta: Vec3) -> bool {
        self.moved_vertices(world_bounds, positions, delta, true).is_ok()
    }

    /// Move vertices by `delta`. Returns the moved positions that are still
    /// vertices afterwards, sorted and deduplicated.
    pub fn move_vertices(
        &mut self,
        world_bounds: &BBox3,
        positions: &[Vec3],
        delta: Vec3,
    ) -> Result<Vec<Vec3>, BrushError> {
        let result = self.moved_vertices(world_bounds, positions, delta, true)?;
        *self = result;
        let mut new_positions: Vec<Vec3> = positions
            .iter()
            .map(|p| *p + delta)
            .filter(|p| self.has_vertex(*p))
            .collect();
        sort_and_dedup_vec3(&mut new_positions);
        Ok(new_positions)
    }

    pub fn can_add_vertex(&self, world_bounds: &BBox3, position: Vec3) -> bool {
        self.with_added_vertex(world_bounds, position).is_ok()
    }

    /// Add a vertex. Succeeds only if the point becomes a corner of the brush.
    pub fn add_vertex(&mut self, world_bounds: &BBox3, position: Vec3) -> Result<(), BrushError> {
        *self = self.with_added_vertex(world_bounds, position)?;
        Ok(())
    }

    pub fn can_remove_vertices(&self, world_bounds: &BBox3, positions: &[Vec3]) -> bool {
        self.without_vertices(world_bounds, positions).is_ok()
    }

    pub fn remove_vertices(&mut self, world_bounds: &BBox3, positions: &[Vec3]) -> Result<(), BrushError> {
        *self = self.without_vertices(world_bounds, positions)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    pub fn can_move_edges(&self, world_bounds: &BBox3, edges: &[Segment3], delta: Vec3) -> bool {
        self.moved_edges(world_bounds, edges, delta).is_ok()
    }

    /// Move edges by `delta`. Returns the moved edges, sorted.
    pub fn move_edges(
        &mut self,
        world_bounds: &BBox3,
        edges: &[Segment3],
        delta: Vec3,
    ) -> Result<Vec<Segment3>, BrushError> {
        *self = self.moved_edges(world_bounds, edges, delta)?;
        let mut new_edges: Vec<Segment3> = edges.iter().map(|e| e.translated(delta)).collect();
        new_edges.sort();
        new_edges.dedup();
        Ok(new_edges)
    }

    pub fn can_remove_edges(&self, world_bounds: &BBox3, edges: &[Segment3]) -> bool {
        edges.iter().all(|e| self.has_edge(e)) && self.can_remove_vertices(world_bounds, &segment_vertices(edges))
    }

    pub fn remove_edges(&mut self, world_bounds: &BBox3, edges: &[Segment3]) -> Result<(), BrushError> {
        if edges.iter().any(|e| !self.has_edge(e)) {
            return Err(BrushError::UnknownEdge);
        }
        self.remove_vertices(world_bounds, &segment_vertices(edges))
    }

    // ------------------------------------------------------------------
    // Faces
    // ------------------------------------------------------------------

    pub fn can_move_faces(&self, world_bounds: &BBox3, faces: &[Polygon3], delta: Vec3) -> bool {
        self.moved_faces(world_bounds, faces, delta).is_ok()
    }

    /// Move faces by `delta`. Returns the moved polygons, sorted.
    pub fn move_faces(
        &mut self,
        world_bounds: &BBox3,
        faces: &[Polygon3],
        delta: Vec3,
    ) -> Result<Vec<Polygon3>, BrushError> {
        *self = self.moved_faces(world_bounds, faces, delta)?;
        let mut new_faces: Vec<Polygon3> = faces.iter().map(|f| f.translated(delta)).collect();
        new_faces.sort();
        new_faces.dedup();
        Ok(new_faces)
    }

    pub fn can_remove_faces(&self, world_bounds: &BBox3, faces: &[Polygon3]) -> bool {
        faces.iter().all(|f| self.has_face(f)) && self.can_remove_vertices(world_bounds, &polygon_vertices(faces))
    }

    pub fn remove_faces(&mut self, world_bounds: &BBox3, faces: &[Polygon3]) -> Result<(), BrushError> {
        if faces.iter().any(|f| !self.has_face(f)) {
            return Err(BrushError::UnknownFace);
        }
        self.remove_vertices(world_bounds, &polygon_vertices(faces))
    }

    // ------------------------------------------------------------------
    // Candidates
    // ------------------------------------------------------------------

    fn moved_vertices(
        &self,
        world_bounds: &BBox3,
        positions: &[Vec3],
        delta: Vec3,
        allow_vertex_removal: bool,
    ) -> Result<Brush, BrushError> {
        if positions.is_empty() {
            return Err(BrushError::EmptyInput);
        }
        if delta == Vec3::ZERO {
            return Err(BrushError::ZeroDelta);
        }
        if positions.iter().any(|p| !self.has_vertex(*p)) {
            return Err(BrushError::UnknownVertex);
        }

        let mut moving = Vec::new();
        let mut remaining = Vec::new();
        let mut points = Vec::with_capacity(self.vertex_count());
        let mut pre_images = Vec::with_capacity(self.vertex_count());
        for position in self.vertex_positions() {
            if positions.contains(&position) {
                moving.push(position);
                points.push(position + delta);
            } else {
                remaining.push(position);
                points.push(position);
            }
            pre_images.push(Some(position));
        }

        if !world_bounds.contains(&BBox3::from_points(points.iter().copied())) {
            return Err(BrushError::OutOfWorldBounds);
        }
        let result = self.rebuild_from_points(world_bounds, &points, &pre_images)?;

        if !allow_vertex_removal && moving.iter().any(|p| !result.has_vertex(*p + delta)) {
            return Err(BrushError::VertexCollapse);
        }

        // A full translation cannot pass through anything
        if remaining.is_empty() {
            return Ok(result);
        }

        match Polyhedron::from_points(&remaining) {
            Ok(hull) => {
                if moving
                    .iter()
                    .any(|p| segment_passes_through(&hull, *p, *p + delta))
                {
                    return Err(BrushError::PassesThroughBrush);
                }
            }
            Err(_) => {
                if let Some(plane) = coplanar_plane(&remaining) {
                    let flips = moving.iter().any(|p| {
                        matches!(
                            (plane.point_status(*p), plane.point_status(*p + delta)),
                            (PointStatus::Above, PointStatus::Below) | (PointStatus::Below, PointStatus::Above)
                        )
                    });
                    if flips {
                        return Err(BrushError::PassesThroughBrush);
                    }
                }
            }
        }

        Ok(result)
    }

    fn moved_edges(&self, world_bounds: &BBox3, edges: &[Segment3], delta: Vec3) -> Result<Brush, BrushError> {
        if edges.is_empty() {
            return Err(BrushError::EmptyInput);
        }
        if edges.iter().any(|e| !self.has_edge(e)) {
            return Err(BrushError::UnknownEdge);
        }
        let result = self.moved_vertices(world_bounds, &segment_vertices(edges), delta, false)?;
        if edges.iter().any(|e| !result.has_edge(&e.translated(delta))) {
            return Err(BrushError::VertexCollapse);
        }
        Ok(result)
    }

    fn moved_faces(&self, world_bounds: &BBox3, faces: &[Polygon3], delta: Vec3) -> Result<Brush, BrushError> {
        if faces.is_empty() {
            return Err(BrushError::EmptyInput);
        }
        if faces.iter().any(|f| !self.has_face(f)) {
            return Err(BrushError::UnknownFace);
        }
        let result = self.moved_vertices(world_bounds, &polygon_vertices(faces), delta, false)?;
        if faces.iter().any(|f| !result.has_face(&f.translated(delta))) {
            return Err(BrushError::VertexCollapse);
        }
        Ok(result)
    }

    fn with_added_vertex(&self, world_bounds: &BBox3, position: Vec3) -> Result<Brush, BrushError> {
        if !world_bounds.contains_point(position) {
            return Err(BrushError::OutOfWorldBounds);
        }
        if self.has_vertex(position) {
            return Err(BrushError::VertexAlreadyPresent);
        }

        let mut points = self.vertex_positions();
        let mut pre_images: Vec<Option<Vec3>> = points.iter().copied().map(Some).collect();
        points.push(position);
        pre_images.push(None);

        let result = self.rebuild_from_points(world_bounds, &points, &pre_images)?;
        if !result.has_vertex(position) {
            return Err(BrushError::VertexCollapse);
        }
        Ok(result)
    }

    fn without_vertices(&self, world_bounds: &BBox3, positions: &[Vec3]) -> Result<Brush, BrushError> {
        if positions.is_empty() {
            return Err(BrushError::EmptyInput);
        }
        if positions.iter().any(|p| !self.has_vertex(*p)) {
            return Err(BrushError::UnknownVertex);
        }

        let points: Vec<Vec3> = self
            .vertex_positions()
            .into_iter()
            .filter(|p| !positions.contains(p))
            .collect();
        let pre_images: Vec<Option<Vec3>> = points.iter().copied().map(Some).collect();
        self.rebuild_from_points(world_bounds, &points, &pre_images)
    }
}

/// Whether the segment from `start` to `end` crosses the strict interior of `hull`.
fn segment_passes_through(hull: &Polyhedron, start: Vec3, end: Vec3) -> bool {
    let direction = end - start;
    let mut t_enter = 0.0f32;
    let mut t_exit = 1.0f32;
    for face in hull.faces() {
        // Inside the shrunken half-space: distance + t * denom < 0
        let distance = face.plane.signed_distance(start) + face.plane.epsilon_at(start);
        let denom = face.plane.normal.dot(direction);
        if denom.abs() <= f32::EPSILON {
            if distance >= 0.0 {
                return false;
            }
            continue;
        }
        let t = -distance / denom;
        if denom < 0.0 {
            t_enter = t_enter.max(t);
        } else {
            t_exit = t_exit.min(t);
        }
        if t_enter >= t_exit {
            return false;
        }
    }
    t_enter < t_exit
}

/// Plane through `points` if they span a polygon.
fn coplanar_plane(points: &[Vec3]) -> Option<BrushPlane> {
    let (&p0, rest) = points.split_first()?;
    let p1 = rest
        .iter()
        .copied()
        .max_by(|a, b| a.distance_squared(p0).total_cmp(&b.distance_squared(p0)))?;
    let p2 = rest
        .iter()
        .copied()
        .max_by(|a, b| {
            let area_a = (p1 - p0).cross(*a - p0).length_squared();
            let area_b = (p1 - p0).cross(*b - p0).length_squared();
            area_a.total_cmp(&area_b)
        })?;
    let plane = BrushPlane::from_points(p0, p1, p2)?;
    points
        .iter()
        .all(|p| plane.point_status(*p) == PointStatus::Inside)
        .then_some(plane)
}
