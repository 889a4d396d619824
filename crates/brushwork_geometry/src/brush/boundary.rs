//! Plane-level edits: resizing by face, affine transforms, vertex snapping and
//! integer plane points. These rebuild the brush from its face planes instead
//! of from its vertices.

use bevy_math::{Mat4, Vec3};

use super::Brush;
use crate::{BBox3, BrushError, BrushPlane, EPSILON, tolerance};

impl Brush {
    // ------------------------------------------------------------------
    // Resize
    // ------------------------------------------------------------------

    pub fn can_move_boundary(&self, world_bounds: &BBox3, face_index: usize, delta: Vec3) -> bool {
        self.moved_boundary(world_bounds, face_index, delta, false).is_ok()
    }

    /// Translate one face plane by `delta`. Returns the index of that face in
    /// the rebuilt brush.
    pub fn move_boundary(
        &mut self,
        world_bounds: &BBox3,
        face_index: usize,
        delta: Vec3,
        lock_textures: bool,
    ) -> Result<usize, BrushError> {
        let normal = self
            .faces
            .get(face_index)
            .ok_or(BrushError::InvalidFaceIndex(face_index))?
            .normal();
        *self = self.moved_boundary(world_bounds, face_index, delta, lock_textures)?;
        self.find_face_by_normal(normal).ok_or(BrushError::FaceDropped)
    }

    fn moved_boundary(
        &self,
        world_bounds: &BBox3,
        face_index: usize,
        delta: Vec3,
        lock_textures: bool,
    ) -> Result<Brush, BrushError> {
        if face_index >= self.faces.len() {
            return Err(BrushError::InvalidFaceIndex(face_index));
        }
        if delta == Vec3::ZERO {
            return Err(BrushError::ZeroDelta);
        }

        let mut faces = self.faces.clone();
        faces[face_index].translate(delta, lock_textures)?;
        let result = Brush::from_faces(world_bounds, faces)?;
        if result.face_count() != self.face_count() {
            return Err(BrushError::FaceDropped);
        }
        if !result.polyhedron.is_closed() {
            return Err(BrushError::Degenerate);
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Transform
    // ------------------------------------------------------------------

    pub fn can_transform(&self, world_bounds: &BBox3, transform: &Mat4) -> bool {
        self.transformed(world_bounds, transform, false).is_ok()
    }

    pub fn transform(&mut self, world_bounds: &BBox3, transform: &Mat4, lock_textures: bool) -> Result<(), BrushError> {
        *self = self.transformed(world_bounds, transform, lock_textures)?;
        Ok(())
    }

    fn transformed(&self, world_bounds: &BBox3, transform: &Mat4, lock_textures: bool) -> Result<Brush, BrushError> {
        let mut faces = self.faces.clone();
        for (index, face) in faces.iter_mut().enumerate() {
            face.transform(transform, self.face_center(index), lock_textures)?;
        }
        let result = Brush::from_faces(world_bounds, faces)?;
        if result.face_count() != self.face_count() {
            return Err(BrushError::FaceDropped);
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Snapping
    // ------------------------------------------------------------------

    pub fn can_snap_vertices(&self, world_bounds: &BBox3, snap_to: f32) -> bool {
        self.snapped(world_bounds, snap_to).is_ok()
    }

    /// Round every vertex to the nearest multiple of `snap_to`. Returns false
    /// when every vertex was already on the grid.
    pub fn snap_vertices(&mut self, world_bounds: &BBox3, snap_to: f32) -> Result<bool, BrushError> {
        match self.snapped(world_bounds, snap_to)? {
            Some(result) => {
                *self = result;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn snapped(&self, world_bounds: &BBox3, snap_to: f32) -> Result<Option<Brush>, BrushError> {
        if snap_to <= 0.0 {
            return Err(BrushError::ZeroDelta);
        }
        let positions = self.vertex_positions();
        let snapped: Vec<Vec3> = positions
            .iter()
            .map(|p| (*p / snap_to).round() * snap_to)
            .collect();
        if snapped == positions {
            return Ok(None);
        }
        let pre_images: Vec<Option<Vec3>> = positions.iter().copied().map(Some).collect();
        self.rebuild_from_points(world_bounds, &snapped, &pre_images)
            .map(Some)
    }

    // ------------------------------------------------------------------
    // Plane points
    // ------------------------------------------------------------------

    /// Replace plane points with integer points from each face's polygon where
    /// those reproduce the plane. Faces that cannot be represented keep their points.
    pub fn find_integer_plane_points(&mut self, world_bounds: &BBox3) -> Result<(), BrushError> {
        let mut faces = self.faces.clone();
        for (index, face) in faces.iter_mut().enumerate() {
            if face.has_integer_points() {
                continue;
            }
            let plane = *face.plane();
            let rounded: Vec<Vec3> = self.face_positions(index).iter().map(|p| p.round()).collect();
            if let Some(points) = integer_points(&rounded, &plane) {
                face.set_points(points)?;
            }
        }

        let result = Brush::from_faces(world_bounds, faces)?;
        if result.face_count() != self.face_count() {
            return Err(BrushError::FaceDropped);
        }
        *self = result;
        Ok(())
    }
}

/// Three consecutive polygon points whose plane matches `plane`.
fn integer_points(polygon: &[Vec3], plane: &BrushPlane) -> Option<[Vec3; 3]> {
    let n = polygon.len();
    (0..n).find_map(|i| {
        let points = [polygon[i], polygon[(i + 1) % n], polygon[(i + 2) % n]];
        let candidate = BrushPlane::from_points(points[0], points[1], points[2])?;
        let same_distance = (candidate.distance - plane.distance).abs() <= 0.01 + tolerance(plane.distance);
        (candidate.normal.dot(plane.normal) >= 1.0 - EPSILON && same_distance).then_some(points)
    })
}
