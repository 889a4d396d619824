use bevy_math::{Mat4, Vec2, Vec3};

use crate::{
    BrushError, BrushFaceAttributes, BrushPlane, TexCoordSnapshot, TexCoordSystem, TexCoordSystemKind,
    plane_triple_intersection,
};

/// One face of a brush: the three points that define its plane, its
/// attributes and its texture projection.
///
/// A face knows nothing about its polygon. The owning [`crate::Brush`] keeps
/// its faces index-aligned with the polyhedron faces and passes geometry in
/// where an operation needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushFace {
    points: [Vec3; 3],
    plane: BrushPlane,
    attributes: BrushFaceAttributes,
    tex_coord_system: TexCoordSystem,
}

impl BrushFace {
    /// Face through three points; `(p1 - p0) x (p2 - p0)` is the outward normal.
    pub fn new(
        points: [Vec3; 3],
        attributes: BrushFaceAttributes,
        tex_coord_system: TexCoordSystem,
    ) -> Result<Self, BrushError> {
        let plane = BrushPlane::from_points(points[0], points[1], points[2]).ok_or(BrushError::Degenerate)?;
        Ok(Self {
            points,
            plane,
            attributes,
            tex_coord_system,
        })
    }

    /// Face with a freshly computed texture projection of the given kind.
    pub fn with_kind(
        points: [Vec3; 3],
        attributes: BrushFaceAttributes,
        kind: TexCoordSystemKind,
    ) -> Result<Self, BrushError> {
        let plane = BrushPlane::from_points(points[0], points[1], points[2]).ok_or(BrushError::Degenerate)?;
        let tex_coord_system = TexCoordSystem::new(kind, plane.normal, attributes.rotation);
        Self::new(points, attributes, tex_coord_system)
    }

    pub fn points(&self) -> &[Vec3; 3] {
        &self.points
    }

    pub fn plane(&self) -> &BrushPlane {
        &self.plane
    }

    pub fn normal(&self) -> Vec3 {
        self.plane.normal
    }

    pub fn attributes(&self) -> &BrushFaceAttributes {
        &self.attributes
    }

    pub fn tex_coord_system(&self) -> &TexCoordSystem {
        &self.tex_coord_system
    }

    pub fn texture_name(&self) -> &str {
        &self.attributes.texture_name
    }

    pub fn tex_coords(&self, point: Vec3) -> Vec2 {
        self.tex_coord_system.tex_coords(point, &self.attributes)
    }

    pub fn to_tex_matrix(&self) -> Mat4 {
        self.tex_coord_system
            .to_matrix(self.attributes.offset, self.attributes.scale)
    }

    /// Whether all three plane points have integer coordinates.
    pub fn has_integer_points(&self) -> bool {
        self.points.iter().all(|p| *p == p.round())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Replace all attributes, rotating the texture axes if the rotation changed.
    pub fn set_attributes(&mut self, attributes: BrushFaceAttributes) {
        let old_rotation = self.attributes.rotation;
        self.attributes = attributes;
        if old_rotation != self.attributes.rotation {
            self.tex_coord_system
                .set_rotation(self.plane.normal, old_rotation, self.attributes.rotation);
        }
    }

    pub fn set_texture(&mut self, texture_name: impl Into<String>) {
        self.attributes.texture_name = texture_name.into();
    }

    pub fn set_x_offset(&mut self, value: f32) {
        self.attributes.offset.x = value;
    }

    pub fn set_y_offset(&mut self, value: f32) {
        self.attributes.offset.y = value;
    }

    pub fn set_x_scale(&mut self, value: f32) {
        self.attributes.scale.x = value;
    }

    pub fn set_y_scale(&mut self, value: f32) {
        self.attributes.scale.y = value;
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        let old_rotation = self.attributes.rotation;
        self.attributes.rotation = degrees;
        self.tex_coord_system
            .set_rotation(self.plane.normal, old_rotation, degrees);
    }

    pub fn set_surface_contents(&mut self, value: i32) {
        self.attributes.surface_contents = value;
    }

    pub fn set_surface_flags(&mut self, value: i32) {
        self.attributes.surface_flags = value;
    }

    pub fn set_surface_value(&mut self, value: f32) {
        self.attributes.surface_value = value;
    }

    // ------------------------------------------------------------------
    // Texture operations
    // ------------------------------------------------------------------

    /// Rotate the texture by `angle` degrees as the user sees it.
    pub fn rotate_texture(&mut self, angle: f32) {
        let rotation = self
            .tex_coord_system
            .rotated_angle(self.plane.normal, self.attributes.rotation, angle);
        self.set_rotation(rotation);
    }

    pub fn move_texture(&mut self, up: Vec3, right: Vec3, offset: Vec2) {
        self.tex_coord_system
            .move_texture(up, right, offset, &mut self.attributes);
    }

    pub fn shear_texture(&mut self, factors: Vec2) {
        self.tex_coord_system.shear(factors);
    }

    pub fn reset_texture_axes(&mut self) {
        self.tex_coord_system
            .reset_axes(self.plane.normal, self.attributes.rotation);
    }

    pub fn take_tex_coord_snapshot(&self) -> Option<TexCoordSnapshot> {
        self.tex_coord_system.take_snapshot()
    }

    pub fn restore_tex_coord_snapshot(&mut self, snapshot: &TexCoordSnapshot) {
        self.tex_coord_system.restore_snapshot(snapshot);
    }

    /// Adopt another face's projection so the texture continues across the
    /// seam between the two planes. `center` is the center of this face's polygon.
    pub fn copy_tex_coord_system_from_face(
        &mut self,
        snapshot: Option<&TexCoordSnapshot>,
        attributes: &BrushFaceAttributes,
        source_plane: &BrushPlane,
        center: Vec3,
    ) {
        self.attributes = attributes.clone();
        let snapshot = match (snapshot, &self.tex_coord_system) {
            (Some(snapshot), TexCoordSystem::Parallel(_)) => snapshot,
            _ => {
                self.reset_texture_axes();
                return;
            }
        };

        self.tex_coord_system.restore_snapshot(snapshot);
        let seam = source_plane.normal.cross(self.plane.normal);
        let reference = seam.try_normalize().and_then(|direction| {
            let through_center = BrushPlane::new(direction, direction.dot(center));
            plane_triple_intersection(source_plane, &self.plane, &through_center)
        });
        let desired = reference.map(|point| self.tex_coord_system.tex_coords(point, attributes));

        self.tex_coord_system
            .update_normal(source_plane.normal, self.plane.normal, self.attributes.rotation);

        if let (Some(point), Some(desired)) = (reference, desired) {
            let current = self.tex_coords(point);
            self.attributes.offset += desired - current;
        }
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Move the plane points, carrying the texture projection to the new normal.
    /// The attributes are untouched.
    pub(crate) fn set_points(&mut self, points: [Vec3; 3]) -> Result<(), BrushError> {
        let plane = BrushPlane::from_points(points[0], points[1], points[2]).ok_or(BrushError::Degenerate)?;
        let old_normal = self.plane.normal;
        self.points = points;
        self.plane = plane;
        self.tex_coord_system
            .update_normal(old_normal, plane.normal, self.attributes.rotation);
        Ok(())
    }

    /// Translate the plane along `delta`, optionally keeping the texture fixed to the face.
    pub(crate) fn translate(&mut self, delta: Vec3, lock_textures: bool) -> Result<(), BrushError> {
        let transform = Mat4::from_translation(delta);
        self.transform(&transform, self.points[0], lock_textures)
    }

    /// Apply an affine transform. Mirroring transforms swap two points so the
    /// normal keeps pointing out of the solid.
    pub(crate) fn transform(&mut self, transform: &Mat4, center: Vec3, lock_textures: bool) -> Result<(), BrushError> {
        let mut points = self.points.map(|p| transform.transform_point3(p));
        if transform.determinant() < 0.0 {
            points.swap(1, 2);
        }
        let plane = BrushPlane::from_points(points[0], points[1], points[2]).ok_or(BrushError::Degenerate)?;
        let old_normal = self.plane.normal;
        self.points = points;
        self.plane = plane;
        self.tex_coord_system.transform(
            transform,
            old_normal,
            plane.normal,
            center,
            &mut self.attributes,
            lock_textures,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> BrushFace {
        BrushFace::with_kind(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            BrushFaceAttributes::new("floor"),
            TexCoordSystemKind::Paraxial,
        )
        .unwrap()
    }

    #[test]
    fn plane_from_points() {
        let face = floor();
        assert_eq!(face.normal(), Vec3::Z);
        assert!(face.has_integer_points());
        assert!(
            BrushFace::with_kind(
                [Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
                BrushFaceAttributes::default(),
                TexCoordSystemKind::Paraxial
            )
            .is_err()
        );
    }

    #[test]
    fn rotation_updates_axes() {
        let mut face = floor();
        let original_x = face.tex_coord_system().x_axis();
        face.set_rotation(90.0);
        assert_ne!(face.tex_coord_system().x_axis(), original_x);
        face.set_rotation(0.0);
        assert_eq!(face.tex_coord_system().x_axis(), original_x);
    }

    #[test]
    fn rotate_texture_is_inverted_on_floor() {
        let mut face = floor();
        face.rotate_texture(10.0);
        assert_eq!(face.attributes().rotation, -10.0);
        face.rotate_texture(-10.0);
        assert_eq!(face.attributes().rotation, 0.0);
    }

    #[test]
    fn mirror_keeps_outward_normal() {
        let mut face = BrushFace::with_kind(
            [Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 1.0)],
            BrushFaceAttributes::default(),
            TexCoordSystemKind::Parallel,
        )
        .unwrap();
        assert_eq!(face.normal(), Vec3::X);
        face.transform(&Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)), Vec3::X, true)
            .unwrap();
        assert_eq!(face.normal(), Vec3::NEG_X);
    }

    #[test]
    fn copy_from_adjacent_face_keeps_seam_coordinates() {
        let top = BrushFace::with_kind(
            [Vec3::new(0.0, 0.0, 8.0), Vec3::new(8.0, 0.0, 8.0), Vec3::new(0.0, 8.0, 8.0)],
            BrushFaceAttributes::new("wood"),
            TexCoordSystemKind::Parallel,
        )
        .unwrap();
        let mut side = BrushFace::with_kind(
            [Vec3::new(8.0, 0.0, 0.0), Vec3::new(8.0, 8.0, 0.0), Vec3::new(8.0, 0.0, 8.0)],
            BrushFaceAttributes::new("plaster"),
            TexCoordSystemKind::Parallel,
        )
        .unwrap();

        let seam_point = Vec3::new(8.0, 4.0, 8.0);
        let expected = top.tex_coords(seam_point);
        side.copy_tex_coord_system_from_face(
            top.take_tex_coord_snapshot().as_ref(),
            top.attributes(),
            top.plane(),
            Vec3::new(8.0, 4.0, 4.0),
        );
        assert_eq!(side.texture_name(), "wood");
        let actual = side.tex_coords(seam_point);
        assert!((actual - expected).length() < 1e-3);
    }
}
