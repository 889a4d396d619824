//! Texture coordinate systems.
//!
//! A face projects its texture with two world-space axes. The paraxial system
//! derives them from the face normal and the rotation attribute; the parallel
//! system stores them explicitly so they can follow arbitrary transforms.

use bevy_math::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::{BrushFaceAttributes, EPSILON};

/// Which coordinate system new faces get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TexCoordSystemKind {
    #[default]
    Paraxial,
    Parallel,
}

// ------------------------------------------------------------------
// Shared helpers
// ------------------------------------------------------------------

/// (projection normal, x axis, y axis), ordered floor, ceiling, then walls.
const BASE_AXES: [[Vec3; 3]; 6] = [
    [Vec3::Z, Vec3::X, Vec3::NEG_Y],
    [Vec3::NEG_Z, Vec3::X, Vec3::NEG_Y],
    [Vec3::X, Vec3::Y, Vec3::NEG_Z],
    [Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z],
    [Vec3::Y, Vec3::X, Vec3::NEG_Z],
    [Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z],
];

fn safe_scale(value: f32) -> f32 {
    if value == 0.0 { 1.0 } else { value }
}

/// Snap components that are within tolerance of an integer.
fn correct(v: Vec3) -> Vec3 {
    let snap = |c: f32| {
        let rounded = c.round();
        if (c - rounded).abs() < EPSILON { rounded + 0.0 } else { c }
    };
    Vec3::new(snap(v.x), snap(v.y), snap(v.z))
}

/// World to texture space: rows `x/scale.x | offset.x`, `y/scale.y | offset.y`, `z`, `0 0 0 1`.
fn world_to_tex(x: Vec3, y: Vec3, z: Vec3, offset: Vec2, scale: Vec2) -> Mat4 {
    let x = x / safe_scale(scale.x);
    let y = y / safe_scale(scale.y);
    Mat4::from_cols(
        Vec4::new(x.x, x.y, x.z, offset.x),
        Vec4::new(y.x, y.y, y.z, offset.y),
        Vec4::new(z.x, z.y, z.z, 0.0),
        Vec4::W,
    )
    .transpose()
}

// ------------------------------------------------------------------
// Paraxial
// ------------------------------------------------------------------

/// Quake-style projection onto the closest axis plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ParaxialTexCoordSystem {
    index: usize,
    x_axis: Vec3,
    y_axis: Vec3,
}

impl ParaxialTexCoordSystem {
    pub fn new(normal: Vec3, rotation: f32) -> Self {
        let mut system = Self {
            index: 0,
            x_axis: Vec3::X,
            y_axis: Vec3::NEG_Y,
        };
        system.set_rotation(normal, rotation, rotation);
        system
    }

    /// Index into the base axis table of the entry closest to `normal`.
    /// The first entry wins ties.
    pub fn plane_normal_index(normal: Vec3) -> usize {
        let mut best_index = 0;
        let mut best_dot = 0.0;
        for (i, axes) in BASE_AXES.iter().enumerate() {
            let dot = normal.dot(axes[0]);
            if dot > best_dot {
                best_dot = dot;
                best_index = i;
            }
        }
        best_index
    }

    pub fn x_axis(&self) -> Vec3 {
        self.x_axis
    }

    pub fn y_axis(&self) -> Vec3 {
        self.y_axis
    }

    pub fn z_axis(&self) -> Vec3 {
        BASE_AXES[self.index][0]
    }

    /// Floor-like projections see the texture mirrored, so user rotations are inverted there.
    pub fn is_rotation_inverted(normal: Vec3) -> bool {
        Self::plane_normal_index(normal) % 2 == 0
    }

    pub fn set_rotation(&mut self, normal: Vec3, _old_angle: f32, new_angle: f32) {
        self.index = Self::plane_normal_index(normal);
        let [_, base_x, base_y] = BASE_AXES[self.index];
        let rotation_axis = base_y.cross(base_x);
        let rotation = Quat::from_axis_angle(rotation_axis, new_angle.to_radians());
        self.x_axis = correct(rotation * base_x);
        self.y_axis = correct(rotation * base_y);
    }
}

// ------------------------------------------------------------------
// Parallel
// ------------------------------------------------------------------

/// Valve 220 style projection with explicit axes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelTexCoordSystem {
    x_axis: Vec3,
    y_axis: Vec3,
}

impl ParallelTexCoordSystem {
    /// Explicit axes. Their lengths are the world to texture scale factors.
    pub fn new(x_axis: Vec3, y_axis: Vec3) -> Self {
        Self { x_axis, y_axis }
    }

    pub fn from_normal(normal: Vec3) -> Self {
        let (x_axis, y_axis) = Self::initial_axes(normal);
        Self { x_axis, y_axis }
    }

    pub fn initial_axes(normal: Vec3) -> (Vec3, Vec3) {
        let abs = normal.abs();
        let x_axis = if abs.z > abs.x && abs.z > abs.y {
            Vec3::Y.cross(normal).normalize_or_zero()
        } else {
            Vec3::Z.cross(normal).normalize_or_zero()
        };
        let y_axis = x_axis.cross(normal).normalize_or_zero();
        (x_axis, y_axis)
    }

    pub fn x_axis(&self) -> Vec3 {
        self.x_axis
    }

    pub fn y_axis(&self) -> Vec3 {
        self.y_axis
    }

    pub fn z_axis(&self) -> Vec3 {
        self.x_axis.cross(self.y_axis).normalize_or_zero()
    }

    pub fn set_rotation(&mut self, old_angle: f32, new_angle: f32) {
        let delta = new_angle - old_angle;
        if delta == 0.0 {
            return;
        }
        let rotation = Quat::from_axis_angle(self.z_axis(), -delta.to_radians());
        self.x_axis = rotation * self.x_axis;
        self.y_axis = rotation * self.y_axis;
    }

    pub fn shear(&mut self, factors: Vec2) {
        let x_axis = self.x_axis + self.y_axis * factors.x;
        let y_axis = self.y_axis + self.x_axis * factors.y;
        self.x_axis = x_axis;
        self.y_axis = y_axis;
    }

    /// Rotate the axes along with a face whose normal changed.
    pub fn update_normal(&mut self, old_normal: Vec3, new_normal: Vec3) {
        let (Some(old_normal), Some(new_normal)) = (old_normal.try_normalize(), new_normal.try_normalize()) else {
            return;
        };
        if old_normal.dot(new_normal) >= 1.0 - EPSILON * EPSILON {
            return;
        }
        let rotation = Quat::from_rotation_arc(old_normal, new_normal);
        self.x_axis = rotation * self.x_axis;
        self.y_axis = rotation * self.y_axis;
    }

    /// Keep the projection fixed to the geometry under an affine transform:
    /// axes go through the inverse transpose of the linear part, and the
    /// translation is absorbed into the offset.
    fn transform_locked(&mut self, transform: &Mat4, attributes: &mut BrushFaceAttributes) {
        let linear = Mat3::from_mat4(*transform);
        if linear.determinant().abs() < EPSILON * EPSILON {
            return;
        }
        let inverse_transpose = linear.inverse().transpose();
        self.x_axis = inverse_transpose * self.x_axis;
        self.y_axis = inverse_transpose * self.y_axis;

        let translation = transform.w_axis.truncate();
        attributes.offset.x -= self.x_axis.dot(translation) / safe_scale(attributes.scale.x);
        attributes.offset.y -= self.y_axis.dot(translation) / safe_scale(attributes.scale.y);
    }
}

// ------------------------------------------------------------------
// Snapshot
// ------------------------------------------------------------------

/// Captured axes of a parallel system. Paraxial systems have nothing to capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoordSnapshot {
    x_axis: Vec3,
    y_axis: Vec3,
}

impl TexCoordSnapshot {
    pub fn x_axis(&self) -> Vec3 {
        self.x_axis
    }

    pub fn y_axis(&self) -> Vec3 {
        self.y_axis
    }
}

// ------------------------------------------------------------------
// Dispatch
// ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TexCoordSystem {
    Paraxial(ParaxialTexCoordSystem),
    Parallel(ParallelTexCoordSystem),
}

impl TexCoordSystem {
    pub fn new(kind: TexCoordSystemKind, normal: Vec3, rotation: f32) -> Self {
        match kind {
            TexCoordSystemKind::Paraxial => Self::Paraxial(ParaxialTexCoordSystem::new(normal, rotation)),
            TexCoordSystemKind::Parallel => {
                let mut system = ParallelTexCoordSystem::from_normal(normal);
                system.set_rotation(0.0, rotation);
                Self::Parallel(system)
            }
        }
    }

    pub fn kind(&self) -> TexCoordSystemKind {
        match self {
            Self::Paraxial(_) => TexCoordSystemKind::Paraxial,
            Self::Parallel(_) => TexCoordSystemKind::Parallel,
        }
    }

    pub fn x_axis(&self) -> Vec3 {
        match self {
            Self::Paraxial(s) => s.x_axis(),
            Self::Parallel(s) => s.x_axis(),
        }
    }

    pub fn y_axis(&self) -> Vec3 {
        match self {
            Self::Paraxial(s) => s.y_axis(),
            Self::Parallel(s) => s.y_axis(),
        }
    }

    pub fn z_axis(&self) -> Vec3 {
        match self {
            Self::Paraxial(s) => s.z_axis(),
            Self::Parallel(s) => s.z_axis(),
        }
    }

    /// World to texture space transform.
    pub fn to_matrix(&self, offset: Vec2, scale: Vec2) -> Mat4 {
        world_to_tex(self.x_axis(), self.y_axis(), self.z_axis(), offset, scale)
    }

    /// Texture to world space transform.
    pub fn from_matrix(&self, offset: Vec2, scale: Vec2) -> Mat4 {
        self.to_matrix(offset, scale).inverse()
    }

    pub fn tex_coords(&self, point: Vec3, attributes: &BrushFaceAttributes) -> Vec2 {
        Vec2::new(
            point.dot(self.x_axis()) / safe_scale(attributes.scale.x),
            point.dot(self.y_axis()) / safe_scale(attributes.scale.y),
        ) + attributes.offset
    }

    pub fn set_rotation(&mut self, normal: Vec3, old_angle: f32, new_angle: f32) {
        match self {
            Self::Paraxial(s) => s.set_rotation(normal, old_angle, new_angle),
            Self::Parallel(s) => s.set_rotation(old_angle, new_angle),
        }
    }

    /// Rotation attribute after rotating the texture by `angle` degrees as seen by the user.
    pub fn rotated_angle(&self, normal: Vec3, rotation: f32, angle: f32) -> f32 {
        match self {
            Self::Paraxial(_) if ParaxialTexCoordSystem::is_rotation_inverted(normal) => rotation - angle,
            _ => rotation + angle,
        }
    }

    /// Move the texture in screen space. `up` and `right` are the camera axes;
    /// the offset is applied along whichever texture axes best match them.
    pub fn move_texture(&self, up: Vec3, right: Vec3, offset: Vec2, attributes: &mut BrushFaceAttributes) {
        let z = self.z_axis();
        let flatten = |axis: Vec3| (axis - z * axis.dot(z)).normalize_or_zero();
        let tex_x = flatten(self.x_axis());
        let tex_y = flatten(self.y_axis());

        // Prefer the texture axis closer to the XY plane for horizontal movement
        let x_is_horizontal = if tex_x.z.abs() < tex_y.z.abs() {
            true
        } else if tex_y.z.abs() < tex_x.z.abs() {
            false
        } else if right.dot(tex_x).abs() > right.dot(tex_y).abs() {
            true
        } else if right.dot(tex_y).abs() > right.dot(tex_x).abs() {
            false
        } else if up.dot(tex_y).abs() > up.dot(tex_x).abs() {
            true
        } else if up.dot(tex_x).abs() > up.dot(tex_y).abs() {
            false
        } else {
            return;
        };

        let (h_axis, v_axis) = if x_is_horizontal { (tex_x, tex_y) } else { (tex_y, tex_x) };
        let horizontal = if right.dot(h_axis) >= 0.0 { -offset.x } else { offset.x };
        let vertical = if up.dot(v_axis) >= 0.0 { -offset.y } else { offset.y };

        let actual = if x_is_horizontal {
            Vec2::new(horizontal, vertical)
        } else {
            Vec2::new(vertical, horizontal)
        };
        attributes.offset += actual;
    }

    /// Paraxial axes cannot be sheared.
    pub fn shear(&mut self, factors: Vec2) {
        match self {
            Self::Paraxial(_) => {}
            Self::Parallel(s) => s.shear(factors),
        }
    }

    pub fn reset_axes(&mut self, normal: Vec3, rotation: f32) {
        match self {
            Self::Paraxial(s) => s.set_rotation(normal, rotation, rotation),
            Self::Parallel(s) => {
                *s = ParallelTexCoordSystem::from_normal(normal);
                s.set_rotation(0.0, rotation);
            }
        }
    }

    /// Carry the system over to a face whose normal changed.
    pub fn update_normal(&mut self, old_normal: Vec3, new_normal: Vec3, rotation: f32) {
        match self {
            Self::Paraxial(s) => s.set_rotation(new_normal, rotation, rotation),
            Self::Parallel(s) => s.update_normal(old_normal, new_normal),
        }
    }

    /// Follow an affine transform of the face. With `lock` the texture stays
    /// fixed to the geometry: exactly for parallel systems, at the face center
    /// for paraxial ones.
    pub fn transform(
        &mut self,
        transform: &Mat4,
        old_normal: Vec3,
        new_normal: Vec3,
        old_center: Vec3,
        attributes: &mut BrushFaceAttributes,
        lock: bool,
    ) {
        if !lock {
            self.update_normal(old_normal, new_normal, attributes.rotation);
            return;
        }
        match self {
            Self::Parallel(s) => s.transform_locked(transform, attributes),
            Self::Paraxial(_) => {
                let before = self.tex_coords(old_center, attributes);
                self.update_normal(old_normal, new_normal, attributes.rotation);
                let after = self.tex_coords(transform.transform_point3(old_center), attributes);
                attributes.offset += before - after;
            }
        }
    }

    pub fn take_snapshot(&self) -> Option<TexCoordSnapshot> {
        match self {
            Self::Paraxial(_) => None,
            Self::Parallel(s) => Some(TexCoordSnapshot {
                x_axis: s.x_axis,
                y_axis: s.y_axis,
            }),
        }
    }

    /// Restore captured axes. Restoring onto a paraxial system is a caller bug.
    pub fn restore_snapshot(&mut self, snapshot: &TexCoordSnapshot) {
        match self {
            Self::Parallel(s) => {
                s.x_axis = snapshot.x_axis;
                s.y_axis = snapshot.y_axis;
            }
            Self::Paraxial(_) => panic!("cannot restore a parallel texture snapshot onto a paraxial system"),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn snapshot_type_safety() {
        let paraxial = TexCoordSystem::Paraxial(ParaxialTexCoordSystem::new(Vec3::Z, 0.0));
        assert!(paraxial.take_snapshot().is_none());

        let mut parallel = TexCoordSystem::Parallel(ParallelTexCoordSystem::new(Vec3::Y, Vec3::X));
        let snapshot = parallel.take_snapshot().unwrap();
        parallel.restore_snapshot(&snapshot);
        assert_eq!(parallel.x_axis(), Vec3::Y);
    }

    #[test]
    #[should_panic]
    fn parallel_snapshot_onto_paraxial_panics() {
        let parallel = TexCoordSystem::Parallel(ParallelTexCoordSystem::new(Vec3::Y, Vec3::X));
        let snapshot = parallel.take_snapshot().unwrap();
        let mut paraxial = TexCoordSystem::Paraxial(ParaxialTexCoordSystem::new(Vec3::Z, 0.0));
        paraxial.restore_snapshot(&snapshot);
    }

    #[test]
    fn parallel_matrix_and_rotation() {
        // One world unit along Y is a tenth of a texture unit
        let system = TexCoordSystem::Parallel(ParallelTexCoordSystem::new(Vec3::X, Vec3::new(0.0, 0.1, 0.0)));
        let world_to_tex = system.to_matrix(Vec2::ZERO, Vec2::ONE);
        assert_eq!(world_to_tex.row(0), Vec4::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(world_to_tex.row(1), Vec4::new(0.0, 0.1, 0.0, 0.0));
        assert_eq!(world_to_tex.row(2), Vec4::new(0.0, 0.0, 1.0, 0.0));
        assert_eq!(world_to_tex.row(3), Vec4::new(0.0, 0.0, 0.0, 1.0));

        let mut rotated = system.clone();
        rotated.set_rotation(Vec3::Z, 0.0, 45.0);
        let tex_x = rotated
            .from_matrix(Vec2::ZERO, Vec2::ONE)
            .transform_point3(Vec3::X)
            .normalize();
        let unrotated = system
            .from_matrix(Vec2::ZERO, Vec2::ONE)
            .transform_point3(Vec3::X)
            .normalize();
        assert!((unrotated - Vec3::X).length() < 1e-6);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert_abs_diff_eq!(tex_x.x, half, epsilon = 1e-5);
        assert_abs_diff_eq!(tex_x.y, -half, epsilon = 1e-5);
        assert_abs_diff_eq!(tex_x.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn paraxial_axes_follow_dominant_normal() {
        assert_eq!(ParaxialTexCoordSystem::plane_normal_index(Vec3::Z), 0);
        assert_eq!(ParaxialTexCoordSystem::plane_normal_index(Vec3::NEG_X), 3);
        assert_eq!(ParaxialTexCoordSystem::plane_normal_index(Vec3::new(0.0, 0.7, 0.7)), 0);

        let wall = ParaxialTexCoordSystem::new(Vec3::NEG_Y, 0.0);
        assert_eq!(wall.x_axis(), Vec3::X);
        assert_eq!(wall.y_axis(), Vec3::NEG_Z);
    }

    #[test]
    fn paraxial_rotation_returns_to_base_axes() {
        let mut system = TexCoordSystem::new(TexCoordSystemKind::Paraxial, Vec3::Z, 0.0);
        let original = system.clone();
        system.set_rotation(Vec3::Z, 0.0, 90.0);
        assert_eq!(system.x_axis(), Vec3::Y);
        assert_ne!(system, original);
        system.set_rotation(Vec3::Z, 90.0, 0.0);
        assert_eq!(system, original);
    }

    #[test]
    fn parallel_initial_axes() {
        let (x, y) = ParallelTexCoordSystem::initial_axes(Vec3::Z);
        assert_eq!(x, Vec3::X);
        assert_eq!(y, Vec3::NEG_Y);
        let (x, _) = ParallelTexCoordSystem::initial_axes(Vec3::X);
        assert_eq!(x, Vec3::Y);
    }

    #[test]
    fn parallel_lock_keeps_coordinates() {
        let mut attributes = BrushFaceAttributes::new("stone");
        attributes.scale = Vec2::new(2.0, 0.5);
        attributes.offset = Vec2::new(3.0, -1.0);
        let mut system = TexCoordSystem::new(TexCoordSystemKind::Parallel, Vec3::Z, 0.0);

        let point = Vec3::new(5.0, 7.0, 1.0);
        let before = system.tex_coords(point, &attributes);
        let transform = Mat4::from_rotation_translation(Quat::from_rotation_z(0.3), Vec3::new(10.0, -4.0, 2.0));
        let new_normal = transform.transform_vector3(Vec3::Z);
        system.transform(&transform, Vec3::Z, new_normal, point, &mut attributes, true);
        let after = system.tex_coords(transform.transform_point3(point), &attributes);

        assert_abs_diff_eq!(before.x, after.x, epsilon = 1e-3);
        assert_abs_diff_eq!(before.y, after.y, epsilon = 1e-3);
    }

    #[test]
    fn paraxial_lock_keeps_center_coordinates() {
        let mut attributes = BrushFaceAttributes::new("stone");
        let mut system = TexCoordSystem::new(TexCoordSystemKind::Paraxial, Vec3::Z, 0.0);
        let center = Vec3::new(8.0, 8.0, 16.0);
        let before = system.tex_coords(center, &attributes);
        let transform = Mat4::from_translation(Vec3::new(16.0, 32.0, 0.0));
        system.transform(&transform, Vec3::Z, Vec3::Z, center, &mut attributes, true);
        let after = system.tex_coords(center + Vec3::new(16.0, 32.0, 0.0), &attributes);
        assert_eq!(before, after);
        assert_eq!(attributes.offset, Vec2::new(-16.0, 32.0));
    }

    #[test]
    fn move_texture_on_floor() {
        let system = TexCoordSystem::new(TexCoordSystemKind::Paraxial, Vec3::Z, 0.0);
        let mut attributes = BrushFaceAttributes::default();
        // Camera looking down with +Y up on screen
        system.move_texture(Vec3::Y, Vec3::X, Vec2::new(4.0, 2.0), &mut attributes);
        assert_eq!(attributes.offset, Vec2::new(-4.0, 2.0));
        system.move_texture(Vec3::Y, Vec3::X, Vec2::new(-4.0, -2.0), &mut attributes);
        assert_eq!(attributes.offset, Vec2::ZERO);
    }

    #[test]
    fn paraxial_shear_is_ignored() {
        let mut system = TexCoordSystem::new(TexCoordSystemKind::Paraxial, Vec3::X, 0.0);
        let original = system.clone();
        system.shear(Vec2::new(0.5, 0.0));
        assert_eq!(system, original);
    }
}
