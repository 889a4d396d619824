use bevy_math::Vec3;

use crate::polyhedron::Polyhedron;
use crate::{BBox3, Brush, BrushError, BrushFace, BrushFaceAttributes, TexCoordSystemKind};

/// Creates brushes for a given world with a fixed texture projection kind.
#[derive(Debug, Clone)]
pub struct BrushBuilder {
    world_bounds: BBox3,
    kind: TexCoordSystemKind,
}

impl BrushBuilder {
    pub fn new(world_bounds: BBox3, kind: TexCoordSystemKind) -> Self {
        Self { world_bounds, kind }
    }

    /// Axis-aligned cube of edge length `size` centred on the origin.
    pub fn create_cube(&self, size: f32, texture_name: &str) -> Result<Brush, BrushError> {
        self.create_cuboid(BBox3::centered(size / 2.0), texture_name)
    }

    /// Six axis-aligned faces spanning `bounds`.
    pub fn create_cuboid(&self, bounds: BBox3, texture_name: &str) -> Result<Brush, BrushError> {
        let BBox3 { min, max } = bounds;
        let points = [
            // +Z
            [
                Vec3::new(min.x, min.y, max.z),
                Vec3::new(max.x, min.y, max.z),
                Vec3::new(min.x, max.y, max.z),
            ],
            // -Z
            [min, Vec3::new(min.x, max.y, min.z), Vec3::new(max.x, min.y, min.z)],
            // +X
            [
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(max.x, min.y, max.z),
            ],
            // -X
            [min, Vec3::new(min.x, min.y, max.z), Vec3::new(min.x, max.y, min.z)],
            // +Y
            [
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(min.x, max.y, max.z),
                Vec3::new(max.x, max.y, min.z),
            ],
            // -Y
            [min, Vec3::new(max.x, min.y, min.z), Vec3::new(min.x, min.y, max.z)],
        ];

        let attributes = BrushFaceAttributes::new(texture_name);
        let faces = points
            .into_iter()
            .map(|p| BrushFace::with_kind(p, attributes.clone(), self.kind))
            .collect::<Result<Vec<_>, _>>()?;
        Brush::from_faces(&self.world_bounds, faces)
    }

    /// Convex hull of `points` with every face textured alike.
    pub fn create_brush(&self, points: &[Vec3], texture_name: &str) -> Result<Brush, BrushError> {
        let polyhedron = Polyhedron::from_points(points)?;
        Brush::from_polyhedron(
            &self.world_bounds,
            polyhedron,
            &BrushFaceAttributes::new(texture_name),
            self.kind,
        )
    }
}
