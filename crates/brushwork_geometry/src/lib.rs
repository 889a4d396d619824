//! Convex brush geometry: planes, handles, the half-edge polyhedron, texture
//! projections and the [`Brush`] type whose edits either fully succeed or
//! leave the brush untouched.

mod attributes;
mod bounds;
mod brush;
mod builder;
mod error;
mod face;
mod handles;
mod plane;
pub mod polyhedron;
mod request;
mod texcoord;

pub use attributes::{BrushFaceAttributes, NO_TEXTURE_NAME};
pub use bounds::BBox3;
pub use brush::Brush;
pub use builder::BrushBuilder;
pub use error::BrushError;
pub use face::BrushFace;
pub use handles::{Polygon3, Segment3, cmp_vec3, polygon_vertices, segment_vertices, sort_and_dedup_vec3};
pub use plane::{BrushPlane, PointStatus, plane_triple_intersection, point_inside_all_planes};
pub use polyhedron::Polyhedron;
pub use request::{AxisOp, ChangeBrushFaceAttributesRequest, FlagOp, TextureOp, ValueOp};
pub use texcoord::{
    ParallelTexCoordSystem, ParaxialTexCoordSystem, TexCoordSnapshot, TexCoordSystem, TexCoordSystemKind,
};

/// Tolerance for plane classification and point deduplication near the origin.
pub const EPSILON: f32 = 1e-4;

/// Growth of the tolerance per unit of distance from the origin. Positions are
/// stored as f32, whose spacing is about 1.2e-7 per unit.
pub const RELATIVE_EPSILON: f32 = 1e-6;

/// Tolerance for comparing positions whose coordinates reach `magnitude`.
pub fn tolerance(magnitude: f32) -> f32 {
    EPSILON.max(magnitude.abs() * RELATIVE_EPSILON)
}
