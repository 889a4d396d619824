use thiserror::Error;

/// Reasons a brush geometry operation is refused.
///
/// Every mutator on [`crate::Brush`] returns one of these instead of leaving a
/// partially edited brush behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BrushError {
    #[error("no handles were given")]
    EmptyInput,
    #[error("the delta is zero")]
    ZeroDelta,
    #[error("the result would not be a closed convex solid")]
    Degenerate,
    #[error("the result would leave the world bounds")]
    OutOfWorldBounds,
    #[error("a requested vertex is not part of the brush")]
    UnknownVertex,
    #[error("a requested edge is not part of the brush")]
    UnknownEdge,
    #[error("a requested face is not part of the brush")]
    UnknownFace,
    #[error("face index {0} is out of range")]
    InvalidFaceIndex(usize),
    #[error("a moved vertex would be absorbed by the brush")]
    VertexCollapse,
    #[error("a moved vertex would pass through the brush")]
    PassesThroughBrush,
    #[error("the result would not be convex")]
    NotConvex,
    #[error("a face would be dropped")]
    FaceDropped,
    #[error("the vertex is already part of the brush")]
    VertexAlreadyPresent,
}
