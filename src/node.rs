//! Scene graph nodes. A document is a tree of nodes rooted in the world node;
//! brushes are leaves.

use std::collections::BTreeMap;
use std::fmt;

use bevy_math::{Vec2, Vec3};
use brushwork_geometry::{
    BBox3, Brush, BrushFace, BrushFaceAttributes, BrushPlane, ChangeBrushFaceAttributesRequest, TexCoordSnapshot,
};

use crate::issues::{Issue, IssueGenerator};
use crate::render_cache::BrushRenderCache;

/// Document-unique node id. Ids are allocated monotonically and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The only way to refer to a face across edits: the owning brush node and
/// the face's index in that brush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrushFaceHandle {
    pub node: NodeId,
    pub face: usize,
}

impl BrushFaceHandle {
    pub fn new(node: NodeId, face: usize) -> Self {
        Self { node, face }
    }
}

impl fmt::Display for BrushFaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.face)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_brush(&self) -> Option<&BrushNode> {
        match &self.kind {
            NodeKind::Brush(brush) => Some(brush),
            _ => None,
        }
    }

    pub(crate) fn as_brush_mut(&mut self) -> Option<&mut BrushNode> {
        match &mut self.kind {
            NodeKind::Brush(brush) => Some(brush),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    World,
    Layer { name: String },
    Group { name: String },
    Entity { properties: BTreeMap<String, String> },
    Brush(BrushNode),
}

impl NodeKind {
    pub fn layer(name: impl Into<String>) -> Self {
        NodeKind::Layer { name: name.into() }
    }

    pub fn group(name: impl Into<String>) -> Self {
        NodeKind::Group { name: name.into() }
    }

    pub fn entity<K: Into<String>, V: Into<String>>(properties: impl IntoIterator<Item = (K, V)>) -> Self {
        NodeKind::Entity {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn brush(brush: Brush) -> Self {
        NodeKind::Brush(BrushNode::new(brush))
    }

    pub fn can_add_child(&self, child: &NodeKind) -> bool {
        match self {
            NodeKind::World => matches!(child, NodeKind::Layer { .. }),
            NodeKind::Layer { .. } | NodeKind::Group { .. } => matches!(
                child,
                NodeKind::Group { .. } | NodeKind::Entity { .. } | NodeKind::Brush(_)
            ),
            NodeKind::Entity { .. } => matches!(child, NodeKind::Brush(_)),
            NodeKind::Brush(_) => false,
        }
    }

    /// Whether duplicating a child of this node duplicates this node too.
    pub fn clone_parent(&self) -> bool {
        matches!(self, NodeKind::Entity { .. })
    }

    pub fn is_selectable(&self) -> bool {
        !matches!(self, NodeKind::World | NodeKind::Layer { .. })
    }

    /// Copy of the node's own state with fresh caches. Children are not included.
    pub(crate) fn clone_fresh(&self) -> NodeKind {
        match self {
            NodeKind::Brush(brush) => NodeKind::Brush(BrushNode::new(brush.brush().clone())),
            other => other.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// BrushNode
// ---------------------------------------------------------------------------

/// A brush in the scene graph. Every mutator invalidates the render cache and
/// the issue cache.
#[derive(Debug, Clone)]
pub struct BrushNode {
    brush: Brush,
    render_cache: BrushRenderCache,
    issues: Option<Vec<Issue>>,
}

impl BrushNode {
    pub fn new(brush: Brush) -> Self {
        Self {
            brush,
            render_cache: BrushRenderCache::default(),
            issues: None,
        }
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn logical_bounds(&self) -> BBox3 {
        self.brush.bounds()
    }

    pub fn face_handles(&self, node: NodeId) -> Vec<BrushFaceHandle> {
        (0..self.brush.face_count())
            .map(|face| BrushFaceHandle::new(node, face))
            .collect()
    }

    pub fn render_cache(&self) -> &BrushRenderCache {
        &self.render_cache
    }

    /// Render data, rebuilt if the brush changed since the last call.
    pub fn validate_render_cache(&mut self) -> &BrushRenderCache {
        self.render_cache.validate(&self.brush);
        &self.render_cache
    }

    /// Issues of this brush, generated on first request after a change.
    pub fn issues(
        &mut self,
        node: NodeId,
        world_bounds: &BBox3,
        generators: &[Box<dyn IssueGenerator>],
    ) -> &[Issue] {
        let brush = &self.brush;
        self.issues.get_or_insert_with(|| {
            let mut issues = Vec::new();
            for generator in generators {
                generator.generate(node, brush, world_bounds, &mut issues);
            }
            issues
        })
    }

    pub fn has_cached_issues(&self) -> bool {
        self.issues.is_some()
    }

    fn invalidate(&mut self) {
        self.render_cache.invalidate();
        self.issues = None;
    }

    /// Replace the brush, returning the previous one.
    pub fn set_brush(&mut self, brush: Brush) -> Brush {
        self.invalidate();
        std::mem::replace(&mut self.brush, brush)
    }

    fn face_mut(&mut self, index: usize) -> &mut BrushFace {
        self.invalidate();
        let count = self.brush.face_count();
        match self.brush.face_mut(index) {
            Some(face) => face,
            None => panic!("face index {index} out of range for a brush with {count} faces"),
        }
    }

    pub fn set_face_attributes(&mut self, index: usize, attributes: BrushFaceAttributes) {
        self.face_mut(index).set_attributes(attributes);
    }

    pub fn evaluate_request(&mut self, index: usize, request: &ChangeBrushFaceAttributesRequest) {
        request.evaluate(self.face_mut(index));
    }

    pub fn rotate_texture(&mut self, index: usize, angle: f32) {
        self.face_mut(index).rotate_texture(angle);
    }

    pub fn move_texture(&mut self, index: usize, up: Vec3, right: Vec3, offset: Vec2) {
        self.face_mut(index).move_texture(up, right, offset);
    }

    pub fn shear_texture(&mut self, index: usize, factors: Vec2) {
        self.face_mut(index).shear_texture(factors);
    }

    pub fn reset_texture_axes(&mut self, index: usize) {
        self.face_mut(index).reset_texture_axes();
    }

    pub fn copy_tex_coord_system_from_face(
        &mut self,
        index: usize,
        snapshot: Option<&TexCoordSnapshot>,
        attributes: &BrushFaceAttributes,
        source_plane: &BrushPlane,
    ) {
        let center = self.brush.face_center(index);
        self.face_mut(index)
            .copy_tex_coord_system_from_face(snapshot, attributes, source_plane, center);
    }

    pub fn restore_tex_coord_snapshot(&mut self, index: usize, snapshot: &TexCoordSnapshot) {
        self.face_mut(index).restore_tex_coord_snapshot(snapshot);
    }

    /// Put back a face captured earlier from this brush.
    pub(crate) fn restore_face(&mut self, index: usize, face: BrushFace) {
        *self.face_mut(index) = face;
    }
}

#[cfg(test)]
mod tests {
    use brushwork_geometry::{BrushBuilder, TexCoordSystemKind};

    use super::*;
    use crate::issues::default_generators;

    fn brush_node() -> BrushNode {
        let brush = BrushBuilder::new(BBox3::centered(8192.0), TexCoordSystemKind::Paraxial)
            .create_cube(16.0, "stone")
            .unwrap();
        BrushNode::new(brush)
    }

    #[test]
    fn node_kind_rules() {
        let brush = NodeKind::Brush(brush_node());
        assert!(NodeKind::World.can_add_child(&NodeKind::layer("a")));
        assert!(!NodeKind::World.can_add_child(&brush));
        assert!(NodeKind::group("g").can_add_child(&brush));
        assert!(NodeKind::entity([("classname", "func_door")]).can_add_child(&brush));
        assert!(!brush.can_add_child(&NodeKind::group("g")));
        assert!(NodeKind::entity::<&str, &str>([]).clone_parent());
        assert!(!NodeKind::group("g").clone_parent());
        assert!(!NodeKind::layer("a").is_selectable());
    }

    #[test]
    fn mutators_invalidate_caches() {
        let mut node = brush_node();
        let generators = default_generators();
        node.validate_render_cache();
        node.issues(NodeId(1), &BBox3::centered(8192.0), &generators);
        assert!(node.render_cache().is_valid());
        assert!(node.has_cached_issues());

        node.rotate_texture(0, 15.0);
        assert!(!node.render_cache().is_valid());
        assert!(!node.has_cached_issues());

        node.validate_render_cache();
        let brush = node.brush().clone();
        node.set_brush(brush);
        assert!(!node.render_cache().is_valid());
    }

    #[test]
    fn issues_are_cached_until_change() {
        let mut node = brush_node();
        let generators = default_generators();
        let world = BBox3::centered(8192.0);
        assert!(node.issues(NodeId(1), &world, &generators).is_empty());

        let mut attributes = node.brush().faces()[1].attributes().clone();
        attributes.scale.x = 0.0;
        node.set_face_attributes(1, attributes);
        let issues = node.issues(NodeId(1), &world, &generators);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].face, Some(1));
    }

    #[test]
    #[should_panic]
    fn face_index_out_of_range_panics() {
        brush_node().rotate_texture(6, 1.0);
    }

    #[test]
    fn face_handles_cover_every_face() {
        let node = brush_node();
        let handles = node.face_handles(NodeId(3));
        assert_eq!(handles.len(), 6);
        assert_eq!(handles[5], BrushFaceHandle::new(NodeId(3), 5));
    }
}
