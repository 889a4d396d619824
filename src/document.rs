//! The document: the node tree, its selection and the mutation primitives
//! commands call into.
//!
//! Geometry primitives come in pairs. `can_*` is a pure pre-check; the
//! matching `perform_*` asserts that the pre-check holds and applies the edit
//! to every affected brush or to none of them.

use std::collections::BTreeMap;

use bevy_math::{Mat4, Vec2, Vec3};
use brushwork_commands::ModificationTracker;
use brushwork_geometry::{
    BBox3, Brush, BrushBuilder, BrushError, BrushFace, BrushFaceAttributes, BrushPlane,
    ChangeBrushFaceAttributesRequest, Polygon3, Segment3, TexCoordSnapshot,
};
use tracing::{debug, info, warn};

use crate::handles::{BrushHandle, HandleBrushMap, HandleSelection};
use crate::issues::{Issue, IssueGenerator, NodeIssueGenerator, default_generators, default_node_generators};
use crate::render_cache::BrushRenderCache;
use crate::selection::Selection;
use crate::snapshot::{Capture, Snapshot, SnapshotError};
use crate::{BrushFaceHandle, BrushNode, EditorConfig, Node, NodeId, NodeKind};

/// A subtree taken out of the document, kept so that it can be put back with
/// the same ids.
#[derive(Debug, Clone)]
pub struct DetachedNode {
    parent: NodeId,
    /// Position among the parent's children. None appends.
    index: Option<usize>,
    /// The subtree root first, then its descendants in pre-order.
    nodes: Vec<Node>,
}

impl DetachedNode {
    fn new(parent: NodeId, index: Option<usize>, root: Node) -> Self {
        Self {
            parent,
            index,
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> NodeId {
        self.nodes[0].id
    }

    pub fn root_kind(&self) -> &NodeKind {
        &self.nodes[0].kind
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }
}

/// Where a node sits among its parent's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePosition {
    pub node: NodeId,
    pub parent: NodeId,
    pub index: usize,
}

/// A brush edit computed on copies, ready to be committed.
type EditedBrushes<T> = (Vec<(NodeId, Brush)>, Vec<T>);

pub struct Document {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    world: NodeId,
    default_layer: NodeId,
    current_parent: NodeId,
    config: EditorConfig,
    selection: Selection,
    handle_selection: HandleSelection,
    modification_count: usize,
    saved_modification_count: usize,
    issue_generators: Vec<Box<dyn IssueGenerator>>,
    node_issue_generators: Vec<Box<dyn NodeIssueGenerator>>,
}

impl Document {
    /// An empty document: a world with one default layer.
    pub fn new(config: EditorConfig) -> Self {
        let world = NodeId(0);
        let default_layer = NodeId(1);

        let mut world_node = Node::new(world, NodeKind::World);
        world_node.children.push(default_layer);
        let mut layer_node = Node::new(default_layer, NodeKind::layer("Default Layer"));
        layer_node.parent = Some(world);

        let mut nodes = BTreeMap::new();
        nodes.insert(world, world_node);
        nodes.insert(default_layer, layer_node);

        Self {
            nodes,
            next_id: 2,
            world,
            default_layer,
            current_parent: default_layer,
            config,
            selection: Selection::default(),
            handle_selection: HandleSelection::default(),
            modification_count: 0,
            saved_modification_count: 0,
            issue_generators: default_generators(),
            node_issue_generators: default_node_generators(),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn world_bounds(&self) -> &BBox3 {
        &self.config.world_bounds
    }

    pub fn world(&self) -> NodeId {
        self.world
    }

    pub fn default_layer(&self) -> NodeId {
        self.default_layer
    }

    /// Where new nodes are added.
    pub fn current_parent(&self) -> NodeId {
        self.current_parent
    }

    pub fn set_current_parent(&mut self, parent: NodeId) {
        assert!(self.nodes.contains_key(&parent), "unknown parent {parent}");
        self.current_parent = parent;
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn brush_node(&self, id: NodeId) -> Option<&BrushNode> {
        self.node(id).and_then(Node::as_brush)
    }

    fn brush_node_mut(&mut self, id: NodeId) -> Option<&mut BrushNode> {
        self.node_mut(id).and_then(Node::as_brush_mut)
    }

    pub fn brush(&self, id: NodeId) -> Option<&Brush> {
        self.brush_node(id).map(BrushNode::brush)
    }

    pub fn face(&self, handle: BrushFaceHandle) -> Option<&BrushFace> {
        self.brush(handle.node).and_then(|b| b.face(handle.face))
    }

    /// `id` and all of its descendants in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            result.push(current);
            stack.extend(node.children.iter().rev());
        }
        result
    }

    pub fn brush_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.as_brush().is_some())
            .map(Node::id)
            .collect()
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.node(id).and_then(Node::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.node(parent).and_then(Node::parent);
        }
        false
    }

    /// The given nodes without those that have an ancestor among them.
    fn topmost(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = Vec::new();
        for id in ids {
            if !result.contains(id) && !ids.iter().any(|other| self.is_ancestor(*other, *id)) {
                result.push(*id);
            }
        }
        result
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_nodes(&self) -> &[NodeId] {
        self.selection.nodes()
    }

    pub fn has_selected_nodes(&self) -> bool {
        self.selection.has_nodes()
    }

    /// Brushes among the selected nodes and their descendants.
    pub fn selected_brushes(&self) -> Vec<NodeId> {
        let mut brushes = Vec::new();
        for id in self.selection.nodes() {
            for node in self.subtree(*id) {
                if self.brush(node).is_some() && !brushes.contains(&node) {
                    brushes.push(node);
                }
            }
        }
        brushes
    }

    /// Every face of the selected brushes when nodes are selected, otherwise
    /// the face selection.
    pub fn selected_brush_faces(&self) -> Vec<BrushFaceHandle> {
        if self.selection.has_nodes() {
            self.selected_brushes()
                .into_iter()
                .filter_map(|id| self.brush_node(id).map(|b| b.face_handles(id)))
                .flatten()
                .collect()
        } else {
            self.selection.faces().to_vec()
        }
    }

    pub fn has_selected_brush_faces(&self) -> bool {
        self.selection.has_faces() || !self.selected_brushes().is_empty()
    }

    pub fn selection_bounds(&self) -> Option<BBox3> {
        let brushes: Vec<NodeId> = if self.selection.has_nodes() {
            self.selected_brushes()
        } else {
            let mut nodes: Vec<NodeId> = self.selection.faces().iter().map(|f| f.node).collect();
            nodes.dedup();
            nodes
        };
        brushes
            .into_iter()
            .filter_map(|id| self.brush_node(id).map(BrushNode::logical_bounds))
            .reduce(|a, b| a.merged(&b))
    }

    pub fn handle_selection(&self) -> &HandleSelection {
        &self.handle_selection
    }

    pub fn handle_selection_mut(&mut self) -> &mut HandleSelection {
        &mut self.handle_selection
    }

    /// Map each handle to the selected brushes that have it.
    pub fn handle_brush_map<H: BrushHandle>(&self, handles: &[H]) -> HandleBrushMap<H> {
        let brushes = self.selected_brushes();
        handles
            .iter()
            .map(|handle| {
                let owners = brushes
                    .iter()
                    .copied()
                    .filter(|id| self.brush(*id).is_some_and(|b| H::exists_on(b, handle)))
                    .collect();
                (handle.clone(), owners)
            })
            .collect()
    }

    /// Lint issues of a node. Brush issues are regenerated only after the
    /// brush changed.
    pub fn issues(&mut self, id: NodeId) -> Vec<Issue> {
        let world_bounds = self.config.world_bounds;
        let mut issues = match self.nodes.get_mut(&id).and_then(Node::as_brush_mut) {
            Some(brush) => brush.issues(id, &world_bounds, &self.issue_generators).to_vec(),
            None => Vec::new(),
        };
        if let Some(node) = self.nodes.get(&id) {
            for generator in &self.node_issue_generators {
                generator.generate(node, &self.config, &mut issues);
            }
        }
        issues
    }

    pub fn render_cache(&mut self, id: NodeId) -> Option<&BrushRenderCache> {
        self.brush_node_mut(id).map(|b| b.validate_render_cache())
    }

    // ------------------------------------------------------------------
    // Modification count
    // ------------------------------------------------------------------

    pub fn modification_count(&self) -> usize {
        self.modification_count
    }

    pub fn set_saved(&mut self) {
        self.saved_modification_count = self.modification_count;
        info!("document saved at modification count {}", self.modification_count);
    }

    pub fn is_modified(&self) -> bool {
        self.modification_count != self.saved_modification_count
    }

    // ------------------------------------------------------------------
    // Building nodes
    // ------------------------------------------------------------------

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn builder(&self) -> BrushBuilder {
        BrushBuilder::new(self.config.world_bounds, self.config.default_tex_coord_system)
    }

    pub fn build_cube(&self, size: f32) -> Result<Brush, BrushError> {
        self.builder().create_cube(size, &self.config.default_texture)
    }

    pub fn build_cuboid(&self, bounds: BBox3) -> Result<Brush, BrushError> {
        self.builder().create_cuboid(bounds, &self.config.default_texture)
    }

    pub fn build_brush(&self, points: &[Vec3]) -> Result<Brush, BrushError> {
        self.builder().create_brush(points, &self.config.default_texture)
    }

    /// A new node with a fresh id, not yet part of the tree.
    pub fn new_node(&mut self, parent: NodeId, kind: NodeKind) -> DetachedNode {
        let id = self.allocate_id();
        DetachedNode::new(parent, None, Node::new(id, kind))
    }

    /// Add a node directly, outside of any command. For building documents.
    pub fn insert_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let node = self.new_node(parent, kind);
        assert!(
            self.can_add_nodes(std::slice::from_ref(&node)),
            "cannot add {:?} to {parent}",
            node.root_kind()
        );
        let id = node.root();
        self.perform_add_nodes(vec![node]);
        id
    }

    /// Copy the subtree at `id` with fresh ids, to be added under `parent`.
    fn clone_subtree(&mut self, id: NodeId, parent: NodeId) -> DetachedNode {
        let old_ids = self.subtree(id);
        let mut new_ids = BTreeMap::new();
        for old in &old_ids {
            let new = self.allocate_id();
            new_ids.insert(*old, new);
        }

        let nodes = old_ids
            .iter()
            .filter_map(|old| {
                let source = self.node(*old)?;
                let mut copy = Node::new(new_ids[old], source.kind.clone_fresh());
                copy.parent = source.parent.and_then(|p| new_ids.get(&p).copied());
                copy.children = source.children.iter().filter_map(|c| new_ids.get(c).copied()).collect();
                Some(copy)
            })
            .collect();
        DetachedNode {
            parent,
            index: None,
            nodes,
        }
    }

    /// Copies of `ids` with fresh ids. A node whose parent is cloned along
    /// with its children (an entity) goes into a copy of that parent; nodes
    /// sharing such a parent share the copy. Returns the subtrees to add and
    /// the ids of the copies of `ids` themselves.
    pub fn prepare_duplicates(&mut self, ids: &[NodeId]) -> (Vec<DetachedNode>, Vec<NodeId>) {
        let mut detached: Vec<DetachedNode> = Vec::new();
        let mut parent_copies: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut copies = Vec::new();

        for id in self.topmost(ids) {
            let Some(parent) = self.node(id).and_then(Node::parent) else {
                continue;
            };
            let Some(parent_node) = self.node(parent) else {
                continue;
            };

            if parent_node.kind.clone_parent() {
                let grandparent = parent_node.parent;
                let parent_kind = parent_node.kind.clone_fresh();
                let slot = match parent_copies.get(&parent) {
                    Some(slot) => *slot,
                    None => {
                        let Some(grandparent) = grandparent else {
                            continue;
                        };
                        let copy = Node::new(self.allocate_id(), parent_kind);
                        detached.push(DetachedNode::new(grandparent, None, copy));
                        parent_copies.insert(parent, detached.len() - 1);
                        detached.len() - 1
                    }
                };
                let parent_copy = detached[slot].root();
                let mut subtree = self.clone_subtree(id, parent_copy);
                subtree.nodes[0].parent = Some(parent_copy);
                copies.push(subtree.root());
                detached[slot].nodes[0].children.push(subtree.root());
                detached[slot].nodes.append(&mut subtree.nodes);
            } else {
                let subtree = self.clone_subtree(id, parent);
                copies.push(subtree.root());
                detached.push(subtree);
            }
        }
        (detached, copies)
    }

    // ------------------------------------------------------------------
    // Adding and removing nodes
    // ------------------------------------------------------------------

    pub fn can_add_nodes(&self, nodes: &[DetachedNode]) -> bool {
        !nodes.is_empty()
            && nodes.iter().all(|detached| {
                self.node(detached.parent)
                    .is_some_and(|parent| parent.kind.can_add_child(detached.root_kind()))
                    && detached.ids().all(|id| !self.nodes.contains_key(&id))
            })
    }

    /// Attach detached subtrees. Returns their root ids.
    pub fn perform_add_nodes(&mut self, mut nodes: Vec<DetachedNode>) -> Vec<NodeId> {
        assert!(self.can_add_nodes(&nodes), "cannot add nodes");
        nodes.sort_by_key(|n| n.index.unwrap_or(usize::MAX));

        let mut roots = Vec::with_capacity(nodes.len());
        for detached in nodes {
            let root = detached.root();
            if let Some(parent) = self.nodes.get_mut(&detached.parent) {
                match detached.index {
                    Some(index) if index <= parent.children.len() => parent.children.insert(index, root),
                    _ => parent.children.push(root),
                }
            }
            for mut node in detached.nodes {
                if node.id == root {
                    node.parent = Some(detached.parent);
                }
                self.nodes.insert(node.id, node);
            }
            roots.push(root);
        }
        debug!("added nodes {roots:?}");
        roots
    }

    pub fn can_remove_nodes(&self, ids: &[NodeId]) -> bool {
        !ids.is_empty()
            && ids
                .iter()
                .all(|id| self.node(*id).is_some_and(|n| !matches!(n.kind, NodeKind::World)))
    }

    /// Detach the given nodes with their subtrees. Removed nodes leave the
    /// selection.
    pub fn perform_remove_nodes(&mut self, ids: &[NodeId]) -> Vec<DetachedNode> {
        assert!(self.can_remove_nodes(ids), "cannot remove nodes {ids:?}");
        let topmost = self.topmost(ids);

        let positions: Vec<(NodeId, NodeId, Option<usize>)> = topmost
            .iter()
            .filter_map(|id| {
                let parent = self.node(*id)?.parent?;
                let index = self.node(parent)?.children.iter().position(|c| c == id);
                Some((*id, parent, index))
            })
            .collect();

        let mut detached = Vec::with_capacity(positions.len());
        let mut removed = Vec::new();
        for (id, parent, index) in positions {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|c| *c != id);
            }
            let nodes: Vec<Node> = self
                .subtree(id)
                .into_iter()
                .filter_map(|n| self.nodes.remove(&n))
                .collect();
            removed.extend(nodes.iter().map(Node::id));
            detached.push(DetachedNode { parent, index, nodes });
        }

        self.selection.forget_nodes(&removed);
        if removed.contains(&self.current_parent) {
            self.current_parent = self.default_layer;
        }
        debug!("removed nodes {topmost:?}");
        detached
    }

    // ------------------------------------------------------------------
    // Reparenting
    // ------------------------------------------------------------------

    fn detach_from_parent(&mut self, id: NodeId) -> Option<NodePosition> {
        let parent = self.node(id)?.parent?;
        let parent_node = self.nodes.get_mut(&parent)?;
        let index = parent_node.children.iter().position(|c| *c == id)?;
        parent_node.children.remove(index);
        Some(NodePosition { node: id, parent, index })
    }

    /// Insert `id` among the children of `parent`. None appends.
    fn attach_to_parent(&mut self, id: NodeId, parent: NodeId, index: Option<usize>) {
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            match index {
                Some(index) if index <= parent_node.children.len() => parent_node.children.insert(index, id),
                _ => parent_node.children.push(id),
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent);
        }
    }

    /// Whether `parent` can take `id` without creating a cycle.
    fn accepts_child(&self, parent: NodeId, id: NodeId) -> bool {
        let (Some(parent_node), Some(node)) = (self.node(parent), self.node(id)) else {
            return false;
        };
        id != parent && !self.is_ancestor(id, parent) && parent_node.kind.can_add_child(&node.kind)
    }

    /// Every node must be somewhere other than `new_parent` already, and
    /// `new_parent` must accept it.
    pub fn can_reparent_nodes(&self, ids: &[NodeId], new_parent: NodeId) -> bool {
        !ids.is_empty()
            && ids.iter().all(|id| {
                self.node(*id)
                    .and_then(Node::parent)
                    .is_some_and(|parent| parent != new_parent)
                    && self.accepts_child(new_parent, *id)
            })
    }

    /// Move the given nodes with their subtrees to the end of `new_parent`'s
    /// children. Returns where they were, in the order they were moved.
    pub fn perform_reparent_nodes(&mut self, ids: &[NodeId], new_parent: NodeId) -> Vec<NodePosition> {
        assert!(
            self.can_reparent_nodes(ids, new_parent),
            "cannot move {ids:?} to {new_parent}"
        );
        let mut positions = Vec::with_capacity(ids.len());
        for id in self.topmost(ids) {
            if let Some(position) = self.detach_from_parent(id) {
                self.attach_to_parent(id, new_parent, None);
                positions.push(position);
            }
        }
        debug!("moved {ids:?} to {new_parent}");
        positions
    }

    pub fn can_restore_positions(&self, positions: &[NodePosition]) -> bool {
        !positions.is_empty()
            && positions.iter().all(|p| {
                self.node(p.node).is_some_and(|n| n.parent.is_some()) && self.accepts_child(p.parent, p.node)
            })
    }

    /// Put nodes back where [`Document::perform_reparent_nodes`] found them.
    pub fn perform_restore_positions(&mut self, positions: &[NodePosition]) {
        assert!(self.can_restore_positions(positions), "cannot restore node positions");
        for position in positions.iter().rev() {
            self.detach_from_parent(position.node);
            self.attach_to_parent(position.node, position.parent, Some(position.index));
        }
        debug!("restored {} node positions", positions.len());
    }

    // ------------------------------------------------------------------
    // Entities and groups
    // ------------------------------------------------------------------

    /// Selected entities, and the entities owning selected brushes.
    pub fn selected_entities(&self) -> Vec<NodeId> {
        let mut entities = Vec::new();
        for id in self.selection.nodes() {
            let Some(node) = self.node(*id) else {
                continue;
            };
            let entity = match node.kind {
                NodeKind::Entity { .. } => Some(*id),
                NodeKind::Brush(_) => node
                    .parent
                    .filter(|p| self.node(*p).is_some_and(|p| matches!(p.kind, NodeKind::Entity { .. }))),
                _ => None,
            };
            match entity {
                Some(entity) if !entities.contains(&entity) => entities.push(entity),
                _ => {}
            }
        }
        entities
    }

    pub fn selected_groups(&self) -> Vec<NodeId> {
        self.selection
            .nodes()
            .iter()
            .copied()
            .filter(|id| self.node(*id).is_some_and(|n| matches!(n.kind, NodeKind::Group { .. })))
            .collect()
    }

    pub fn entity_property(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Entity { properties } => properties.get(key).map(String::as_str),
            _ => None,
        }
    }

    pub fn group_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Group { name } => Some(name.as_str()),
            _ => None,
        }
    }

    fn entity_properties_mut(&mut self, id: NodeId) -> Option<&mut BTreeMap<String, String>> {
        match &mut self.nodes.get_mut(&id)?.kind {
            NodeKind::Entity { properties } => Some(properties),
            _ => None,
        }
    }

    /// Set `key` on every given entity. False if all of them already had
    /// that value.
    pub fn perform_set_entity_property(&mut self, ids: &[NodeId], key: &str, value: &str) -> bool {
        let mut changed = false;
        for id in ids {
            let Some(properties) = self.entity_properties_mut(*id) else {
                continue;
            };
            if properties.get(key).map(String::as_str) != Some(value) {
                properties.insert(key.to_owned(), value.to_owned());
                changed = true;
            }
        }
        changed
    }

    /// False if none of the given entities had `key`.
    pub fn perform_remove_entity_property(&mut self, ids: &[NodeId], key: &str) -> bool {
        let mut changed = false;
        for id in ids {
            if let Some(properties) = self.entity_properties_mut(*id) {
                changed |= properties.remove(key).is_some();
            }
        }
        changed
    }

    /// Refused when an entity that has `old_key` also has `new_key`.
    pub fn can_rename_entity_property(&self, ids: &[NodeId], old_key: &str, new_key: &str) -> bool {
        old_key != new_key
            && ids.iter().all(|id| {
                self.entity_property(*id, old_key).is_none() || self.entity_property(*id, new_key).is_none()
            })
    }

    pub fn perform_rename_entity_property(&mut self, ids: &[NodeId], old_key: &str, new_key: &str) -> bool {
        if !self.can_rename_entity_property(ids, old_key, new_key) {
            warn!("cannot rename property '{old_key}' to '{new_key}'");
            return false;
        }
        let mut changed = false;
        for id in ids {
            let Some(properties) = self.entity_properties_mut(*id) else {
                continue;
            };
            if let Some(value) = properties.remove(old_key) {
                properties.insert(new_key.to_owned(), value);
                changed = true;
            }
        }
        changed
    }

    /// False if every given group already had `name`.
    pub fn perform_rename_groups(&mut self, ids: &[NodeId], name: &str) -> bool {
        let mut changed = false;
        for id in ids {
            match self.nodes.get_mut(id).map(|n| &mut n.kind) {
                Some(NodeKind::Group { name: current }) if current.as_str() != name => {
                    *current = name.to_owned();
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }

    // ------------------------------------------------------------------
    // Brush editing helpers
    // ------------------------------------------------------------------

    /// Apply `edit` to copies of the given brushes without touching the
    /// document. None if a node is not a brush or an edit is refused.
    fn edited_brushes<A, T>(
        &self,
        operation: &str,
        items: &[(NodeId, A)],
        mut edit: impl FnMut(&A, &mut Brush, &BBox3) -> Result<T, BrushError>,
    ) -> Option<EditedBrushes<T>> {
        let world_bounds = self.world_bounds();
        let mut brushes = Vec::with_capacity(items.len());
        let mut results = Vec::with_capacity(items.len());
        for (id, argument) in items {
            let Some(brush) = self.brush(*id) else {
                debug!("{operation}: {id} is not a brush");
                return None;
            };
            let mut brush = brush.clone();
            match edit(argument, &mut brush, world_bounds) {
                Ok(result) => results.push(result),
                Err(err) => {
                    debug!("{operation} refused for {id}: {err}");
                    return None;
                }
            }
            brushes.push((*id, brush));
        }
        Some((brushes, results))
    }

    fn commit_brushes(&mut self, brushes: Vec<(NodeId, Brush)>) {
        for (id, brush) in brushes {
            self.replace_brush(id, brush);
        }
    }

    /// Swap in a new brush for `id`. Selected faces of the brush follow their
    /// normals into the new face list and are dropped if they did not survive.
    pub(crate) fn replace_brush(&mut self, id: NodeId, brush: Brush) {
        let Some(node) = self.nodes.get_mut(&id).and_then(Node::as_brush_mut) else {
            return;
        };
        let old = node.set_brush(brush);
        let new = node.brush();
        if !self.selection.faces().iter().any(|f| f.node == id) {
            return;
        }
        let faces = self
            .selection
            .faces()
            .iter()
            .filter_map(|handle| {
                if handle.node != id {
                    return Some(*handle);
                }
                let normal = old.face(handle.face)?.normal();
                new.find_face_by_normal(normal).map(|face| BrushFaceHandle::new(id, face))
            })
            .collect();
        self.selection.set_faces(faces);
    }

    fn unit_items(ids: Vec<NodeId>) -> Vec<(NodeId, ())> {
        ids.into_iter().map(|id| (id, ())).collect()
    }

    // ------------------------------------------------------------------
    // Vertex tool primitives
    // ------------------------------------------------------------------

    pub fn can_move_handles<H: BrushHandle>(&self, brush_handles: &[(NodeId, Vec<H>)], delta: Vec3) -> bool {
        !brush_handles.is_empty()
            && brush_handles.iter().all(|(id, handles)| {
                self.brush(*id)
                    .is_some_and(|b| H::can_move(b, self.world_bounds(), handles, delta))
            })
    }

    /// Move handles on every brush. Returns the new handles, sorted and
    /// deduplicated.
    pub fn perform_move_handles<H: BrushHandle>(&mut self, brush_handles: &[(NodeId, Vec<H>)], delta: Vec3) -> Vec<H> {
        let Some((brushes, moved)) = self.edited_brushes("move", brush_handles, |handles, brush, world_bounds| {
            H::move_on(brush, world_bounds, handles, delta)
        }) else {
            panic!("moving {} by {delta} failed its pre-check", H::PLURAL);
        };
        self.commit_brushes(brushes);
        let mut new_handles: Vec<H> = moved.into_iter().flatten().collect();
        H::sort_and_dedup(&mut new_handles);
        new_handles
    }

    pub fn can_remove_handles<H: BrushHandle>(&self, brush_handles: &[(NodeId, Vec<H>)]) -> bool {
        !brush_handles.is_empty()
            && brush_handles.iter().all(|(id, handles)| {
                self.brush(*id)
                    .is_some_and(|b| H::can_remove(b, self.world_bounds(), handles))
            })
    }

    pub fn perform_remove_handles<H: BrushHandle>(&mut self, brush_handles: &[(NodeId, Vec<H>)]) {
        let Some((brushes, _)) = self.edited_brushes("remove", brush_handles, |handles, brush, world_bounds| {
            H::remove_from(brush, world_bounds, handles)
        }) else {
            panic!("removing {} failed its pre-check", H::PLURAL);
        };
        self.commit_brushes(brushes);
    }

    pub fn perform_move_vertices(&mut self, brush_vertices: &[(NodeId, Vec<Vec3>)], delta: Vec3) -> Vec<Vec3> {
        self.perform_move_handles(brush_vertices, delta)
    }

    pub fn perform_move_edges(&mut self, brush_edges: &[(NodeId, Vec<Segment3>)], delta: Vec3) -> Vec<Segment3> {
        self.perform_move_handles(brush_edges, delta)
    }

    pub fn perform_move_faces(&mut self, brush_faces: &[(NodeId, Vec<Polygon3>)], delta: Vec3) -> Vec<Polygon3> {
        self.perform_move_handles(brush_faces, delta)
    }

    pub fn perform_remove_vertices(&mut self, brush_vertices: &[(NodeId, Vec<Vec3>)]) {
        self.perform_remove_handles(brush_vertices);
    }

    fn added_vertices(&self, brush_vertices: &[(NodeId, Vec<Vec3>)]) -> Option<EditedBrushes<()>> {
        self.edited_brushes("add vertices", brush_vertices, |positions, brush, world_bounds| {
            positions
                .iter()
                .try_for_each(|position| brush.add_vertex(world_bounds, *position))
        })
    }

    pub fn can_add_vertices(&self, brush_vertices: &[(NodeId, Vec<Vec3>)]) -> bool {
        !brush_vertices.is_empty() && self.added_vertices(brush_vertices).is_some()
    }

    pub fn perform_add_vertices(&mut self, brush_vertices: &[(NodeId, Vec<Vec3>)]) {
        let Some((brushes, _)) = self.added_vertices(brush_vertices) else {
            panic!("adding vertices failed its pre-check");
        };
        self.commit_brushes(brushes);
    }

    // ------------------------------------------------------------------
    // Brush primitives
    // ------------------------------------------------------------------

    fn resized(&self, faces: &[BrushFaceHandle], delta: Vec3) -> Option<(Vec<(NodeId, Brush)>, Vec<BrushFaceHandle>)> {
        if faces.is_empty() {
            return None;
        }
        let mut groups: Vec<(NodeId, Vec<usize>)> = Vec::new();
        for face in faces {
            match groups.iter_mut().find(|(id, _)| *id == face.node) {
                Some((_, indices)) => indices.push(face.face),
                None => groups.push((face.node, vec![face.face])),
            }
        }

        let lock_textures = self.config.texture_lock;
        let (brushes, new_indices) = self.edited_brushes("resize", &groups, |indices, brush, world_bounds| {
            let normals = indices
                .iter()
                .map(|i| brush.face(*i).map(BrushFace::normal).ok_or(BrushError::InvalidFaceIndex(*i)))
                .collect::<Result<Vec<_>, _>>()?;
            normals
                .into_iter()
                .map(|normal| {
                    let index = brush.find_face_by_normal(normal).ok_or(BrushError::FaceDropped)?;
                    brush.move_boundary(world_bounds, index, delta, lock_textures)
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        let new_faces = faces
            .iter()
            .filter_map(|face| {
                let group = groups.iter().position(|(id, _)| *id == face.node)?;
                let slot = groups[group].1.iter().position(|i| *i == face.face)?;
                Some(BrushFaceHandle::new(face.node, new_indices[group][slot]))
            })
            .collect();
        Some((brushes, new_faces))
    }

    pub fn can_resize_brushes(&self, faces: &[BrushFaceHandle], delta: Vec3) -> bool {
        self.resized(faces, delta).is_some()
    }

    /// Move the given faces outward or inward by `delta`. Returns the handles
    /// of the moved faces in the resized brushes.
    pub fn perform_resize_brushes(&mut self, faces: &[BrushFaceHandle], delta: Vec3) -> Vec<BrushFaceHandle> {
        let Some((brushes, new_faces)) = self.resized(faces, delta) else {
            panic!("resizing by {delta} failed its pre-check");
        };
        self.commit_brushes(brushes);
        new_faces
    }

    pub fn can_transform(&self, transform: &Mat4) -> bool {
        let brushes = self.selected_brushes();
        !brushes.is_empty()
            && brushes.iter().all(|id| {
                self.brush(*id)
                    .is_some_and(|b| b.can_transform(self.world_bounds(), transform))
            })
    }

    /// Transform every selected brush. False, with the document untouched,
    /// if any of them refuses.
    pub fn perform_transform(&mut self, transform: &Mat4, lock_textures: bool) -> bool {
        let items = Self::unit_items(self.selected_brushes());
        if items.is_empty() {
            return false;
        }
        match self.edited_brushes("transform", &items, |_, brush, world_bounds| {
            brush.transform(world_bounds, transform, lock_textures)
        }) {
            Some((brushes, _)) => {
                self.commit_brushes(brushes);
                true
            }
            None => {
                warn!("transform refused for the selected brushes");
                false
            }
        }
    }

    /// Snap the vertices of the selected brushes to multiples of `snap_to`.
    /// Brushes that cannot be snapped are left alone. Returns whether any
    /// brush changed.
    pub fn perform_snap_vertices(&mut self, snap_to: f32) -> bool {
        let world_bounds = self.config.world_bounds;
        let mut snapped = Vec::new();
        let mut failed = 0;
        for id in self.selected_brushes() {
            let Some(mut brush) = self.brush(id).cloned() else {
                continue;
            };
            match brush.snap_vertices(&world_bounds, snap_to) {
                Ok(true) => snapped.push((id, brush)),
                Ok(false) => {}
                Err(err) => {
                    debug!("cannot snap {id}: {err}");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            warn!("could not snap vertices of {failed} brushes");
        }
        let changed = !snapped.is_empty();
        self.commit_brushes(snapped);
        changed
    }

    /// Replace the plane points of the selected brushes by integer points
    /// where possible. Returns whether any brush was processed.
    pub fn perform_find_plane_points(&mut self) -> bool {
        let world_bounds = self.config.world_bounds;
        let mut updated = Vec::new();
        for id in self.selected_brushes() {
            let Some(mut brush) = self.brush(id).cloned() else {
                continue;
            };
            match brush.find_integer_plane_points(&world_bounds) {
                Ok(()) => updated.push((id, brush)),
                Err(err) => warn!("cannot find plane points for {id}: {err}"),
            }
        }
        let any = !updated.is_empty();
        self.commit_brushes(updated);
        any
    }

    // ------------------------------------------------------------------
    // Face primitives
    // ------------------------------------------------------------------

    /// Apply `edit` to every selected brush face. False if there is none.
    fn edit_selected_faces(&mut self, mut edit: impl FnMut(&mut BrushNode, usize)) -> bool {
        let faces = self.selected_brush_faces();
        if faces.is_empty() {
            return false;
        }
        for handle in faces {
            if let Some(node) = self.brush_node_mut(handle.node) {
                edit(node, handle.face);
            }
        }
        true
    }

    pub fn perform_change_brush_face_attributes(&mut self, request: &ChangeBrushFaceAttributesRequest) -> bool {
        self.edit_selected_faces(|node, face| node.evaluate_request(face, request))
    }

    pub fn perform_set_face_attributes(&mut self, attributes: &BrushFaceAttributes) -> bool {
        self.edit_selected_faces(|node, face| node.set_face_attributes(face, attributes.clone()))
    }

    pub fn perform_move_textures(&mut self, camera_up: Vec3, camera_right: Vec3, offset: Vec2) -> bool {
        self.edit_selected_faces(|node, face| node.move_texture(face, camera_up, camera_right, offset))
    }

    pub fn perform_rotate_textures(&mut self, angle: f32) -> bool {
        self.edit_selected_faces(|node, face| node.rotate_texture(face, angle))
    }

    pub fn perform_shear_textures(&mut self, factors: Vec2) -> bool {
        self.edit_selected_faces(|node, face| node.shear_texture(face, factors))
    }

    pub fn perform_copy_tex_coord_system_from_face(
        &mut self,
        snapshot: Option<&TexCoordSnapshot>,
        attributes: &BrushFaceAttributes,
        source_plane: &BrushPlane,
    ) -> bool {
        self.edit_selected_faces(|node, face| {
            node.copy_tex_coord_system_from_face(face, snapshot, attributes, source_plane)
        })
    }

    // ------------------------------------------------------------------
    // Selection primitives
    // ------------------------------------------------------------------

    pub fn perform_select_nodes(&mut self, ids: &[NodeId]) {
        let selectable: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| self.node(*id).is_some_and(|n| n.kind.is_selectable()))
            .collect();
        self.selection.select_nodes(selectable);
    }

    pub fn perform_select_faces(&mut self, faces: &[BrushFaceHandle]) {
        let valid: Vec<BrushFaceHandle> = faces.iter().copied().filter(|f| self.face(*f).is_some()).collect();
        self.selection.select_faces(valid);
    }

    /// Select every object in every layer.
    pub fn perform_select_all_nodes(&mut self) {
        let objects: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| matches!(n.kind, NodeKind::Layer { .. }))
            .flat_map(|layer| layer.children.iter().copied())
            .collect();
        self.selection.clear();
        self.selection.select_nodes(objects);
    }

    pub fn perform_select_all_faces(&mut self) {
        let faces: Vec<BrushFaceHandle> = self
            .nodes
            .values()
            .filter_map(|n| n.as_brush().map(|b| b.face_handles(n.id)))
            .flatten()
            .collect();
        self.selection.clear();
        self.selection.select_faces(faces);
    }

    /// Replace the node selection by the faces of the selected brushes.
    pub fn perform_convert_to_face_selection(&mut self) {
        let faces = self.selected_brush_faces();
        self.selection.clear();
        self.selection.select_faces(faces);
    }

    pub fn perform_deselect_nodes(&mut self, ids: &[NodeId]) {
        self.selection.deselect_nodes(ids);
    }

    pub fn perform_deselect_faces(&mut self, faces: &[BrushFaceHandle]) {
        self.selection.deselect_faces(faces);
    }

    pub fn perform_deselect_all(&mut self) {
        self.selection.clear();
    }

    pub(crate) fn restore_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Capture the given nodes and everything below them.
    pub fn take_snapshot(&self, ids: &[NodeId]) -> Snapshot {
        let mut seen = Vec::new();
        let mut captures = Vec::new();
        for id in ids {
            for node in self.subtree(*id) {
                if seen.contains(&node) {
                    continue;
                }
                seen.push(node);
                if let Some(capture) = self.node(node).and_then(Node::take_snapshot) {
                    captures.push(capture);
                }
            }
        }
        Snapshot::new(captures)
    }

    /// Capture only the given nodes, not their children.
    pub fn take_node_snapshot(&self, ids: &[NodeId]) -> Snapshot {
        Snapshot::new(
            ids.iter()
                .filter_map(|id| self.node(*id).and_then(Node::take_snapshot))
                .collect(),
        )
    }

    pub fn take_face_snapshot(&self, faces: &[BrushFaceHandle]) -> Snapshot {
        Snapshot::new(
            faces
                .iter()
                .filter_map(|handle| {
                    self.face(*handle).map(|face| Capture::Face {
                        handle: *handle,
                        face: face.clone(),
                    })
                })
                .collect(),
        )
    }

    /// Restore everything `snapshot` captured, or nothing if any capture no
    /// longer applies.
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), Vec<SnapshotError>> {
        let result = snapshot.restore(self);
        if let Err(errors) = &result {
            for error in errors {
                warn!("snapshot restore: {error}");
            }
        }
        result
    }
}

impl ModificationTracker for Document {
    fn increment_modification_count(&mut self, delta: usize) {
        self.modification_count += delta;
    }

    fn decrement_modification_count(&mut self, delta: usize) {
        debug_assert!(
            self.modification_count >= delta,
            "modification count {} cannot drop by {delta}",
            self.modification_count
        );
        self.modification_count -= delta;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn document() -> Document {
        Document::new(EditorConfig::default())
    }

    fn add_cube(document: &mut Document, parent: NodeId, size: f32) -> NodeId {
        let cube = document.build_cube(size).unwrap();
        document.insert_node(parent, NodeKind::brush(cube))
    }

    #[test]
    fn new_document_has_world_and_layer() {
        let document = document();
        assert_eq!(document.node_count(), 2);
        assert_eq!(document.node(document.world()).unwrap().children(), &[document.default_layer()]);
        assert_eq!(document.current_parent(), document.default_layer());
    }

    #[test]
    fn removed_nodes_return_to_their_places() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 8.0);
        let b = add_cube(&mut document, layer, 16.0);
        let c = add_cube(&mut document, layer, 32.0);
        document.perform_select_nodes(&[a, c]);

        let detached = document.perform_remove_nodes(&[c, a]);
        assert_eq!(document.node(layer).unwrap().children(), &[b]);
        assert!(!document.has_selected_nodes());

        document.perform_add_nodes(detached);
        assert_eq!(document.node(layer).unwrap().children(), &[a, b, c]);
        assert_eq!(document.node(c).unwrap().parent(), Some(layer));
    }

    #[test]
    fn removing_a_group_takes_its_children() {
        let mut document = document();
        let group = document.insert_node(document.default_layer(), NodeKind::group("g"));
        let brush = add_cube(&mut document, group, 8.0);
        let detached = document.perform_remove_nodes(&[brush, group]);
        assert_eq!(detached.len(), 1);
        assert!(document.node(brush).is_none());
        assert_eq!(detached[0].ids().collect::<Vec<_>>(), vec![group, brush]);
    }

    #[test]
    fn duplicates_share_a_copied_entity() {
        let mut document = document();
        let entity = document.insert_node(document.default_layer(), NodeKind::entity([("classname", "func_door")]));
        let a = add_cube(&mut document, entity, 8.0);
        let b = add_cube(&mut document, entity, 16.0);

        let (detached, copies) = document.prepare_duplicates(&[a, b]);
        assert_eq!(detached.len(), 1);
        assert_eq!(copies.len(), 2);
        assert!(matches!(detached[0].root_kind(), NodeKind::Entity { .. }));

        let roots = document.perform_add_nodes(detached);
        let copy = document.node(roots[0]).unwrap();
        assert_eq!(copy.children(), copies.as_slice());
        assert_eq!(document.node(copies[0]).unwrap().parent(), Some(roots[0]));
        assert_eq!(document.brush(copies[1]), document.brush(b));
    }

    #[test]
    fn world_cannot_be_removed_and_layers_cannot_take_layers() {
        let mut document = document();
        assert!(!document.can_remove_nodes(&[document.world()]));
        let layer = document.new_node(document.default_layer(), NodeKind::layer("nested"));
        assert!(!document.can_add_nodes(&[layer]));
    }

    #[test]
    fn vertex_moves_apply_to_all_brushes_or_none() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        let b = add_cube(&mut document, layer, 32.0);
        let corner = Vec3::splat(8.0);

        assert!(document.can_move_handles(&[(a, vec![corner])], Vec3::new(4.0, 0.0, 0.0)));
        // The second brush has no vertex at the corner.
        assert!(!document.can_move_handles(&[(a, vec![corner]), (b, vec![corner])], Vec3::X));

        let moved = document.perform_move_vertices(&[(a, vec![corner])], Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(moved, vec![Vec3::new(12.0, 8.0, 8.0)]);
        assert!(document.brush(a).unwrap().has_vertex(Vec3::new(12.0, 8.0, 8.0)));
    }

    #[test]
    #[should_panic]
    fn perform_without_pre_check_panics() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        document.perform_move_vertices(&[(a, vec![Vec3::splat(8.0)])], Vec3::new(-20.0, -20.0, -20.0));
    }

    #[test]
    fn resize_follows_moved_face() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        let top = document.brush(a).unwrap().find_face_by_normal(Vec3::Z).unwrap();
        let handle = BrushFaceHandle::new(a, top);
        document.perform_select_faces(&[handle]);

        let new_faces = document.perform_resize_brushes(&[handle], Vec3::Z * 8.0);
        assert_eq!(new_faces.len(), 1);
        assert_eq!(document.face(new_faces[0]).unwrap().normal(), Vec3::Z);
        assert_eq!(document.brush(a).unwrap().bounds().max.z, 16.0);
        assert_eq!(document.selection().faces(), new_faces.as_slice());
        assert!(!document.can_resize_brushes(&[handle], Vec3::Z * -40.0));
    }

    #[test]
    fn transform_refusal_leaves_everything() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        let b = add_cube(&mut document, layer, 32.0);
        document.perform_select_nodes(&[a, b]);
        let before = document.brush(a).unwrap().clone();

        assert!(!document.perform_transform(&Mat4::from_translation(Vec3::X * 8180.0), false));
        assert_eq!(document.brush(a).unwrap(), &before);

        assert!(document.perform_transform(&Mat4::from_rotation_z(FRAC_PI_2), true));
        let bounds = document.selection_bounds().unwrap();
        assert!((bounds.max - Vec3::splat(16.0)).abs().max_element() < 1e-3);
        assert!((bounds.min + Vec3::splat(16.0)).abs().max_element() < 1e-3);
    }

    #[test]
    fn snapping_reports_changes() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        document.perform_select_nodes(&[a]);
        assert!(!document.perform_snap_vertices(1.0));
        assert!(document.perform_transform(&Mat4::from_translation(Vec3::splat(0.25)), false));
        assert!(document.perform_snap_vertices(1.0));
        assert!(document.brush(a).unwrap().has_integer_vertices());
    }

    #[test]
    fn face_operations_need_a_selection() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        assert!(!document.perform_rotate_textures(10.0));

        document.perform_select_nodes(&[a]);
        assert_eq!(document.selected_brush_faces().len(), 6);
        assert!(document.perform_rotate_textures(10.0));
        assert!(document.brush(a).unwrap().faces().iter().all(|f| f.attributes().rotation != 0.0));

        document.perform_convert_to_face_selection();
        assert!(!document.has_selected_nodes());
        assert_eq!(document.selection().faces().len(), 6);
    }

    #[test]
    fn issues_follow_edits() {
        let mut document = document();
        let layer = document.default_layer();
        let a = add_cube(&mut document, layer, 16.0);
        assert!(document.issues(a).is_empty());
        document.perform_select_nodes(&[a]);
        document.perform_transform(&Mat4::from_translation(Vec3::splat(0.5)), false);
        assert_eq!(document.issues(a).len(), 2);
    }

    #[test]
    fn modification_count_against_saved_checkpoint() {
        let mut document = document();
        assert!(!document.is_modified());
        document.increment_modification_count(2);
        assert!(document.is_modified());
        document.set_saved();
        assert!(!document.is_modified());
        document.decrement_modification_count(1);
        assert!(document.is_modified());
        assert_eq!(document.modification_count(), 1);
    }

    #[test]
    #[should_panic(expected = "cannot drop")]
    fn unbalanced_modification_count_panics() {
        let mut document = document();
        document.increment_modification_count(1);
        document.decrement_modification_count(2);
    }
}
