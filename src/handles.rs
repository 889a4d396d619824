//! Vertex tool handles and their mapping onto brushes.

use std::fmt::Debug;

use bevy_math::Vec3;
use brushwork_geometry::{BBox3, Brush, BrushError, Polygon3, Segment3, sort_and_dedup_vec3};

use crate::NodeId;

/// A vertex, edge or face handle as the vertex tool sees it.
pub trait BrushHandle: Clone + PartialEq + Debug + 'static {
    /// "Vertices", "Edges" or "Faces", used in command names.
    const PLURAL: &'static str;

    fn sort_and_dedup(handles: &mut Vec<Self>);
    fn exists_on(brush: &Brush, handle: &Self) -> bool;
    fn selected(selection: &HandleSelection) -> &Vec<Self>;
    fn selected_mut(selection: &mut HandleSelection) -> &mut Vec<Self>;

    fn can_move(brush: &Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> bool;
    fn move_on(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> Result<Vec<Self>, BrushError>;
    fn can_remove(brush: &Brush, world_bounds: &BBox3, handles: &[Self]) -> bool;
    fn remove_from(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self]) -> Result<(), BrushError>;
}

impl BrushHandle for Vec3 {
    const PLURAL: &'static str = "Vertices";

    fn sort_and_dedup(handles: &mut Vec<Self>) {
        sort_and_dedup_vec3(handles);
    }

    fn exists_on(brush: &Brush, handle: &Self) -> bool {
        brush.has_vertex(*handle)
    }

    fn selected(selection: &HandleSelection) -> &Vec<Self> {
        &selection.vertices
    }

    fn selected_mut(selection: &mut HandleSelection) -> &mut Vec<Self> {
        &mut selection.vertices
    }

    fn can_move(brush: &Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> bool {
        brush.can_move_vertices(world_bounds, handles, delta)
    }

    fn move_on(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> Result<Vec<Self>, BrushError> {
        brush.move_vertices(world_bounds, handles, delta)
    }

    fn can_remove(brush: &Brush, world_bounds: &BBox3, handles: &[Self]) -> bool {
        brush.can_remove_vertices(world_bounds, handles)
    }

    fn remove_from(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self]) -> Result<(), BrushError> {
        brush.remove_vertices(world_bounds, handles)
    }
}

impl BrushHandle for Segment3 {
    const PLURAL: &'static str = "Edges";

    fn sort_and_dedup(handles: &mut Vec<Self>) {
        handles.sort();
        handles.dedup();
    }

    fn exists_on(brush: &Brush, handle: &Self) -> bool {
        brush.has_edge(handle)
    }

    fn selected(selection: &HandleSelection) -> &Vec<Self> {
        &selection.edges
    }

    fn selected_mut(selection: &mut HandleSelection) -> &mut Vec<Self> {
        &mut selection.edges
    }

    fn can_move(brush: &Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> bool {
        brush.can_move_edges(world_bounds, handles, delta)
    }

    fn move_on(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> Result<Vec<Self>, BrushError> {
        brush.move_edges(world_bounds, handles, delta)
    }

    fn can_remove(brush: &Brush, world_bounds: &BBox3, handles: &[Self]) -> bool {
        brush.can_remove_edges(world_bounds, handles)
    }

    fn remove_from(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self]) -> Result<(), BrushError> {
        brush.remove_edges(world_bounds, handles)
    }
}

impl BrushHandle for Polygon3 {
    const PLURAL: &'static str = "Faces";

    fn sort_and_dedup(handles: &mut Vec<Self>) {
        handles.sort();
        handles.dedup();
    }

    fn exists_on(brush: &Brush, handle: &Self) -> bool {
        brush.has_face(handle)
    }

    fn selected(selection: &HandleSelection) -> &Vec<Self> {
        &selection.faces
    }

    fn selected_mut(selection: &mut HandleSelection) -> &mut Vec<Self> {
        &mut selection.faces
    }

    fn can_move(brush: &Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> bool {
        brush.can_move_faces(world_bounds, handles, delta)
    }

    fn move_on(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self], delta: Vec3) -> Result<Vec<Self>, BrushError> {
        brush.move_faces(world_bounds, handles, delta)
    }

    fn can_remove(brush: &Brush, world_bounds: &BBox3, handles: &[Self]) -> bool {
        brush.can_remove_faces(world_bounds, handles)
    }

    fn remove_from(brush: &mut Brush, world_bounds: &BBox3, handles: &[Self]) -> Result<(), BrushError> {
        brush.remove_faces(world_bounds, handles)
    }
}

// ---------------------------------------------------------------------------
// HandleSelection
// ---------------------------------------------------------------------------

/// Handles selected in the vertex tool, each list sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandleSelection {
    vertices: Vec<Vec3>,
    edges: Vec<Segment3>,
    faces: Vec<Polygon3>,
}

impl HandleSelection {
    pub fn selected<H: BrushHandle>(&self) -> &[H] {
        H::selected(self)
    }

    pub fn is_selected<H: BrushHandle>(&self, handle: &H) -> bool {
        H::selected(self).contains(handle)
    }

    pub fn select<H: BrushHandle>(&mut self, handles: &[H]) {
        let selected = H::selected_mut(self);
        selected.extend_from_slice(handles);
        H::sort_and_dedup(selected);
    }

    pub fn deselect<H: BrushHandle>(&mut self, handles: &[H]) {
        H::selected_mut(self).retain(|h| !handles.contains(h));
    }

    /// Swap `old` handles for `new` ones after an edit moved them.
    pub fn replace<H: BrushHandle>(&mut self, old: &[H], new: &[H]) {
        self.deselect(old);
        self.select(new);
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }
}

// ---------------------------------------------------------------------------
// HandleBrushMap
// ---------------------------------------------------------------------------

/// Handles with the brushes that contain them, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleBrushMap<H> {
    entries: Vec<(H, Vec<NodeId>)>,
}

impl<H> Default for HandleBrushMap<H> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

/// A [`HandleBrushMap`] turned inside out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedHandles<H> {
    /// Brushes in order of first appearance.
    pub brushes: Vec<NodeId>,
    /// Handles per brush, in the order of `brushes`.
    pub brush_handles: Vec<(NodeId, Vec<H>)>,
    /// Every handle, sorted and deduplicated.
    pub handles: Vec<H>,
}

impl<H: BrushHandle> HandleBrushMap<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: H, brushes: Vec<NodeId>) {
        self.entries.push((handle, brushes));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn extract(&self) -> ExtractedHandles<H> {
        let mut brush_handles: Vec<(NodeId, Vec<H>)> = Vec::new();
        for (handle, brushes) in &self.entries {
            for brush in brushes {
                match brush_handles.iter_mut().find(|(id, _)| id == brush) {
                    Some((_, handles)) => {
                        if !handles.contains(handle) {
                            handles.push(handle.clone());
                        }
                    }
                    None => brush_handles.push((*brush, vec![handle.clone()])),
                }
            }
        }

        let brushes = brush_handles.iter().map(|(id, _)| *id).collect();
        let mut handles: Vec<H> = self.entries.iter().map(|(h, _)| h.clone()).collect();
        H::sort_and_dedup(&mut handles);
        ExtractedHandles {
            brushes,
            brush_handles,
            handles,
        }
    }
}

impl<H: BrushHandle> FromIterator<(H, Vec<NodeId>)> for HandleBrushMap<H> {
    fn from_iter<I: IntoIterator<Item = (H, Vec<NodeId>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
