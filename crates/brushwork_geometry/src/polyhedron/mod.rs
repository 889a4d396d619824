//! Half-edge boundary representation of a convex solid.
//!
//! Index-based arena storage: every id indexes into the corresponding element
//! vector, so a polyhedron can be cloned and compared by value. A polyhedron is
//! only ever built from a point cloud through the convex hull, which keeps it
//! closed and convex; edits produce a new polyhedron instead of patching links.

mod hull;

use std::collections::HashMap;

use bevy_math::{DVec3, Vec3};

use crate::{BBox3, BrushError, BrushPlane, EPSILON, PointStatus, Polygon3, Segment3, tolerance};

/// Index into the vertex array.
pub type VertexId = u32;
/// Index into the half-edge array.
pub type HalfEdgeId = u32;
/// Index into the edge array.
pub type EdgeId = u32;
/// Index into the face array.
pub type FaceId = u32;

/// Sentinel for an unset link.
pub const INVALID: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    /// One outgoing half-edge.
    pub half_edge: HalfEdgeId,
    /// Scratch slot for rebuild algorithms. After a hull build it holds the
    /// index of the input point this vertex came from.
    pub payload: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfEdge {
    pub origin: VertexId,
    pub twin: HalfEdgeId,
    /// Next half-edge around the face (counter-clockwise seen from outside).
    pub next: HalfEdgeId,
    pub prev: HalfEdgeId,
    pub face: FaceId,
    pub edge: EdgeId,
}

/// A full edge: the two opposing half-edges. The face of `first` is the edge's
/// first face, the face of `second` its second face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub first: HalfEdgeId,
    pub second: HalfEdgeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// One half-edge of the boundary loop.
    pub boundary: HalfEdgeId,
    pub plane: BrushPlane,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyhedron {
    vertices: Vec<Vertex>,
    half_edges: Vec<HalfEdge>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    bounds: BBox3,
}

impl Polyhedron {
    /// Convex hull of `points`. Fails with [`BrushError::Degenerate`] when the
    /// points do not span a volume.
    pub fn from_points(points: &[Vec3]) -> Result<Self, BrushError> {
        let mesh = hull::convex_hull(points)?;
        Self::from_loops(&mesh.positions, &mesh.sources, &mesh.faces)
    }

    fn from_loops(positions: &[Vec3], sources: &[usize], loops: &[Vec<usize>]) -> Result<Self, BrushError> {
        let mut vertices: Vec<Vertex> = positions
            .iter()
            .zip(sources)
            .map(|(&position, &source)| Vertex {
                position,
                half_edge: INVALID,
                payload: Some(source),
            })
            .collect();

        let mut half_edges: Vec<HalfEdge> = Vec::new();
        let mut faces: Vec<Face> = Vec::with_capacity(loops.len());
        // Directed edge (from, to) -> half-edge, for twin linking
        let mut edge_map: HashMap<(u32, u32), HalfEdgeId> = HashMap::new();

        for (fi, face_loop) in loops.iter().enumerate() {
            let n = face_loop.len();
            if n < 3 {
                return Err(BrushError::Degenerate);
            }
            let base = half_edges.len() as HalfEdgeId;
            for i in 0..n {
                let from = face_loop[i] as VertexId;
                let to = face_loop[(i + 1) % n] as VertexId;
                let id = base + i as u32;
                half_edges.push(HalfEdge {
                    origin: from,
                    twin: INVALID,
                    next: base + ((i + 1) % n) as u32,
                    prev: base + ((i + n - 1) % n) as u32,
                    face: fi as FaceId,
                    edge: INVALID,
                });
                if vertices[from as usize].half_edge == INVALID {
                    vertices[from as usize].half_edge = id;
                }
                if edge_map.insert((from, to), id).is_some() {
                    return Err(BrushError::Degenerate);
                }
            }

            let loop_positions: Vec<Vec3> = face_loop.iter().map(|&v| positions[v]).collect();
            faces.push(Face {
                boundary: base,
                plane: newell_plane(&loop_positions).ok_or(BrushError::Degenerate)?,
            });
        }

        let mut edges: Vec<Edge> = Vec::with_capacity(half_edges.len() / 2);
        for id in 0..half_edges.len() {
            if half_edges[id].edge != INVALID {
                continue;
            }
            let from = half_edges[id].origin;
            let to = half_edges[half_edges[id].next as usize].origin;
            let Some(&twin) = edge_map.get(&(to, from)) else {
                return Err(BrushError::Degenerate);
            };
            let edge = edges.len() as EdgeId;
            edges.push(Edge {
                first: id as HalfEdgeId,
                second: twin,
            });
            half_edges[id].twin = twin;
            half_edges[id].edge = edge;
            half_edges[twin as usize].twin = id as HalfEdgeId;
            half_edges[twin as usize].edge = edge;
        }

        let bounds = BBox3::from_points(positions.iter().copied());
        Ok(Self {
            vertices,
            half_edges,
            edges,
            faces,
            bounds,
        })
    }

    // ------------------------------------------------------------------
    // Element access
    // ------------------------------------------------------------------

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn half_edges(&self) -> &[HalfEdge] {
        &self.half_edges
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn bounds(&self) -> BBox3 {
        self.bounds
    }

    pub fn vertex_positions(&self) -> Vec<Vec3> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Mean of all vertex positions; always strictly inside a convex solid.
    pub fn center(&self) -> Vec3 {
        self.vertices.iter().map(|v| v.position).sum::<Vec3>() / self.vertices.len().max(1) as f32
    }

    pub fn destination(&self, half_edge: HalfEdgeId) -> VertexId {
        let next = self.half_edges[half_edge as usize].next;
        self.half_edges[next as usize].origin
    }

    pub fn first_face(&self, edge: EdgeId) -> FaceId {
        self.half_edges[self.edges[edge as usize].first as usize].face
    }

    pub fn second_face(&self, edge: EdgeId) -> FaceId {
        self.half_edges[self.edges[edge as usize].second as usize].face
    }

    pub fn edge_segment(&self, edge: EdgeId) -> Segment3 {
        let first = self.edges[edge as usize].first;
        let a = self.half_edges[first as usize].origin;
        let b = self.destination(first);
        Segment3::new(
            self.vertices[a as usize].position,
            self.vertices[b as usize].position,
        )
    }

    pub fn edge_segments(&self) -> Vec<Segment3> {
        (0..self.edges.len() as EdgeId).map(|e| self.edge_segment(e)).collect()
    }

    /// Vertex ids of a face boundary, in winding order.
    pub fn face_vertices(&self, face: FaceId) -> Vec<VertexId> {
        let start = self.faces[face as usize].boundary;
        let mut result = Vec::new();
        let mut current = start;
        loop {
            let he = &self.half_edges[current as usize];
            result.push(he.origin);
            current = he.next;
            if current == start {
                break;
            }
        }
        result
    }

    pub fn face_positions(&self, face: FaceId) -> Vec<Vec3> {
        self.face_vertices(face)
            .into_iter()
            .map(|v| self.vertices[v as usize].position)
            .collect()
    }

    pub fn face_polygon(&self, face: FaceId) -> Polygon3 {
        Polygon3::new(self.face_positions(face))
    }

    pub fn face_polygons(&self) -> Vec<Polygon3> {
        (0..self.faces.len() as FaceId).map(|f| self.face_polygon(f)).collect()
    }

    pub fn face_plane(&self, face: FaceId) -> BrushPlane {
        self.faces[face as usize].plane
    }

    /// Faces around a vertex, walking outgoing half-edges through their twins.
    pub fn vertex_faces(&self, vertex: VertexId) -> Vec<FaceId> {
        let start = self.vertices[vertex as usize].half_edge;
        let mut result = Vec::new();
        let mut current = start;
        loop {
            let he = &self.half_edges[current as usize];
            result.push(he.face);
            current = self.half_edges[he.prev as usize].twin;
            if current == start || current == INVALID || result.len() > self.faces.len() {
                break;
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Handle lookup
    // ------------------------------------------------------------------

    /// Vertex within `tolerance` of `position`. A zero tolerance means exact.
    pub fn find_vertex(&self, position: Vec3, tolerance: f32) -> Option<VertexId> {
        self.vertices
            .iter()
            .position(|v| v.position == position || v.position.distance(position) <= tolerance)
            .map(|i| i as VertexId)
    }

    pub fn find_edge(&self, segment: &Segment3) -> Option<EdgeId> {
        (0..self.edges.len() as EdgeId).find(|&e| self.edge_segment(e) == *segment)
    }

    pub fn find_face(&self, polygon: &Polygon3) -> Option<FaceId> {
        (0..self.faces.len() as FaceId).find(|&f| self.face_polygon(f) == *polygon)
    }

    pub fn has_vertex(&self, position: Vec3) -> bool {
        self.find_vertex(position, 0.0).is_some()
    }

    pub fn has_edge(&self, segment: &Segment3) -> bool {
        self.find_edge(segment).is_some()
    }

    pub fn has_face(&self, polygon: &Polygon3) -> bool {
        self.find_face(polygon).is_some()
    }

    // ------------------------------------------------------------------
    // Spatial queries
    // ------------------------------------------------------------------

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.faces
            .iter()
            .all(|f| f.plane.point_status(point) != PointStatus::Above)
    }

    /// Whether `other` lies completely inside this solid.
    pub fn contains(&self, other: &Polyhedron) -> bool {
        other.vertices.iter().all(|v| self.contains_point(v.position))
    }

    /// Largest absolute coordinate of the bounds.
    fn magnitude(&self) -> f32 {
        self.bounds.min.abs().max(self.bounds.max.abs()).max_element()
    }

    /// Separating-axis test over both face normal sets and every pair of edge
    /// directions. Touching solids intersect.
    pub fn intersects(&self, other: &Polyhedron) -> bool {
        if !self.bounds.intersects(&other.bounds) {
            return false;
        }

        let mut axes: Vec<Vec3> = self.faces.iter().map(|f| f.plane.normal).collect();
        axes.extend(other.faces.iter().map(|f| f.plane.normal));
        for a in self.edge_directions() {
            for b in other.edge_directions() {
                let axis = a.cross(b);
                if axis.length_squared() > EPSILON * EPSILON {
                    axes.push(axis.normalize());
                }
            }
        }

        let epsilon = tolerance(self.magnitude().max(other.magnitude()));
        axes.iter().all(|axis| {
            let (min_a, max_a) = self.project(*axis);
            let (min_b, max_b) = other.project(*axis);
            max_a >= min_b - epsilon && max_b >= min_a - epsilon
        })
    }

    fn edge_directions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.edges.iter().map(|e| {
            let origin = self.half_edges[e.first as usize].origin;
            let dest = self.destination(e.first);
            self.vertices[dest as usize].position - self.vertices[origin as usize].position
        })
    }

    fn project(&self, axis: Vec3) -> (f32, f32) {
        self.vertices
            .iter()
            .map(|v| v.position.dot(axis))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)))
    }

    // ------------------------------------------------------------------
    // Validity
    // ------------------------------------------------------------------

    /// Every half-edge has a consistent twin and V - E + F = 2.
    pub fn is_closed(&self) -> bool {
        let linked = self.half_edges.iter().enumerate().all(|(id, he)| {
            he.twin != INVALID && self.half_edges[he.twin as usize].twin == id as HalfEdgeId
        });
        let euler = self.vertices.len() as i64 - self.edges.len() as i64 + self.faces.len() as i64;
        linked && euler == 2
    }

    /// No vertex lies outside any face plane and every face is planar.
    pub fn is_convex(&self) -> bool {
        self.faces.iter().all(|f| {
            self.vertices
                .iter()
                .all(|v| f.plane.point_status(v.position) != PointStatus::Above)
        }) && (0..self.faces.len() as FaceId).all(|f| {
            let plane = self.face_plane(f);
            self.face_positions(f)
                .iter()
                .all(|p| plane.point_status(*p) == PointStatus::Inside)
        })
    }
}

/// Plane of a (possibly slightly non-planar) loop by Newell's method, taken
/// relative to the loop centroid.
fn newell_plane(loop_positions: &[Vec3]) -> Option<BrushPlane> {
    let n = loop_positions.len();
    let centroid = loop_positions.iter().map(|p| p.as_dvec3()).sum::<DVec3>() / n as f64;
    let mut normal = DVec3::ZERO;
    for i in 0..n {
        let a = loop_positions[i].as_dvec3() - centroid;
        let b = loop_positions[(i + 1) % n].as_dvec3() - centroid;
        normal += DVec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    let normal = normal.try_normalize()?;
    Some(BrushPlane::through(normal, centroid))
}
