use std::collections::BTreeMap;

use bevy_math::{Vec2, Vec3};
use brushwork_geometry::Brush;
use brushwork_geometry::polyhedron::EdgeId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// A face as a run of corners in the vertex array.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFace {
    pub texture: String,
    pub face_index: usize,
    pub first_vertex: usize,
    pub vertex_count: usize,
}

/// An edge between two faces. Vertex indices refer to the brush's vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedEdge {
    pub face1: usize,
    pub face2: usize,
    pub vertex1: usize,
    pub vertex2: usize,
}

/// Renderer-facing data for one brush. Rebuilt as a whole on demand after an
/// invalidation; never patched in place.
#[derive(Debug, Clone, Default)]
pub struct BrushRenderCache {
    valid: bool,
    generation: u64,
    vertices: Vec<CachedVertex>,
    faces: Vec<CachedFace>,
    edges: Vec<CachedEdge>,
}

impl BrushRenderCache {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of rebuilds so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
        self.vertices.clear();
        self.faces.clear();
        self.edges.clear();
    }

    /// Rebuild from `brush` unless the cache is already valid.
    pub fn validate(&mut self, brush: &Brush) {
        if self.valid {
            return;
        }

        let polyhedron = brush.polyhedron();
        let mut vertices = Vec::new();
        let mut faces = Vec::with_capacity(brush.face_count());
        for (index, face) in brush.faces().iter().enumerate() {
            let positions = brush.face_positions(index);
            faces.push(CachedFace {
                texture: face.texture_name().to_owned(),
                face_index: index,
                first_vertex: vertices.len(),
                vertex_count: positions.len(),
            });
            vertices.extend(positions.into_iter().map(|position| CachedVertex {
                position,
                normal: face.normal(),
                uv: face.tex_coords(position),
            }));
        }

        let edges = polyhedron
            .edges()
            .iter()
            .enumerate()
            .map(|(e, edge)| {
                let first = &polyhedron.half_edges()[edge.first as usize];
                CachedEdge {
                    face1: polyhedron.first_face(e as EdgeId) as usize,
                    face2: polyhedron.second_face(e as EdgeId) as usize,
                    vertex1: first.origin as usize,
                    vertex2: polyhedron.destination(edge.first) as usize,
                }
            })
            .collect();

        self.vertices = vertices;
        self.faces = faces;
        self.edges = edges;
        self.valid = true;
        self.generation += 1;
    }

    pub fn vertices(&self) -> &[CachedVertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[CachedFace] {
        &self.faces
    }

    pub fn edges(&self) -> &[CachedEdge] {
        &self.edges
    }

    /// Faces grouped by texture name.
    pub fn faces_by_texture(&self) -> BTreeMap<&str, Vec<&CachedFace>> {
        let mut grouped: BTreeMap<&str, Vec<&CachedFace>> = BTreeMap::new();
        for face in &self.faces {
            grouped.entry(face.texture.as_str()).or_default().push(face);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use brushwork_geometry::{BBox3, BrushBuilder, TexCoordSystemKind};

    use super::*;

    fn cube() -> Brush {
        BrushBuilder::new(BBox3::centered(8192.0), TexCoordSystemKind::Paraxial)
            .create_cube(32.0, "brick")
            .unwrap()
    }

    #[test]
    fn validate_builds_everything() {
        let brush = cube();
        let mut cache = BrushRenderCache::default();
        assert!(!cache.is_valid());
        cache.validate(&brush);
        assert!(cache.is_valid());
        assert_eq!(cache.generation(), 1);
        assert_eq!(cache.faces().len(), 6);
        assert_eq!(cache.vertices().len(), 24);
        assert_eq!(cache.edges().len(), 12);
        for face in cache.faces() {
            assert_eq!(face.vertex_count, 4);
        }
        for edge in cache.edges() {
            assert_ne!(edge.face1, edge.face2);
            assert!(edge.vertex1 < 8 && edge.vertex2 < 8);
        }
    }

    #[test]
    fn validate_is_lazy_and_invalidate_drops_data() {
        let brush = cube();
        let mut cache = BrushRenderCache::default();
        cache.validate(&brush);
        cache.validate(&brush);
        assert_eq!(cache.generation(), 1);
        cache.invalidate();
        assert!(cache.vertices().is_empty());
        cache.validate(&brush);
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn faces_grouped_by_texture() {
        let mut brush = cube();
        brush.face_mut(0).unwrap().set_texture("metal");
        let mut cache = BrushRenderCache::default();
        cache.validate(&brush);
        let grouped = cache.faces_by_texture();
        assert_eq!(grouped["metal"].len(), 1);
        assert_eq!(grouped["brick"].len(), 5);
    }
}
