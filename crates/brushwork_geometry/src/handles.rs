//! Position-based handles for vertices, edges and faces.
//!
//! Handles identify brush elements by their geometry rather than by index, so
//! they survive a rebuild of the underlying mesh as long as the element itself
//! does. Equality is exact; ordering is a total lexicographic order so handle
//! lists can be sorted and deduplicated.

use std::cmp::Ordering;

use bevy_math::Vec3;

/// Total lexicographic order on positions.
pub fn cmp_vec3(a: &Vec3, b: &Vec3) -> Ordering {
    a.x.total_cmp(&b.x)
        .then_with(|| a.y.total_cmp(&b.y))
        .then_with(|| a.z.total_cmp(&b.z))
}

/// Sort positions lexicographically and drop exact duplicates.
pub fn sort_and_dedup_vec3(points: &mut Vec<Vec3>) {
    points.sort_by(cmp_vec3);
    points.dedup();
}

/// An edge handle. The endpoints are stored in ascending order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment3 {
    start: Vec3,
    end: Vec3,
}

impl Segment3 {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        if cmp_vec3(&a, &b) == Ordering::Greater {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn end(&self) -> Vec3 {
        self.end
    }

    pub fn vertices(&self) -> [Vec3; 2] {
        [self.start, self.end]
    }

    pub fn center(&self) -> Vec3 {
        (self.start + self.end) * 0.5
    }

    pub fn translated(&self, delta: Vec3) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }
}

impl Eq for Segment3 {}

impl Ord for Segment3 {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_vec3(&self.start, &other.start).then_with(|| cmp_vec3(&self.end, &other.end))
    }
}

impl PartialOrd for Segment3 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A face handle: the face's vertex loop, rotated so the smallest vertex comes first.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon3 {
    vertices: Vec<Vec3>,
}

impl Polygon3 {
    pub fn new(mut vertices: Vec<Vec3>) -> Self {
        if let Some(first) = vertices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| cmp_vec3(a, b))
            .map(|(i, _)| i)
        {
            vertices.rotate_left(first);
        }
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn center(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        self.vertices.iter().copied().sum::<Vec3>() / self.vertices.len() as f32
    }

    pub fn translated(&self, delta: Vec3) -> Self {
        Self::new(self.vertices.iter().map(|v| *v + delta).collect())
    }

    /// Whether both polygons have the same vertices, ignoring winding and start.
    pub fn has_same_vertices(&self, other: &Polygon3) -> bool {
        let mut a = self.vertices.clone();
        let mut b = other.vertices.clone();
        sort_and_dedup_vec3(&mut a);
        sort_and_dedup_vec3(&mut b);
        a == b
    }
}

impl Eq for Polygon3 {}

impl Ord for Polygon3 {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.vertices.iter().zip(&other.vertices) {
            match cmp_vec3(a, b) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        self.vertices.len().cmp(&other.vertices.len())
    }
}

impl PartialOrd for Polygon3 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Collect every vertex of the given segments, sorted and deduplicated.
pub fn segment_vertices<'a>(segments: impl IntoIterator<Item = &'a Segment3>) -> Vec<Vec3> {
    let mut result: Vec<Vec3> = segments.into_iter().flat_map(|s| s.vertices()).collect();
    sort_and_dedup_vec3(&mut result);
    result
}

/// Collect every vertex of the given polygons, sorted and deduplicated.
pub fn polygon_vertices<'a>(polygons: impl IntoIterator<Item = &'a Polygon3>) -> Vec<Vec3> {
    let mut result: Vec<Vec3> = polygons
        .into_iter()
        .flat_map(|p| p.vertices().iter().copied())
        .collect();
    sort_and_dedup_vec3(&mut result);
    result
}
