//! Convex hull of a point cloud, produced as polygon face loops.
//!
//! Every plane through three input points that has all other points on one
//! side is a supporting plane; the points lying on it form a face. Points that
//! are not corners of at least three faces (edge or face interiors) are dropped.
//! Brushes have few vertices, so the cubic enumeration is cheap and it needs no
//! special handling for coplanar or collinear input.
//!
//! Candidate planes are evaluated in f64 relative to one of their defining
//! points, so classification does not degrade with distance from the origin.

use bevy_math::{DVec3, Vec3};
use tracing::trace;

use crate::{BrushError, BrushPlane, tolerance};

/// Hull output: unique positions, the input index each position came from, and
/// counter-clockwise (seen from outside) face loops indexing into `positions`.
#[derive(Debug, Clone)]
pub(crate) struct HullMesh {
    pub positions: Vec<Vec3>,
    pub sources: Vec<usize>,
    pub faces: Vec<Vec<usize>>,
}

/// Build the convex hull of `input`.
pub(crate) fn convex_hull(input: &[Vec3]) -> Result<HullMesh, BrushError> {
    if input.is_empty() {
        return Err(BrushError::EmptyInput);
    }

    if input.iter().any(|p| !p.is_finite()) {
        return Err(BrushError::Degenerate);
    }
    let magnitude = input.iter().map(|p| p.abs().max_element()).fold(0.0, f32::max);
    let epsilon = tolerance(magnitude);

    // Deduplicate, remembering where each point came from
    let mut points: Vec<Vec3> = Vec::with_capacity(input.len());
    let mut sources: Vec<usize> = Vec::with_capacity(input.len());
    for (index, p) in input.iter().enumerate() {
        if points.iter().all(|q| q.distance(*p) >= epsilon) {
            points.push(*p);
            sources.push(index);
        }
    }
    if points.len() < 4 {
        return Err(BrushError::Degenerate);
    }

    let faces = supporting_faces(&points, f64::from(epsilon));
    if faces.len() < 4 {
        return Err(BrushError::Degenerate);
    }

    // Corners are the points shared by at least three faces
    let mut face_count = vec![0usize; points.len()];
    for (_, on_plane) in &faces {
        for &p in on_plane {
            face_count[p] += 1;
        }
    }

    let mut loops = Vec::with_capacity(faces.len());
    for (plane, on_plane) in &faces {
        let mut corners: Vec<usize> = on_plane.iter().copied().filter(|&p| face_count[p] >= 3).collect();
        if corners.len() < 3 {
            return Err(BrushError::Degenerate);
        }
        sort_by_winding(&points, &mut corners, plane.normal);
        loops.push(corners);
    }

    trace!(points = points.len(), faces = loops.len(), "convex hull built");

    Ok(compact(&points, &sources, loops))
}

/// Enumerate supporting planes, keeping only maximal on-plane point sets.
fn supporting_faces(points: &[Vec3], epsilon: f64) -> Vec<(BrushPlane, Vec<usize>)> {
    let wide: Vec<DVec3> = points.iter().map(|p| p.as_dvec3()).collect();
    let n = points.len();
    let mut faces: Vec<(BrushPlane, Vec<usize>)> = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                // Three points of a known face reproduce that face
                if faces.iter().any(|(_, set)| {
                    set.binary_search(&i).is_ok() && set.binary_search(&j).is_ok() && set.binary_search(&k).is_ok()
                }) {
                    continue;
                }
                let origin = wide[i];
                let normal = (wide[j] - origin).cross(wide[k] - origin).normalize_or_zero();
                if normal.length_squared() < 0.5 {
                    continue;
                }

                let mut above = false;
                let mut below = false;
                let mut on_plane = Vec::new();
                for (m, p) in wide.iter().enumerate() {
                    let d = normal.dot(*p - origin);
                    if d > epsilon {
                        above = true;
                    } else if d < -epsilon {
                        below = true;
                    } else {
                        on_plane.push(m);
                    }
                    if above && below {
                        break;
                    }
                }
                if above == below {
                    // Either a separating plane or all points are coplanar
                    continue;
                }
                let plane = BrushPlane::through(if above { -normal } else { normal }, origin);

                if faces
                    .iter()
                    .any(|(_, set)| on_plane.iter().all(|m| set.binary_search(m).is_ok()))
                {
                    continue;
                }
                faces.retain(|(_, set)| !set.iter().all(|m| on_plane.binary_search(m).is_ok()));
                faces.push((plane, on_plane));
            }
        }
    }
    faces
}

/// Sort indices counter-clockwise around `normal`.
fn sort_by_winding(points: &[Vec3], indices: &mut [usize], normal: Vec3) {
    if indices.len() < 3 {
        return;
    }
    let centroid: Vec3 = indices.iter().map(|&i| points[i]).sum::<Vec3>() / indices.len() as f32;
    let up = if normal.y.abs() >= normal.x.abs() && normal.y.abs() >= normal.z.abs() {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let u_axis = normal.cross(up).normalize_or_zero();
    let v_axis = normal.cross(u_axis).normalize_or_zero();

    indices.sort_by(|&a, &b| {
        let da = points[a] - centroid;
        let db = points[b] - centroid;
        let angle_a = da.dot(v_axis).atan2(da.dot(u_axis));
        let angle_b = db.dot(v_axis).atan2(db.dot(u_axis));
        angle_a.total_cmp(&angle_b)
    });
}

fn compact(points: &[Vec3], sources: &[usize], mut loops: Vec<Vec<usize>>) -> HullMesh {
    let mut remap = vec![usize::MAX; points.len()];
    let mut positions = Vec::new();
    let mut kept_sources = Vec::new();
    for face in &mut loops {
        for v in face.iter_mut() {
            if remap[*v] == usize::MAX {
                remap[*v] = positions.len();
                positions.push(points[*v]);
                kept_sources.push(sources[*v]);
            }
            *v = remap[*v];
        }
    }
    HullMesh {
        positions,
        sources: kept_sources,
        faces: loops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_points() -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push(Vec3::new(x, y, z));
                }
            }
        }
        points
    }

    #[test]
    fn cube_hull_has_six_quads() {
        let hull = convex_hull(&cube_points()).unwrap();
        assert_eq!(hull.positions.len(), 8);
        assert_eq!(hull.faces.len(), 6);
        assert!(hull.faces.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn interior_and_duplicate_points_are_dropped() {
        let mut points = cube_points();
        points.push(Vec3::splat(0.5));
        points.push(Vec3::ONE);
        let hull = convex_hull(&points).unwrap();
        assert_eq!(hull.positions.len(), 8);
        assert!(!hull.sources.contains(&8));
        assert!(!hull.sources.contains(&9));
    }

    #[test]
    fn points_on_edges_and_faces_are_not_corners() {
        let mut points = cube_points();
        points.extend([
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(2.0, 1.0, 1.0),
            Vec3::new(0.5, 0.5, 0.0),
        ]);
        let hull = convex_hull(&points).unwrap();
        assert_eq!(hull.positions.len(), 8);
        assert_eq!(hull.faces.len(), 6);
        assert!(hull.positions.iter().all(|p| p.x != 1.0 && p.x != 0.5));
    }

    #[test]
    fn winding_is_outward() {
        let hull = convex_hull(&cube_points()).unwrap();
        let center = Vec3::splat(0.5);
        for face in &hull.faces {
            let p = |i: usize| hull.positions[face[i]];
            let normal = (p(1) - p(0)).cross(p(2) - p(0));
            assert!(normal.dot(p(0) - center) > 0.0);
        }
    }

    #[test]
    fn tetrahedron() {
        let hull = convex_hull(&[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z]).unwrap();
        assert_eq!(hull.positions.len(), 4);
        assert_eq!(hull.faces.len(), 4);
        assert!(hull.faces.iter().all(|f| f.len() == 3));
    }

    #[test]
    fn far_rotated_cube_keeps_quad_faces() {
        let rotation = bevy_math::Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalize(), 0.3);
        let center = Vec3::splat(6000.0);
        let points: Vec<Vec3> = cube_points()
            .into_iter()
            .map(|p| center + rotation * ((p - Vec3::splat(0.5)) * 64.0))
            .collect();
        let hull = convex_hull(&points).unwrap();
        assert_eq!(hull.positions.len(), 8);
        assert_eq!(hull.faces.len(), 6);
        assert!(hull.faces.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn flat_input_is_degenerate() {
        let points = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
        assert_eq!(convex_hull(&points).unwrap_err(), BrushError::Degenerate);
        assert_eq!(convex_hull(&[]).unwrap_err(), BrushError::EmptyInput);
    }
}
