//! Simple closed source meshes, handy for tests, benchmarks and demos.

use std::f64::consts::PI;

use nalgebra::Point3;

use crate::scene::SourceMesh;

/// Axis-aligned cube of edge `size` centered at the origin.
///
/// 8 vertices and 12 triangles, counter-clockwise seen from outside.
#[must_use]
pub fn cube(name: &str, size: f64) -> SourceMesh {
    let h = size / 2.0;
    let positions = vec![
        Point3::new(-h, -h, -h),
        Point3::new(h, -h, -h),
        Point3::new(h, h, -h),
        Point3::new(-h, h, -h),
        Point3::new(-h, -h, h),
        Point3::new(h, -h, h),
        Point3::new(h, h, h),
        Point3::new(-h, h, h),
    ];
    let faces = vec![
        // -Z
        [0, 2, 1],
        [0, 3, 2],
        // +Z
        [4, 5, 6],
        [4, 6, 7],
        // -Y
        [0, 1, 5],
        [0, 5, 4],
        // +Y
        [3, 7, 6],
        [3, 6, 2],
        // -X
        [0, 4, 7],
        [0, 7, 3],
        // +X
        [1, 2, 6],
        [1, 6, 5],
    ];
    SourceMesh::new(name, positions, faces)
}

/// Latitude/longitude sphere with poles on the y axis.
///
/// `segments` is clamped to at least 3 and `rings` to at least 2.
#[must_use]
pub fn uv_sphere(name: &str, center: Point3<f64>, radius: f64, segments: usize, rings: usize) -> SourceMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut positions = Vec::with_capacity(segments * (rings - 1) + 2);
    positions.push(center + nalgebra::Vector3::new(0.0, radius, 0.0));
    for i in 1..rings {
        let phi = PI * i as f64 / rings as f64;
        let (rho, y) = (radius * phi.sin(), radius * phi.cos());
        for j in 0..segments {
            let theta = 2.0 * PI * j as f64 / segments as f64;
            positions.push(center + nalgebra::Vector3::new(rho * theta.cos(), y, -rho * theta.sin()));
        }
    }
    positions.push(center + nalgebra::Vector3::new(0.0, -radius, 0.0));

    let north = 0u32;
    let south = (positions.len() - 1) as u32;
    let ring = |i: usize, j: usize| (1 + i * segments + j % segments) as u32;

    let mut faces = Vec::with_capacity(2 * segments * (rings - 1));
    for j in 0..segments {
        faces.push([north, ring(0, j), ring(0, j + 1)]);
    }
    for i in 0..rings - 2 {
        for j in 0..segments {
            faces.push([ring(i, j), ring(i + 1, j), ring(i + 1, j + 1)]);
            faces.push([ring(i, j), ring(i + 1, j + 1), ring(i, j + 1)]);
        }
    }
    for j in 0..segments {
        faces.push([ring(rings - 2, j), south, ring(rings - 2, j + 1)]);
    }

    SourceMesh::new(name, positions, faces)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::halfedge::HalfEdgeMesh;

    fn signed_volume(mesh: &SourceMesh) -> f64 {
        mesh.faces
            .iter()
            .map(|f| {
                let [a, b, c] = f.map(|i| mesh.positions[i as usize].coords);
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    #[test]
    fn test_cube_is_closed_and_outward() {
        let mesh = cube("c", 2.0);
        let he = HalfEdgeMesh::from_triangles(&mesh.positions, &mesh.faces, 1e-10);
        assert!(he.halfedges().iter().all(|h| !h.is_boundary()));
        assert!((signed_volume(&mesh) - 8.0).abs() < 1e-10);
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let mesh = uv_sphere("s", Point3::origin(), 1.0, 12, 8);
        assert_eq!(mesh.positions.len(), 12 * 7 + 2);
        assert_eq!(mesh.faces.len(), 2 * 12 * 7);
        let he = HalfEdgeMesh::from_triangles(&mesh.positions, &mesh.faces, 1e-10);
        assert!(he.halfedges().iter().all(|h| !h.is_boundary()));
        let volume = signed_volume(&mesh);
        assert!(volume > 3.0 && volume < 4.0 * PI / 3.0);
    }
}
