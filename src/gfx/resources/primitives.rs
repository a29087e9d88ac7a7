//! # Procedural Geometry
//!
//! Built-in shapes used when a model file cannot be loaded, plus the
//! full-screen quad shared by the resolve and composite passes.
//!
//! - **Cube**: stands in for entity models
//! - **Sphere**: point light gizmo
//! - **Pyramid**: directional light gizmo
//! - **Quad**: position(3) + uv(2), covering clip space

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3, Zero};

use crate::gfx::scene::mesh::{Mesh, VertexBufferLayout};

/// Generated geometry ready to be interleaved into a [`Mesh`]
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub tex_coords: Vec<[f32; 2]>,
    /// Normal vectors (x, y, z)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (counter-clockwise winding)
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves position, normal and uv with a 32 byte stride
    pub fn interleave(&self) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.vertices.len() * 8);
        for (i, position) in self.vertices.iter().enumerate() {
            data.extend_from_slice(position);
            data.extend_from_slice(&self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]));
            data.extend_from_slice(&self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]));
        }
        data
    }

    /// Wraps the geometry as a single-submesh mesh
    pub fn into_mesh(self, label: &str) -> Mesh {
        let mut mesh = Mesh::new(label);
        mesh.push_submesh(
            label,
            VertexBufferLayout::position_normal_uv(),
            &self.interleave(),
            &self.indices,
        );
        mesh
    }
}

/// Area-weighted vertex normals from triangle faces
pub fn compute_face_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals: Vec<Vector3<f32>> = vec![Vector3::zero(); positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let (pa, pb, pc) = (
            Vector3::from(positions[a]),
            Vector3::from(positions[b]),
            Vector3::from(positions[c]),
        );
        let face = (pb - pa).cross(pc - pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals
        .into_iter()
        .map(|n| {
            if n.magnitude2() > f32::EPSILON {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

/// Unit cube centered at the origin, vertices from -0.5 to 0.5
pub fn generate_cube() -> GeometryData {
    let mut data = GeometryData::new();

    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    for (normal, u_axis, v_axis) in faces {
        let base = data.vertices.len() as u32;
        let (n, u, v) = (
            Vector3::from(normal),
            Vector3::from(u_axis),
            Vector3::from(v_axis),
        );
        for [s, t] in corners {
            let position = n * 0.5 + u * (s - 0.5) + v * (t - 0.5);
            data.vertices.push(position.into());
            data.normals.push(normal);
            data.tex_coords.push([s, t]);
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    data
}

/// UV sphere of radius 1.0 centered at the origin
pub fn generate_sphere(longitude_segments: u32, latitude_segments: u32) -> GeometryData {
    let mut data = GeometryData::new();

    let long_segs = longitude_segments.max(3);
    let lat_segs = latitude_segments.max(2);

    for lat in 0..=lat_segs {
        let theta = lat as f32 * PI / lat_segs as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for long in 0..=long_segs {
            let phi = long as f32 * 2.0 * PI / long_segs as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            let position = [sin_theta * cos_phi, cos_theta, sin_theta * sin_phi];
            data.vertices.push(position);
            data.normals.push(position);
            data.tex_coords
                .push([long as f32 / long_segs as f32, lat as f32 / lat_segs as f32]);
        }
    }

    for lat in 0..lat_segs {
        for long in 0..long_segs {
            let first = lat * (long_segs + 1) + long;
            let second = first + long_segs + 1;

            data.indices.extend_from_slice(&[first, first + 1, second]);
            data.indices.extend_from_slice(&[second, first + 1, second + 1]);
        }
    }

    data
}

/// Square pyramid with its apex on +X, one unit long
pub fn generate_pyramid() -> GeometryData {
    let apex = [0.5, 0.0, 0.0];
    let base = [
        [-0.5, -0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, 0.5, 0.5],
        [-0.5, -0.5, 0.5],
    ];

    let mut data = GeometryData::new();
    let mut push_triangle = |corners: [[f32; 3]; 3]| {
        let start = data.vertices.len() as u32;
        let face = compute_face_normals(&corners, &[0, 1, 2]);
        for (i, corner) in corners.iter().enumerate() {
            data.vertices.push(*corner);
            data.normals.push(face[i]);
            data.tex_coords.push([[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]][i]);
        }
        data.indices.extend_from_slice(&[start, start + 1, start + 2]);
    };

    for i in 0..4 {
        push_triangle([base[i], base[(i + 1) % 4], apex]);
    }
    push_triangle([base[0], base[3], base[2]]);
    push_triangle([base[2], base[1], base[0]]);

    data
}

/// Two triangles covering clip space, with uv (0, 0) at the top left
pub fn fullscreen_quad() -> Mesh {
    #[rustfmt::skip]
    let vertices: [f32; 20] = [
        -1.0, -1.0, 0.0,   0.0, 1.0,
         1.0, -1.0, 0.0,   1.0, 1.0,
         1.0,  1.0, 0.0,   1.0, 0.0,
        -1.0,  1.0, 0.0,   0.0, 0.0,
    ];

    let mut mesh = Mesh::new("fullscreen quad");
    mesh.push_submesh(
        "fullscreen quad",
        VertexBufferLayout::position_uv(),
        &vertices,
        &[0, 1, 2, 0, 2, 3],
    );
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(data: &GeometryData) {
        for triangle in data.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                .map(|i| Vector3::from(data.vertices[i as usize]));
            let face = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(face.dot(center) > 0.0, "triangle {:?} faces inwards", triangle);
        }
    }

    #[test]
    fn test_cube_generation() {
        let cube = generate_cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert_outward(&cube);
    }

    #[test]
    fn test_sphere_generation() {
        let sphere = generate_sphere(8, 6);
        assert_eq!(sphere.vertex_count(), 9 * 7);
        assert_eq!(sphere.triangle_count(), 8 * 6 * 2);
        assert_eq!(sphere.vertices.len(), sphere.normals.len());
        assert_eq!(sphere.vertices.len(), sphere.tex_coords.len());
    }

    #[test]
    fn test_pyramid_generation() {
        let pyramid = generate_pyramid();
        assert_eq!(pyramid.triangle_count(), 6);
        assert_outward(&pyramid);
    }

    #[test]
    fn test_face_normals() {
        let normals = compute_face_normals(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [5.0, 5.0, 5.0]],
            &[0, 1, 2],
        );
        assert_eq!(normals[0], [0.0, 0.0, 1.0]);
        // unreferenced vertices fall back to +Y
        assert_eq!(normals[3], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_into_mesh_interleaves_with_32_byte_stride() {
        let mesh = generate_cube().into_mesh("cube");
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.submeshes[0].layout.stride, 32);
        assert_eq!(mesh.vertex_data.len(), 24 * 32);
        assert_eq!(mesh.submeshes[0].index_count, 36);
    }

    #[test]
    fn test_quad_uses_position_uv_layout() {
        let quad = fullscreen_quad();
        assert_eq!(quad.submeshes[0].layout.stride, 20);
        assert_eq!(quad.submeshes[0].vertex_count, 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 0, 2, 3]);
    }
}
