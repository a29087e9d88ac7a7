//! Mesh, submesh and material records
//!
//! A [`Mesh`] keeps every submesh in one interleaved vertex buffer and one
//! index buffer. Each submesh starts at its own byte offset in both and keeps
//! the vertex bindings resolved for it so far.

use crate::gfx::{
    backend::{MeshHandle, TextureHandle},
    binding::VertexBinding,
    resources::program::ProgramId,
};

/// Size of one index in the shared index buffer
pub const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// One attribute stored in a submesh's vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub component_count: u32,
    /// Byte offset inside one vertex
    pub offset: u32,
}

/// How one vertex of a submesh is laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayout {
    pub attributes: Vec<VertexAttribute>,
    pub stride: u32,
}

impl VertexBufferLayout {
    /// Builds a tightly packed float layout from `(location, component_count)` pairs
    pub fn packed(attributes: &[(u32, u32)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(location, component_count)| {
                let attribute = VertexAttribute {
                    location,
                    component_count,
                    offset,
                };
                offset += component_count * std::mem::size_of::<f32>() as u32;
                attribute
            })
            .collect();

        Self {
            attributes,
            stride: offset,
        }
    }

    /// position(3), normal(3), uv(2)
    pub fn position_normal_uv() -> Self {
        Self::packed(&[(0, 3), (1, 3), (2, 2)])
    }

    /// position(3), uv(2)
    pub fn position_uv() -> Self {
        Self::packed(&[(0, 3), (1, 2)])
    }

    pub fn find(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    pub fn locations(&self) -> Vec<u32> {
        self.attributes.iter().map(|a| a.location).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Submesh {
    pub name: String,
    pub layout: VertexBufferLayout,
    /// Byte offset of the first vertex in the mesh vertex buffer
    pub vertex_offset: u64,
    pub vertex_count: u32,
    /// Byte offset of the first index in the mesh index buffer
    pub index_offset: u64,
    pub index_count: u32,
    /// Bindings resolved for this submesh, at most one per program
    pub bindings: Vec<(ProgramId, VertexBinding)>,
}

impl Submesh {
    pub fn first_index(&self) -> u32 {
        (self.index_offset / INDEX_SIZE) as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub label: String,
    pub vertex_data: Vec<u8>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
    /// Set once the mesh has been uploaded
    pub handle: Option<MeshHandle>,
}

impl Mesh {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Appends a submesh whose indices are relative to its own first vertex
    pub fn push_submesh(
        &mut self,
        name: impl Into<String>,
        layout: VertexBufferLayout,
        vertices: &[f32],
        indices: &[u32],
    ) -> usize {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_offset = self.vertex_data.len() as u64;
        let index_offset = self.indices.len() as u64 * INDEX_SIZE;
        let vertex_count = vertex_bytes.len() as u32 / layout.stride.max(1);

        self.vertex_data.extend_from_slice(vertex_bytes);
        self.indices.extend_from_slice(indices);
        self.submeshes.push(Submesh {
            name: name.into(),
            layout,
            vertex_offset,
            vertex_count,
            index_offset,
            index_count: indices.len() as u32,
            bindings: Vec::new(),
        });

        self.submeshes.len() - 1
    }
}

/// Surface description used by the geometry pass
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub albedo: TextureHandle,
}

/// A mesh together with one material per submesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub name: String,
    pub mesh: usize,
    pub materials: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_layout_offsets_and_stride() {
        let layout = VertexBufferLayout::position_normal_uv();
        assert_eq!(layout.stride, 32);
        assert_eq!(layout.find(1).map(|a| a.offset), Some(12));
        assert_eq!(layout.find(2).map(|a| a.offset), Some(24));
        assert_eq!(VertexBufferLayout::position_uv().stride, 20);
    }

    #[test]
    fn test_submeshes_share_buffers_at_increasing_offsets() {
        let mut mesh = Mesh::new("pair");
        let triangle = [0.0f32; 24];
        mesh.push_submesh("a", VertexBufferLayout::position_normal_uv(), &triangle, &[0, 1, 2]);
        mesh.push_submesh("b", VertexBufferLayout::position_normal_uv(), &triangle, &[2, 1, 0]);

        let second = &mesh.submeshes[1];
        assert_eq!(second.vertex_offset, 96);
        assert_eq!(second.vertex_count, 3);
        assert_eq!(second.index_offset, 12);
        assert_eq!(second.first_index(), 3);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertex_data.len(), 192);
    }
}
