//! Vertex-attribute binding resolution
//!
//! A [`VertexBinding`] says where each input a program declares lives inside a
//! submesh's vertex data. Bindings are created lazily the first time a
//! submesh is drawn with a program, cached on the submesh and never
//! invalidated. The backend builds one pipeline per [`BindingId`].

use crate::{
    error::RenderError,
    gfx::{
        resources::program::{Program, ProgramId},
        scene::mesh::Submesh,
    },
};

/// Globally unique binding identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// One program input mapped to submesh data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAttribute {
    pub location: u32,
    pub component_count: u32,
    /// Absolute byte offset in the mesh vertex buffer
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBinding {
    pub id: BindingId,
    pub program: ProgramId,
    /// In the order the program declares its inputs
    pub attributes: Vec<BoundAttribute>,
    /// Byte offset of the submesh's first vertex
    pub base_offset: u64,
    pub stride: u32,
}

impl VertexBinding {
    /// Attribute offset relative to the submesh's first vertex
    pub fn local_offset(&self, attribute: &BoundAttribute) -> u64 {
        attribute.offset - self.base_offset
    }
}

/// Hands out binding ids and fills submesh binding caches
#[derive(Debug, Default)]
pub struct BindingResolver {
    next_id: u32,
}

impl BindingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bindings created so far
    pub fn created(&self) -> u32 {
        self.next_id
    }

    /// Returns the binding of `submesh` for `program`, creating it on first use
    ///
    /// Fails when the program expects a location the submesh does not store.
    pub fn try_resolve<'a>(
        &mut self,
        submesh: &'a mut Submesh,
        program: &Program,
    ) -> Result<&'a VertexBinding, RenderError> {
        if let Some(index) = submesh
            .bindings
            .iter()
            .position(|(program_id, _)| *program_id == program.id)
        {
            return Ok(&submesh.bindings[index].1);
        }

        let mut attributes = Vec::with_capacity(program.inputs.len());
        for input in &program.inputs {
            let stored = submesh.layout.find(input.location).ok_or_else(|| {
                RenderError::MissingVertexAttribute {
                    program: program.name.clone(),
                    location: input.location,
                    available: submesh.layout.locations(),
                }
            })?;

            attributes.push(BoundAttribute {
                location: stored.location,
                component_count: stored.component_count,
                offset: stored.offset as u64 + submesh.vertex_offset,
            });
        }

        let binding = VertexBinding {
            id: BindingId(self.next_id),
            program: program.id,
            attributes,
            base_offset: submesh.vertex_offset,
            stride: submesh.layout.stride,
        };
        self.next_id += 1;

        log::debug!(
            "Created vertex binding {:?} for submesh '{}' with program '{}'",
            binding.id,
            submesh.name,
            program.name
        );

        submesh.bindings.push((program.id, binding));
        Ok(&submesh.bindings[submesh.bindings.len() - 1].1)
    }

    /// Like [`Self::try_resolve`], but a layout mismatch is fatal
    pub fn resolve<'a>(&mut self, submesh: &'a mut Submesh, program: &Program) -> &'a VertexBinding {
        match self.try_resolve(submesh, program) {
            Ok(binding) => binding,
            Err(err) => panic!("{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        resources::program::ProgramKind,
        scene::mesh::{Mesh, VertexBufferLayout},
    };

    fn two_submesh_mesh() -> Mesh {
        let mut mesh = Mesh::new("test");
        mesh.push_submesh("first", VertexBufferLayout::position_normal_uv(), &[0.0; 32], &[0, 1, 2]);
        mesh.push_submesh("second", VertexBufferLayout::position_normal_uv(), &[0.0; 24], &[0, 1, 2]);
        mesh
    }

    #[test]
    fn test_resolve_twice_returns_cached_binding() {
        let mut mesh = two_submesh_mesh();
        let program = Program::new(ProgramId(0), ProgramKind::Geometry);
        let mut resolver = BindingResolver::new();

        let first = resolver.resolve(&mut mesh.submeshes[0], &program).clone();
        let second = resolver.resolve(&mut mesh.submeshes[0], &program).clone();

        assert_eq!(first, second);
        assert_eq!(resolver.created(), 1);
        assert_eq!(mesh.submeshes[0].bindings.len(), 1);
    }

    #[test]
    fn test_two_programs_get_distinct_bindings() {
        let mut mesh = two_submesh_mesh();
        let geometry = Program::new(ProgramId(0), ProgramKind::Geometry);
        let gizmo = Program::new(ProgramId(1), ProgramKind::Gizmo);
        let mut resolver = BindingResolver::new();

        let a = resolver.resolve(&mut mesh.submeshes[0], &geometry).id;
        let b = resolver.resolve(&mut mesh.submeshes[0], &gizmo).id;

        assert_ne!(a, b);
        assert_eq!(mesh.submeshes[0].bindings.len(), 2);
    }

    #[test]
    fn test_binding_ids_unique_across_submeshes() {
        let mut mesh = two_submesh_mesh();
        let program = Program::new(ProgramId(0), ProgramKind::Geometry);
        let mut resolver = BindingResolver::new();

        let a = resolver.resolve(&mut mesh.submeshes[0], &program).id;
        let b = resolver.resolve(&mut mesh.submeshes[1], &program).id;
        assert_ne!(a, b);
    }

    #[test]
    fn test_offsets_include_submesh_base() {
        let mut mesh = two_submesh_mesh();
        let program = Program::new(ProgramId(0), ProgramKind::Geometry);
        let mut resolver = BindingResolver::new();

        let binding = resolver.resolve(&mut mesh.submeshes[1], &program);
        assert_eq!(binding.base_offset, 128);
        assert_eq!(binding.stride, 32);

        let offsets: Vec<u64> = binding.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![128, 140, 152]);
        assert_eq!(binding.local_offset(&binding.attributes[2]), 24);
    }

    #[test]
    fn test_missing_location_is_an_error() {
        let mut mesh = Mesh::new("quad");
        mesh.push_submesh("quad", VertexBufferLayout::position_uv(), &[0.0; 20], &[0, 1, 2]);
        let program = Program::new(ProgramId(0), ProgramKind::Geometry);
        let mut resolver = BindingResolver::new();

        let result = resolver.try_resolve(&mut mesh.submeshes[0], &program);
        assert!(matches!(
            result,
            Err(RenderError::MissingVertexAttribute { location: 2, .. })
        ));
        assert!(mesh.submeshes[0].bindings.is_empty());
    }

    #[test]
    #[should_panic(expected = "expects vertex attribute at location 2")]
    fn test_resolve_panics_on_missing_location() {
        let mut mesh = Mesh::new("quad");
        mesh.push_submesh("quad", VertexBufferLayout::position_uv(), &[0.0; 20], &[0, 1, 2]);
        let program = Program::new(ProgramId(0), ProgramKind::Geometry);

        BindingResolver::new().resolve(&mut mesh.submeshes[0], &program);
    }
}
