//! Recorded frame commands
//!
//! The dispatcher records each pass as a [`RenderPassRecord`]; backends turn
//! the records into GPU work. Recording keeps the draw sequencing testable
//! without a device.

use bytemuck::{Pod, Zeroable};

use crate::gfx::{
    aligned_buffer::{Channel, ParameterBlock},
    backend::{AttachmentSetHandle, MeshHandle, TextureHandle},
    binding::VertexBinding,
    framebuffer::Attachment,
    resources::program::ProgramId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    GBuffer,
    DeferredResolve,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Offscreen(AttachmentSetHandle),
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRef {
    Image(TextureHandle),
    Attachment {
        set: AttachmentSetHandle,
        attachment: Attachment,
    },
}

/// Per-draw uniforms of a light gizmo, mirrored by `gizmo.wgsl`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GizmoUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub color: [f32; 3],
    pub _padding: f32,
}

/// Per-draw uniforms of the composite pass, mirrored by `composite.wgsl`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositeUniforms {
    pub is_depth: u32,
    pub near: f32,
    pub far: f32,
    pub _padding: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawUniforms {
    Gizmo(GizmoUniforms),
    Composite(CompositeUniforms),
}

impl DrawUniforms {
    pub fn bytes(&self) -> &[u8] {
        match self {
            DrawUniforms::Gizmo(uniforms) => bytemuck::bytes_of(uniforms),
            DrawUniforms::Composite(uniforms) => bytemuck::bytes_of(uniforms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    UseProgram(ProgramId),
    BindParameterBlock {
        slot: u32,
        channel: Channel,
        block: ParameterBlock,
    },
    BindTexture {
        unit: u32,
        texture: TextureRef,
    },
    SetDrawUniforms(DrawUniforms),
    BindVertices {
        mesh: MeshHandle,
        binding: VertexBinding,
    },
    DrawIndexed {
        first_index: u32,
        index_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassRecord {
    pub kind: PassKind,
    pub target: PassTarget,
    pub clear_color: [f32; 4],
    pub depth_test: bool,
    pub commands: Vec<DrawCommand>,
}

impl RenderPassRecord {
    pub fn new(kind: PassKind, target: PassTarget, clear_color: [f32; 4], depth_test: bool) -> Self {
        Self {
            kind,
            target,
            clear_color,
            depth_test,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawIndexed { .. }))
            .count()
    }

    /// Textures bound in this pass, in bind order
    pub fn bound_textures(&self) -> impl Iterator<Item = (u32, TextureRef)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameCommands {
    pub passes: Vec<RenderPassRecord>,
}

impl FrameCommands {
    pub fn pass(&self, kind: PassKind) -> Option<&RenderPassRecord> {
        self.passes.iter().find(|p| p.kind == kind)
    }

    pub fn pass_kinds(&self) -> Vec<PassKind> {
        self.passes.iter().map(|p| p.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_shaders() {
        assert_eq!(std::mem::size_of::<GizmoUniforms>(), 208);
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 16);
    }

    #[test]
    fn test_draw_count_ignores_state_commands() {
        let mut pass = RenderPassRecord::new(PassKind::Composite, PassTarget::Screen, [0.0; 4], false);
        pass.push(DrawCommand::UseProgram(ProgramId(3)));
        pass.push(DrawCommand::BindTexture {
            unit: 0,
            texture: TextureRef::Image(TextureHandle(1)),
        });
        pass.push(DrawCommand::DrawIndexed {
            first_index: 0,
            index_count: 6,
        });

        assert_eq!(pass.draw_count(), 1);
        assert_eq!(
            pass.bound_textures().collect::<Vec<_>>(),
            vec![(0, TextureRef::Image(TextureHandle(1)))]
        );
    }
}
