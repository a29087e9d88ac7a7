//! Recording backend for tests
//!
//! Hands out sequential handles and keeps every call so tests can assert on
//! what the renderer asked the device to do.

use image::RgbaImage;

use super::{AttachmentSetHandle, BackendLimits, MeshHandle, RenderBackend, TextureHandle};
use crate::{
    error::RenderError,
    gfx::{
        aligned_buffer::Channel,
        frame::FrameCommands,
        framebuffer::{AttachmentSetDesc, AttachmentStatus},
        resources::program::Program,
        scene::mesh::Mesh,
    },
};

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    /// (program name, source) in compile order
    pub compiled_programs: Vec<(String, String)>,
    /// Program names whose compilation should fail
    pub failing_programs: Vec<String>,
    /// (label, vertex bytes, index count) per upload
    pub meshes: Vec<(String, usize, usize)>,
    /// (label, width, height) per texture
    pub textures: Vec<(String, u32, u32)>,
    pub attachment_sets: Vec<(AttachmentSetDesc, AttachmentStatus)>,
    pub globals: Vec<Vec<u8>>,
    pub locals: Vec<Vec<u8>>,
    pub submitted: Vec<FrameCommands>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderBackend for HeadlessBackend {
    fn limits(&self) -> BackendLimits {
        BackendLimits {
            uniform_offset_alignment: 256,
            max_uniform_block_size: 65536,
            max_color_attachments: 8,
            max_texture_dimension: 8192,
            max_color_attachment_bytes_per_sample: 32,
        }
    }

    fn compile_program(&mut self, program: &Program, source: &str) -> Result<(), RenderError> {
        self.compiled_programs
            .push((program.name.clone(), source.to_string()));

        if self.failing_programs.contains(&program.name) {
            return Err(RenderError::ShaderCompilation {
                program: program.name.clone(),
                message: "forced failure".to_string(),
            });
        }
        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle {
        self.meshes
            .push((mesh.label.clone(), mesh.vertex_data.len(), mesh.indices.len()));
        MeshHandle(self.meshes.len() as u32 - 1)
    }

    fn create_texture(&mut self, image: &RgbaImage, label: &str) -> TextureHandle {
        self.textures
            .push((label.to_string(), image.width(), image.height()));
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn create_attachment_set(
        &mut self,
        desc: &AttachmentSetDesc,
        status: &AttachmentStatus,
    ) -> AttachmentSetHandle {
        self.attachment_sets.push((desc.clone(), status.clone()));
        AttachmentSetHandle(self.attachment_sets.len() as u32 - 1)
    }

    fn upload_parameters(&mut self, channel: Channel, bytes: &[u8]) {
        match channel {
            Channel::Globals => self.globals.push(bytes.to_vec()),
            Channel::Locals => self.locals.push(bytes.to_vec()),
        }
    }

    fn submit(&mut self, frame: &FrameCommands) -> Result<(), RenderError> {
        self.submitted.push(frame.clone());
        Ok(())
    }
}
