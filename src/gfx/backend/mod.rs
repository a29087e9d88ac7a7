//! GPU backend seam
//!
//! The renderer creates resources and submits recorded frames through
//! [`RenderBackend`]. [`wgpu_backend::WgpuBackend`] drives a real device; the
//! test-only headless backend records every call instead.

#[cfg(test)]
pub mod headless;
pub mod gpu_texture;
pub mod pipelines;
pub mod wgpu_backend;

use image::RgbaImage;

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentSetHandle(pub u32);

/// Device limits the core packs and validates against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLimits {
    /// Required alignment of dynamic uniform offsets
    pub uniform_offset_alignment: u32,
    /// Largest uniform buffer binding
    pub max_uniform_block_size: u32,
    pub max_color_attachments: u32,
    pub max_texture_dimension: u32,
    pub max_color_attachment_bytes_per_sample: u32,
}

impl BackendLimits {
    pub fn from_wgpu(limits: &wgpu::Limits) -> Self {
        Self {
            uniform_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            max_uniform_block_size: limits.max_uniform_buffer_binding_size,
            max_color_attachments: limits.max_color_attachments,
            max_texture_dimension: limits.max_texture_dimension_2d,
            max_color_attachment_bytes_per_sample: limits.max_color_attachment_bytes_per_sample,
        }
    }
}

/// Human-readable description of the active device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterDetails {
    pub name: String,
    pub vendor: String,
    pub backend: String,
    pub device_type: String,
    pub driver: String,
    pub driver_info: String,
    pub features: Vec<String>,
}

pub trait RenderBackend {
    fn limits(&self) -> BackendLimits;

    /// Compiles `source` for `program`; errors carry the compiler output
    fn compile_program(&mut self, program: &Program, source: &str) -> Result<(), RenderError>;

    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle;

    fn create_texture(&mut self, image: &RgbaImage, label: &str) -> TextureHandle;

    /// Allocates an attachment set; incomplete sets are kept but never rendered into
    fn create_attachment_set(
        &mut self,
        desc: &AttachmentSetDesc,
        status: &AttachmentStatus,
    ) -> AttachmentSetHandle;

    /// Replaces the contents of the uniform buffer backing `channel`
    fn upload_parameters(&mut self, channel: Channel, bytes: &[u8]);

    fn submit(&mut self, frame: &FrameCommands) -> Result<(), RenderError>;
}
