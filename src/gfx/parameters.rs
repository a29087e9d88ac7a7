//! Per-frame uniform packing
//!
//! The global block mirrors the WGSL `Globals` struct:
//!
//! ```text
//! camera_position: vec3<f32>   @0
//! light_count:     u32         @12
//! lights: array<Light>         @16, stride 64
//!     kind      u32            @0
//!     color     vec3<f32>      @16
//!     direction vec3<f32>      @32
//!     position  vec3<f32>      @48
//! ```
//!
//! Each entity block holds the world matrix followed by the
//! world-view-projection matrix and starts on the backend's uniform offset
//! alignment so it can be bound with a dynamic offset.

use cgmath::{Matrix4, Vector3};

use crate::gfx::{
    aligned_buffer::{AlignedBuffer, Channel, ParameterBlock},
    camera::FlyCamera,
    scene::{light::Light, Entity},
};

/// Lights the shaders iterate over at most
pub const MAX_SHADER_LIGHTS: usize = 32;

/// Stride of one packed light
pub const LIGHT_STRIDE: usize = 64;

/// Size the shaders declare for the global block
pub const GLOBALS_BINDING_SIZE: u64 = 16 + (MAX_SHADER_LIGHTS * LIGHT_STRIDE) as u64;

/// Size of one entity block
pub const LOCALS_BLOCK_SIZE: u64 = 128;

const VEC4_ALIGNMENT: usize = 16;

/// Owns both channel buffers and the ranges written into them this frame
#[derive(Debug)]
pub struct FrameParameters {
    globals: AlignedBuffer,
    locals: AlignedBuffer,
    global_block: ParameterBlock,
    binding_alignment: usize,
}

impl FrameParameters {
    /// `capacity` is the largest uniform block the backend binds;
    /// `binding_alignment` its minimum dynamic offset alignment
    pub fn new(capacity: usize, binding_alignment: usize) -> Self {
        assert!(
            binding_alignment.is_power_of_two(),
            "uniform offset alignment {} is not a power of two",
            binding_alignment
        );
        Self {
            globals: AlignedBuffer::new(capacity),
            locals: AlignedBuffer::new(capacity),
            global_block: ParameterBlock::default(),
            binding_alignment,
        }
    }

    pub fn global_block(&self) -> ParameterBlock {
        self.global_block
    }

    pub fn binding_alignment(&self) -> usize {
        self.binding_alignment
    }

    pub fn buffer(&self, channel: Channel) -> &AlignedBuffer {
        match channel {
            Channel::Globals => &self.globals,
            Channel::Locals => &self.locals,
        }
    }

    /// Bytes packed for `channel` this frame
    pub fn bytes(&self, channel: Channel) -> &[u8] {
        self.buffer(channel).written()
    }

    /// Packs the camera, the lights and one block per entity
    ///
    /// Entity blocks are written in slice order and stored on each entity.
    pub fn pack(&mut self, camera: &FlyCamera, lights: &[Light], entities: &mut [Entity]) {
        self.pack_globals(camera.position, lights);
        self.pack_locals(&camera.view_matrix(), &camera.projection_matrix(), entities);
    }

    pub fn pack_globals(&mut self, camera_position: Vector3<f32>, lights: &[Light]) {
        if lights.len() > MAX_SHADER_LIGHTS {
            log::warn!(
                "{} lights packed but shaders only read the first {}",
                lights.len(),
                MAX_SHADER_LIGHTS
            );
        }

        let buffer = &mut self.globals;
        buffer.acquire();
        let offset = buffer.head();

        buffer.push_vec3(camera_position);
        buffer.push_u32(lights.len() as u32);

        for light in lights {
            buffer.align_head(VEC4_ALIGNMENT);
            buffer.push_u32(light.kind.tag());
            buffer.push_vec3(light.color);
            buffer.push_vec3(light.direction);
            buffer.push_vec3(light.position);
        }

        self.global_block = ParameterBlock {
            offset: offset as u32,
            size: (buffer.head() - offset) as u32,
        };
        buffer.release();

        log::trace!(
            "Packed {} lights into global block {:?}",
            lights.len(),
            self.global_block
        );
    }

    pub fn pack_locals(
        &mut self,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
        entities: &mut [Entity],
    ) {
        let view_projection = projection * view;
        let buffer = &mut self.locals;
        buffer.acquire();

        for entity in entities.iter_mut() {
            buffer.align_head(self.binding_alignment);
            let offset = buffer.head();

            let world = Matrix4::from_translation(entity.position);
            buffer.push_mat4(&world);
            buffer.push_mat4(&(view_projection * world));

            entity.block = ParameterBlock {
                offset: offset as u32,
                size: (buffer.head() - offset) as u32,
            };
        }

        buffer.release();
    }
}

/// Reads one light back out of a packed global block
#[cfg(test)]
pub(crate) fn unpack_light(globals: &[u8], index: usize) -> Light {
    use crate::gfx::scene::light::LightKind;

    let base = 16 + index * LIGHT_STRIDE;
    let vec3 = |at: usize| -> Vector3<f32> {
        let raw: [f32; 3] = bytemuck::pod_read_unaligned(&globals[at..at + 12]);
        raw.into()
    };
    let tag: u32 = bytemuck::pod_read_unaligned(&globals[base..base + 4]);

    Light {
        kind: LightKind::from_tag(tag).unwrap_or_else(|| panic!("unknown light tag {}", tag)),
        color: vec3(base + 16),
        direction: vec3(base + 32),
        position: vec3(base + 48),
    }
}
