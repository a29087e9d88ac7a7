//! Host-side staging buffer with an alignment-aware write cursor
//!
//! An [`AlignedBuffer`] is filled once per frame between [`AlignedBuffer::acquire`]
//! and [`AlignedBuffer::release`], then handed to the backend as one upload.
//! Misuse (pushing outside a session, overflowing the capacity, a non power of
//! two alignment) is a programming error and panics.

use cgmath::{Matrix4, Vector3};

/// Which per-frame uniform region a buffer feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Camera position and light array, bound once per pass
    Globals,
    /// Per-entity transforms, bound at a dynamic offset per draw
    Locals,
}

/// Sub-range of an [`AlignedBuffer`] holding one draw's parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterBlock {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug)]
pub struct AlignedBuffer {
    data: Vec<u8>,
    capacity: usize,
    head: usize,
    mapped: bool,
}

impl AlignedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            capacity,
            head: 0,
            mapped: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far in the current session
    pub fn head(&self) -> usize {
        self.head
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Starts a write session and rewinds the cursor
    pub fn acquire(&mut self) {
        assert!(!self.mapped, "aligned buffer acquired twice");
        self.mapped = true;
        self.head = 0;
    }

    /// Ends the write session and returns the bytes written
    pub fn release(&mut self) -> &[u8] {
        assert!(self.mapped, "aligned buffer released without being acquired");
        self.mapped = false;
        &self.data[..self.head]
    }

    /// Moves the cursor forward to the next multiple of `alignment`
    pub fn align_head(&mut self, alignment: usize) {
        assert!(self.mapped, "aligned buffer written outside of a session");
        assert!(
            alignment.is_power_of_two(),
            "alignment {} is not a power of two",
            alignment
        );
        let aligned = (self.head + alignment - 1) & !(alignment - 1);
        assert!(
            aligned <= self.capacity,
            "aligned buffer overflow: cursor {} exceeds capacity {}",
            aligned,
            self.capacity
        );
        self.head = aligned;
    }

    /// Copies `data` at the next `alignment` boundary and returns its offset
    pub fn push_aligned(&mut self, data: &[u8], alignment: usize) -> usize {
        self.align_head(alignment);
        let offset = self.head;
        let end = offset + data.len();
        assert!(
            end <= self.capacity,
            "aligned buffer overflow: {} bytes at offset {} exceed capacity {}",
            data.len(),
            offset,
            self.capacity
        );
        self.data[offset..end].copy_from_slice(data);
        self.head = end;
        offset
    }

    pub fn push_u32(&mut self, value: u32) -> usize {
        self.push_aligned(bytemuck::bytes_of(&value), 4)
    }

    /// vec3 occupies 12 bytes on a 16 byte boundary, like WGSL `vec3<f32>`
    pub fn push_vec3(&mut self, value: Vector3<f32>) -> usize {
        let raw: [f32; 3] = value.into();
        self.push_aligned(bytemuck::bytes_of(&raw), 16)
    }

    pub fn push_mat4(&mut self, value: &Matrix4<f32>) -> usize {
        let raw: [[f32; 4]; 4] = (*value).into();
        self.push_aligned(bytemuck::bytes_of(&raw), 16)
    }

    /// Bytes from the last session, valid until the next `acquire`
    pub fn written(&self) -> &[u8] {
        &self.data[..self.head]
    }
}
