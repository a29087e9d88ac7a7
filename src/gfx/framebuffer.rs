//! Off-screen attachment sets
//!
//! Every set has three `Rgba16Float` color outputs (albedo, normal, position in
//! that order) plus a `Depth32Float` depth image, all at display resolution.
//! Completeness is checked against the backend limits before allocation; an
//! incomplete set is logged and left non-functional.

use thiserror::Error;

use crate::gfx::backend::{AttachmentSetHandle, BackendLimits, RenderBackend};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color,
    Normal,
    Position,
    Depth,
}

impl Attachment {
    /// Color outputs in render target order
    pub const COLOR_OUTPUTS: [Attachment; 3] =
        [Attachment::Color, Attachment::Normal, Attachment::Position];

    pub fn label(self) -> &'static str {
        match self {
            Attachment::Color => "color",
            Attachment::Normal => "normal",
            Attachment::Position => "position",
            Attachment::Depth => "depth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color: Vec<(Attachment, wgpu::TextureFormat)>,
    pub depth: Option<wgpu::TextureFormat>,
}

impl AttachmentSetDesc {
    /// The G-buffer layout at the given resolution
    pub fn gbuffer(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            color: Attachment::COLOR_OUTPUTS
                .iter()
                .map(|&attachment| (attachment, COLOR_FORMAT))
                .collect(),
            depth: Some(DEPTH_FORMAT),
        }
    }

    /// Render target slot of a color attachment
    pub fn color_slot(&self, attachment: Attachment) -> Option<usize> {
        self.color.iter().position(|(a, _)| *a == attachment)
    }
}

/// Why an attachment set cannot be rendered into
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Incompleteness {
    #[error("attachment extent {width}x{height} is empty")]
    ZeroExtent { width: u32, height: u32 },

    #[error("attachment extent {width}x{height} exceeds the maximum texture dimension {max}")]
    ExceedsMaxDimension { width: u32, height: u32, max: u32 },

    #[error("{count} color outputs requested but only {max} are supported")]
    TooManyColorAttachments { count: u32, max: u32 },

    #[error("color outputs need {bytes} bytes per sample but the limit is {max}")]
    ExceedsBytesPerSample { bytes: u32, max: u32 },

    #[error("format {format:?} of the {attachment} attachment is not color renderable")]
    NotRenderable {
        attachment: &'static str,
        format: wgpu::TextureFormat,
    },

    #[error("depth attachment is missing or has non-depth format {format:?}")]
    MissingDepth { format: Option<wgpu::TextureFormat> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentStatus {
    Complete,
    Incomplete(Incompleteness),
}

impl AttachmentStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, AttachmentStatus::Complete)
    }
}

/// Checks `desc` against the limits of the device it will be allocated on
pub fn check_completeness(desc: &AttachmentSetDesc, limits: &BackendLimits) -> AttachmentStatus {
    use Incompleteness::*;

    let (width, height) = (desc.width, desc.height);
    if width == 0 || height == 0 {
        return AttachmentStatus::Incomplete(ZeroExtent { width, height });
    }
    if width > limits.max_texture_dimension || height > limits.max_texture_dimension {
        return AttachmentStatus::Incomplete(ExceedsMaxDimension {
            width,
            height,
            max: limits.max_texture_dimension,
        });
    }

    let count = desc.color.len() as u32;
    if count > limits.max_color_attachments {
        return AttachmentStatus::Incomplete(TooManyColorAttachments {
            count,
            max: limits.max_color_attachments,
        });
    }

    let mut bytes = 0;
    for &(attachment, format) in &desc.color {
        let renderable = format.has_color_aspect()
            && format
                .guaranteed_format_features(wgpu::Features::empty())
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
        match format.target_pixel_byte_cost() {
            Some(cost) if renderable => bytes += cost,
            _ => {
                return AttachmentStatus::Incomplete(NotRenderable {
                    attachment: attachment.label(),
                    format,
                })
            }
        }
    }
    if bytes > limits.max_color_attachment_bytes_per_sample {
        return AttachmentStatus::Incomplete(ExceedsBytesPerSample {
            bytes,
            max: limits.max_color_attachment_bytes_per_sample,
        });
    }

    match desc.depth {
        Some(format) if format.is_depth_stencil_format() && format.has_depth_aspect() => {
            AttachmentStatus::Complete
        }
        format => AttachmentStatus::Incomplete(MissingDepth { format }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSet {
    pub handle: AttachmentSetHandle,
    pub desc: AttachmentSetDesc,
    pub status: AttachmentStatus,
}

impl AttachmentSet {
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// Describes, validates and allocates a G-buffer style attachment set
pub fn create_attachment_set<B: RenderBackend>(
    backend: &mut B,
    label: &str,
    resolution: (u32, u32),
) -> AttachmentSet {
    let desc = AttachmentSetDesc::gbuffer(label, resolution.0, resolution.1);
    let status = check_completeness(&desc, &backend.limits());

    match &status {
        AttachmentStatus::Complete => log::info!(
            "Created attachment set '{}' at {}x{}",
            label,
            resolution.0,
            resolution.1
        ),
        AttachmentStatus::Incomplete(reason) => {
            log::error!("Attachment set '{}' is incomplete: {}", label, reason)
        }
    }

    let handle = backend.create_attachment_set(&desc, &status);
    AttachmentSet {
        handle,
        desc,
        status,
    }
}
