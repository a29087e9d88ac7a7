//! Error types shared across the renderer
//!
//! Load-time failures (shaders, textures, models, surface) are recoverable and
//! surface as [`RenderError`] values that callers log and degrade around.
//! Integration-time mismatches are fatal and only use [`RenderError`] to carry
//! a readable panic message.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or driving the renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to compile program '{program}': {message}")]
    ShaderCompilation { program: String, message: String },

    #[error("failed to read shader source {path}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode texture {path}")]
    TextureDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to load model {path}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error(
        "program '{program}' expects vertex attribute at location {location} \
         but the submesh only provides locations {available:?}"
    )]
    MissingVertexAttribute {
        program: String,
        location: u32,
        available: Vec<u32>,
    },

    #[error("no suitable graphics adapter found")]
    AdapterRequest(#[from] wgpu::RequestAdapterError),

    #[error("failed to create graphics device")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("failed to create window surface")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to acquire surface texture")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Errors raised while loading a [`crate::config::RendererConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}
