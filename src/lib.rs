//! Deferra
//!
//! A small real-time renderer on wgpu and winit. Frames are drawn either
//! straight from the G-buffer or through a deferred lighting pass, and any
//! intermediate target can be shown for inspection.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod ui;

pub use app::App;
pub use config::RendererConfig;
pub use error::{ConfigError, RenderError};
pub use gfx::Renderer;
