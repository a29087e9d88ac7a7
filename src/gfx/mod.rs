//! # Graphics Module
//!
//! Everything between the scene description and the GPU.
//!
//! ## Architecture Overview
//!
//! - **Parameters** ([`aligned_buffer`], [`parameters`]) - per-frame uniform
//!   data packed at backend-legal offsets
//! - **Bindings** ([`binding`]) - vertex attribute layouts resolved per
//!   submesh and program, then cached
//! - **Targets** ([`framebuffer`]) - attachment sets validated against the
//!   backend limits
//! - **Dispatch** ([`dispatch`], [`frame`]) - records the passes of a forward
//!   or deferred frame as backend-neutral commands
//! - **Backend** ([`backend`]) - executes recorded frames with wgpu
//!
//! The [`Renderer`] owns one session of all of the above.
//!
//! ```no_run
//! use deferra::{config::RendererConfig, gfx::Renderer};
//! # fn run<B: deferra::gfx::backend::RenderBackend>(backend: &mut B) {
//! let mut renderer = Renderer::init(backend, &RendererConfig::default(), (1280, 720));
//! renderer.render(backend).ok();
//! # }
//! ```

pub mod aligned_buffer;
pub mod backend;
pub mod binding;
pub mod camera;
pub mod dispatch;
pub mod frame;
pub mod framebuffer;
pub mod parameters;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use camera::FlyCamera;
pub use dispatch::{RenderMode, RenderSettings, RenderTarget};
pub use renderer::Renderer;
