//! # User Interface Module
//!
//! Dear ImGui overlay drawn on top of the rendered frame.
//!
//! - [`UiManager`] - context, winit platform glue and wgpu renderer
//! - [`debug_panel`] - render mode and target selection plus frame and
//!   adapter info
//!
//! Window events go to the UI first. While ImGui wants the mouse or keyboard
//! the camera receives no input.

pub mod debug_panel;
pub mod manager;

pub use debug_panel::{debug_panel, FrameStats};
pub use manager::UiManager;
