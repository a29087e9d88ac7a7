//! Loaded and generated resources
//!
//! Programs, textures, OBJ models and procedural primitives. Everything here
//! reaches the GPU through [`crate::gfx::backend::RenderBackend`].

pub mod model_loader;
pub mod primitives;
pub mod program;
pub mod texture;

pub use program::{Program, ProgramId, ProgramKind, ProgramLibrary};
pub use texture::{create_white_texture, TextureCache};
