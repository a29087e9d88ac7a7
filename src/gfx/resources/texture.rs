//! Texture decoding and the per-path texture cache

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use image::{Rgba, RgbaImage};

use crate::{
    error::RenderError,
    gfx::backend::{RenderBackend, TextureHandle},
};

/// Decodes an image file into RGBA8, flipped so row 0 is the bottom row
pub fn decode_texture(path: &Path) -> Result<RgbaImage, RenderError> {
    let image = image::open(path).map_err(|source| RenderError::TextureDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.flipv().into_rgba8())
}

/// 1x1 image of a single color
pub fn solid_image(rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(1, 1, Rgba(rgba))
}

/// 1x1 white texture, substituted for missing or undecodable albedo maps
pub fn create_white_texture<B: RenderBackend>(backend: &mut B) -> TextureHandle {
    backend.create_texture(&solid_image([255, 255, 255, 255]), "builtin white")
}

/// Uploads each texture file once and hands out the same handle afterwards
#[derive(Debug, Default)]
pub struct TextureCache {
    loaded: HashMap<PathBuf, TextureHandle>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Returns `None` and logs when the file cannot be decoded
    pub fn load<B: RenderBackend>(&mut self, backend: &mut B, path: &Path) -> Option<TextureHandle> {
        if let Some(&handle) = self.loaded.get(path) {
            return Some(handle);
        }

        match decode_texture(path) {
            Ok(image) => {
                let handle = backend.create_texture(&image, &path.display().to_string());
                log::info!(
                    "Loaded texture {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                self.loaded.insert(path.to_path_buf(), handle);
                Some(handle)
            }
            Err(err) => {
                log::error!("{}: {}", err, error_source(&err));
                None
            }
        }
    }
}

fn error_source(err: &RenderError) -> String {
    std::error::Error::source(err)
        .map(|source| source.to_string())
        .unwrap_or_default()
}
