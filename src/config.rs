//! Renderer configuration with defaults and RON loading
//!
//! Every section is `#[serde(default)]`, so a config file only needs to name
//! the values it overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    gfx::dispatch::{RenderMode, RenderTarget},
};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "deferra.ron";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
    pub assets: AssetConfig,
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Logical width; the off-screen targets are sized from the physical size
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "deferra".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Units per second
    pub speed: f32,
    /// Degrees per pixel of mouse motion
    pub sensitivity: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 10.0],
            speed: 2.5,
            sensitivity: 0.1,
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub mode: RenderMode,
    pub target: RenderTarget,
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Forward,
            target: RenderTarget::Albedo,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory that relative asset paths are resolved against
    pub root: PathBuf,
    pub entity_model: PathBuf,
    pub point_light_model: PathBuf,
    pub directional_light_model: PathBuf,
    /// Overrides the built-in WGSL sources when set
    pub shader_dir: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            entity_model: PathBuf::from("Patrick/Patrick.obj"),
            point_light_model: PathBuf::from("Patrick/PointLight.obj"),
            directional_light_model: PathBuf::from("Patrick/DirectionalLight.obj"),
            shader_dir: None,
        }
    }
}

impl AssetConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Populate three entities and seven lights at startup
    pub default_scene: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            default_scene: true,
        }
    }
}

impl RendererConfig {
    /// Loads a config from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads the explicit path if given, else [`DEFAULT_CONFIG_FILE`] if it
    /// exists, else the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    log::info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: RendererConfig =
            ron::from_str("(render: (mode: Deferred), window: (width: 800))").unwrap();

        assert_eq!(config.render.mode, RenderMode::Deferred);
        assert_eq!(config.render.target, RenderTarget::Albedo);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deferra.ron");
        std::fs::write(&path, "(render: (target: Depth), scene: (default_scene: false))").unwrap();

        let config = RendererConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.render.target, RenderTarget::Depth);
        assert!(!config.scene.default_scene);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RendererConfig::load(&dir.path().join("missing.ron"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_ron_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        std::fs::write(&path, "{{not valid}}").unwrap();

        let result = RendererConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_relative_asset_paths_resolve_against_root() {
        let assets = AssetConfig {
            root: PathBuf::from("data"),
            ..Default::default()
        };
        assert_eq!(
            assets.resolve(Path::new("cube.obj")),
            PathBuf::from("data").join("cube.obj")
        );
    }
}
