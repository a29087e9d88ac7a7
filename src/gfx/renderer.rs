//! Renderer session
//!
//! Ties the scene, camera, programs and off-screen targets together and runs
//! the per-frame update and render steps against any [`RenderBackend`].

use std::path::Path;

use cgmath::Vector3;

use crate::{
    config::{AssetConfig, RendererConfig},
    error::RenderError,
    gfx::{
        aligned_buffer::Channel,
        backend::{RenderBackend, TextureHandle},
        binding::BindingResolver,
        camera::{CameraInput, FlyCamera},
        dispatch::{record_frame, FrameInputs, FrameTargets, RenderSettings},
        frame::FrameCommands,
        framebuffer::{create_attachment_set, AttachmentSet},
        parameters::FrameParameters,
        resources::{
            model_loader,
            primitives::{self, GeometryData},
            create_white_texture, ProgramLibrary, TextureCache,
        },
        scene::{
            light::Light,
            mesh::{Material, Model},
            GizmoModels, Scene,
        },
    },
};

/// Everything one rendering session owns
pub struct Renderer {
    pub scene: Scene,
    pub camera: FlyCamera,
    pub settings: RenderSettings,
    programs: ProgramLibrary,
    resolver: BindingResolver,
    parameters: FrameParameters,
    textures: TextureCache,
    white: TextureHandle,
    gbuffer: AttachmentSet,
    resolved: AttachmentSet,
    quad_mesh: usize,
}

impl Renderer {
    /// Compiles programs, allocates the attachment sets at `display_size` and
    /// loads the gizmo models, plus the default scene when configured
    pub fn init<B: RenderBackend>(
        backend: &mut B,
        config: &RendererConfig,
        display_size: (u32, u32),
    ) -> Self {
        let limits = backend.limits();
        let programs = ProgramLibrary::load(backend, config.assets.shader_dir.as_deref());
        let white = create_white_texture(backend);
        let gbuffer = create_attachment_set(backend, "gbuffer", display_size);
        let resolved = create_attachment_set(backend, "resolve", display_size);

        let mut scene = Scene::new();
        let mut quad = primitives::fullscreen_quad();
        quad.handle = Some(backend.upload_mesh(&quad));
        let quad_mesh = scene.add_mesh(quad);

        let (width, height) = display_size;
        let aspect = if height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };

        let mut renderer = Self {
            scene,
            camera: FlyCamera::new(&config.camera, aspect),
            settings: RenderSettings {
                mode: config.render.mode,
                target: config.render.target,
                clear_color: config.render.clear_color,
            },
            programs,
            resolver: BindingResolver::new(),
            parameters: FrameParameters::new(
                limits.max_uniform_block_size as usize,
                limits.uniform_offset_alignment as usize,
            ),
            textures: TextureCache::new(),
            white,
            gbuffer,
            resolved,
            quad_mesh,
        };

        let assets = &config.assets;
        let point = renderer.load_model_or(backend, &assets.resolve(&assets.point_light_model), || {
            primitives::generate_sphere(16, 12)
        });
        let directional = renderer.load_model_or(
            backend,
            &assets.resolve(&assets.directional_light_model),
            primitives::generate_pyramid,
        );
        renderer.scene.gizmos = Some(GizmoModels { point, directional });

        if config.scene.default_scene {
            renderer.populate_default_scene(backend, assets);
        }

        log::info!(
            "Renderer ready: {} entities, {} lights, {:?} mode",
            renderer.scene.entities.len(),
            renderer.scene.lights.len(),
            renderer.settings.mode
        );
        renderer
    }

    /// Decodes and uploads an image, once per path
    pub fn load_texture_2d<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        path: &Path,
    ) -> Option<TextureHandle> {
        self.textures.load(backend, path)
    }

    /// Loads an OBJ model, substituting generated geometry when that fails
    pub fn load_model_or<B, F>(&mut self, backend: &mut B, path: &Path, fallback: F) -> usize
    where
        B: RenderBackend,
        F: FnOnce() -> GeometryData,
    {
        let white = self.white;
        match model_loader::load_model(backend, &mut self.textures, &mut self.scene, path, white) {
            Ok(model) => model,
            Err(err) => {
                log::warn!("{}, using generated geometry instead", err);
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "fallback".to_string());

                let mut mesh = fallback().into_mesh(name.as_str());
                mesh.handle = Some(backend.upload_mesh(&mesh));
                let mesh = self.scene.add_mesh(mesh);
                let material = self.scene.add_material(Material {
                    name: format!("{} material", name),
                    albedo: white,
                });
                self.scene.add_model(Model {
                    name,
                    mesh,
                    materials: vec![material],
                })
            }
        }
    }

    /// Three copies of the entity model and seven mixed lights
    pub fn populate_default_scene<B: RenderBackend>(&mut self, backend: &mut B, assets: &AssetConfig) {
        let model = self.load_model_or(
            backend,
            &assets.resolve(&assets.entity_model),
            primitives::generate_cube,
        );
        for x in [0.0, 7.0, -7.0] {
            self.scene.add_entity(Vector3::new(x, 0.0, 0.0), model);
        }

        for light in default_lights() {
            self.scene.add_light(light);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize_projection(width, height);
    }

    /// Applies camera input and packs and uploads this frame's parameters
    pub fn update<B: RenderBackend>(&mut self, backend: &mut B, input: &CameraInput, dt: f32) {
        input.apply(&mut self.camera, dt);

        self.parameters
            .pack(&self.camera, &self.scene.lights, &mut self.scene.entities);

        for channel in [Channel::Globals, Channel::Locals] {
            backend.upload_parameters(channel, self.parameters.bytes(channel));
        }
    }

    /// Records the passes for the current settings
    pub fn record_frame(&mut self) -> FrameCommands {
        record_frame(
            &self.settings,
            FrameInputs {
                scene: &mut self.scene,
                programs: &self.programs,
                resolver: &mut self.resolver,
                camera: &self.camera,
                global_block: self.parameters.global_block(),
                targets: FrameTargets {
                    gbuffer: self.gbuffer.handle,
                    resolved: self.resolved.handle,
                    quad_mesh: self.quad_mesh,
                    fallback_texture: self.white,
                },
            },
        )
    }

    /// Records the frame and submits it through `backend`
    pub fn render<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), RenderError> {
        let frame = self.record_frame();
        backend.submit(&frame)
    }

    pub fn gbuffer(&self) -> &AttachmentSet {
        &self.gbuffer
    }

    /// Vertex bindings resolved so far
    pub fn binding_count(&self) -> u32 {
        self.resolver.created()
    }
}

fn default_lights() -> Vec<Light> {
    vec![
        Light::directional(
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(11.0, 0.0, 0.0),
        ),
        Light::point(Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0)),
        Light::directional(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, -1.0, 0.0),
            Vector3::new(-3.0, -3.0, -4.0),
        ),
        Light::point(Vector3::new(0.0, 1.0, 0.0), Vector3::new(2.0, 0.0, 2.0)),
        Light::point(Vector3::new(0.0, 1.0, 1.0), Vector3::new(-2.0, 2.0, 2.0)),
        Light::point(Vector3::new(1.0, 0.3, 1.0), Vector3::new(7.0, 3.0, 2.0)),
        Light::point(Vector3::new(1.0, 1.0, 0.0), Vector3::new(-7.0, -2.0, 2.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        aligned_buffer::ParameterBlock,
        backend::headless::HeadlessBackend,
        dispatch::{RenderMode, RenderTarget},
        frame::{PassKind, TextureRef},
        framebuffer::Attachment,
        scene::light::LightKind,
    };

    fn config(default_scene: bool) -> RendererConfig {
        let mut config = RendererConfig::default();
        config.assets.root = "does-not-exist".into();
        config.scene.default_scene = default_scene;
        config
    }

    #[test]
    fn test_empty_scene_updates_and_renders() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::init(&mut backend, &config(false), (64, 64));

        renderer.update(&mut backend, &CameraInput::default(), 0.016);
        renderer.render(&mut backend).unwrap();

        // camera position and light count only
        assert_eq!(backend.globals.last().map(Vec::len), Some(16));
        assert_eq!(backend.locals.last().map(Vec::len), Some(0));

        let frame = &backend.submitted[0];
        assert_eq!(frame.pass(PassKind::GBuffer).unwrap().draw_count(), 0);
        assert_eq!(frame.pass_kinds(), vec![PassKind::GBuffer, PassKind::Composite]);
    }

    #[test]
    fn test_missing_models_fall_back_to_primitives() {
        let mut backend = HeadlessBackend::new();
        let renderer = Renderer::init(&mut backend, &config(true), (64, 64));

        let scene = &renderer.scene;
        assert_eq!(scene.entities.len(), 3);
        assert_eq!(scene.light_count(LightKind::Directional), 2);
        assert_eq!(scene.light_count(LightKind::Point), 5);

        let cube = &scene.meshes[scene.models[scene.entities[0].model].mesh];
        assert_eq!(cube.submeshes[0].index_count, 36);
        let gizmos = scene.gizmos.unwrap();
        assert_ne!(gizmos.point, gizmos.directional);
        assert!(scene.meshes.iter().all(|mesh| mesh.handle.is_some()));
    }

    #[test]
    fn test_default_scene_blocks_are_distinct_and_aligned() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::init(&mut backend, &config(true), (64, 64));
        renderer.update(&mut backend, &CameraInput::default(), 0.016);

        let blocks: Vec<ParameterBlock> = renderer.scene.entities.iter().map(|e| e.block).collect();
        for pair in blocks.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
        }
        assert!(blocks.iter().all(|b| b.offset % 16 == 0 && b.size == 128));
        assert_eq!(backend.globals.last().map(Vec::len), Some(16 + 7 * 64 - 4));
    }

    #[test]
    fn test_deferred_depth_view_renders_every_pass() {
        let mut backend = HeadlessBackend::new();
        let mut config = config(true);
        config.render.mode = RenderMode::Deferred;
        config.render.target = RenderTarget::Depth;
        let mut renderer = Renderer::init(&mut backend, &config, (64, 64));

        renderer.update(&mut backend, &CameraInput::default(), 0.016);
        renderer.render(&mut backend).unwrap();

        let frame = &backend.submitted[0];
        assert_eq!(
            frame.pass_kinds(),
            vec![PassKind::GBuffer, PassKind::DeferredResolve, PassKind::Composite]
        );
        // three entities plus seven gizmos
        assert_eq!(frame.pass(PassKind::GBuffer).unwrap().draw_count(), 10);
        assert_eq!(
            frame.pass(PassKind::Composite).unwrap().bound_textures().next(),
            Some((
                0,
                TextureRef::Attachment {
                    set: renderer.gbuffer().handle,
                    attachment: Attachment::Depth
                }
            ))
        );
    }

    #[test]
    fn test_bindings_are_reused_across_frames() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::init(&mut backend, &config(true), (64, 64));

        renderer.render(&mut backend).unwrap();
        let after_first = renderer.binding_count();
        renderer.render(&mut backend).unwrap();

        assert!(after_first > 0);
        assert_eq!(renderer.binding_count(), after_first);
    }

    #[test]
    fn test_missing_texture_returns_none() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::init(&mut backend, &config(false), (64, 64));
        assert_eq!(
            renderer.load_texture_2d(&mut backend, Path::new("does-not-exist/albedo.png")),
            None
        );
    }
}
