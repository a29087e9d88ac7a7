//! Render-mode dispatch
//!
//! Records the ordered pass sequence for one frame:
//!
//! 1. G-buffer pass: every entity with the mesh program for the mode, then
//!    one gizmo per light with the gizmo program. Forward lights the meshes
//!    here; Deferred writes unlit albedo and leaves lighting to the resolve.
//! 2. Deferred resolve pass, only in [`RenderMode::Deferred`]: lights the
//!    G-buffer into the resolve attachment set.
//! 3. Composite pass: shows the attachment picked by [`RenderTarget`] on screen.

use cgmath::Matrix4;
use serde::{Deserialize, Serialize};

use crate::gfx::{
    aligned_buffer::{Channel, ParameterBlock},
    backend::{AttachmentSetHandle, TextureHandle},
    binding::BindingResolver,
    camera::FlyCamera,
    frame::{
        CompositeUniforms, DrawCommand, DrawUniforms, FrameCommands, GizmoUniforms, PassKind,
        PassTarget, RenderPassRecord, TextureRef,
    },
    framebuffer::Attachment,
    resources::program::{ProgramKind, ProgramLibrary},
    scene::{mesh::Mesh, Scene},
};

/// Uniform slot of the global block
pub const GLOBALS_SLOT: u32 = 0;
/// Uniform slot of the per-entity block
pub const LOCALS_SLOT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Shows the G-buffer as written, without lighting
    #[default]
    Forward,
    /// Adds the lighting resolve pass
    Deferred,
}

impl RenderMode {
    pub const ALL: [RenderMode; 2] = [RenderMode::Forward, RenderMode::Deferred];

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Forward => "Forward",
            RenderMode::Deferred => "Deferred",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderTarget {
    #[default]
    Albedo,
    Normal,
    Position,
    Depth,
}

impl RenderTarget {
    pub const ALL: [RenderTarget; 4] = [
        RenderTarget::Albedo,
        RenderTarget::Normal,
        RenderTarget::Position,
        RenderTarget::Depth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RenderTarget::Albedo => "Albedo",
            RenderTarget::Normal => "Normals",
            RenderTarget::Position => "Position",
            RenderTarget::Depth => "Depth",
        }
    }
}

/// State the debug panel edits and the dispatcher reads each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub mode: RenderMode,
    pub target: RenderTarget,
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mode: RenderMode::Forward,
            target: RenderTarget::Albedo,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

/// Attachment the composite pass samples, and whether it holds depth
pub fn composite_source(
    mode: RenderMode,
    target: RenderTarget,
    gbuffer: AttachmentSetHandle,
    resolved: AttachmentSetHandle,
) -> (TextureRef, bool) {
    let (set, attachment) = match target {
        RenderTarget::Albedo => match mode {
            RenderMode::Deferred => (resolved, Attachment::Color),
            RenderMode::Forward => (gbuffer, Attachment::Color),
        },
        RenderTarget::Normal => (gbuffer, Attachment::Normal),
        RenderTarget::Position => (gbuffer, Attachment::Position),
        RenderTarget::Depth => (gbuffer, Attachment::Depth),
    };
    (
        TextureRef::Attachment { set, attachment },
        attachment == Attachment::Depth,
    )
}

/// Resources a frame is recorded against
#[derive(Debug, Clone, Copy)]
pub struct FrameTargets {
    pub gbuffer: AttachmentSetHandle,
    pub resolved: AttachmentSetHandle,
    /// Index of the shared full-screen quad in [`Scene::meshes`]
    pub quad_mesh: usize,
    /// Bound for submeshes without a material
    pub fallback_texture: TextureHandle,
}

pub struct FrameInputs<'a> {
    pub scene: &'a mut Scene,
    pub programs: &'a ProgramLibrary,
    pub resolver: &'a mut BindingResolver,
    pub camera: &'a FlyCamera,
    pub global_block: ParameterBlock,
    pub targets: FrameTargets,
}

/// Records the passes for the current settings
pub fn record_frame(settings: &RenderSettings, inputs: FrameInputs<'_>) -> FrameCommands {
    let FrameInputs {
        scene,
        programs,
        resolver,
        camera,
        global_block,
        targets,
    } = inputs;

    let mut frame = FrameCommands::default();
    frame.passes.push(record_gbuffer_pass(
        settings,
        scene,
        programs,
        resolver,
        camera,
        global_block,
        targets,
    ));

    if settings.mode == RenderMode::Deferred {
        let mut pass = RenderPassRecord::new(
            PassKind::DeferredResolve,
            PassTarget::Offscreen(targets.resolved),
            settings.clear_color,
            true,
        );
        let program = programs.get(ProgramKind::Resolve);
        pass.push(DrawCommand::UseProgram(program.id));
        pass.push(DrawCommand::BindParameterBlock {
            slot: GLOBALS_SLOT,
            channel: Channel::Globals,
            block: global_block,
        });
        let inputs = [Attachment::Color, Attachment::Position, Attachment::Normal];
        for (unit, attachment) in inputs.into_iter().enumerate() {
            pass.push(DrawCommand::BindTexture {
                unit: unit as u32,
                texture: TextureRef::Attachment {
                    set: targets.gbuffer,
                    attachment,
                },
            });
        }
        draw_quad(&mut pass, scene, targets.quad_mesh, resolver, programs, ProgramKind::Resolve);
        frame.passes.push(pass);
    }

    let mut pass = RenderPassRecord::new(
        PassKind::Composite,
        PassTarget::Screen,
        settings.clear_color,
        false,
    );
    let program = programs.get(ProgramKind::Composite);
    let (source, is_depth) =
        composite_source(settings.mode, settings.target, targets.gbuffer, targets.resolved);
    pass.push(DrawCommand::UseProgram(program.id));
    pass.push(DrawCommand::SetDrawUniforms(DrawUniforms::Composite(
        CompositeUniforms {
            is_depth: is_depth as u32,
            near: camera.znear,
            far: camera.zfar,
            _padding: 0.0,
        },
    )));
    pass.push(DrawCommand::BindTexture {
        unit: 0,
        texture: source,
    });
    draw_quad(&mut pass, scene, targets.quad_mesh, resolver, programs, ProgramKind::Composite);
    frame.passes.push(pass);

    frame
}

/// Program drawing scene entities in `mode`
fn mesh_program(mode: RenderMode) -> ProgramKind {
    match mode {
        RenderMode::Forward => ProgramKind::ForwardLit,
        RenderMode::Deferred => ProgramKind::Geometry,
    }
}

fn record_gbuffer_pass(
    settings: &RenderSettings,
    scene: &mut Scene,
    programs: &ProgramLibrary,
    resolver: &mut BindingResolver,
    camera: &FlyCamera,
    global_block: ParameterBlock,
    targets: FrameTargets,
) -> RenderPassRecord {
    let mut pass = RenderPassRecord::new(
        PassKind::GBuffer,
        PassTarget::Offscreen(targets.gbuffer),
        settings.clear_color,
        true,
    );

    let Scene {
        entities,
        lights,
        meshes,
        models,
        materials,
        gizmos,
    } = scene;

    let geometry = programs.get(mesh_program(settings.mode));
    pass.push(DrawCommand::UseProgram(geometry.id));

    for entity in entities.iter() {
        let model = &models[entity.model];
        let mesh = &mut meshes[model.mesh];
        let Some(handle) = mesh.handle else {
            log::warn!("Skipping entity with mesh '{}' that was never uploaded", mesh.label);
            continue;
        };

        pass.push(DrawCommand::BindParameterBlock {
            slot: GLOBALS_SLOT,
            channel: Channel::Globals,
            block: global_block,
        });
        pass.push(DrawCommand::BindParameterBlock {
            slot: LOCALS_SLOT,
            channel: Channel::Locals,
            block: entity.block,
        });

        for (index, submesh) in mesh.submeshes.iter_mut().enumerate() {
            let binding = resolver.resolve(submesh, geometry).clone();
            let albedo = model
                .materials
                .get(index)
                .and_then(|&material| materials.get(material))
                .map(|material| material.albedo)
                .unwrap_or(targets.fallback_texture);

            pass.push(DrawCommand::BindVertices {
                mesh: handle,
                binding,
            });
            pass.push(DrawCommand::BindTexture {
                unit: 0,
                texture: TextureRef::Image(albedo),
            });
            pass.push(DrawCommand::DrawIndexed {
                first_index: submesh.first_index(),
                index_count: submesh.index_count,
            });
        }
    }

    let Some(gizmos) = *gizmos else {
        return pass;
    };

    let gizmo = programs.get(ProgramKind::Gizmo);
    let view: [[f32; 4]; 4] = camera.view_matrix().into();
    let proj: [[f32; 4]; 4] = camera.projection_matrix().into();
    pass.push(DrawCommand::UseProgram(gizmo.id));

    for light in lights.iter() {
        let model = &models[gizmos.model_for(light.kind)];
        let mesh: &mut Mesh = &mut meshes[model.mesh];
        let Some(handle) = mesh.handle else {
            continue;
        };

        pass.push(DrawCommand::SetDrawUniforms(DrawUniforms::Gizmo(GizmoUniforms {
            model: Matrix4::from_translation(light.position).into(),
            view,
            proj,
            color: light.color.into(),
            _padding: 0.0,
        })));

        for submesh in mesh.submeshes.iter_mut() {
            let binding = resolver.resolve(submesh, gizmo).clone();
            pass.push(DrawCommand::BindVertices {
                mesh: handle,
                binding,
            });
            pass.push(DrawCommand::DrawIndexed {
                first_index: submesh.first_index(),
                index_count: submesh.index_count,
            });
        }
    }

    pass
}

fn draw_quad(
    pass: &mut RenderPassRecord,
    scene: &mut Scene,
    quad_mesh: usize,
    resolver: &mut BindingResolver,
    programs: &ProgramLibrary,
    kind: ProgramKind,
) {
    let quad = &mut scene.meshes[quad_mesh];
    let Some(handle) = quad.handle else {
        log::warn!("Full-screen quad was never uploaded");
        return;
    };

    for submesh in quad.submeshes.iter_mut() {
        let binding = resolver.resolve(submesh, programs.get(kind)).clone();
        pass.push(DrawCommand::BindVertices {
            mesh: handle,
            binding,
        });
        pass.push(DrawCommand::DrawIndexed {
            first_index: submesh.first_index(),
            index_count: submesh.index_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CameraConfig,
        gfx::{
            backend::{headless::HeadlessBackend, RenderBackend},
            binding::BindingId,
            framebuffer::create_attachment_set,
            resources::primitives,
            scene::{
                light::Light,
                mesh::{Material, Model},
                GizmoModels,
            },
        },
    };
    use cgmath::Vector3;

    struct Fixture {
        scene: Scene,
        programs: ProgramLibrary,
        resolver: BindingResolver,
        camera: FlyCamera,
        targets: FrameTargets,
    }

    impl Fixture {
        fn new(entity_count: usize, with_lights: bool) -> Self {
            let mut backend = HeadlessBackend::new();
            let programs = ProgramLibrary::load(&mut backend, None);
            let gbuffer = create_attachment_set(&mut backend, "gbuffer", (64, 64)).handle;
            let resolved = create_attachment_set(&mut backend, "resolve", (64, 64)).handle;
            let white = backend.create_texture(&image::RgbaImage::new(1, 1), "white");

            let mut scene = Scene::new();
            let mut upload = |scene: &mut Scene, mut mesh: Mesh| {
                mesh.handle = Some(backend.upload_mesh(&mesh));
                scene.add_mesh(mesh)
            };

            let quad_mesh = upload(&mut scene, primitives::fullscreen_quad());
            let cube_mesh = upload(&mut scene, primitives::generate_cube().into_mesh("cube"));
            let sphere_mesh = upload(&mut scene, primitives::generate_sphere(8, 6).into_mesh("sphere"));
            let pyramid_mesh = upload(&mut scene, primitives::generate_pyramid().into_mesh("pyramid"));

            let material = scene.add_material(Material {
                name: "white".into(),
                albedo: white,
            });
            let cube = scene.add_model(Model {
                name: "cube".into(),
                mesh: cube_mesh,
                materials: vec![material],
            });
            let point = scene.add_model(Model {
                name: "point".into(),
                mesh: sphere_mesh,
                materials: Vec::new(),
            });
            let directional = scene.add_model(Model {
                name: "directional".into(),
                mesh: pyramid_mesh,
                materials: Vec::new(),
            });
            scene.gizmos = Some(GizmoModels { point, directional });

            for i in 0..entity_count {
                scene.add_entity(Vector3::new(i as f32 * 7.0, 0.0, 0.0), cube);
            }
            if with_lights {
                scene.add_light(Light::directional(
                    Vector3::new(1.0, 1.0, 1.0),
                    Vector3::new(1.0, 0.0, 0.0),
                    Vector3::new(11.0, 0.0, 0.0),
                ));
                scene.add_light(Light::point(Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0)));
                scene.add_light(Light::point(Vector3::new(0.0, 1.0, 0.0), Vector3::new(2.0, 0.0, 2.0)));
            }

            Self {
                scene,
                programs,
                resolver: BindingResolver::new(),
                camera: FlyCamera::new(&CameraConfig::default(), 1.0),
                targets: FrameTargets {
                    gbuffer,
                    resolved,
                    quad_mesh,
                    fallback_texture: white,
                },
            }
        }

        fn record(&mut self, mode: RenderMode, target: RenderTarget) -> FrameCommands {
            let settings = RenderSettings {
                mode,
                target,
                ..Default::default()
            };
            record_frame(
                &settings,
                FrameInputs {
                    scene: &mut self.scene,
                    programs: &self.programs,
                    resolver: &mut self.resolver,
                    camera: &self.camera,
                    global_block: ParameterBlock { offset: 0, size: 204 },
                    targets: self.targets,
                },
            )
        }
    }

    fn gbuffer_color(fixture: &Fixture) -> TextureRef {
        TextureRef::Attachment {
            set: fixture.targets.gbuffer,
            attachment: Attachment::Color,
        }
    }

    #[test]
    fn test_forward_records_gbuffer_and_composite() {
        let mut fixture = Fixture::new(3, true);
        let frame = fixture.record(RenderMode::Forward, RenderTarget::Albedo);

        assert_eq!(frame.pass_kinds(), vec![PassKind::GBuffer, PassKind::Composite]);
        let composite = frame.pass(PassKind::Composite).unwrap();
        assert!(!composite.depth_test);
        assert_eq!(composite.target, PassTarget::Screen);
        assert_eq!(composite.bound_textures().collect::<Vec<_>>(), vec![(0, gbuffer_color(&fixture))]);
    }

    #[test]
    fn test_deferred_adds_resolve_pass_in_order() {
        let mut fixture = Fixture::new(3, true);
        let frame = fixture.record(RenderMode::Deferred, RenderTarget::Albedo);

        assert_eq!(
            frame.pass_kinds(),
            vec![PassKind::GBuffer, PassKind::DeferredResolve, PassKind::Composite]
        );

        let resolve = frame.pass(PassKind::DeferredResolve).unwrap();
        assert_eq!(resolve.target, PassTarget::Offscreen(fixture.targets.resolved));
        let units: Vec<_> = resolve.bound_textures().collect();
        let gbuffer = fixture.targets.gbuffer;
        assert_eq!(
            units,
            vec![
                (0, TextureRef::Attachment { set: gbuffer, attachment: Attachment::Color }),
                (1, TextureRef::Attachment { set: gbuffer, attachment: Attachment::Position }),
                (2, TextureRef::Attachment { set: gbuffer, attachment: Attachment::Normal }),
            ]
        );
        assert!(resolve.commands.contains(&DrawCommand::BindParameterBlock {
            slot: GLOBALS_SLOT,
            channel: Channel::Globals,
            block: ParameterBlock { offset: 0, size: 204 },
        }));

        let composite = frame.pass(PassKind::Composite).unwrap();
        assert_eq!(
            composite.bound_textures().next(),
            Some((
                0,
                TextureRef::Attachment {
                    set: fixture.targets.resolved,
                    attachment: Attachment::Color
                }
            ))
        );
    }

    #[test]
    fn test_depth_target_samples_gbuffer_depth_in_both_modes() {
        for mode in RenderMode::ALL {
            let mut fixture = Fixture::new(1, false);
            let frame = fixture.record(mode, RenderTarget::Depth);
            let composite = frame.pass(PassKind::Composite).unwrap();

            assert_eq!(
                composite.bound_textures().collect::<Vec<_>>(),
                vec![(
                    0,
                    TextureRef::Attachment {
                        set: fixture.targets.gbuffer,
                        attachment: Attachment::Depth
                    }
                )]
            );
            let is_depth = composite.commands.iter().any(|c| {
                matches!(
                    c,
                    DrawCommand::SetDrawUniforms(DrawUniforms::Composite(CompositeUniforms {
                        is_depth: 1,
                        ..
                    }))
                )
            });
            assert!(is_depth);
        }
    }

    #[test]
    fn test_composite_source_table() {
        let (g, r) = (AttachmentSetHandle(0), AttachmentSetHandle(1));
        let attachment_of = |mode, target| match composite_source(mode, target, g, r) {
            (TextureRef::Attachment { set, attachment }, _) => (set, attachment),
            other => panic!("unexpected source {:?}", other),
        };

        assert_eq!(attachment_of(RenderMode::Forward, RenderTarget::Albedo), (g, Attachment::Color));
        assert_eq!(attachment_of(RenderMode::Deferred, RenderTarget::Albedo), (r, Attachment::Color));
        assert_eq!(attachment_of(RenderMode::Deferred, RenderTarget::Normal), (g, Attachment::Normal));
        assert_eq!(attachment_of(RenderMode::Forward, RenderTarget::Position), (g, Attachment::Position));
        assert!(composite_source(RenderMode::Forward, RenderTarget::Depth, g, r).1);
        assert!(!composite_source(RenderMode::Forward, RenderTarget::Normal, g, r).1);
    }

    #[test]
    fn test_forward_entities_are_lit_and_deferred_are_not() {
        let first_program = |frame: &FrameCommands| {
            frame.pass(PassKind::GBuffer).and_then(|pass| {
                pass.commands.iter().find_map(|c| match c {
                    DrawCommand::UseProgram(id) => Some(*id),
                    _ => None,
                })
            })
        };

        let mut fixture = Fixture::new(2, true);
        let forward = fixture.record(RenderMode::Forward, RenderTarget::Albedo);
        let deferred = fixture.record(RenderMode::Deferred, RenderTarget::Albedo);

        let lit = fixture.programs.get(ProgramKind::ForwardLit).id;
        let unlit = fixture.programs.get(ProgramKind::Geometry).id;
        assert_eq!(first_program(&forward), Some(lit));
        assert_eq!(first_program(&deferred), Some(unlit));

        // the lit program reads the light array, so the forward pass binds it
        let forward_gbuffer = forward.pass(PassKind::GBuffer).unwrap();
        assert!(forward_gbuffer.commands.contains(&DrawCommand::BindParameterBlock {
            slot: GLOBALS_SLOT,
            channel: Channel::Globals,
            block: ParameterBlock { offset: 0, size: 204 },
        }));
        assert_eq!(forward_gbuffer.draw_count(), deferred.pass(PassKind::GBuffer).unwrap().draw_count());
    }

    #[test]
    fn test_gbuffer_binds_blocks_per_entity() {
        let mut fixture = Fixture::new(3, false);
        let offsets = [0, 256, 512];
        for (entity, offset) in fixture.scene.entities.iter_mut().zip(offsets) {
            entity.block = ParameterBlock { offset, size: 128 };
        }
        let frame = fixture.record(RenderMode::Forward, RenderTarget::Albedo);
        let gbuffer = frame.pass(PassKind::GBuffer).unwrap();

        let locals: Vec<u32> = gbuffer
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::BindParameterBlock {
                    slot: LOCALS_SLOT,
                    channel: Channel::Locals,
                    block,
                } => Some(block.offset),
                _ => None,
            })
            .collect();
        assert_eq!(locals, offsets.to_vec());
        assert_eq!(gbuffer.draw_count(), 3);
        assert!(gbuffer.depth_test);
    }

    #[test]
    fn test_gizmos_use_their_own_model_bindings() {
        let mut fixture = Fixture::new(0, true);
        let frame = fixture.record(RenderMode::Forward, RenderTarget::Albedo);
        let gbuffer = frame.pass(PassKind::GBuffer).unwrap();
        let gizmo_program = fixture.programs.get(ProgramKind::Gizmo).id;

        let bindings: Vec<(BindingId, u32)> = gbuffer
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::BindVertices { mesh, binding } => {
                    assert_eq!(binding.program, gizmo_program);
                    Some((binding.id, mesh.0))
                }
                _ => None,
            })
            .collect();

        // directional, point, point
        assert_eq!(bindings.len(), 3);
        assert_ne!(bindings[0], bindings[1]);
        assert_eq!(bindings[1], bindings[2]);
        assert_eq!(gbuffer.draw_count(), 3);

        let pyramid = &fixture.scene.meshes[fixture.scene.models[fixture.scene.gizmos.unwrap().directional].mesh];
        assert_eq!(pyramid.submeshes[0].bindings[0].1.id, bindings[0].0);
    }

    #[test]
    fn test_empty_scene_records_no_entity_draws() {
        let mut fixture = Fixture::new(0, false);
        let frame = fixture.record(RenderMode::Deferred, RenderTarget::Albedo);

        assert_eq!(frame.pass(PassKind::GBuffer).unwrap().draw_count(), 0);
        assert_eq!(frame.pass(PassKind::DeferredResolve).unwrap().draw_count(), 1);
        assert_eq!(frame.pass(PassKind::Composite).unwrap().draw_count(), 1);
    }

    #[test]
    fn test_quad_shared_between_passes() {
        let mut fixture = Fixture::new(1, true);
        let frame = fixture.record(RenderMode::Deferred, RenderTarget::Albedo);
        let quad_handle = fixture.scene.meshes[fixture.targets.quad_mesh].handle.unwrap();

        for kind in [PassKind::DeferredResolve, PassKind::Composite] {
            let pass = frame.pass(kind).unwrap();
            assert!(pass
                .commands
                .iter()
                .any(|c| matches!(c, DrawCommand::BindVertices { mesh, .. } if *mesh == quad_handle)));
        }
        // one binding per quad program, both cached on the single quad submesh
        assert_eq!(fixture.scene.meshes[fixture.targets.quad_mesh].submeshes[0].bindings.len(), 2);
    }
}
