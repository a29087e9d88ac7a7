//! Scene state owned by the renderer
//!
//! Collections are appended during setup and read every frame. Entities keep
//! their index for the whole session; only their parameter block changes.

pub mod light;
pub mod mesh;

use cgmath::Vector3;

use crate::gfx::aligned_buffer::ParameterBlock;

use self::{
    light::{Light, LightKind},
    mesh::{Material, Mesh, Model},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub position: Vector3<f32>,
    /// Index into [`Scene::models`]
    pub model: usize,
    /// Where this frame's transforms were packed
    pub block: ParameterBlock,
}

/// Models drawn in place of each light kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GizmoModels {
    pub point: usize,
    pub directional: usize,
}

impl GizmoModels {
    /// Model used to draw a light of `kind`
    pub fn model_for(self, kind: LightKind) -> usize {
        match kind {
            LightKind::Point => self.point,
            LightKind::Directional => self.directional,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    pub entities: Vec<Entity>,
    pub lights: Vec<Light>,
    pub meshes: Vec<Mesh>,
    pub models: Vec<Model>,
    pub materials: Vec<Material>,
    pub gizmos: Option<GizmoModels>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_model(&mut self, model: Model) -> usize {
        debug_assert!(model.mesh < self.meshes.len());
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn add_entity(&mut self, position: Vector3<f32>, model: usize) -> usize {
        debug_assert!(model < self.models.len());
        self.entities.push(Entity {
            position,
            model,
            block: ParameterBlock::default(),
        });
        self.entities.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn light_count(&self, kind: LightKind) -> usize {
        self.lights.iter().filter(|l| l.kind == kind).count()
    }
}
