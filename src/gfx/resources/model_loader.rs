//! Wavefront OBJ loading
//!
//! Every object in the file becomes one submesh of a single [`Mesh`], with
//! interleaved position, normal and uv. Diffuse maps named by the MTL file
//! are resolved relative to the OBJ directory.

use std::path::{Path, PathBuf};

use crate::{
    error::RenderError,
    gfx::{
        backend::{RenderBackend, TextureHandle},
        resources::{primitives::compute_face_normals, texture::TextureCache},
        scene::{
            mesh::{Material, Mesh, Model, VertexBufferLayout},
            Scene,
        },
    },
};

/// Geometry and material references read from an OBJ file
#[derive(Debug)]
pub struct ObjData {
    pub mesh: Mesh,
    /// Material index per submesh, into `materials`
    pub submesh_materials: Vec<Option<usize>>,
    /// (name, diffuse texture path) per MTL material
    pub materials: Vec<(String, Option<PathBuf>)>,
}

/// Reads and triangulates `path`
pub fn read_obj(path: &Path) -> Result<ObjData, RenderError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| RenderError::ModelLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let materials = match materials {
        Ok(materials) => materials
            .into_iter()
            .map(|m| {
                let diffuse = m.diffuse_texture.map(|file| base_dir.join(file));
                (m.name, diffuse)
            })
            .collect(),
        Err(err) => {
            log::warn!("No materials for {}: {}", path.display(), err);
            Vec::new()
        }
    };

    let label = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut mesh = Mesh::new(label);
    let mut submesh_materials = Vec::with_capacity(models.len());

    for model in &models {
        let source = &model.mesh;
        let positions: Vec<[f32; 3]> = source
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();

        let normals: Vec<[f32; 3]> = if source.normals.len() == source.positions.len() {
            source
                .normals
                .chunks_exact(3)
                .map(|n| [n[0], n[1], n[2]])
                .collect()
        } else {
            log::debug!("Computing normals for '{}'", model.name);
            compute_face_normals(&positions, &source.indices)
        };

        let has_uvs = source.texcoords.len() / 2 == positions.len();
        let mut vertices = Vec::with_capacity(positions.len() * 8);
        for (i, position) in positions.iter().enumerate() {
            vertices.extend_from_slice(position);
            vertices.extend_from_slice(&normals[i]);
            if has_uvs {
                vertices.extend_from_slice(&source.texcoords[i * 2..i * 2 + 2]);
            } else {
                vertices.extend_from_slice(&[0.0, 0.0]);
            }
        }

        log::debug!(
            "Submesh '{}': {} vertices, {} triangles",
            model.name,
            positions.len(),
            source.indices.len() / 3
        );

        mesh.push_submesh(
            model.name.as_str(),
            VertexBufferLayout::position_normal_uv(),
            &vertices,
            &source.indices,
        );
        submesh_materials.push(source.material_id.filter(|&id| id < materials.len()));
    }

    Ok(ObjData {
        mesh,
        submesh_materials,
        materials,
    })
}

/// Loads an OBJ file into `scene`, uploading its mesh and textures
///
/// Returns the index of the new model. Submeshes without a usable diffuse map
/// get `fallback_albedo`.
pub fn load_model<B: RenderBackend>(
    backend: &mut B,
    textures: &mut TextureCache,
    scene: &mut Scene,
    path: &Path,
    fallback_albedo: TextureHandle,
) -> Result<usize, RenderError> {
    let ObjData {
        mut mesh,
        submesh_materials,
        materials,
    } = read_obj(path)?;

    let mut material_indices = Vec::with_capacity(materials.len());
    for (name, diffuse) in materials {
        let albedo = diffuse
            .and_then(|file| textures.load(backend, &file))
            .unwrap_or(fallback_albedo);
        material_indices.push(scene.add_material(Material { name, albedo }));
    }

    let mut default_material = None;
    let mut model_materials = Vec::with_capacity(submesh_materials.len());
    for material in submesh_materials {
        let index = match material {
            Some(id) => material_indices[id],
            None => *default_material.get_or_insert_with(|| {
                scene.add_material(Material {
                    name: "default".to_string(),
                    albedo: fallback_albedo,
                })
            }),
        };
        model_materials.push(index);
    }

    log::info!(
        "Loaded model {} ({} submeshes)",
        path.display(),
        mesh.submeshes.len()
    );

    mesh.handle = Some(backend.upload_mesh(&mesh));
    let name = mesh.label.clone();
    let mesh = scene.add_mesh(mesh);
    Ok(scene.add_model(Model {
        name,
        mesh,
        materials: model_materials,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::headless::HeadlessBackend;

    const TWO_TRIANGLES: &str = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
v 0 0 1
v 1 0 1
v 0 1 1
v 1 1 1
f 4 5 6 7
";

    #[test]
    fn test_objects_become_submeshes_with_computed_normals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.obj");
        std::fs::write(&path, TWO_TRIANGLES).unwrap();

        let data = read_obj(&path).unwrap();
        let mesh = &data.mesh;
        assert_eq!(mesh.label, "pair");
        assert_eq!(mesh.submeshes.len(), 2);
        assert_eq!(mesh.submeshes[0].index_count, 3);
        // the quad is triangulated
        assert_eq!(mesh.submeshes[1].index_count, 6);
        assert_eq!(mesh.submeshes[1].vertex_offset, 3 * 32);

        let floats: &[f32] = bytemuck::cast_slice(&mesh.vertex_data);
        assert_eq!(&floats[3..6], &[0.0, 0.0, 1.0]);
        assert_eq!(data.submesh_materials, vec![None, None]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = read_obj(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(matches!(err, RenderError::ModelLoad { .. }));
    }

    #[test]
    fn test_load_model_uploads_and_falls_back_to_white() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.obj");
        std::fs::write(&path, TWO_TRIANGLES).unwrap();

        let mut backend = HeadlessBackend::new();
        let white = backend.create_texture(&image::RgbaImage::new(1, 1), "white");
        let mut scene = Scene::new();
        let model = load_model(&mut backend, &mut TextureCache::new(), &mut scene, &path, white)
            .unwrap();

        let model = &scene.models[model];
        assert_eq!(model.materials.len(), 2);
        assert_eq!(model.materials[0], model.materials[1]);
        assert_eq!(scene.materials[model.materials[0]].albedo, white);
        assert!(scene.meshes[model.mesh].handle.is_some());
        assert_eq!(backend.meshes.len(), 1);
    }
}
