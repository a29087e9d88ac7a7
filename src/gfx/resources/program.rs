//! Shader programs and their declared vertex inputs
//!
//! Each [`ProgramKind`] maps to one WGSL module. The built-in sources are
//! compiled into the binary; a shader directory from the configuration can
//! replace them file by file.

use std::path::Path;

use crate::{error::RenderError, gfx::backend::RenderBackend};

/// Handle identifying a program within a [`ProgramLibrary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// One vertex input a program expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAttribute {
    pub location: u32,
    pub component_count: u32,
}

impl ProgramAttribute {
    pub const fn new(location: u32, component_count: u32) -> Self {
        Self {
            location,
            component_count,
        }
    }
}

const MESH_INPUTS: &[ProgramAttribute] = &[
    ProgramAttribute::new(0, 3),
    ProgramAttribute::new(1, 3),
    ProgramAttribute::new(2, 2),
];

const QUAD_INPUTS: &[ProgramAttribute] = &[ProgramAttribute::new(0, 3), ProgramAttribute::new(1, 2)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Writes albedo, position and normal for textured meshes
    Geometry,
    /// Flat-colored light markers drawn into the G-buffer
    Gizmo,
    /// Full-screen lighting pass over the G-buffer
    Resolve,
    /// Presents one attachment to the screen
    Composite,
    /// Geometry pass variant that lights albedo directly from the global block
    ForwardLit,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 5] = [
        ProgramKind::Geometry,
        ProgramKind::Gizmo,
        ProgramKind::Resolve,
        ProgramKind::Composite,
        ProgramKind::ForwardLit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::Geometry => "geometry",
            ProgramKind::Gizmo => "gizmo",
            ProgramKind::Resolve => "resolve",
            ProgramKind::Composite => "composite",
            ProgramKind::ForwardLit => "forward",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ProgramKind::Geometry => "geometry.wgsl",
            ProgramKind::Gizmo => "gizmo.wgsl",
            ProgramKind::Resolve => "resolve.wgsl",
            ProgramKind::Composite => "composite.wgsl",
            ProgramKind::ForwardLit => "forward.wgsl",
        }
    }

    pub fn builtin_source(self) -> &'static str {
        match self {
            ProgramKind::Geometry => include_str!("../shaders/geometry.wgsl"),
            ProgramKind::Gizmo => include_str!("../shaders/gizmo.wgsl"),
            ProgramKind::Resolve => include_str!("../shaders/resolve.wgsl"),
            ProgramKind::Composite => include_str!("../shaders/composite.wgsl"),
            ProgramKind::ForwardLit => include_str!("../shaders/forward.wgsl"),
        }
    }

    pub fn inputs(self) -> &'static [ProgramAttribute] {
        match self {
            ProgramKind::Geometry | ProgramKind::ForwardLit | ProgramKind::Gizmo => MESH_INPUTS,
            ProgramKind::Resolve | ProgramKind::Composite => QUAD_INPUTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub kind: ProgramKind,
    pub inputs: Vec<ProgramAttribute>,
    /// False once compilation failed; draws using it are skipped
    pub usable: bool,
}

impl Program {
    pub fn new(id: ProgramId, kind: ProgramKind) -> Self {
        Self {
            id,
            name: kind.name().to_string(),
            kind,
            inputs: kind.inputs().to_vec(),
            usable: true,
        }
    }
}

/// Every program the renderer draws with, indexed by [`ProgramKind`]
#[derive(Debug, Clone)]
pub struct ProgramLibrary {
    programs: Vec<Program>,
}

impl ProgramLibrary {
    /// Compiles all programs through `backend`
    ///
    /// A program that fails to compile is logged and kept as unusable.
    pub fn load<B: RenderBackend>(backend: &mut B, shader_dir: Option<&Path>) -> Self {
        let mut programs = Vec::with_capacity(ProgramKind::ALL.len());

        for (index, kind) in ProgramKind::ALL.into_iter().enumerate() {
            let mut program = Program::new(ProgramId(index as u32), kind);

            let source = match shader_dir {
                Some(dir) => read_source(&dir.join(kind.file_name())).unwrap_or_else(|err| {
                    log::warn!("{}, using built-in '{}' source", err, kind.name());
                    kind.builtin_source().to_string()
                }),
                None => kind.builtin_source().to_string(),
            };

            match backend.compile_program(&program, &source) {
                Ok(()) => log::info!("Compiled program '{}'", program.name),
                Err(err) => {
                    log::error!("{}", err);
                    program.usable = false;
                }
            }

            programs.push(program);
        }

        Self { programs }
    }

    pub fn get(&self, kind: ProgramKind) -> &Program {
        // `load` pushes one program per kind in declaration order
        &self.programs[kind as usize]
    }

    pub fn by_id(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Program> {
        self.programs.iter()
    }
}

fn read_source(path: &Path) -> Result<String, RenderError> {
    std::fs::read_to_string(path).map_err(|source| RenderError::ShaderSource {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::headless::HeadlessBackend;

    #[test]
    fn test_library_compiles_every_kind() {
        let mut backend = HeadlessBackend::new();
        let library = ProgramLibrary::load(&mut backend, None);

        for kind in ProgramKind::ALL {
            let program = library.get(kind);
            assert_eq!(program.kind, kind);
            assert!(program.usable);
            assert_eq!(library.by_id(program.id).map(|p| p.kind), Some(kind));
        }
        assert_eq!(backend.compiled_programs.len(), ProgramKind::ALL.len());
    }

    #[test]
    fn test_failed_compile_marks_program_unusable() {
        let mut backend = HeadlessBackend::new();
        backend.failing_programs.push("resolve".to_string());

        let library = ProgramLibrary::load(&mut backend, None);
        assert!(!library.get(ProgramKind::Resolve).usable);
        assert!(library.get(ProgramKind::Geometry).usable);
    }

    #[test]
    fn test_shader_dir_overrides_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gizmo.wgsl"), "// custom gizmo").unwrap();

        let mut backend = HeadlessBackend::new();
        ProgramLibrary::load(&mut backend, Some(dir.path()));

        let gizmo = backend
            .compiled_programs
            .iter()
            .find(|(name, _)| name == "gizmo")
            .map(|(_, source)| source.as_str());
        assert_eq!(gizmo, Some("// custom gizmo"));

        let geometry = backend
            .compiled_programs
            .iter()
            .find(|(name, _)| name == "geometry")
            .map(|(_, source)| source.as_str());
        assert_eq!(geometry, Some(ProgramKind::Geometry.builtin_source()));
    }

    #[test]
    fn test_quad_programs_take_position_and_uv() {
        assert_eq!(
            ProgramKind::Composite.inputs(),
            &[ProgramAttribute::new(0, 3), ProgramAttribute::new(1, 2)]
        );
        assert_eq!(ProgramKind::Geometry.inputs().len(), 3);
        assert_eq!(ProgramKind::ForwardLit.inputs(), ProgramKind::Geometry.inputs());
    }

    #[test]
    fn test_only_forward_program_reads_lights() {
        assert!(ProgramKind::ForwardLit.builtin_source().contains("globals.lights"));
        assert!(!ProgramKind::Geometry.builtin_source().contains("globals.lights"));
    }
}
