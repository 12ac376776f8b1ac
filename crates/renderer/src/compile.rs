//! CPU-side shader compilation and reflection.
//!
//! Every stage is parsed by the `naga` GLSL frontend and validated before any
//! GPU object exists, so compile diagnostics carry line and column information
//! and `--check` can run without a window. The GPU half of linking lives in
//! `gpu::program`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use wgpu::naga;
use wgpu::naga::front::glsl::{Frontend, Options, ParseErrors};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::StartupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStageKind {
    pub fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStageKind::Vertex => naga::ShaderStage::Vertex,
            ShaderStageKind::Fragment => naga::ShaderStage::Fragment,
            ShaderStageKind::Compute => naga::ShaderStage::Compute,
        }
    }
}

impl fmt::Display for ShaderStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStageKind::Vertex => "vertex",
            ShaderStageKind::Fragment => "fragment",
            ShaderStageKind::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// Raw GLSL text of one stage and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    stage: ShaderStageKind,
    origin: PathBuf,
    text: String,
}

impl ShaderSource {
    /// Reads the whole file. Missing, unreadable and blank files are all
    /// start-up failures naming the stage and path.
    pub fn load(stage: ShaderStageKind, path: &Path) -> Result<Self, StartupError> {
        let text = fs::read_to_string(path).map_err(|err| StartupError::ShaderLoad {
            stage,
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Self::from_text(stage, path, text)
    }

    pub fn from_text(
        stage: ShaderStageKind,
        origin: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Result<Self, StartupError> {
        let origin = origin.into();
        let text = text.into();
        if text.trim().is_empty() {
            return Err(StartupError::ShaderLoad {
                stage,
                path: origin,
                reason: "shader source is empty".to_string(),
            });
        }
        Ok(Self {
            stage,
            origin,
            text,
        })
    }

    pub fn stage(&self) -> ShaderStageKind {
        self.stage
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A stage that parsed and validated successfully.
#[derive(Debug)]
pub struct CompiledStage {
    source: ShaderSource,
    module: naga::Module,
}

impl CompiledStage {
    pub fn stage(&self) -> ShaderStageKind {
        self.source.stage
    }

    pub fn source(&self) -> &ShaderSource {
        &self.source
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }
}

/// Parses and validates a single stage.
pub fn compile_stage(program: &str, source: ShaderSource) -> Result<CompiledStage, StartupError> {
    let stage = source.stage;
    let compile_error = |diagnostic: String| StartupError::ShaderCompile {
        program: program.to_string(),
        stage,
        diagnostic,
    };

    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(stage.to_naga()), &source.text)
        .map_err(|errors| compile_error(format_parse_errors(&errors, &source.text)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    if let Err(err) = validator.validate(&module) {
        let location = err
            .spans()
            .next()
            .map(|(span, _)| {
                let loc = span.location(&source.text);
                format!("{}:{}: ", loc.line_number, loc.line_position)
            })
            .unwrap_or_default();
        return Err(compile_error(format!("{location}{}", err.as_inner())));
    }

    tracing::debug!(
        program,
        %stage,
        path = %source.origin.display(),
        globals = module.global_variables.len(),
        "compiled shader stage"
    );

    Ok(CompiledStage { source, module })
}

fn format_parse_errors(errors: &ParseErrors, text: &str) -> String {
    errors
        .errors
        .iter()
        .map(|error| {
            let loc = error.meta.location(text);
            format!("{}:{}: {}", loc.line_number, loc.line_position, error.kind)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resource binding declared by a program, resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinding {
    /// Variable name, or the block name for an anonymous uniform block.
    pub name: String,
    /// Type name of a uniform block (`FrameParams` in `uniform FrameParams { .. } params`).
    pub block: Option<String>,
    pub group: u32,
    pub binding: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    pub bindings: Vec<NamedBinding>,
    /// Declared `local_size` of the compute entry point.
    pub workgroup_size: Option<[u32; 3]>,
}

impl ProgramReflection {
    fn collect(stages: &[CompiledStage]) -> Self {
        let mut reflection = Self::default();
        for compiled in stages {
            let module = compiled.module();
            for (_, global) in module.global_variables.iter() {
                let Some(binding) = &global.binding else {
                    continue;
                };
                let block = module.types[global.ty].name.clone();
                let Some(name) = global.name.clone().or_else(|| block.clone()) else {
                    continue;
                };
                let entry = NamedBinding {
                    name,
                    block,
                    group: binding.group,
                    binding: binding.binding,
                };
                if !reflection.bindings.contains(&entry) {
                    reflection.bindings.push(entry);
                }
            }
            if let Some(entry) = module
                .entry_points
                .iter()
                .find(|entry| entry.stage == naga::ShaderStage::Compute)
            {
                reflection.workgroup_size = Some(entry.workgroup_size);
            }
        }
        reflection
    }

    /// Looks a binding up by variable name or uniform block name.
    pub fn binding(&self, name: &str) -> Option<&NamedBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.name == name || binding.block.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Vertex and fragment stages feeding a render pipeline.
    Render,
    /// A single compute stage.
    Compute,
}

/// Every requested stage compiled; ready for GPU pipeline creation.
#[derive(Debug)]
pub struct CompiledProgram {
    label: String,
    kind: ProgramKind,
    stages: Vec<CompiledStage>,
    reflection: ProgramReflection,
}

impl CompiledProgram {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }

    pub fn stage(&self, kind: ShaderStageKind) -> Option<&CompiledStage> {
        self.stages.iter().find(|compiled| compiled.stage() == kind)
    }

    pub(crate) fn link_error(&self, diagnostic: impl Into<String>) -> StartupError {
        StartupError::ShaderLink {
            program: self.label.clone(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// Collects stage sources for one program and compiles them together.
///
/// ```no_run
/// # use renderer::compile::{ShaderProgramBuilder, ShaderSource, ShaderStageKind};
/// # use std::path::Path;
/// let program = ShaderProgramBuilder::new("display")
///     .stage(ShaderSource::load(ShaderStageKind::Vertex, Path::new("shaders/quad.vert"))?)
///     .stage(ShaderSource::load(ShaderStageKind::Fragment, Path::new("shaders/quad.frag"))?)
///     .compile()?;
/// # Ok::<(), renderer::StartupError>(())
/// ```
#[derive(Debug)]
pub struct ShaderProgramBuilder {
    label: String,
    sources: Vec<ShaderSource>,
}

impl ShaderProgramBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sources: Vec::new(),
        }
    }

    pub fn stage(mut self, source: ShaderSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Compiles each stage independently, then checks that the stage set forms
    /// a program. Nothing is returned unless every stage compiled.
    pub fn compile(self) -> Result<CompiledProgram, StartupError> {
        let kinds: Vec<ShaderStageKind> = self.sources.iter().map(ShaderSource::stage).collect();

        let mut stages = Vec::with_capacity(self.sources.len());
        for source in self.sources {
            stages.push(compile_stage(&self.label, source)?);
        }

        let kind = match kinds.as_slice() {
            [ShaderStageKind::Vertex, ShaderStageKind::Fragment]
            | [ShaderStageKind::Fragment, ShaderStageKind::Vertex] => ProgramKind::Render,
            [ShaderStageKind::Compute] => ProgramKind::Compute,
            other => {
                let names: Vec<String> = other.iter().map(ToString::to_string).collect();
                return Err(StartupError::ShaderLink {
                    program: self.label,
                    diagnostic: format!(
                        "unsupported stage combination [{}]; expected vertex+fragment or compute",
                        names.join(", ")
                    ),
                });
            }
        };

        let reflection = ProgramReflection::collect(&stages);
        Ok(CompiledProgram {
            label: self.label,
            kind,
            stages,
            reflection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position, 1.0);
}
";

    const FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;
layout(set = 0, binding = 0) uniform texture2D screen_texture;
layout(set = 0, binding = 1) uniform sampler screen_sampler;
void main() {
    out_color = texture(sampler2D(screen_texture, screen_sampler), v_uv);
}
";

    const COMPUTE: &str = r"#version 450
layout(local_size_x = 4, local_size_y = 2) in;
layout(set = 0, binding = 0, rgba32f) uniform writeonly image2D screen_image;
void main() {
    ivec2 pixel = ivec2(gl_GlobalInvocationID.xy);
    imageStore(screen_image, pixel, vec4(1.0));
}
";

    fn source(stage: ShaderStageKind, text: &str) -> ShaderSource {
        ShaderSource::from_text(stage, format!("inline.{stage}"), text).expect("source")
    }

    #[test]
    fn compiles_display_program_and_reflects_bindings() {
        let program = ShaderProgramBuilder::new("display")
            .stage(source(ShaderStageKind::Vertex, VERTEX))
            .stage(source(ShaderStageKind::Fragment, FRAGMENT))
            .compile()
            .expect("display program");

        assert_eq!(program.kind(), ProgramKind::Render);
        let texture = program
            .reflection()
            .binding("screen_texture")
            .expect("screen_texture binding");
        assert_eq!((texture.group, texture.binding), (0, 0));
        assert!(program.reflection().workgroup_size.is_none());
    }

    #[test]
    fn compute_program_reports_local_size() {
        let program = ShaderProgramBuilder::new("compute")
            .stage(source(ShaderStageKind::Compute, COMPUTE))
            .compile()
            .expect("compute program");
        assert_eq!(program.kind(), ProgramKind::Compute);
        assert_eq!(program.reflection().workgroup_size, Some([4, 2, 1]));
        assert!(program.reflection().binding("screen_image").is_some());
    }

    #[test]
    fn uniform_block_resolves_by_block_name() {
        let text = r"#version 450
layout(local_size_x = 8, local_size_y = 8) in;
layout(set = 0, binding = 0, rgba32f) uniform writeonly image2D screen_image;
layout(std140, set = 0, binding = 1) uniform FrameParams {
    float time;
    uint frame;
    uvec2 resolution;
} params;
void main() {
    imageStore(screen_image, ivec2(gl_GlobalInvocationID.xy), vec4(params.time));
}
";
        let program = ShaderProgramBuilder::new("compute")
            .stage(source(ShaderStageKind::Compute, text))
            .compile()
            .expect("compute program");
        let block = program
            .reflection()
            .binding("FrameParams")
            .expect("FrameParams block");
        assert_eq!((block.group, block.binding), (0, 1));
    }

    #[test]
    fn syntax_error_names_program_stage_and_line() {
        let broken = "#version 450\nvoid main() {\n    float x = ;\n}\n";
        let err = ShaderProgramBuilder::new("compute")
            .stage(source(ShaderStageKind::Compute, broken))
            .compile()
            .expect_err("broken shader");
        match err {
            StartupError::ShaderCompile {
                program,
                stage,
                diagnostic,
            } => {
                assert_eq!(program, "compute");
                assert_eq!(stage, ShaderStageKind::Compute);
                assert!(diagnostic.starts_with("3:"), "diagnostic: {diagnostic}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lone_vertex_stage_fails_to_link() {
        let err = ShaderProgramBuilder::new("display")
            .stage(source(ShaderStageKind::Vertex, VERTEX))
            .compile()
            .expect_err("incomplete program");
        assert!(matches!(err, StartupError::ShaderLink { .. }), "{err}");
    }

    #[test]
    fn compute_mixed_with_vertex_fails_to_link() {
        let err = ShaderProgramBuilder::new("mixed")
            .stage(source(ShaderStageKind::Vertex, VERTEX))
            .stage(source(ShaderStageKind::Compute, COMPUTE))
            .compile()
            .expect_err("mixed program");
        assert!(err.to_string().contains("vertex, compute"), "{err}");
    }

    #[test]
    fn blank_source_is_a_load_failure() {
        let err = ShaderSource::from_text(ShaderStageKind::Fragment, "blank.frag", " \n\t\n")
            .expect_err("blank");
        assert!(matches!(
            err,
            StartupError::ShaderLoad {
                stage: ShaderStageKind::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_a_load_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.comp");
        let err = ShaderSource::load(ShaderStageKind::Compute, &path).expect_err("missing");
        match err {
            StartupError::ShaderLoad { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_source_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quad.vert");
        fs::write(&path, VERTEX).expect("write shader");
        let loaded = ShaderSource::load(ShaderStageKind::Vertex, &path).expect("load");
        assert_eq!(loaded.text(), VERTEX);
        assert_eq!(loaded.origin(), path.as_path());
    }
}
