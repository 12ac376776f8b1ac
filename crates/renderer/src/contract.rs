//! Fixed binding layout shared by the compute and display programs.
//!
//! Compute (group 0):
//!
//! | binding | name               | resource                      |
//! |---------|--------------------|-------------------------------|
//! | 0       | `screen_image`     | `rgba32f` write-only image    |
//! | 1       | `FrameParams`      | uniform block                 |
//! | 2       | `channel0`         | sampled input texture         |
//! | 3       | `channel0_sampler` | sampler for the input channel |
//!
//! Display (group 0): `screen_texture` at 0 and `screen_sampler` at 1.
//!
//! Bindings are resolved by name once the programs compile; uniform blocks
//! resolve by block name.

use crate::compile::{
    CompiledProgram, ProgramKind, ShaderProgramBuilder, ShaderSource, ShaderStageKind,
};
use crate::dispatch::WorkgroupSize;
use crate::error::StartupError;
use crate::types::ShaderPaths;

pub const SCREEN_IMAGE_NAME: &str = "screen_image";
pub const SCREEN_IMAGE_BINDING: u32 = 0;
pub const FRAME_PARAMS_NAME: &str = "FrameParams";
pub const FRAME_PARAMS_BINDING: u32 = 1;
pub const CHANNEL_TEXTURE_NAME: &str = "channel0";
pub const CHANNEL_TEXTURE_BINDING: u32 = 2;
pub const CHANNEL_SAMPLER_NAME: &str = "channel0_sampler";
pub const CHANNEL_SAMPLER_BINDING: u32 = 3;

pub const SCREEN_TEXTURE_NAME: &str = "screen_texture";
pub const SCREEN_TEXTURE_BINDING: u32 = 0;
pub const SCREEN_SAMPLER_NAME: &str = "screen_sampler";
pub const SCREEN_SAMPLER_BINDING: u32 = 1;

const GROUP: u32 = 0;

/// Confirms a render program samples the screen image where the display pass binds it.
pub fn check_display_program(program: &CompiledProgram) -> Result<(), StartupError> {
    if program.kind() != ProgramKind::Render {
        return Err(program.link_error("display program must have vertex and fragment stages"));
    }
    expect_binding(program, SCREEN_TEXTURE_NAME, SCREEN_TEXTURE_BINDING)?;
    expect_binding(program, SCREEN_SAMPLER_NAME, SCREEN_SAMPLER_BINDING)
}

/// Confirms a compute program writes the screen image at the fixed slot and
/// declares the configured workgroup size.
pub fn check_compute_program(
    program: &CompiledProgram,
    workgroup: WorkgroupSize,
) -> Result<(), StartupError> {
    if program.kind() != ProgramKind::Compute {
        return Err(program.link_error("compute program must have exactly one compute stage"));
    }
    expect_binding(program, SCREEN_IMAGE_NAME, SCREEN_IMAGE_BINDING)?;
    expect_binding(program, FRAME_PARAMS_NAME, FRAME_PARAMS_BINDING)?;
    // The input channel is optional, but must sit at its slot when declared.
    for (name, slot) in [
        (CHANNEL_TEXTURE_NAME, CHANNEL_TEXTURE_BINDING),
        (CHANNEL_SAMPLER_NAME, CHANNEL_SAMPLER_BINDING),
    ] {
        if program.reflection().binding(name).is_some() {
            expect_binding(program, name, slot)?;
        }
    }

    match program.reflection().workgroup_size {
        Some(local_size) if workgroup.matches_local_size(local_size) => Ok(()),
        Some([x, y, z]) => Err(program.link_error(format!(
            "shader declares local_size {x}x{y}x{z} but the configured workgroup is {workgroup}x1"
        ))),
        None => Err(program.link_error("compute stage has no entry point")),
    }
}

/// Both programs, compiled and checked against the binding layout above.
#[derive(Debug)]
pub struct PreparedPrograms {
    pub display: CompiledProgram,
    pub compute: CompiledProgram,
}

/// Loads every stage from disk, compiles both programs and checks the
/// contract. This is all of start-up that does not need a GPU.
pub fn prepare_programs(
    shaders: &ShaderPaths,
    workgroup: WorkgroupSize,
) -> Result<PreparedPrograms, StartupError> {
    let display = ShaderProgramBuilder::new("display")
        .stage(ShaderSource::load(ShaderStageKind::Vertex, &shaders.vertex)?)
        .stage(ShaderSource::load(ShaderStageKind::Fragment, &shaders.fragment)?)
        .compile()?;
    check_display_program(&display)?;

    let compute = ShaderProgramBuilder::new("compute")
        .stage(ShaderSource::load(ShaderStageKind::Compute, &shaders.compute)?)
        .compile()?;
    check_compute_program(&compute, workgroup)?;

    Ok(PreparedPrograms { display, compute })
}

fn expect_binding(program: &CompiledProgram, name: &str, slot: u32) -> Result<(), StartupError> {
    let Some(binding) = program.reflection().binding(name) else {
        return Err(program.link_error(format!("missing required binding '{name}'")));
    };
    if (binding.group, binding.binding) != (GROUP, slot) {
        return Err(program.link_error(format!(
            "'{name}' must be bound at set {GROUP}, binding {slot} (found set {}, binding {})",
            binding.group, binding.binding
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(text: &str) -> CompiledProgram {
        let source =
            ShaderSource::from_text(ShaderStageKind::Compute, "test.comp", text).expect("source");
        ShaderProgramBuilder::new("compute")
            .stage(source)
            .compile()
            .expect("compile")
    }

    fn compute_with(local_size: &str, binding: u32) -> String {
        compute_with_params(local_size, binding, FRAME_PARAMS_BINDING)
    }

    fn compute_with_params(local_size: &str, binding: u32, params_binding: u32) -> String {
        format!(
            "#version 450\n\
             layout({local_size}) in;\n\
             layout(set = 0, binding = {binding}, rgba32f) uniform writeonly image2D screen_image;\n\
             layout(std140, set = 0, binding = {params_binding}) uniform FrameParams {{\n\
             \x20   float time;\n\
             \x20   uint frame;\n\
             \x20   uvec2 resolution;\n\
             }} params;\n\
             void main() {{\n\
             \x20   imageStore(screen_image, ivec2(gl_GlobalInvocationID.xy), vec4(params.time));\n\
             }}\n"
        )
    }

    fn display(sampler_binding: u32) -> CompiledProgram {
        let vertex = "#version 450\n\
             layout(location = 0) in vec3 a_position;\n\
             layout(location = 1) in vec2 a_uv;\n\
             layout(location = 0) out vec2 v_uv;\n\
             void main() {\n\
             \x20   v_uv = a_uv;\n\
             \x20   gl_Position = vec4(a_position, 1.0);\n\
             }\n";
        let fragment = format!(
            "#version 450\n\
             layout(location = 0) in vec2 v_uv;\n\
             layout(location = 0) out vec4 out_color;\n\
             layout(set = 0, binding = 0) uniform texture2D screen_texture;\n\
             layout(set = 0, binding = {sampler_binding}) uniform sampler screen_sampler;\n\
             void main() {{\n\
             \x20   out_color = texture(sampler2D(screen_texture, screen_sampler), v_uv);\n\
             }}\n"
        );
        ShaderProgramBuilder::new("display")
            .stage(
                ShaderSource::from_text(ShaderStageKind::Vertex, "test.vert", vertex)
                    .expect("vertex"),
            )
            .stage(
                ShaderSource::from_text(ShaderStageKind::Fragment, "test.frag", fragment)
                    .expect("fragment"),
            )
            .compile()
            .expect("compile")
    }

    #[test]
    fn accepts_matching_compute_program() {
        let program = compute(&compute_with("local_size_x = 8, local_size_y = 4", 0));
        let workgroup = WorkgroupSize::new(8, 4).expect("workgroup");
        check_compute_program(&program, workgroup).expect("contract holds");
    }

    #[test]
    fn rejects_workgroup_mismatch() {
        let program = compute(&compute_with("local_size_x = 16, local_size_y = 16", 0));
        let err = check_compute_program(&program, WorkgroupSize::default()).expect_err("mismatch");
        let message = err.to_string();
        assert!(message.contains("16x16x1"), "{message}");
        assert!(message.contains("8x8"), "{message}");
    }

    #[test]
    fn rejects_storage_image_at_wrong_slot() {
        let program = compute(&compute_with("local_size_x = 8, local_size_y = 8", 5));
        let err = check_compute_program(&program, WorkgroupSize::default()).expect_err("slot");
        assert!(err.to_string().contains("binding 5"), "{err}");
    }

    #[test]
    fn display_check_rejects_compute_program() {
        let program = compute(&compute_with("local_size_x = 8, local_size_y = 8", 0));
        let err = check_display_program(&program).expect_err("wrong kind");
        assert!(matches!(err, StartupError::ShaderLink { .. }));
    }

    #[test]
    fn accepts_display_program_with_sampler_at_slot() {
        check_display_program(&display(SCREEN_SAMPLER_BINDING)).expect("contract holds");
    }

    #[test]
    fn rejects_display_sampler_at_wrong_slot() {
        let err = check_display_program(&display(5)).expect_err("sampler slot");
        match err {
            StartupError::ShaderLink { program, diagnostic } => {
                assert_eq!(program, "display");
                assert!(diagnostic.contains(SCREEN_SAMPLER_NAME), "{diagnostic}");
                assert!(diagnostic.contains("binding 5"), "{diagnostic}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_frame_params_at_wrong_slot() {
        let text = compute_with_params("local_size_x = 8, local_size_y = 8", 0, 7);
        let err = check_compute_program(&compute(&text), WorkgroupSize::default())
            .expect_err("frame params slot");
        let message = err.to_string();
        assert!(message.contains(FRAME_PARAMS_NAME), "{message}");
        assert!(message.contains("binding 7"), "{message}");
    }
}
