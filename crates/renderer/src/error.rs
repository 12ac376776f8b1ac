use std::path::PathBuf;

use crate::compile::ShaderStageKind;
use crate::mesh::MeshError;

/// Failures that abort start-up before the first frame.
///
/// Every variant names the stage of start-up that failed; resources acquired
/// before the failure are released as the partially built state is dropped.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to initialise GPU resources: {0}")]
    ResourceInit(String),
    #[error("failed to load {stage} shader '{}': {reason}", path.display())]
    ShaderLoad {
        stage: ShaderStageKind,
        path: PathBuf,
        reason: String,
    },
    #[error("{stage} stage of program '{program}' failed to compile:\n{diagnostic}")]
    ShaderCompile {
        program: String,
        stage: ShaderStageKind,
        diagnostic: String,
    },
    #[error("program '{program}' failed to link: {diagnostic}")]
    ShaderLink { program: String, diagnostic: String },
    #[error("failed to set up material: could not decode image '{}': {reason}", path.display())]
    ImageDecode { path: PathBuf, reason: String },
    #[error(transparent)]
    InvalidMesh(#[from] MeshError),
}

impl StartupError {
    /// Short name of the start-up phase that failed, for exit reporting.
    pub fn phase(&self) -> &'static str {
        match self {
            StartupError::ResourceInit(_) => "resource initialisation",
            StartupError::ShaderLoad { .. } => "shader load",
            StartupError::ShaderCompile { .. } => "shader compile",
            StartupError::ShaderLink { .. } => "program link",
            StartupError::ImageDecode { .. } => "material setup",
            StartupError::InvalidMesh(_) => "mesh setup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_names_stage_and_path() {
        let err = StartupError::ShaderLoad {
            stage: ShaderStageKind::Compute,
            path: PathBuf::from("shaders/missing.comp"),
            reason: "No such file or directory".into(),
        };
        let message = err.to_string();
        assert!(message.contains("compute"));
        assert!(message.contains("shaders/missing.comp"));
        assert_eq!(err.phase(), "shader load");
    }

    #[test]
    fn mesh_errors_convert() {
        let err: StartupError = MeshError::IndexOutOfRange {
            position: 0,
            index: 9,
            vertex_count: 4,
        }
        .into();
        assert!(matches!(err, StartupError::InvalidMesh(_)));
        assert_eq!(err.phase(), "mesh setup");
    }
}
