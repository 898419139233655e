use thiserror::Error;

use gl_wrapper::api::LoadError;
use gl_wrapper::geometry::GBError;
use gl_wrapper::program::{BuildStage, PBError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to create a window: {0}")]
    WindowCreation(String),
    #[error("Failed to create an OpenGL context: {0}")]
    ContextCreation(#[from] glutin::error::Error),
    #[error("Failed to initialize OpenGL: {0}")]
    LoaderInit(#[from] LoadError),
    #[error("{stage} failed: {diagnostic}")]
    ShaderBuildFailed {
        stage: BuildStage,
        diagnostic: String,
    },
    #[error("Invalid shader program: {0}")]
    Program(PBError),
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GBError),
    #[error("Failed to present frame: {0}")]
    Present(glutin::error::Error),
}

impl From<PBError> for AppError {
    fn from(e: PBError) -> Self {
        match e {
            PBError::ShaderBuildFailed { stage, diagnostic } => {
                Self::ShaderBuildFailed { stage, diagnostic }
            }
            other => Self::Program(other),
        }
    }
}
