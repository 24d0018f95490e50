use thiserror::Error;

use glint_io::IoError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unsupported capture format: {0}")]
    UnsupportedCaptureFormat(String),

    #[error("Cannot create a {width}x{height} surface")]
    SurfaceCreation { width: u32, height: u32 },

    #[error("The renderer has been destroyed")]
    Destroyed,

    #[error("The renderer was started twice")]
    AlreadyStarted,

    #[error(transparent)]
    Io(#[from] IoError),
}
