use thiserror::Error;

/// Errors originating from the core pipeline.
///
/// None of these are fatal to the frame loop: callers keep the last valid
/// state and carry on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid atlas or effect configuration (empty character set, bad limits).
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Font or rasterizer unavailable.
    #[error("Backend de rendu indisponible : {0}")]
    RenderBackend(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// Invalid width/height dimensions.
    #[error("Dimensions invalides : {width}×{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for [`CoreError::RenderBackend`].
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::RenderBackend(msg.into())
    }
}
