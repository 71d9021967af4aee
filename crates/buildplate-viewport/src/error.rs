//! Error types for the viewport crate.
//!
//! Load and render failures surface as data (a toast and a model without an
//! instance); these types only travel across the loader, backend and panel
//! seams.

use std::io;
use thiserror::Error;

/// Errors produced while loading geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The file could not be read.
    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    /// The file was read but could not be parsed.
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// The extension is not a supported mesh format.
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// The mesh has no triangles.
    #[error("Model contains no triangles: {0}")]
    EmptyGeometry(String),

    /// No async runtime is available to run the load.
    #[error("No async runtime available to load {0}")]
    NoRuntime(String),

    /// The load task ended without reporting.
    #[error("Load task aborted: {0}")]
    Aborted(String),
}

impl LoadError {
    pub(crate) fn io(path: &str, err: io::Error) -> Self {
        LoadError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn parse(path: &str, reason: impl std::fmt::Display) -> Self {
        LoadError::Parse {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from a render backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// GPU buffer or vertex array creation failed.
    #[error("Buffer creation error: {0}")]
    Buffer(String),

    /// Shader compilation or linking failed.
    #[error("Shader compilation error: {0}")]
    Shader(String),

    /// Any other backend failure.
    #[error("Render backend error: {0}")]
    Backend(String),
}

/// Errors from the adjustment tool panel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    /// A field could not be parsed as a number.
    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },

    /// The operation needs a selected model.
    #[error("No model selected")]
    NoSelection,

    /// The selected model has no loaded geometry yet.
    #[error("Model geometry not loaded: {0}")]
    GeometryNotLoaded(String),
}

/// Umbrella error for viewport construction.
#[derive(Error, Debug)]
pub enum ViewportError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Panel error: {0}")]
    Panel(#[from] PanelError),

    #[error("Configuration error: {0}")]
    Config(#[from] buildplate_settings::ConfigError),
}

pub type LoadResult<T> = Result<T, LoadError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = LoadError::io(
            "/models/missing.stl",
            io::Error::new(io::ErrorKind::NotFound, "No such file"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to read /models/missing.stl: No such file"
        );

        let err = LoadError::EmptyGeometry("/models/empty.stl".to_string());
        assert_eq!(
            err.to_string(),
            "Model contains no triangles: /models/empty.stl"
        );
    }

    #[test]
    fn test_panel_error_display() {
        let err = PanelError::InvalidNumber {
            field: "position.x".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid number for position.x: 'abc'");
        assert_eq!(PanelError::NoSelection.to_string(), "No model selected");
    }

    #[test]
    fn test_error_conversion() {
        let err: ViewportError = RenderError::Shader("bad".to_string()).into();
        assert!(matches!(err, ViewportError::Render(_)));

        let err: ViewportError = LoadError::UnsupportedFormat("3mf".to_string()).into();
        assert!(matches!(err, ViewportError::Load(_)));
    }
}
