//! Error types for the build-volume registry.

use thiserror::Error;

/// Errors related to a single build-volume entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// A required field is missing or empty.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A printable-area dimension is zero, negative or not finite.
    #[error("Invalid dimension for '{field}': {value}")]
    InvalidDimension { field: String, value: f64 },

    /// The asset extension does not match its declared format.
    #[error("Asset '{path}' does not match format {format}")]
    AssetFormatMismatch { path: String, format: String },
}

/// Errors raised while assembling a registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// A registry needs at least one entry to have a default.
    #[error("Registry has no build volumes")]
    Empty,

    /// Two entries share a printer id.
    #[error("Duplicate printer id: {0}")]
    DuplicateId(String),

    /// An entry failed validation.
    #[error("Invalid build volume: {0}")]
    Invalid(#[from] ProfileError),
}

/// Result type alias for entry validation.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Result type alias for registry construction.
pub type RegistryResult<T> = Result<T, RegistryError>;
