//! Error type shared by all field, halo and communication operations.

use crate::geometry::{Dim3, In3D};
use thiserror::Error;

/// Unified error type for `halofield` operations.
///
/// Every variant signals a programming or configuration error upstream;
/// operations returning it leave their target unmodified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Two arrays that must agree in shape do not.
    #[error("Shape mismatch for {component}-component: expected {expected}, found {found}")]
    ShapeMismatch {
        component: Dim3,
        expected: In3D<usize>,
        found: In3D<usize>,
    },
    /// An array layout is degenerate or cannot hold the requested halo.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
    /// A halo exchange handle would be shared, or was used with a foreign array.
    #[error("Resource ownership violated: {0}")]
    ResourceOwnership(String),
    /// A communication backend failed to deliver a message as expected.
    #[error("Communication failed: {0}")]
    Communication(String),
    /// The domain decomposition configuration was rejected.
    #[error("Invalid domain configuration: {0}")]
    InvalidConfig(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, FieldError>;
