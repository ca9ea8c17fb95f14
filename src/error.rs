//! Error taxonomy for the matching engine.

use thiserror::Error;

/// Everything that can go wrong when constructing or driving an [`crate::Engine`].
///
/// Every match call is atomic with respect to visible engine state: on any
/// failure the engine remains usable and previously cached textures stay
/// valid.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Raised at construction time, e.g. a local block size that is not a
    /// positive power of two.
    #[error("invalid engine configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// A shader module failed to build during engine initialization.
    #[error("shader build failure in `{module}`: {detail}")]
    ShaderBuildFailure { module: &'static str, detail: String },

    /// The rotated kernel does not fit inside the texture for the requested
    /// rotation, i.e. the resulting cost-surface size would be non-positive.
    #[error("rotated kernel does not fit inside texture: {0}")]
    InvalidDimensions(&'static str),

    /// A device-side allocation failed.
    #[error("device resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// Any dispatch or read-back error reported by the backend.
    #[error("device failure: {0}")]
    DeviceFailure(String),

    /// `invalidate` was called with an id that is not currently cached.
    #[error("unknown texture id: {0}")]
    UnknownId(String),
}

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, MatchError>;
