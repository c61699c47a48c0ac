//! Errors produced while loading and compiling effect definitions.

use thiserror::Error;

/// Failures surfaced while parsing/validating authored effect definitions.
#[derive(Debug, Error)]
pub enum EffectError {
    /// The YAML document didn't match the expected schema.
    #[error("invalid effect definition document: {0}")]
    InvalidDocument(#[from] serde_yaml::Error),
    /// An authored `delivery_kind` wasn't one of `area`/`target`/`visual`.
    #[error("unknown delivery kind: {0}")]
    UnknownDeliveryKind(String),
    /// An authored geometry `shape` wasn't recognized.
    #[error("unknown geometry shape: {0}")]
    UnknownGeometryShape(String),
    /// An authored `motion_profile` wasn't recognized.
    #[error("unknown motion profile: {0}")]
    UnknownMotionProfile(String),
    /// An authored `impact_policy` wasn't recognized.
    #[error("unknown impact policy: {0}")]
    UnknownImpactPolicy(String),
    /// An authored `end_policy` wasn't recognized.
    #[error("unknown end policy: {0}")]
    UnknownEndPolicy(String),
    /// An authored end condition wasn't recognized.
    #[error("unknown end condition: {0}")]
    UnknownEndCondition(String),
}
