//! This module defines the error types used by the `amr-map` crate.

use amr_frame::FrameError;
use thiserror::Error;

/// Coarse classification used to pick how a load failure is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The robot answered but something the viewer needs was missing or invalid.
    DataUnavailable,
    /// A request failed on the way to or from the robot.
    Network,
}

/// Errors raised while loading the map and its frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("No localization data available")]
    NoLocalization,

    #[error("No map data available")]
    NoMap,

    #[error("No map identifier available")]
    NoMapId,

    #[error("No map resolution available")]
    NoResolution,

    #[error("No map origin available")]
    NoOrigin,

    #[error("{0}")]
    InvalidFrame(#[from] FrameError),

    #[error("Failed to fetch {resource}: {reason}")]
    Network { resource: String, reason: String },

    #[error("Failed to fetch {resource}: server responded with HTTP {status}")]
    Status { resource: String, status: u16 },

    #[error("Malformed response from {resource}: {reason}")]
    Malformed { resource: String, reason: String },

    #[error("Failed to decode map image {resource}: {reason}")]
    Decode { resource: String, reason: String },
}

impl LoadError {
    /// Which banner family the error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Network { .. } | LoadError::Status { .. } => ErrorKind::Network,
            _ => ErrorKind::DataUnavailable,
        }
    }

    /// Identifier of the resource that failed, for network class errors.
    pub fn resource(&self) -> Option<&str> {
        match self {
            LoadError::Network { resource, .. }
            | LoadError::Status { resource, .. }
            | LoadError::Malformed { resource, .. }
            | LoadError::Decode { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

/// Errors raised while submitting a localization initialization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    #[error("Permission denied: localization cannot be initialized right now")]
    Forbidden,

    #[error("Localization service not found")]
    NotFound,

    #[error("Validation error: the robot rejected the pose")]
    Validation,

    #[error("Failed to initialize localization (HTTP {0})")]
    Http(u16),

    #[error("Localization initialization rejected: {0}")]
    Rejected(String),

    #[error("Failed to reach localization service: {0}")]
    Network(String),
}

impl CommitError {
    /// Map a non-success HTTP status to the matching error.
    pub fn from_status(status: u16) -> Self {
        match status {
            403 => CommitError::Forbidden,
            404 => CommitError::NotFound,
            422 => CommitError::Validation,
            other => CommitError::Http(other),
        }
    }
}
