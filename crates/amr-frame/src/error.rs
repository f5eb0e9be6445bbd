#![warn(missing_docs)]

//! Error types for the frame library.
//!
//! This module defines the errors returned when a map frame is built from
//! parameters that cannot describe a valid metric <-> local mapping.

use core::fmt;

/// Errors that can occur when constructing or using a map frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The map resolution was zero, negative or not a finite number.
    /// Carries the offending value.
    InvalidResolution(f64),
    /// One of the origin components was not a finite number.
    InvalidOrigin(&'static str),
    /// The map width or height was zero.
    InvalidDimensions(&'static str),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidResolution(value) => {
                write!(f, "Invalid map resolution: {} (must be positive)", value)
            }
            FrameError::InvalidOrigin(msg) => write!(f, "Invalid map origin: {}", msg),
            FrameError::InvalidDimensions(msg) => write!(f, "Invalid map dimensions: {}", msg),
        }
    }
}

impl core::error::Error for FrameError {}
