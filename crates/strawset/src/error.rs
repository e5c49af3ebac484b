// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

/// Error type for dataset checking operations.
///
/// Only conditions that make a run impossible are errors. Decode faults and
/// invariant violations found while checking a sample are collected into the
/// reports instead.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// Image decoding or encoding error.
    ImageError(image::ImageError),
    /// Directory traversal error.
    WalkError(walkdir::Error),
    /// A required input file or directory does not exist.
    MissingInput(String),
    /// The annotation file is structurally inconsistent.
    InvalidAnnotations(String),
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
    /// A check ran to completion and reported failures.
    VerificationFailed(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::ImageError(e) => write!(f, "Image error: {}", e),
            Error::WalkError(e) => write!(f, "Directory walk error: {}", e),
            Error::MissingInput(s) => write!(f, "Missing input: {}", s),
            Error::InvalidAnnotations(s) => write!(f, "Invalid annotations: {}", s),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
            Error::VerificationFailed(s) => write!(f, "Verification failed: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::ImageError(e) => Some(e),
            Error::WalkError(e) => Some(e),
            _ => None,
        }
    }
}
