//! # Error Types
//!
//! This module defines the error type shared by every part of the framework.
//! Configuration problems, persistence problems and interpretation budgets all
//! surface as variants of [`BeagleError`].
//!
//! Only the resource-exceeded variants are meant to be caught in the middle of
//! an evolution: evaluators test [`BeagleError::is_resources_exceeded`] and
//! assign a fallback fitness. Every other variant propagates to the caller of
//! the evolver.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use beagle::error::{BeagleError, Result};
//!
//! fn check_depth(min: usize, max: usize) -> Result<()> {
//!     if min > max {
//!         return Err(BeagleError::Configuration(format!(
//!             "minimum depth {} exceeds maximum depth {}",
//!             min, max
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_depth(2, 5).is_ok());
//! assert!(check_depth(6, 5).is_err());
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use beagle::error::{BeagleError, OptionExt};
//!
//! fn first_score(scores: &[f64]) -> beagle::error::Result<f64> {
//!     scores.first().copied().ok_or_else_beagle(|| BeagleError::EmptyPopulation)
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Represents errors that can occur in the framework.
#[derive(Error, Debug)]
pub enum BeagleError {
    /// Invalid or inconsistent configuration detected while initializing an
    /// operator or generating individuals.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A named parameter is missing from the register or holds the wrong type.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// The interpreter executed more primitives than allowed.
    #[error("Resources exceeded: {executed} nodes executed, {allowed} allowed")]
    NodesExceeded {
        /// Number of nodes executed when the limit was hit.
        executed: usize,
        /// Configured ceiling.
        allowed: usize,
    },

    /// The interpreter ran longer than allowed.
    #[error("Resources exceeded: execution took {elapsed:?}, {allowed:?} allowed")]
    TimeExceeded {
        /// Time elapsed when the limit was detected.
        elapsed: Duration,
        /// Configured ceiling.
        allowed: Duration,
    },

    /// A primitive failed during execution (type mismatch, unbound variable...).
    #[error("Execution error: {0}")]
    Execution(String),

    /// A node index does not address a node of the tree.
    #[error("Invalid node index {index} for a tree of {size} nodes")]
    InvalidNode {
        /// Requested index.
        index: usize,
        /// Number of nodes in the tree.
        size: usize,
    },

    /// A persisted document does not describe a valid tree or individual.
    #[error("Format error: {0}")]
    Format(String),

    /// Error that occurs when an empty population is encountered.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// Error raised by the JSON reader or writer.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

impl BeagleError {
    /// Returns `true` for the node-count and wall-clock budget violations.
    pub fn is_resources_exceeded(&self) -> bool {
        matches!(
            self,
            BeagleError::NodesExceeded { .. } | BeagleError::TimeExceeded { .. }
        )
    }
}

/// A specialized Result type for framework operations.
pub type Result<T> = std::result::Result<T, BeagleError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use beagle::error::ResultExt;
/// use std::fs::File;
///
/// fn open_milestone(path: &str) -> beagle::error::Result<()> {
///     File::open(path).context("Failed to open milestone")?;
///     Ok(())
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Converts the error to a `BeagleError::Other` prefixed with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| BeagleError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T>` using `err_fn` for the `None` case.
    fn ok_or_else_beagle<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> BeagleError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_beagle<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> BeagleError,
    {
        self.ok_or_else(err_fn)
    }
}
