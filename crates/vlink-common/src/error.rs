// ============================================
// File: crates/vlink-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Provides the base error type for identifier parsing and validation,
//! wrapped by the error enums of every higher crate.
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum for common operations
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include key material in error messages
//! - Implement `From` traits for seamless error propagation
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across vlink crates.
///
/// # Example
/// ```
/// use vlink_common::error::{CommonError, Result};
///
/// fn require_nonempty(data: &[u8]) -> Result<()> {
///     if data.is_empty() {
///         return Err(CommonError::invalid_input("data", "cannot be empty"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    // ========================================
    // Validation Errors
    // ========================================

    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Data length doesn't match expected size.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },


    // ========================================
    // Encoding Errors
    // ========================================

    /// Failed to decode textual or binary data.
    #[error("Decoding error: {context}: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Error details
        details: String,
    },

    // ========================================
    // Internal Errors
    // ========================================

    /// Internal error (bug or unexpected condition).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of what went wrong
        message: String,
    },
}

impl CommonError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error was caused by bad input rather
    /// than by a local fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::InvalidLength { .. }
                | Self::Decoding { .. }
        )
    }

    /// Returns `true` if this error indicates a local bug.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<hex::FromHexError> for CommonError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Decoding {
            context: "hex decode".into(),
            details: err.to_string(),
        }
    }
}

impl From<std::num::ParseIntError> for CommonError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::Decoding {
            context: "integer parse".into(),
            details: err.to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================
