// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for OpenEFT.

use std::time::Duration;

use thiserror::Error;

use crate::types::FitAttempt;

/// Top-level error type for all OpenEFT operations.
#[derive(Debug, Error)]
pub enum EftError {
    // -- Model / codec errors --
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("cannot encode transaction: {0}")]
    EncodeError(String),

    #[error("malformed transaction at byte {offset}: {reason}")]
    MalformedTransaction { offset: usize, reason: String },

    // -- Compression errors --
    #[error("{codec} did not finish within {deadline:?}")]
    CodecTimeout { codec: String, deadline: Duration },

    #[error(
        "no quality level fits within {max_bytes} bytes (attempted: {})",
        describe_attempts(.attempts)
    )]
    SizeUnattainable {
        max_bytes: u64,
        attempts: Vec<FitAttempt>,
    },

    #[error("image codec failed: {0}")]
    Codec(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EftError {
    /// Shorthand for a decoder failure at `offset`.
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTransaction {
            offset,
            reason: reason.into(),
        }
    }
}

fn describe_attempts(attempts: &[FitAttempt]) -> String {
    if attempts.is_empty() {
        return "none".into();
    }
    attempts
        .iter()
        .map(|a| format!("q{} -> {} bytes", a.quality, a.encoded_len))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EftError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualityLevel;

    #[test]
    fn size_unattainable_lists_attempts() {
        let err = EftError::SizeUnattainable {
            max_bytes: 100,
            attempts: vec![
                FitAttempt {
                    quality: QualityLevel(90),
                    encoded_len: 400,
                },
                FitAttempt {
                    quality: QualityLevel(30),
                    encoded_len: 150,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("q90 -> 400 bytes"));
        assert!(text.contains("q30 -> 150 bytes"));
    }

    #[test]
    fn malformed_carries_offset() {
        let err = EftError::malformed(17, "bad separator");
        assert_eq!(
            err.to_string(),
            "malformed transaction at byte 17: bad separator"
        );
    }
}
