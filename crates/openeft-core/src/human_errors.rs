// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages and retry classification.
//
// Every technical error is mapped to plain English with a concrete next step
// for the person at the capture station.

use crate::error::EftError;
use crate::types::ErrorClass;

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether retrying the same request can help.
    pub retriable: bool,
    pub class: ErrorClass,
}

/// Classify an `EftError` for retry decisions.
///
/// Only a stalled or interrupted tool is transient; everything the codec
/// rejects stays rejected on a second attempt.
pub fn classify_error(err: &EftError) -> ErrorClass {
    match err {
        EftError::CodecTimeout { .. } => ErrorClass::Transient,

        EftError::EncodeError(_) | EftError::SizeUnattainable { .. } => ErrorClass::UserAction,
        EftError::InvalidConfig(_) => ErrorClass::UserAction,

        EftError::SchemaViolation(_)
        | EftError::MalformedTransaction { .. }
        | EftError::Codec(_)
        | EftError::ImageError(_)
        | EftError::Serialization(_) => ErrorClass::Permanent,

        EftError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => {
                ErrorClass::Transient
            }
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Permanent,
        },
    }
}

/// Convert an `EftError` into a message an operator can act on.
pub fn humanize_error(err: &EftError) -> HumanError {
    let class = classify_error(err);
    let (message, suggestion): (String, String) = match err {
        EftError::SchemaViolation(detail) => (
            "Some of the entered data can't be stored in an EFT file.".into(),
            format!("Remove separator characters or unsupported fields and try again. ({detail})"),
        ),

        EftError::EncodeError(detail) => (
            "The submission is missing required information.".into(),
            format!("Fill in the missing fields or images, then generate again. ({detail})"),
        ),

        EftError::MalformedTransaction { offset, .. } => (
            "This file is not a valid EFT transaction.".into(),
            format!(
                "The file is damaged or was written by a non-conforming tool (problem near byte {offset}). Re-export it from the original source."
            ),
        ),

        EftError::CodecTimeout { codec, .. } => (
            "Image compression took too long.".into(),
            format!("Try again. If this keeps happening, check that {codec} is installed and working."),
        ),

        EftError::SizeUnattainable { max_bytes, .. } => (
            "The fingerprint images are too large for the agency's file size limit.".into(),
            format!(
                "Crop the images more tightly or rescan at a lower resolution. The limit is {:.1} MB.",
                *max_bytes as f64 / (1024.0 * 1024.0)
            ),
        ),

        EftError::Codec(_) => (
            "The image compression tool reported an error.".into(),
            "Check that the NBIS tools are installed, or switch to the JPEG codec in settings.".into(),
        ),

        EftError::ImageError(_) => (
            "There's a problem with one of the fingerprint images.".into(),
            "The image may be damaged or in an unusual format. Try saving it as a PNG first.".into(),
        ),

        EftError::InvalidConfig(detail) => (
            "The settings file contains an invalid value.".into(),
            format!("Correct the setting and restart. ({detail})"),
        ),

        EftError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => (
            "The file couldn't be found.".into(),
            "It may have been moved or deleted. Try choosing the file again.".into(),
        ),

        EftError::Io(io_err) if io_err.kind() == std::io::ErrorKind::PermissionDenied => (
            "OpenEFT doesn't have permission to use that file.".into(),
            "Check the file permissions, or copy the file to a different location first.".into(),
        ),

        EftError::Io(_) => (
            "There was a problem reading or writing a file.".into(),
            "Try again. If this keeps happening, the disk may be full.".into(),
        ),

        EftError::Serialization(_) => (
            "A settings file could not be read.".into(),
            "Check that the file is valid JSON.".into(),
        ),
    };

    HumanError {
        message,
        suggestion,
        retriable: class == ErrorClass::Transient,
        class,
    }
}
