// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenEFT: Core types, configuration and error definitions shared across all
// crates.

pub mod codec;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use codec::{ImageCodec, QualityScorer, Segmenter};
pub use config::EftConfig;
pub use error::EftError;
pub use types::*;
