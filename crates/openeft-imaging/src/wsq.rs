// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WSQ compression through the NBIS `cwsq` tool.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use openeft_core::codec::ImageCodec;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{CompressionAlgorithm, QualityLevel, RawImage};
use tracing::{debug, instrument};

use crate::process::{failure_detail, run_with_deadline};

/// `cwsq` adapter. Quality levels are read as hundredths of a bit per pixel.
///
/// Each call works in its own temporary directory, so concurrent calls never
/// share files.
#[derive(Debug, Clone)]
pub struct CwsqCodec {
    program: PathBuf,
    pixels_per_inch: u32,
    deadline: Duration,
}

impl CwsqCodec {
    pub fn new(program: impl Into<PathBuf>, pixels_per_inch: u32, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            pixels_per_inch,
            deadline,
        }
    }

    /// Bitrate argument for a quality level, e.g. `225` becomes `2.25`.
    pub fn bitrate(quality: QualityLevel) -> String {
        format!("{}.{:02}", quality.0 / 100, quality.0 % 100)
    }
}

impl ImageCodec for CwsqCodec {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Wsq20
    }

    fn name(&self) -> &str {
        "cwsq"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height(), quality = quality.0))]
    fn compress(&self, image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>> {
        if quality.0 == 0 {
            return Err(EftError::Codec("WSQ bitrate must be positive".into()));
        }
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("capture.raw");
        std::fs::write(&input, image.pixels())?;

        let attributes = format!(
            "{},{},8,{}",
            image.width(),
            image.height(),
            self.pixels_per_inch
        );
        let output = run_with_deadline(
            Command::new(&self.program)
                .current_dir(workdir.path())
                .arg(Self::bitrate(quality))
                .arg("wsq")
                .arg(&input)
                .arg("-r")
                .arg(attributes),
            self.name(),
            self.deadline,
        )?;
        if !output.status.success() {
            return Err(EftError::Codec(failure_detail(self.name(), &output)));
        }

        let wsq_path = input.with_extension("wsq");
        let bytes = std::fs::read(&wsq_path).map_err(|err| {
            EftError::Codec(format!("cwsq produced no output file: {err}"))
        })?;
        debug!(encoded_len = bytes.len(), "WSQ encoded");
        Ok(bytes)
    }
}
