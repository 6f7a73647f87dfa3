// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Slap segmentation through the NBIS `nfseg` tool.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use openeft_core::codec::Segmenter;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{FingerPosition, FingerSegment, RawImage};
use tracing::{debug, instrument, warn};

use crate::process::{failure_detail, run_with_deadline};
use crate::processor::CaptureProcessor;

const CAPTURE_FILE: &str = "capture.png";

/// Runs `nfseg <fgp> 1 1 1 0 capture.png` in a scratch directory and reads
/// one box per `FILE` line of its report.
#[derive(Debug, Clone)]
pub struct NfsegSegmenter {
    program: PathBuf,
    deadline: Duration,
}

impl NfsegSegmenter {
    pub fn new(program: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            deadline,
        }
    }
}

impl Segmenter for NfsegSegmenter {
    fn name(&self) -> &str {
        "nfseg"
    }

    #[instrument(skip_all, fields(%position, width = image.width(), height = image.height()))]
    fn segment(&self, image: &RawImage, position: FingerPosition) -> Result<Vec<FingerSegment>> {
        let workdir = tempfile::tempdir()?;
        let png = CaptureProcessor::from_raw_image(image)?.to_png_bytes()?;
        std::fs::write(workdir.path().join(CAPTURE_FILE), png)?;

        let output = run_with_deadline(
            Command::new(&self.program)
                .current_dir(workdir.path())
                .arg(position.code().to_string())
                .args(["1", "1", "1", "0", CAPTURE_FILE]),
            "nfseg",
            self.deadline,
        )?;
        if !output.status.success() {
            return Err(EftError::Codec(failure_detail("nfseg", &output)));
        }
        let segments = parse_report(&String::from_utf8_lossy(&output.stdout));
        debug!(found = segments.len(), "slap segmented");
        Ok(segments)
    }
}

/// Boxes from nfseg's report. Lines that do not describe a segment are
/// skipped.
fn parse_report(stdout: &str) -> Vec<FingerSegment> {
    stdout
        .lines()
        .filter(|line| line.starts_with("FILE"))
        .filter_map(|line| {
            let segment = parse_line(line);
            if segment.is_none() {
                warn!(line, "unreadable nfseg line");
            }
            segment
        })
        .collect()
}

/// `FILE capture_02.raw e 3 sw 168 sh 280 sx 120 sy 256 th -28.3`. The
/// finger position is the numeric suffix of the file name.
fn parse_line(line: &str) -> Option<FingerSegment> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let value = |key: &str| -> Option<i64> {
        let index = words.iter().position(|word| *word == key)?;
        words.get(index + 1)?.parse().ok()
    };
    let coordinate = |key: &str| value(key).map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX));

    let file = words.get(1)?;
    let stem = file.rsplit_once('.').map_or(*file, |(stem, _)| stem);
    let position = stem
        .rsplit_once('_')
        .and_then(|(_, suffix)| suffix.parse::<u8>().ok())
        .and_then(FingerPosition::new)?;

    Some(FingerSegment {
        position,
        x: coordinate("sx")?,
        y: coordinate("sy")?,
        width: coordinate("sw")?,
        height: coordinate("sh")?,
    })
}
