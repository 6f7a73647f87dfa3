// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// NFIQ quality scoring through the NBIS `nfiq` tool.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use openeft_core::codec::QualityScorer;
use openeft_core::error::{EftError, Result};
use openeft_core::types::RawImage;
use tracing::{debug, instrument};

use crate::process::{failure_detail, run_with_deadline};

/// Organisation and algorithm identifiers recorded with NFIQ 1.0 scores.
const NFIQ_ORGANIZATION: &str = "15";
const NFIQ_ALGORITHM: &str = "14205";

#[derive(Debug, Clone)]
pub struct NfiqScorer {
    program: PathBuf,
    deadline: Duration,
}

impl NfiqScorer {
    pub fn new(program: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            deadline,
        }
    }
}

impl QualityScorer for NfiqScorer {
    fn organization_id(&self) -> &str {
        NFIQ_ORGANIZATION
    }

    fn algorithm_id(&self) -> &str {
        NFIQ_ALGORITHM
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn score(&self, image: &RawImage) -> Result<u8> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("capture.raw");
        std::fs::write(&input, image.pixels())?;

        let output = run_with_deadline(
            Command::new(&self.program)
                .arg(&input)
                .arg("-raw")
                .arg(format!("{},{},8", image.width(), image.height())),
            "nfiq",
            self.deadline,
        )?;
        if !output.status.success() {
            return Err(EftError::Codec(failure_detail("nfiq", &output)));
        }
        let score = parse_score(&String::from_utf8_lossy(&output.stdout))?;
        debug!(score, "NFIQ scored");
        Ok(score)
    }
}

/// NFIQ prints a single score from 1 (best) to 5 (worst).
fn parse_score(stdout: &str) -> Result<u8> {
    stdout
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|score| (1..=5).contains(score))
        .ok_or_else(|| EftError::Codec(format!("unexpected nfiq output '{}'", stdout.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_parsing() {
        assert_eq!(parse_score("3\n").expect("score"), 3);
        assert_eq!(parse_score(" 1 ").expect("score"), 1);
        assert!(parse_score("0").is_err());
        assert!(parse_score("6").is_err());
        assert!(parse_score("ERROR").is_err());
    }

    #[test]
    fn missing_program_is_codec_error() {
        let scorer = NfiqScorer::new("openeft-missing-nfiq", Duration::from_secs(1));
        let raw = RawImage::new(vec![0u8; 4], 2, 2).expect("raw");
        assert!(matches!(scorer.score(&raw), Err(EftError::Codec(_))));
        assert_eq!(scorer.organization_id(), "15");
    }
}
