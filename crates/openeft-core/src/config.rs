// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EftError, Result};
use crate::types::{QualityLevel, RecordMode};

/// Agency identifiers and fixed values written into every generated
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyProfile {
    /// Standard version (1.002).
    pub version: String,
    /// Type of transaction (1.004).
    pub transaction_type: String,
    /// Priority 1-9 (1.006).
    pub priority: u8,
    /// Destination agency identifier (1.007).
    pub destination_agency: String,
    /// Originating agency identifier (1.008, 2.073, 14.004).
    pub originating_agency: String,
    /// Native scanning resolution (1.011).
    pub native_scanning_resolution: String,
    /// Nominal transmitting resolution (1.012).
    pub nominal_transmitting_resolution: String,
    /// Reason fingerprinted (2.037).
    pub reason_fingerprinted: String,
    /// Retention code (2.005).
    pub retention_code: String,
}

impl Default for AgencyProfile {
    fn default() -> Self {
        Self {
            version: "0200".into(),
            transaction_type: "FAUF".into(),
            priority: 5,
            destination_agency: "WVIAFIS0Z".into(),
            originating_agency: "WVATF0800".into(),
            native_scanning_resolution: "00.00".into(),
            nominal_transmitting_resolution: "00.00".into(),
            reason_fingerprinted: "Firearms".into(),
            retention_code: "N".into(),
        }
    }
}

/// Which codec compresses images when a transaction is over budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecChoice {
    /// NBIS `cwsq`, the FBI's fingerprint codec.
    Wsq,
    /// In-process baseline JPEG.
    Jpeg,
}

/// Persistent generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EftConfig {
    pub agency: AgencyProfile,
    /// Agency ceiling on the encoded transaction, in bytes.
    pub max_bytes: u64,
    pub codec: CodecChoice,
    /// WSQ ladder in hundredths of a bit per pixel, best first.
    pub wsq_quality_levels: Vec<u16>,
    /// JPEG ladder (1-100), best first.
    pub jpeg_quality_levels: Vec<u16>,
    /// Try embedding images uncompressed before walking the ladder.
    pub try_uncompressed_first: bool,
    /// Deadline for a single codec or scorer invocation.
    pub codec_timeout_secs: u64,
    pub record_mode: RecordMode,
    /// Transmitted pixel scale written to 14.009/14.010.
    pub pixels_per_inch: u32,
    /// NBIS tool locations; bare names are resolved through `PATH`.
    pub cwsq_program: String,
    pub nfiq_program: String,
    pub nfseg_program: String,
    /// Score captures with NFIQ and record the result in 14.024.
    pub score_quality: bool,
    /// Split slaps into fingers with nfseg, writing 14.021 and scoring each
    /// finger rather than the whole slap.
    pub segment_slaps: bool,
}

impl Default for EftConfig {
    fn default() -> Self {
        Self {
            agency: AgencyProfile::default(),
            max_bytes: 12_373_196, // 11.8 MiB
            codec: CodecChoice::Wsq,
            wsq_quality_levels: vec![350, 300, 250, 200, 150, 100, 75],
            jpeg_quality_levels: vec![95, 90, 80, 70, 60, 50, 40, 30],
            try_uncompressed_first: true,
            codec_timeout_secs: 30,
            record_mode: RecordMode::Slaps,
            pixels_per_inch: 500,
            cwsq_program: "cwsq".into(),
            nfiq_program: "nfiq".into(),
            nfseg_program: "nfseg".into(),
            score_quality: false,
            segment_slaps: false,
        }
    }
}

impl EftConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// Quality ladder for the configured codec.
    pub fn quality_levels(&self) -> Vec<QualityLevel> {
        let raw = match self.codec {
            CodecChoice::Wsq => &self.wsq_quality_levels,
            CodecChoice::Jpeg => &self.jpeg_quality_levels,
        };
        raw.iter().copied().map(QualityLevel).collect()
    }

    pub fn codec_timeout(&self) -> Duration {
        Duration::from_secs(self.codec_timeout_secs)
    }

    /// Reject settings the generator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(EftError::InvalidConfig("max_bytes must be positive".into()));
        }
        if self.codec_timeout_secs == 0 {
            return Err(EftError::InvalidConfig(
                "codec_timeout_secs must be positive".into(),
            ));
        }
        if !(1..=9).contains(&self.agency.priority) {
            return Err(EftError::InvalidConfig(format!(
                "priority {} is outside 1-9",
                self.agency.priority
            )));
        }
        if self.jpeg_quality_levels.iter().any(|q| !(1..=100).contains(q)) {
            return Err(EftError::InvalidConfig(
                "JPEG quality levels must lie in 1-100".into(),
            ));
        }
        validate_ladder(&self.quality_levels())
    }
}

/// A quality ladder must be non-empty and strictly descending.
pub fn validate_ladder(levels: &[QualityLevel]) -> Result<()> {
    if levels.is_empty() {
        return Err(EftError::InvalidConfig("quality ladder is empty".into()));
    }
    if levels.windows(2).any(|pair| pair[0] <= pair[1]) {
        return Err(EftError::InvalidConfig(format!(
            "quality ladder must be strictly descending: {:?}",
            levels.iter().map(|q| q.0).collect::<Vec<_>>()
        )));
    }
    Ok(())
}
