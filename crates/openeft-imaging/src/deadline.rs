// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deadline wrapper for codecs without their own timeout.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use openeft_core::codec::ImageCodec;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{CompressionAlgorithm, QualityLevel, RawImage};
use tracing::warn;

/// Runs each `compress` call on a worker thread and gives up after
/// `deadline`. An abandoned call finishes in the background and its result
/// is dropped.
#[derive(Clone)]
pub struct TimedCodec {
    inner: Arc<dyn ImageCodec>,
    deadline: Duration,
}

impl TimedCodec {
    pub fn new(inner: Arc<dyn ImageCodec>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl ImageCodec for TimedCodec {
    fn algorithm(&self) -> CompressionAlgorithm {
        self.inner.algorithm()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn compress(&self, image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let image = image.clone();
        thread::Builder::new()
            .name(format!("{}-worker", self.inner.name()))
            .spawn(move || {
                let _ = tx.send(inner.compress(&image, quality));
            })?;

        match rx.recv_timeout(self.deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(codec = self.name(), deadline = ?self.deadline, "codec call abandoned");
                Err(EftError::CodecTimeout {
                    codec: self.name().to_owned(),
                    deadline: self.deadline,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(EftError::Codec(format!(
                "{} worker stopped without a result",
                self.name()
            ))),
        }
    }
}
