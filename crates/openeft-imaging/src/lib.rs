// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenEFT Imaging: capture normalisation, in-process codecs, adapters for
// the NBIS command-line tools, and the FD-258 card renderer.

pub mod card;
pub mod codecs;
pub mod deadline;
pub mod process;
pub mod processor;
pub mod scoring;
pub mod segment;
pub mod wsq;

pub use card::{CardField, Fd258Card, PrintBox};
pub use codecs::{JpegCodec, Uncompressed};
pub use deadline::TimedCodec;
pub use processor::CaptureProcessor;
pub use scoring::NfiqScorer;
pub use segment::NfsegSegmenter;
pub use wsq::CwsqCodec;
