// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: bridges the command line to the openeft backend crates.
//
// Each service wraps one or more backend crate APIs and returns data the CLI
// can print or write directly.

pub mod card;
pub mod data_dir;
pub mod demographics;
pub mod editor;
pub mod generator;
