// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 digests of encoded transactions.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a lowercase hex string.
///
/// Logged with every fitted transaction so a submitted file can be matched
/// to the generation run that produced it.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
