// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Information separators used by tagged records.

/// File separator: ends a record.
pub const FS: u8 = 0x1C;
/// Group separator: between fields.
pub const GS: u8 = 0x1D;
/// Record separator: between subfields.
pub const RS: u8 = 0x1E;
/// Unit separator: between items.
pub const US: u8 = 0x1F;

/// Tag/value delimiter in `T.NNN:value`.
pub const TAG_DELIMITER: u8 = b':';

pub fn is_separator(byte: u8) -> bool {
    (FS..=US).contains(&byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_range() {
        assert!(is_separator(FS));
        assert!(is_separator(US));
        assert!(!is_separator(b':'));
        assert!(!is_separator(0x1B));
        assert!(!is_separator(0x20));
    }
}
