// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Demographic normalisation for the Type-2 record and the transaction
// control number.
//
// Out-of-range values are coerced to the "unknown" encoding, never passed
// through.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use openeft_ansi::FieldTag;

/// 2.018 NAM.
pub const NAME: FieldTag = FieldTag::new(2, 18);
/// 2.016 SOC.
pub const SSN: FieldTag = FieldTag::new(2, 16);
/// 2.022 DOB.
pub const DATE_OF_BIRTH: FieldTag = FieldTag::new(2, 22);
/// 2.027 HGT.
pub const HEIGHT: FieldTag = FieldTag::new(2, 27);
/// 2.029 WGT.
pub const WEIGHT: FieldTag = FieldTag::new(2, 29);

const NAME_LIMIT: usize = 30;
const NO_MIDDLE_NAME: &str = "NMN";
const UNKNOWN_INITIALS: &str = "XXX";
const UNKNOWN_MEASURE: &str = "000";

/// `Surname, First Middle`, at most 30 characters.
///
/// Input is comma separated (`DOE, JOHN, QUINCY`). A missing middle name is
/// written as `NMN`; an overlong name first loses its middle name to an
/// initial, then gets truncated.
pub fn format_name(raw: &str) -> String {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [] => String::new(),
        [only] => truncate(only, NAME_LIMIT),
        [surname, first, rest @ ..] => {
            let middle = if rest.is_empty() {
                NO_MIDDLE_NAME.to_string()
            } else {
                rest.join(" ")
            };
            let full = format!("{surname}, {first} {middle}");
            if full.chars().count() <= NAME_LIMIT {
                return full;
            }
            if middle != NO_MIDDLE_NAME {
                if let Some(initial) = middle.chars().next() {
                    let short = format!("{surname}, {first} {initial}");
                    if short.chars().count() <= NAME_LIMIT {
                        return short;
                    }
                }
            }
            truncate(&full, NAME_LIMIT)
        }
    }
}

/// Up to five uppercase initials from a `Surname, First Middle` name, or
/// `XXX` when the name cannot be split.
pub fn initials(name: &str) -> String {
    let Some((surname, given)) = name.split_once(',') else {
        return UNKNOWN_INITIALS.into();
    };
    let given: Vec<&str> = given.split_whitespace().collect();

    let mut letters = String::new();
    letters.extend(surname.trim().chars().next());
    if let Some(first) = given.first() {
        letters.extend(first.chars().next());
        if let Some(second) = given.get(1).filter(|g| **g != NO_MIDDLE_NAME) {
            letters.extend(second.chars().next());
        }
    }

    let cleaned: String = letters
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .take(5)
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_INITIALS.into()
    } else {
        cleaned
    }
}

/// Nine digits or nothing. `bypass` always yields nothing.
pub fn normalise_ssn(raw: &str, bypass: bool) -> String {
    if bypass {
        return String::new();
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 9 { digits } else { String::new() }
}

/// `YYYY-MM-DD` becomes `YYYYMMDD`.
pub fn normalise_dob(raw: &str) -> String {
    raw.trim().replace('-', "")
}

/// Feet-and-inches height `FII`, 4'00" to 7'11". Anything else is `000`.
pub fn normalise_height(raw: Option<&str>) -> String {
    match raw.and_then(|h| h.trim().parse::<u16>().ok()) {
        Some(height) if (400..=711).contains(&height) => height.to_string(),
        _ => UNKNOWN_MEASURE.into(),
    }
}

/// Weight in pounds, 1-499. Anything else is `000`.
pub fn normalise_weight(raw: Option<&str>) -> String {
    match raw.and_then(|w| w.trim().parse::<u16>().ok()) {
        // Zero is "not recorded", written like any other unknown weight.
        Some(0) | None => UNKNOWN_MEASURE.into(),
        Some(weight) if weight <= 499 => weight.to_string(),
        Some(_) => UNKNOWN_MEASURE.into(),
    }
}

/// Transaction control number: `YYMMDD-<initials>-<NN>`.
pub fn transaction_control_number(date: NaiveDate, initials: &str, sequence: u8) -> String {
    format!("{}-{initials}-{sequence:02}", date.format("%y%m%d"))
}

/// Apply the per-field rules to caller-supplied demographics. Empty values
/// are dropped; height and weight are always present.
pub fn normalise_demographics(
    fields: &BTreeMap<FieldTag, String>,
    bypass_ssn: bool,
) -> BTreeMap<FieldTag, String> {
    let mut out = BTreeMap::new();
    for (tag, value) in fields {
        let value = match *tag {
            NAME => format_name(value),
            SSN => normalise_ssn(value, bypass_ssn),
            DATE_OF_BIRTH => normalise_dob(value),
            HEIGHT | WEIGHT => continue,
            _ => value.trim().to_string(),
        };
        if !value.is_empty() {
            out.insert(*tag, value);
        }
    }
    out.insert(HEIGHT, normalise_height(fields.get(&HEIGHT).map(String::as_str)));
    out.insert(WEIGHT, normalise_weight(fields.get(&WEIGHT).map(String::as_str)));
    out
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
