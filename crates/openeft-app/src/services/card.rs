// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FD-258 card generation from the same demographics and captures that feed
// an EFT submission.

use std::collections::BTreeMap;

use openeft_ansi::FieldTag;
use openeft_core::EftConfig;
use openeft_core::error::Result;
use openeft_imaging::card::card_date;
use openeft_imaging::{CardField, Fd258Card, PrintBox};
use tracing::{info, instrument, warn};

use super::demographics::{self, DATE_OF_BIRTH, HEIGHT, NAME, SSN, WEIGHT};
use super::generator::{Capture, GenerateRequest};

/// Type-2 fields printed on the card, other than those with special
/// handling.
const PLAIN_FIELDS: [(u16, CardField); 9] = [
    (19, CardField::Aliases),
    (20, CardField::PlaceOfBirth),
    (21, CardField::Citizenship),
    (24, CardField::Sex),
    (25, CardField::Race),
    (31, CardField::Eyes),
    (32, CardField::Hair),
    (41, CardField::Residence),
    (37, CardField::Reason),
];

/// Builds FD-258 cards with the agency profile from `config`.
#[derive(Debug, Clone)]
pub struct CardService {
    config: EftConfig,
}

impl CardService {
    pub fn new(config: EftConfig) -> Self {
        Self { config }
    }

    /// Lay out a card. Demographics are normalised as for a submission;
    /// captures without a box on the card are skipped.
    pub fn card(
        &self,
        fields: &BTreeMap<FieldTag, String>,
        captures: &[Capture],
        request: &GenerateRequest,
    ) -> Result<Fd258Card> {
        let normalised = demographics::normalise_demographics(fields, request.bypass_ssn);
        let text = |tag: FieldTag| normalised.get(&tag).cloned().unwrap_or_default();
        let agency = &self.config.agency;

        let mut card = Fd258Card::new(self.config.pixels_per_inch);
        card.set_text(CardField::Name, text(NAME));
        card.set_text(CardField::DateOfBirth, card_date(&text(DATE_OF_BIRTH)));
        card.set_text(CardField::Ssn, text(SSN));
        card.set_text(CardField::Height, text(HEIGHT));
        card.set_text(CardField::Weight, text(WEIGHT));
        card.set_text(CardField::OriginatingAgency, &agency.originating_agency);
        card.set_text(CardField::Reason, &agency.reason_fingerprinted);
        card.set_text(
            CardField::Date,
            request.capture_date.format("%m/%d/%Y").to_string(),
        );
        for (number, field) in PLAIN_FIELDS {
            let value = text(FieldTag::new(2, number));
            if !value.is_empty() {
                card.set_text(field, value);
            }
        }

        for capture in captures {
            if PrintBox::for_position(capture.position).is_none() {
                warn!(position = %capture.position, "no box on the FD-258 card, skipped");
                continue;
            }
            card.set_print(capture.position, capture.image.clone())?;
        }
        Ok(card)
    }

    /// Lay out and render a card to PDF bytes.
    #[instrument(skip_all, fields(captures = captures.len()))]
    pub fn render(
        &self,
        fields: &BTreeMap<FieldTag, String>,
        captures: &[Capture],
        request: &GenerateRequest,
    ) -> Result<Vec<u8>> {
        let bytes = self.card(fields, captures, request)?.render()?;
        info!(size = bytes.len(), "FD-258 card generated");
        Ok(bytes)
    }
}
