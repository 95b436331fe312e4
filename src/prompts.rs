//! Per-locale instructions and column captions for the connection register.
//!
//! The target table is fixed: nine columns describing grid connection
//! agreements. The captions are localised, the column identity is the
//! position. Everything language-specific lives in the tables below so that
//! supporting another language is a data change.

use crate::config::Locale;

/// Number of columns in the target schema.
pub const COLUMN_COUNT: usize = 9;

/// Position of the "connection power [kW]" column, the one inspected for
/// repeated header lines.
pub const HEADER_MARKER_COLUMN: usize = 3;

/// Substrings that identify a repeated header line in the marker column,
/// one per supported locale. Matched case-sensitively.
pub const HEADER_MARKERS: [&str; 2] = ["Moc przyłączeniowa", "Connection power"];

const COLUMNS_PL: [&str; COLUMN_COUNT] = [
    "Podmiot",
    "Siedziba / miejsce zamieszkania",
    "Lokalizacja przyłączenia",
    "Moc przyłączeniowa [kW]",
    "Rodzaj instalacji",
    "Data wydania warunków przyłączenia",
    "Data zawarcia umowy o przyłączenie",
    "Data rozpoczęcia dostarczania energii elektrycznej",
    "Uwagi",
];

const COLUMNS_EN: [&str; COLUMN_COUNT] = [
    "Entity",
    "Headquarters / residence",
    "Connection location",
    "Connection power [kW]",
    "Installation type",
    "Date of connection conditions issued",
    "Date of connection agreement",
    "Date of electricity supply commencement",
    "Notes",
];

const INSTRUCTION_PL: &str = "Przetwórz ten dokument na CSV zachowując układ tabeli: \
Podmiot,Siedziba / miejsce zamieszkania,Lokalizacja przyłączenia,Moc przyłączeniowa [kW],\
Rodzaj instalacji,Data wydania warunków przyłączenia,Data zawarcia umowy o przyłączenie,\
Data rozpoczęcia dostarczania energii elektrycznej,Uwagi. Tabelę zwróć w formie ramki CSV.";

const INSTRUCTION_EN: &str = "Process this document into CSV maintaining the table layout: \
Entity,Headquarters / residence,Connection location,Connection power [kW],Installation type,\
Date of connection conditions issued,Date of connection agreement,\
Date of electricity supply commencement,Notes. Return the table as a CSV frame.";

/// The instruction sent alongside every page for `locale`.
pub fn instruction(locale: Locale) -> &'static str {
    match locale {
        Locale::Pl => INSTRUCTION_PL,
        Locale::En => INSTRUCTION_EN,
    }
}

/// Column captions of the target table for `locale`.
pub fn column_captions(locale: Locale) -> &'static [&'static str; COLUMN_COUNT] {
    match locale {
        Locale::Pl => &COLUMNS_PL,
        Locale::En => &COLUMNS_EN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_instruction_lists_every_caption() {
        for locale in Locale::ALL {
            let text = instruction(locale);
            for caption in column_captions(locale) {
                assert!(
                    text.contains(caption),
                    "{locale}: instruction misses caption {caption:?}"
                );
            }
        }
    }

    #[test]
    fn marker_column_caption_contains_a_marker() {
        for locale in Locale::ALL {
            let caption = column_captions(locale)[HEADER_MARKER_COLUMN];
            assert!(HEADER_MARKERS.iter().any(|m| caption.contains(m)), "{caption}");
        }
    }

    #[test]
    fn instructions_differ_per_locale() {
        assert_ne!(instruction(Locale::Pl), instruction(Locale::En));
        assert!(instruction(Locale::En).starts_with("Process this document"));
    }
}
