//! Letter codes and feasible-letter bitmaps.
//!
//! Letters are identified by small integer codes. Codes `1..=MAX_GLYPH` are ordinary letters and
//! `DASH` is the placeholder used by spread entry and by padded message words; code 0 is unused so
//! that per-letter arrays can be indexed directly by code. A feasible-letter bitmap (FLBM) has bit
//! `code - 1` set for every letter still allowed in a position.

use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use crate::MAX_SLOT_LENGTH;

/// A letter code, based on its index in an `Alphabet`.
pub type GlyphId = usize;

/// A feasible-letter bitmap.
pub type Flbm = u64;

/// A string of letter codes, as stored for each light.
pub type GlyphString = SmallVec<[GlyphId; MAX_SLOT_LENGTH]>;

/// The highest code available for ordinary letters.
pub const MAX_GLYPH: GlyphId = 60;

/// The code for the dash placeholder.
pub const DASH: GlyphId = MAX_GLYPH + 1;

/// Size of arrays indexed by letter code (code 0 is unused).
pub const GLYPH_CODES: usize = DASH + 1;

/// Inline capacity for per-letter `SmallVec`s; at least `GLYPH_CODES`.
pub const GLYPH_CAPACITY: usize = 64;

/// Every ordinary letter.
pub const FLBM_NORMAL: Flbm = (1 << MAX_GLYPH) - 1;

/// The dash placeholder.
pub const FLBM_DASH: Flbm = 1 << (DASH - 1);

/// Every ordinary letter plus the dash.
pub const FLBM_ALL: Flbm = FLBM_NORMAL | FLBM_DASH;

/// The bitmap containing just the given letter.
#[inline]
#[must_use]
pub const fn glyph_bit(glyph: GlyphId) -> Flbm {
    1 << (glyph - 1)
}

/// Does this bitmap have exactly one letter left?
#[inline]
#[must_use]
pub const fn is_forced(flbm: Flbm) -> bool {
    flbm != 0 && flbm & (flbm - 1) == 0
}

/// The single letter in a forced bitmap.
#[inline]
#[must_use]
pub fn forced_glyph(flbm: Flbm) -> Option<GlyphId> {
    if is_forced(flbm) {
        Some(flbm.trailing_zeros() as GlyphId + 1)
    } else {
        None
    }
}

/// Iterate over the letter codes present in a bitmap, lowest first.
pub fn glyphs_in(flbm: Flbm) -> impl Iterator<Item = GlyphId> {
    (1..GLYPH_CODES).filter(move |&glyph| flbm & glyph_bit(glyph) != 0)
}

/// Mapping between characters and letter codes. Matching is case-insensitive; `-` always maps to
/// `DASH`.
#[derive(Clone)]
pub struct Alphabet {
    glyphs: SmallVec<[char; GLYPH_CAPACITY]>,
    codes: HashMap<char, GlyphId>,
}

impl Debug for Alphabet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alphabet")
            .field("glyphs", &self.glyphs.iter().skip(1).collect::<String>())
            .finish()
    }
}

impl Alphabet {
    /// Build an alphabet from the distinct characters of `chars`, in order of first appearance.
    ///
    /// # Panics
    ///
    /// Panics if there are more than `MAX_GLYPH` distinct characters.
    #[must_use]
    pub fn new(chars: &str) -> Alphabet {
        let mut alphabet = Alphabet {
            glyphs: SmallVec::from_elem('?', 1),
            codes: HashMap::new(),
        };

        for char in chars.chars().flat_map(char::to_lowercase) {
            if char == '-' || alphabet.codes.contains_key(&char) {
                continue;
            }
            assert!(
                alphabet.glyphs.len() <= MAX_GLYPH,
                "Alphabet has more than {MAX_GLYPH} letters"
            );
            alphabet.codes.insert(char, alphabet.glyphs.len());
            alphabet.glyphs.push(char);
        }

        alphabet
    }

    /// The 26 unaccented Latin letters.
    #[must_use]
    pub fn latin() -> Alphabet {
        Alphabet::new("abcdefghijklmnopqrstuvwxyz")
    }

    /// Number of ordinary letters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn code(&self, char: char) -> Option<GlyphId> {
        if char == '-' {
            return Some(DASH);
        }
        char.to_lowercase()
            .next()
            .and_then(|lower| self.codes.get(&lower).copied())
    }

    #[must_use]
    pub fn glyph(&self, code: GlyphId) -> char {
        if code == DASH {
            '-'
        } else {
            self.glyphs.get(code).copied().unwrap_or('?')
        }
    }

    /// Encode a string, dropping characters that aren't in the alphabet (spaces, punctuation).
    #[must_use]
    pub fn encode(&self, text: &str) -> GlyphString {
        text.chars().filter_map(|char| self.code(char)).collect()
    }

    #[must_use]
    pub fn decode(&self, glyphs: &[GlyphId]) -> String {
        glyphs.iter().map(|&glyph| self.glyph(glyph)).collect()
    }

    /// A bitmap of every ordinary letter in the alphabet.
    #[must_use]
    pub fn letters(&self) -> Flbm {
        (1..self.glyphs.len()).fold(0, |flbm, glyph| flbm | glyph_bit(glyph))
    }

    /// Render a bitmap as the letters it contains, or `.` when it's empty.
    #[must_use]
    pub fn describe(&self, flbm: Flbm) -> String {
        if flbm == 0 {
            return ".".to_string();
        }
        glyphs_in(flbm).map(|glyph| self.glyph(glyph)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_bitmaps() {
        assert!(is_forced(glyph_bit(1)));
        assert!(is_forced(FLBM_DASH));
        assert!(!is_forced(0));
        assert!(!is_forced(glyph_bit(3) | glyph_bit(4)));
        assert_eq!(forced_glyph(glyph_bit(17)), Some(17));
        assert_eq!(forced_glyph(FLBM_DASH), Some(DASH));
        assert_eq!(forced_glyph(FLBM_ALL), None);
    }

    #[test]
    fn test_full_alphabet_stays_inline() {
        let chars: String = (0..MAX_GLYPH as u32)
            .filter_map(|offset| char::from_u32(0x3041 + offset))
            .collect();
        let alphabet = Alphabet::new(&chars);

        assert_eq!(alphabet.len(), MAX_GLYPH);
        assert!(!alphabet.glyphs.spilled());
        assert_eq!(alphabet.glyph(MAX_GLYPH), char::from_u32(0x3041 + 59).unwrap());
    }

    #[test]
    fn test_dash_is_outside_normal_letters() {
        assert_eq!(FLBM_NORMAL & FLBM_DASH, 0);
        assert_eq!(glyphs_in(FLBM_ALL).count(), MAX_GLYPH + 1);
        assert_eq!(glyphs_in(FLBM_ALL).last(), Some(DASH));
    }

    #[test]
    fn test_alphabet_is_case_insensitive() {
        let alphabet = Alphabet::latin();

        assert_eq!(alphabet.len(), 26);
        assert_eq!(alphabet.code('a'), Some(1));
        assert_eq!(alphabet.code('A'), Some(1));
        assert_eq!(alphabet.code('-'), Some(DASH));
        assert_eq!(alphabet.code('3'), None);
        assert_eq!(alphabet.encode("Ice cream").as_slice(), &[9, 3, 5, 3, 18, 5, 1, 13]);
        assert_eq!(alphabet.decode(&alphabet.encode("OK-")), "ok-");
        assert_eq!(alphabet.letters().count_ones(), 26);
        assert_eq!(alphabet.describe(glyph_bit(1) | glyph_bit(3)), "ac");
    }
}
