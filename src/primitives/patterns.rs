//! Catalogue of "patterned" histories and their continuations.
//!
//! A history is patterned when it is the first eight symbols of one of:
//!
//! | Family            | Construction (s = seed)       | Continuation |
//! |-------------------|-------------------------------|--------------|
//! | period-4          | `s s s[0]`          (4-bit s) | `s[0]`       |
//! | inverted period-4 | `s !s s[0]`         (4-bit s) | `s[0]`       |
//! | period-3          | `s s s`             (3-bit s) | `s[2]`       |
//! | inverted period-3 | `s !s s`            (3-bit s) | `s[2]`       |
//!
//! The four families overlap on the constant and alternating strings; those
//! agree on their continuation, so the union holds 44 distinct entries. The
//! catalogue is built once on first use and shared read-only afterwards.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::types::{Bit, HISTORY_LEN, History};

/// Length of a catalogued sequence: the history plus its continuation.
const SEQUENCE_LEN: usize = HISTORY_LEN + 1;

static CATALOGUE: Lazy<PatternCatalogue> = Lazy::new(PatternCatalogue::build);

/// Shared, lazily-built catalogue.
pub fn catalogue() -> &'static PatternCatalogue {
    &CATALOGUE
}

/// Patterned histories mapped to the symbol that continues them.
#[derive(Debug, Clone)]
pub struct PatternCatalogue {
    /// Catalogue order, used for listing.
    entries: Vec<(History, Bit)>,
    continuations: FxHashMap<History, Bit>,
}

impl PatternCatalogue {
    /// Enumerate every seed of every family and union the results.
    pub fn build() -> Self {
        let mut sequences: Vec<[Bit; SEQUENCE_LEN]> = Vec::new();
        let mut push_unique = |seq: [Bit; SEQUENCE_LEN]| {
            if !sequences.contains(&seq) {
                sequences.push(seq);
            }
        };

        for seed in (0..16).map(|v| seed_bits(v, 4)) {
            push_unique(assemble(&[&seed, &seed, &seed[..1]]));
        }
        for seed in (0..16).map(|v| seed_bits(v, 4)) {
            push_unique(assemble(&[&seed, &flipped(&seed), &seed[..1]]));
        }
        for seed in (0..8).map(|v| seed_bits(v, 3)) {
            push_unique(assemble(&[&seed, &seed, &seed]));
        }
        for seed in (0..8).map(|v| seed_bits(v, 3)) {
            push_unique(assemble(&[&seed, &flipped(&seed), &seed]));
        }

        let mut entries = Vec::with_capacity(sequences.len());
        let mut continuations = FxHashMap::default();
        for seq in &sequences {
            let mut prefix = [Bit::Zero; HISTORY_LEN];
            prefix.copy_from_slice(&seq[..HISTORY_LEN]);
            let history = History::new(prefix);
            let next = seq[HISTORY_LEN];
            // First catalogued sequence wins a shared prefix.
            if !continuations.contains_key(&history) {
                continuations.insert(history, next);
                entries.push((history, next));
            }
        }

        Self {
            entries,
            continuations,
        }
    }

    /// Known next symbol of the pattern `x` starts, if any.
    pub fn continuation(&self, x: &History) -> Option<Bit> {
        self.continuations.get(x).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = &(History, Bit)> {
        self.entries.iter()
    }
}

/// `width` low bits of `value`, most significant first.
fn seed_bits(value: usize, width: usize) -> Vec<Bit> {
    (0..width)
        .map(|i| {
            if value & (1 << (width - 1 - i)) != 0 {
                Bit::One
            } else {
                Bit::Zero
            }
        })
        .collect()
}

fn flipped(bits: &[Bit]) -> Vec<Bit> {
    bits.iter().map(|b| b.flip()).collect()
}

/// Concatenate parts into one nine-symbol sequence.
///
/// Only called with parts whose lengths sum to `SEQUENCE_LEN`.
fn assemble(parts: &[&[Bit]]) -> [Bit; SEQUENCE_LEN] {
    let mut out = [Bit::Zero; SEQUENCE_LEN];
    let mut pos = 0;
    for part in parts {
        out[pos..pos + part.len()].copy_from_slice(part);
        pos += part.len();
    }
    debug_assert_eq!(pos, SEQUENCE_LEN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> History {
        s.parse().unwrap()
    }

    #[test]
    fn test_catalogue_size() {
        // 16 + 16 period-4, 8 + 8 period-3, minus the four shared sequences.
        assert_eq!(catalogue().len(), 44);
    }

    #[test]
    fn test_period_four_continuations() {
        let cat = catalogue();
        assert_eq!(cat.continuation(&h("01100110")), Some(Bit::Zero));
        assert_eq!(cat.continuation(&h("10001000")), Some(Bit::One));
        // Inverted: seed then its complement.
        assert_eq!(cat.continuation(&h("01101001")), Some(Bit::Zero));
        assert_eq!(cat.continuation(&h("11000011")), Some(Bit::One));
    }

    #[test]
    fn test_period_three_continuations() {
        let cat = catalogue();
        // 011 011 01|1
        assert_eq!(cat.continuation(&h("01101101")), Some(Bit::One));
        // 001 110 00|1
        assert_eq!(cat.continuation(&h("00111000")), Some(Bit::One));
        // 110 001 11|0
        assert_eq!(cat.continuation(&h("11000111")), Some(Bit::Zero));
    }

    #[test]
    fn test_unpatterned_history_has_no_continuation() {
        let cat = catalogue();
        assert_eq!(cat.continuation(&h("00010111")), None);
        assert_eq!(cat.continuation(&h("10110001")), None);
    }

    #[test]
    fn test_every_seed_is_catalogued() {
        let cat = catalogue();
        for v in 0..16 {
            let s = seed_bits(v, 4);
            let plain = assemble(&[&s, &s, &s[..1]]);
            let mut prefix = [Bit::Zero; HISTORY_LEN];
            prefix.copy_from_slice(&plain[..HISTORY_LEN]);
            assert_eq!(cat.continuation(&History::new(prefix)), Some(s[0]));
        }
        for v in 0..8 {
            let s = seed_bits(v, 3);
            let inverted = assemble(&[&s, &flipped(&s), &s]);
            let mut prefix = [Bit::Zero; HISTORY_LEN];
            prefix.copy_from_slice(&inverted[..HISTORY_LEN]);
            assert_eq!(cat.continuation(&History::new(prefix)), Some(s[2]));
        }
    }

    #[test]
    fn test_complement_of_pattern_is_pattern() {
        let cat = catalogue();
        for (history, next) in cat.iter() {
            assert_eq!(cat.continuation(&history.inverted()), Some(next.flip()));
        }
    }
}
