//! Core value types shared by every stage of the rule search.
//!
//! The evidence unit is a fixed-width binary history (eight outcomes seen
//! so far) paired with the bit a participant predicted next. Everything is
//! immutable once constructed; histories are `Copy` so the hot loop never
//! allocates while evaluating a program.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of symbols in every history string.
pub const HISTORY_LEN: usize = 8;

/// A single binary symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    /// Bitwise complement.
    pub fn flip(self) -> Bit {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }

    pub fn from_char(c: char) -> Option<Bit> {
        match c {
            '0' => Some(Bit::Zero),
            '1' => Some(Bit::One),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }

    /// 0.0 or 1.0, for vote averaging.
    pub fn as_f64(self) -> f64 {
        match self {
            Bit::Zero => 0.0,
            Bit::One => 1.0,
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Bit {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Bit::from_char(c).ok_or(ValueError::Symbol(c)),
            _ => Err(ValueError::Length {
                expected: 1,
                found: trimmed.chars().count(),
            }),
        }
    }
}

/// Errors from parsing bits and histories out of text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected {expected} symbol(s), found {found}")]
    Length { expected: usize, found: usize },
    #[error("invalid symbol '{0}' (expected '0' or '1')")]
    Symbol(char),
}

/// The eight outcomes a participant saw before predicting.
///
/// Index 0 is the oldest outcome, index 7 the most recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct History([Bit; HISTORY_LEN]);

impl History {
    pub fn new(bits: [Bit; HISTORY_LEN]) -> Self {
        Self(bits)
    }

    /// Build from the low eight bits of `byte`, most significant bit first,
    /// so `0b0000_0001` renders as `"00000001"`.
    pub fn from_byte(byte: u8) -> Self {
        let mut bits = [Bit::Zero; HISTORY_LEN];
        for (i, slot) in bits.iter_mut().enumerate() {
            if byte & (0x80 >> i) != 0 {
                *slot = Bit::One;
            }
        }
        Self(bits)
    }

    /// Every possible history, in ascending binary order.
    pub fn all() -> impl Iterator<Item = History> {
        (0..=u8::MAX).map(History::from_byte)
    }

    /// Symbol at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= HISTORY_LEN`. The grammar only ever produces indices
    /// inside the history, so an out-of-range index is a programming error.
    pub fn get(&self, i: usize) -> Bit {
        assert!(
            i < HISTORY_LEN,
            "history index {i} out of range (len {HISTORY_LEN})"
        );
        self.0[i]
    }

    /// Most recent outcome.
    pub fn last(&self) -> Bit {
        self.0[HISTORY_LEN - 1]
    }

    /// Number of occurrences of `bit`.
    pub fn count(&self, bit: Bit) -> usize {
        self.0.iter().filter(|&&b| b == bit).count()
    }

    pub fn bits(&self) -> &[Bit; HISTORY_LEN] {
        &self.0
    }

    /// Symbols from position `start` to the end.
    pub fn suffix(&self, start: usize) -> &[Bit] {
        assert!(
            start < HISTORY_LEN,
            "history index {start} out of range (len {HISTORY_LEN})"
        );
        &self.0[start..]
    }

    /// Bitwise complement of every symbol.
    pub fn inverted(&self) -> History {
        let mut bits = self.0;
        for b in bits.iter_mut() {
            *b = b.flip();
        }
        History(bits)
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{}", b.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for History {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let found = trimmed.chars().count();
        if found != HISTORY_LEN {
            return Err(ValueError::Length {
                expected: HISTORY_LEN,
                found,
            });
        }

        let mut bits = [Bit::Zero; HISTORY_LEN];
        for (slot, c) in bits.iter_mut().zip(trimmed.chars()) {
            *slot = Bit::from_char(c).ok_or(ValueError::Symbol(c))?;
        }
        Ok(Self(bits))
    }
}

/// One observation: the history shown and the bit the participant predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datum {
    pub history: History,
    pub observed: Bit,
}

impl Datum {
    pub fn new(history: History, observed: Bit) -> Self {
        Self { history, observed }
    }
}

/// All observations for one participant, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub id: String,
    pub data: Vec<Datum>,
}

impl ParticipantRecord {
    pub fn new(id: impl Into<String>, data: Vec<Datum>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}
