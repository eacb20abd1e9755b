//! Primitive library: the building blocks a rule is composed from.
//!
//! Every primitive is a pure function of the history. Primitives that can
//! decline to answer return `None` ("does not apply"); the else-chain then
//! falls through to the next rule. Only `get` always answers.
//!
//! | Primitive              | Answers when                            | Answer            |
//! |------------------------|-----------------------------------------|-------------------|
//! | `get(x, i)`            | always                                  | `x[i]`            |
//! | `streak(x, i)`         | `x[i..]` is all ones                    | last symbol       |
//! | `pattern_continuation` | `x` is catalogued                       | pattern's next    |
//! | `balance(x, n)`        | one symbol occurs fewer than `n` times  | the rare symbol   |
//! | `conform(x, n)`        | one symbol occurs fewer than `n` times  | the common symbol |

pub mod patterns;

pub use patterns::{PatternCatalogue, catalogue};

use crate::types::{Bit, History};

/// Result of a primitive that may decline to answer.
pub type Answer = Option<Bit>;

/// Symbol at index `i`.
///
/// # Panics
///
/// Panics if `i` is outside the history.
pub fn get(x: &History, i: usize) -> Bit {
    x.get(i)
}

/// The last symbol, when every symbol from `i` to the end is a one.
pub fn streak(x: &History, i: usize) -> Answer {
    if x.suffix(i).iter().all(|&b| b == Bit::One) {
        Some(x.last())
    } else {
        None
    }
}

/// Next symbol of the catalogued pattern `x` begins, if any.
pub fn pattern_continuation(x: &History) -> Answer {
    catalogue().continuation(x)
}

/// Predict that the under-represented symbol catches up.
///
/// Ones are checked first: a history with fewer than `n` of both symbols
/// cannot exist for `n <= 4`.
pub fn balance(x: &History, n: usize) -> Answer {
    if x.count(Bit::One) < n {
        Some(Bit::One)
    } else if x.count(Bit::Zero) < n {
        Some(Bit::Zero)
    } else {
        None
    }
}

/// Predict that the dominant symbol continues. Opposite polarity of [`balance`].
pub fn conform(x: &History, n: usize) -> Answer {
    if x.count(Bit::One) < n {
        Some(Bit::Zero)
    } else if x.count(Bit::Zero) < n {
        Some(Bit::One)
    } else {
        None
    }
}

/// Complement an answer. A declined answer stays declined.
pub fn invert(r: Answer) -> Answer {
    r.map(Bit::flip)
}

/// Left-biased fallback: `r` if it answered, otherwise `r2`.
pub fn or_else(r: Answer, r2: Answer) -> Answer {
    r.or(r2)
}
