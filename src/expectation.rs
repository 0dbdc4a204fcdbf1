use std::fmt;

use crate::error::Error;

/// A quantified assertion about how many times a stub's request pattern was
/// observed.
///
/// Used with [`StubHandle::verify`] and friends:
///
/// [`StubHandle::verify`]: crate::StubHandle::verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// The pattern was never observed.
    Never,
    /// Observed exactly once.
    Once,
    /// Observed exactly `n` times.
    Exactly(u64),
    /// Observed at least `n` times.
    AtLeast(u64),
    /// Observed at most `n` times.
    AtMost(u64),
    /// Observed between `lo` and `hi` times, both inclusive.
    Between(u64, u64),
}

impl Expectation {
    /// Build a `Between` expectation, validating `lo <= hi`.
    pub fn between(lo: u64, hi: u64) -> Result<Self, Error> {
        if lo > hi {
            return Err(Error::Validation(format!(
                "between({}, {}) is malformed: the lower bound exceeds the upper bound",
                lo, hi
            )));
        }
        Ok(Self::Between(lo, hi))
    }

    /// Does `count` satisfy this expectation?
    pub fn contains(&self, count: u64) -> bool {
        match self {
            Expectation::Never => count == 0,
            Expectation::Once => count == 1,
            Expectation::Exactly(n) => count == *n,
            Expectation::AtLeast(n) => count >= *n,
            Expectation::AtMost(n) => count <= *n,
            Expectation::Between(lo, hi) => (*lo..=*hi).contains(&count),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Never => write!(f, "never"),
            Expectation::Once => write!(f, "exactly once"),
            Expectation::Exactly(n) => write!(f, "exactly {} time(s)", n),
            Expectation::AtLeast(n) => write!(f, "at least {} time(s)", n),
            Expectation::AtMost(n) => write!(f, "at most {} time(s)", n),
            Expectation::Between(lo, hi) => {
                write!(f, "between {} and {} time(s), inclusive", lo, hi)
            }
        }
    }
}
