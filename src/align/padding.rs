//! Padding arithmetic shared by the copier and the verifier.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use thiserror::Error;

/// Byte boundary stored entries must start on. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alignment(NonZeroU64);

impl Alignment {
    /// 4-byte alignment, what Android resources expect.
    pub const DEFAULT: Alignment = Alignment(NonZeroU64::MIN.saturating_add(3));

    pub const fn new(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Filler bytes needed so that `offset + padding` lands on a boundary.
    ///
    /// Always in `0..alignment`; zero when `offset` is already aligned.
    pub fn padding_for(self, offset: u64) -> u64 {
        let a = self.get();
        (a - offset % a) % a
    }

    /// Distance past the previous boundary.
    pub fn remainder(self, offset: u64) -> u64 {
        offset % self.get()
    }

    pub fn is_aligned(self, offset: u64) -> bool {
        self.remainder(offset) == 0
    }
}

impl From<NonZeroU64> for Alignment {
    fn from(value: NonZeroU64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAlignmentError {
    #[error("alignment must be a positive integer, got '{0}'")]
    Invalid(String),
    #[error("alignment must be greater than zero")]
    Zero,
}

impl FromStr for Alignment {
    type Err = ParseAlignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| ParseAlignmentError::Invalid(s.to_string()))?;
        Alignment::new(value).ok_or(ParseAlignmentError::Zero)
    }
}

/// Free-function form of [`Alignment::padding_for`].
pub fn padding_for(offset: u64, alignment: Alignment) -> u64 {
    alignment.padding_for(offset)
}
