use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the nine glyphs shown in the test grid
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum_macros::Display,
)]
pub enum Symbol {
    #[strum(to_string = "∆")]
    Delta,
    #[strum(to_string = "⊥")]
    UpTack,
    #[strum(to_string = "⊢")]
    RightTack,
    #[strum(to_string = "○")]
    Circle,
    #[strum(to_string = "∨")]
    Or,
    #[strum(to_string = "⊨")]
    Models,
    #[strum(to_string = "†")]
    Dagger,
    #[strum(to_string = "≠")]
    NotEqual,
    #[strum(to_string = "∪")]
    Union,
}

impl Symbol {
    pub const ALL: [Symbol; 9] = [
        Symbol::Delta,
        Symbol::UpTack,
        Symbol::RightTack,
        Symbol::Circle,
        Symbol::Or,
        Symbol::Models,
        Symbol::Dagger,
        Symbol::NotEqual,
        Symbol::Union,
    ];

    /// Draw a symbol uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn from_glyph(glyph: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.to_string() == glyph)
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

/// A recorded answer digit, always within 1..=9
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digit(u8);

impl Digit {
    pub fn new(value: u8) -> Option<Self> {
        (1..=9).contains(&value).then_some(Self(value))
    }

    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(10).and_then(|d| Self::new(d as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed symbol -> digit correspondence used for display and scoring
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerKey {
    digits: [Digit; 9],
}

impl AnswerKey {
    /// The standard key: symbols in declaration order map to 1 through 9
    pub fn standard() -> Self {
        Self {
            digits: [1, 2, 3, 4, 5, 6, 7, 8, 9].map(Digit),
        }
    }

    pub fn digit_for(&self, symbol: Symbol) -> Digit {
        self.digits[symbol.ordinal()]
    }

    pub fn is_correct(&self, symbol: Symbol, answer: Digit) -> bool {
        self.digit_for(symbol) == answer
    }

    /// Key entries ordered by digit, for rendering the legend
    pub fn entries(&self) -> Vec<(Digit, Symbol)> {
        Symbol::ALL
            .into_iter()
            .map(|s| (self.digit_for(s), s))
            .sorted()
            .collect()
    }
}

impl Default for AnswerKey {
    fn default() -> Self {
        Self::standard()
    }
}
