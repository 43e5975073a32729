//! Decoded result constants
//!
//! Engines only ever hold these values encrypted; the enums exist so that
//! callers can interpret a plaintext obtained from the decryption oracle.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Ordering of the user's number relative to the system's number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareOutcome {
    /// User number < system number
    Lower = 0,

    /// User number == system number
    Equal = 1,

    /// User number > system number
    Higher = 2,
}

impl CompareOutcome {
    /// Outcome expected for a plaintext pair
    pub fn of(user: u8, system: u8) -> Self {
        match user.cmp(&system) {
            std::cmp::Ordering::Less => CompareOutcome::Lower,
            std::cmp::Ordering::Equal => CompareOutcome::Equal,
            std::cmp::Ordering::Greater => CompareOutcome::Higher,
        }
    }
}

impl TryFrom<u8> for CompareOutcome {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompareOutcome::Lower),
            1 => Ok(CompareOutcome::Equal),
            2 => Ok(CompareOutcome::Higher),
            other => Err(CoreError::CryptoError(format!("not a comparison result: {}", other))),
        }
    }
}

impl Display for CompareOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CompareOutcome::Lower => write!(f, "LOWER"),
            CompareOutcome::Equal => write!(f, "EQUAL"),
            CompareOutcome::Higher => write!(f, "HIGHER"),
        }
    }
}

/// Result of a guess against the game's secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GuessOutcome {
    /// Guess < secret
    TooLow = 0,

    /// Guess == secret
    Correct = 1,

    /// Guess > secret
    TooHigh = 2,
}

impl TryFrom<u8> for GuessOutcome {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GuessOutcome::TooLow),
            1 => Ok(GuessOutcome::Correct),
            2 => Ok(GuessOutcome::TooHigh),
            other => Err(CoreError::CryptoError(format!("not a guess result: {}", other))),
        }
    }
}

impl Display for GuessOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GuessOutcome::TooLow => write!(f, "TOO_LOW"),
            GuessOutcome::Correct => write!(f, "CORRECT"),
            GuessOutcome::TooHigh => write!(f, "TOO_HIGH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(10, 90, CompareOutcome::Lower)]
    #[case(50, 50, CompareOutcome::Equal)]
    #[case(90, 10, CompareOutcome::Higher)]
    #[case(0, 255, CompareOutcome::Lower)]
    #[case(255, 0, CompareOutcome::Higher)]
    fn test_compare_outcome_of(
        #[case] user: u8,
        #[case] system: u8,
        #[case] expected: CompareOutcome,
    ) {
        assert_eq!(CompareOutcome::of(user, system), expected);
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(CompareOutcome::Lower as u8, 0);
        assert_eq!(CompareOutcome::Equal as u8, 1);
        assert_eq!(CompareOutcome::Higher as u8, 2);
        assert_eq!(GuessOutcome::TooLow as u8, 0);
        assert_eq!(GuessOutcome::Correct as u8, 1);
        assert_eq!(GuessOutcome::TooHigh as u8, 2);

        assert_eq!(GuessOutcome::try_from(1).unwrap(), GuessOutcome::Correct);
        assert!(CompareOutcome::try_from(3).is_err());
        assert!(GuessOutcome::try_from(200).is_err());
    }
}
