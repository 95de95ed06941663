//! Observables and observations
use crate::constants::{L1_FREQUENCY_HZ, L2_FREQUENCY_HZ, L5_FREQUENCY_HZ, SPEED_OF_LIGHT_M_S};
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParsingError {
    #[error("unknown observable \"{0}\"")]
    UnknownObservable(String),
    #[error("unknown frequency band \"{0}\"")]
    UnknownBand(String),
}

/// Carrier frequency [Band]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Band {
    /// L1 (GPS) or E1 (Galileo)
    #[strum(to_string = "1")]
    L1,
    /// L2 (GPS)
    #[strum(to_string = "2")]
    L2,
    /// L5 (GPS) or E5a (Galileo)
    #[strum(to_string = "5")]
    L5,
}

impl Band {
    /// Carrier frequency in Hz
    pub const fn frequency_hz(&self) -> f64 {
        match self {
            Self::L1 => L1_FREQUENCY_HZ,
            Self::L2 => L2_FREQUENCY_HZ,
            Self::L5 => L5_FREQUENCY_HZ,
        }
    }

    /// Carrier wavelength in meters
    pub fn wavelength_m(&self) -> f64 {
        SPEED_OF_LIGHT_M_S / self.frequency_hz()
    }
}

/// [Observable] is a closed set of signal types:
/// a code (pseudo range, in meters) or a phase (in cycles) measurement
/// on a given [Band].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Observable {
    /// Pseudo range (m)
    Code(Band),
    /// Carrier phase (cycles)
    Phase(Band),
}

impl Observable {
    /// Returns the [Band] of this [Observable]
    pub const fn band(&self) -> Band {
        match self {
            Self::Code(band) | Self::Phase(band) => *band,
        }
    }

    /// True if this is a code measurement
    pub const fn is_code(&self) -> bool {
        matches!(self, Self::Code(_))
    }

    /// True if this is a phase measurement
    pub const fn is_phase(&self) -> bool {
        matches!(self, Self::Phase(_))
    }

    /// True if `pattern` is a valid [Observable] pattern:
    /// a kind (`C` or `L`) followed by a band (`1`, `2` or `5`),
    /// either of them possibly replaced by the `*` wildcard.
    pub fn is_pattern(pattern: &str) -> bool {
        let chars = pattern.chars().collect::<Vec<_>>();
        match chars.as_slice() {
            [kind, band] => {
                matches!(kind, 'C' | 'L' | '*') && matches!(band, '1' | '2' | '5' | '*')
            },
            _ => false,
        }
    }

    /// True if this [Observable] matches `pattern`, see [Self::is_pattern].
    pub fn matches(&self, pattern: &str) -> bool {
        let code = self.to_string();
        code.len() == pattern.len()
            && code
                .chars()
                .zip(pattern.chars())
                .all(|(c, p)| p == '*' || p == c)
    }
}

impl std::fmt::Display for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Code(band) => write!(f, "C{}", band),
            Self::Phase(band) => write!(f, "L{}", band),
        }
    }
}

impl FromStr for Observable {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // RINEX like codes: C1, L2, possibly followed by a tracking attribute (C1C)
        let s = s.trim();
        let (kind, band) = match (s.get(..1), s.get(1..2)) {
            (Some(kind), Some(band)) => (kind, band),
            _ => return Err(ParsingError::UnknownObservable(s.to_string())),
        };

        let band = Band::from_str(band).or(Err(ParsingError::UnknownBand(s.to_string())))?;

        match kind {
            "C" => Ok(Self::Code(band)),
            "L" => Ok(Self::Phase(band)),
            _ => Err(ParsingError::UnknownObservable(s.to_string())),
        }
    }
}

/// [Observation]: one [Observable] measured at one epoch, for one transmitter.
/// Measured value is never modified once read, only the
/// validity flag and the residual evolve during preprocessing.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// [Observable]
    pub observable: Observable,
    /// Raw measurement: meters for code, cycles for phase
    pub value: f64,
    /// Residual derived by the preprocessing stages:
    /// code: observed minus computed (m),
    /// phase: TEC-like combination residual (cycles)
    pub residual: f64,
    /// False once flagged by any stage
    pub valid: bool,
}

impl Observation {
    /// Creates a new valid [Observation]
    pub fn new(observable: Observable, value: f64) -> Self {
        Self {
            observable,
            value,
            residual: 0.0,
            valid: true,
        }
    }
}
