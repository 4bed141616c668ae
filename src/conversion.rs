//! Conversion between volts and 20-bit DAC codes.
//!
//! The mapping is affine over the reference pair:
//! `V = (VrefP - VrefN) * D / (2^20 - 1) - VrefN`.

use snafu::ensure;

use crate::types::{CodeOutOfRangeSnafu, Error, InvalidReferenceSnafu};

/// Largest code the DAC accepts, `2^20 - 1`.
pub const MAX_CODE: u32 = (1 << 20) - 1;

/// Default positive reference voltage.
pub const VREF_P: f64 = 10.38;
/// Default negative reference voltage.
pub const VREF_N: f64 = 0.0;

const MAX_CODE_F: f64 = MAX_CODE as f64;

/// Reference voltage pair used for every conversion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Reference {
    positive: f64,
    negative: f64,
}

impl Reference {
    /// # Errors
    /// Returns [`Error::InvalidReference`] unless both values are finite and
    /// `positive > negative`.
    pub fn new(positive: f64, negative: f64) -> Result<Self, Error> {
        ensure!(
            positive.is_finite() && negative.is_finite() && positive > negative,
            InvalidReferenceSnafu { positive, negative }
        );
        Ok(Self { positive, negative })
    }

    pub const fn positive(&self) -> f64 {
        self.positive
    }

    pub const fn negative(&self) -> f64 {
        self.negative
    }

    /// Convert a voltage to a DAC code, truncating toward zero.
    ///
    /// Voltages at or above VrefP saturate at [`MAX_CODE`]. There is no lower
    /// clamp, a negative voltage gives a negative code.
    pub fn volt_to_dac(&self, volts: f64) -> i64 {
        if volts < self.positive {
            (volts * MAX_CODE_F / (self.positive - self.negative) + self.negative) as i64
        } else {
            MAX_CODE as i64
        }
    }

    /// Convert a DAC code to volts.
    pub fn dac_to_volt(&self, code: u32) -> f64 {
        (self.positive - self.negative) * f64::from(code) / MAX_CODE_F - self.negative
    }
}

impl Default for Reference {
    fn default() -> Self {
        Self {
            positive: VREF_P,
            negative: VREF_N,
        }
    }
}

/// A code that fits in the DAC's 20-bit register.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct DacCode(u32);

impl DacCode {
    /// # Errors
    /// Returns [`Error::CodeOutOfRange`] if `code` is negative or above [`MAX_CODE`].
    pub fn new(code: i64) -> Result<Self, Error> {
        ensure!(
            (0..=i64::from(MAX_CODE)).contains(&code),
            CodeOutOfRangeSnafu { code }
        );
        Ok(Self(code as u32))
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// On-wire representation, a big-endian 32-bit word.
    pub(crate) const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}
