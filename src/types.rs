//! This module defines range-checked types for channel addresses, linear
//! compensation modes and the codec configuration.

use snafu::{ensure, OptionExt, Snafu};

use core::convert::{TryFrom, TryInto};
use core::ops::Deref;

use crate::conversion::Reference;

/// Default number of DAC channels on the controller.
pub const DEFAULT_CHANNELS: u8 = 3;

/// Upper bound on the channel count, sizes the fixed frame buffers.
pub const MAX_CHANNELS: usize = 8;

/// Error type for this module
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a channel or broadcast address for this controller.
    #[snafu(display("Invalid address"))]
    InvalidAddress,
    /// The value isn't a linear compensation mode.
    #[snafu(display("Invalid linear compensation mode"))]
    InvalidMode,
    /// The channel count is zero or larger than [`MAX_CHANNELS`].
    #[snafu(display("Invalid channel count {}", count))]
    InvalidChannelCount { count: usize },
    /// The positive reference isn't above the negative one.
    #[snafu(display("Invalid reference pair VrefP={} VrefN={}", positive, negative))]
    InvalidReference { positive: f64, negative: f64 },
    /// A sync set needs exactly one voltage per channel.
    #[snafu(display("Expected {} voltages, got {}", expected, got))]
    VoltageCount { expected: usize, got: usize },
    /// The voltage maps to a code that can't be sent as an unsigned word.
    #[snafu(display("DAC code {} out of range", code))]
    CodeOutOfRange { code: i64 },
}

const fn invalid_address() -> InvalidAddressSnafu {
    InvalidAddressSnafu
}

/// Address of a DAC channel, or the broadcast address.
///
/// The address is only checked against the channel count when it is used
/// with a [`Config`], see [`Config::check_address`].
///
/// ## Example
/// ```
/// use hvdac_proto::Address;
/// let addr = Address::new(1).unwrap();
/// assert_eq!(*addr, 1);
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct Address(u8);

impl Address {
    /// Create a new address from anything that fits in a byte.
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` doesn't fit in a `u8`.
    pub fn new(address: impl TryInto<u8>) -> Result<Self, Error> {
        let address = address.try_into().ok().with_context(invalid_address)?;
        Ok(Self(address))
    }
}

impl Deref for Address {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<usize> for Address {
    fn eq(&self, other: &usize) -> bool {
        self.0 as usize == *other
    }
}

/// Trait to convert `T: TryInto<u8>` into an [`Address`].
pub trait IntoAddress {
    /// Convert self to an Address.
    /// # Errors
    /// Returns `Error:InvalidAddress` if self isn't a valid address.
    fn into_address(self) -> Result<Address, Error>;
}

impl IntoAddress for Address {
    fn into_address(self) -> Result<Address, Error> {
        Ok(self)
    }
}

impl<T> IntoAddress for T
where
    T: TryInto<u8>,
{
    fn into_address(self) -> Result<Address, Error> {
        Address::new(self)
    }
}

/// Linear compensation setting written to the DAC control register.
///
/// Selects the output band the channel is most accurate in.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u8)]
pub enum LinearCompensation {
    /// 0 V to 10 V, the power-on setting.
    UpTo10V = 0,
    /// 10 V to 12 V
    UpTo12V = 1,
    /// 12 V to 16 V
    UpTo16V = 2,
    /// 16 V to 19 V
    UpTo19V = 3,
    /// 19 V to 20 V
    UpTo20V = 4,
}

impl Default for LinearCompensation {
    fn default() -> Self {
        Self::UpTo10V
    }
}

impl From<LinearCompensation> for u8 {
    fn from(mode: LinearCompensation) -> Self {
        mode as u8
    }
}

impl TryFrom<u8> for LinearCompensation {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use LinearCompensation::*;
        Ok(match value {
            0 => UpTo10V,
            1 => UpTo12V,
            2 => UpTo16V,
            3 => UpTo19V,
            4 => UpTo20V,
            _ => return InvalidModeSnafu.fail(),
        })
    }
}

/// Calibration and channel layout of a controller.
///
/// Immutable once created; hand it to [`Master::new`](crate::Master::new).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    reference: Reference,
    channels: u8,
}

impl Config {
    /// Create a configuration for a controller with `channels` DAC outputs.
    /// # Errors
    /// Returns [`Error::InvalidChannelCount`] if `channels` is zero or above
    /// [`MAX_CHANNELS`].
    pub fn new(reference: Reference, channels: u8) -> Result<Self, Error> {
        ensure!(
            (1..=MAX_CHANNELS).contains(&(channels as usize)),
            InvalidChannelCountSnafu {
                count: channels as usize
            }
        );
        Ok(Self {
            reference,
            channels,
        })
    }

    pub const fn reference(&self) -> Reference {
        self.reference
    }

    /// Number of physical DAC channels, N_DAC.
    pub const fn channels(&self) -> u8 {
        self.channels
    }

    /// The "all channels" address, equal to the channel count.
    pub const fn broadcast(&self) -> Address {
        Address(self.channels)
    }

    /// True if `address` selects a single channel rather than all of them.
    pub fn is_channel(&self, address: Address) -> bool {
        *address < self.channels
    }

    /// Accept channel addresses and the broadcast address.
    /// # Errors
    /// Returns [`Error::InvalidAddress`] for anything above the broadcast address.
    pub fn check_address(&self, address: impl IntoAddress) -> Result<Address, Error> {
        let address = address.into_address()?;
        ensure!(*address <= self.channels, invalid_address());
        Ok(address)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference: Reference::default(),
            channels: DEFAULT_CHANNELS,
        }
    }
}
