//! Decoding of the 16-bit "linear" floating-point format the PSU uses for
//! voltage, current and power readings.
//!
//! This is the format described in the PMBus spec, v1.2, Part II, section 8.3.1:
//! the top 5 bits are a two's complement exponent and the bottom 11 bits are a
//! two's complement mantissa, `value = mantissa * 2^exponent`.
//!
//! The device only ever sends this format, so there is no encode direction.

use modular_bitfield::prelude::*;

/// Bit layout of a raw linear reading. Fields are listed from the least significant bit.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct LinearBits {
    mantissa: B11,
    exponent: B5,
}

/// Decode a raw linear value into milli-units (the true value multiplied by 1000).
///
/// Odd mantissas are rounded up by one before scaling. This is not symmetric
/// rounding, but it is what the PSU readings are expected to come out as.
pub fn decode(raw: u16) -> i32 {
    let bits = LinearBits::from_bytes(raw.to_le_bytes());

    let mut exponent = i32::from(bits.exponent());
    if exponent > 15 {
        exponent -= 32;
    }

    let mut mantissa = i32::from(bits.mantissa());
    if mantissa > 1023 {
        mantissa -= 2048;
    }
    if mantissa & 1 != 0 {
        mantissa += 1;
    }

    // Scale to milli-units before applying the exponent.
    let scaled = mantissa * 1000;
    if exponent >= 0 {
        scaled << exponent
    } else {
        scaled >> -exponent
    }
}
