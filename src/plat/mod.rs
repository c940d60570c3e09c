//! Common platform definitions shared by the fpg1 modules: field widths, sentinels and domain names.

use std::{fmt, num::ParseIntError};

use thiserror::Error;

/// An error for the core platform of fpg1.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlatformError {
    #[error("value {value:#x} does not fit the {bits}-bit {field} field")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        bits: u32,
    },
}

/// Type alias for Result<T, [PlatformError]>.
pub type PResult<T> = Result<T, PlatformError>;

/// Width of the divide unit's dividend and quotient.
pub const DIVIDEND_BITS: u32 = 34;
/// Width of the divide unit's divisor and remainder.
pub const DIVISOR_BITS: u32 = 17;
/// Width of the running partial remainder. One bit wider than a shifted divisor so the sign of a
/// trial subtraction is always representable.
pub const PARTIAL_REMAINDER_BITS: u32 = DIVIDEND_BITS + 1;

/// Number of stages in the divide pipeline.
pub const DIVIDE_STAGES: usize = 8;
/// Restoring-division steps performed by each pipeline stage. Sums to [`DIVIDEND_BITS`].
pub const STAGE_BITS: [u32; DIVIDE_STAGES] = [4, 4, 4, 5, 4, 4, 4, 5];

/// Quotient reported for a zero divisor.
pub const QUOTIENT_SENTINEL: u64 = mask(DIVIDEND_BITS);
/// Remainder reported for a zero divisor.
pub const REMAINDER_SENTINEL: u32 = mask(DIVISOR_BITS) as u32;

/* Display path field widths */
/// Memory address carried from the execution domain (4K words).
pub const ADDRESS_BITS: u32 = 12;
/// One PDP-1 word.
pub const DATA_BITS: u32 = 18;
/// A point coordinate on the 1024x1024 display raster.
pub const COORD_BITS: u32 = 10;
/// Point brightness, 0-7.
pub const INTENSITY_BITS: u32 = 3;

/// Returns a mask with the low `bits` bits set.
pub const fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Checks that `value` fits a `bits`-wide field, returning it unchanged if it does.
///
/// # Errors
///
/// This function will return an error if `value` has bits set above the field width.
pub fn check_width(field: &'static str, value: u64, bits: u32) -> PResult<u64> {
    if value & !mask(bits) != 0 {
        Err(PlatformError::FieldOverflow { field, value, bits })
    } else {
        Ok(value)
    }
}

/// Parses a number with an optional `0x`, `0o` or `0b` radix prefix. Decimal otherwise.
pub fn parse_number(s: &str) -> Result<u64, ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(oct) = s.strip_prefix("0o") {
        u64::from_str_radix(oct, 8)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        s.parse()
    }
}

/// The independently clocked regions of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DomainId {
    /// Processor execution domain. Owns the divide pipeline.
    Execution = 0,
    /// Display timing (pixel clock) domain.
    Display,
}

impl DomainId {
    pub const ALL: [DomainId; 2] = [DomainId::Execution, DomainId::Display];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainId::Execution => write!(f, "exec"),
            DomainId::Display => write!(f, "display"),
        }
    }
}
