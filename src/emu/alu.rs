//! Restoring-division arithmetic shared by the divide pipeline and the legacy reference unit.

use crate::plat::{
    mask, DIVIDEND_BITS, DIVISOR_BITS, PARTIAL_REMAINDER_BITS, QUOTIENT_SENTINEL,
    REMAINDER_SENTINEL,
};

const REMAINDER_MASK: u64 = mask(PARTIAL_REMAINDER_BITS);
const QUOTIENT_MASK: u64 = mask(DIVIDEND_BITS);
const SIGN_BIT: u32 = PARTIAL_REMAINDER_BITS - 1;

/// Performs one restoring-division step.
///
/// The partial remainder and the quotient accumulator act as one long shift register: the
/// accumulator's top bit (the next undetermined dividend bit) is shifted into the remainder, then
/// the zero-extended divisor is trial-subtracted. If the subtraction does not borrow, it is kept
/// and a 1 enters the quotient; otherwise the shifted remainder is kept and a 0 enters.
///
/// Returns the new `(partial_remainder, partial_quotient)`.
pub fn restoring_step(remainder: u64, quotient: u64, divisor: u32) -> (u64, u64) {
    let carry_in = (quotient >> (DIVIDEND_BITS - 1)) & 1;
    let shifted = ((remainder << 1) | carry_in) & REMAINDER_MASK;
    let quotient = (quotient << 1) & QUOTIENT_MASK;

    let trial = shifted.wrapping_sub(u64::from(divisor)) & REMAINDER_MASK;
    let borrow = (trial >> SIGN_BIT) & 1 == 1;
    if borrow {
        (shifted, quotient)
    } else {
        (trial, quotient | 1)
    }
}

/// The legacy non-pipelined divide unit: all [`DIVIDEND_BITS`] restoring steps at once.
///
/// Operands are truncated to their field widths. A zero divisor yields
/// ([`QUOTIENT_SENTINEL`], [`REMAINDER_SENTINEL`]).
pub fn legacy_divide(dividend: u64, divisor: u32) -> (u64, u32) {
    let divisor = divisor & REMAINDER_SENTINEL;
    if divisor == 0 {
        return (QUOTIENT_SENTINEL, REMAINDER_SENTINEL);
    }
    let mut remainder = 0;
    let mut quotient = dividend & QUOTIENT_MASK;
    for _ in 0..DIVIDEND_BITS {
        (remainder, quotient) = restoring_step(remainder, quotient, divisor);
    }
    (quotient, (remainder & mask(DIVISOR_BITS)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xorshift(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    #[test]
    fn test_step_subtracts_when_it_fits() {
        // remainder 0b10, next dividend bit 1 -> shifted 0b101 = 5; 5 - 3 = 2
        let q = 1 << (DIVIDEND_BITS - 1);
        assert_eq!(restoring_step(0b10, q, 3), (2, 1));
    }

    #[test]
    fn test_step_restores_on_borrow() {
        assert_eq!(restoring_step(1, 0, 5), (2, 0));
    }

    #[test]
    fn test_legacy_divide_matches_native() {
        let mut seed = 0x2545_F491_4F6C_DD1D;
        for _ in 0..5000 {
            let d = xorshift(&mut seed) & QUOTIENT_MASK;
            let v = (xorshift(&mut seed) as u32 & REMAINDER_SENTINEL).max(1);
            let (q, r) = legacy_divide(d, v);
            assert_eq!(q, d / u64::from(v), "{d} / {v}");
            assert_eq!(u64::from(r), d % u64::from(v), "{d} % {v}");
        }
    }

    #[test]
    fn test_legacy_divide_edges() {
        assert_eq!(legacy_divide(QUOTIENT_MASK, 1), (QUOTIENT_MASK, 0));
        assert_eq!(legacy_divide(0, 1), (0, 0));
        assert_eq!(
            legacy_divide(QUOTIENT_MASK, REMAINDER_SENTINEL),
            (
                QUOTIENT_MASK / u64::from(REMAINDER_SENTINEL),
                (QUOTIENT_MASK % u64::from(REMAINDER_SENTINEL)) as u32
            )
        );
        assert_eq!(legacy_divide(5, 7), (0, 5));
    }

    #[test]
    fn test_legacy_divide_by_zero() {
        assert_eq!(legacy_divide(12345, 0), (QUOTIENT_SENTINEL, REMAINDER_SENTINEL));
        // only the low 17 bits of the divisor are wired
        assert_eq!(
            legacy_divide(12345, 1 << DIVISOR_BITS),
            (QUOTIENT_SENTINEL, REMAINDER_SENTINEL)
        );
    }
}
