//! IEEE-754 double to Cray floating-point word conversion.
//!
//! The Cray X-MP word format is sign (1 bit), biased exponent (15 bits,
//! excess 040000 octal = 16384), and a 48-bit fraction with an implicit
//! leading 1 just left of the binary point (i.e. the fraction occupies
//! `[0.5, 1.0)`, unlike IEEE's `[1.0, 2.0)`).

const CRAY_EXPONENT_BIAS: i64 = 0o040000; // 16384
const FRACTION_BITS: u32 = 48;

/// Convert `v` to its 64-bit Cray floating-point word representation.
/// Zero maps to the all-zero word; subnormals and NaN/infinity are out
/// of scope and are coerced to zero or the maximum magnitude of the
/// same sign.
pub fn to_cray_float(v: f64) -> u64 {
    if v == 0.0 {
        return 0;
    }
    if !v.is_finite() {
        let sign = if v.is_sign_negative() { 1u64 } else { 0 };
        return (sign << 63) | 0x7FFF_FFFF_FFFF_FFFF;
    }

    let sign = if v.is_sign_negative() { 1u64 } else { 0 };
    let mag = v.abs();
    let exp2 = mag.log2().floor() as i64 + 1; // mag in [2^(exp2-1), 2^exp2)
    let mantissa = mag / 2f64.powi(exp2 as i32); // in [0.5, 1.0)
    let fraction = (mantissa * (1u64 << FRACTION_BITS) as f64).round() as u64;
    let biased_exp = (exp2 + CRAY_EXPONENT_BIAS) as u64;

    (sign << 63) | (biased_exp << FRACTION_BITS) | (fraction & ((1u64 << FRACTION_BITS) - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_zero_word() {
        assert_eq!(to_cray_float(0.0), 0);
    }

    #[test]
    fn sign_bit_set_for_negative() {
        let pos = to_cray_float(1.5);
        let neg = to_cray_float(-1.5);
        assert_eq!(pos & !(1u64 << 63), neg & !(1u64 << 63));
        assert_eq!(neg >> 63, 1);
        assert_eq!(pos >> 63, 0);
    }

    #[test]
    fn one_point_zero_has_half_mantissa() {
        let word = to_cray_float(1.0);
        let exp = (word >> FRACTION_BITS) & 0x7FFF;
        assert_eq!(exp as i64 - CRAY_EXPONENT_BIAS, 1);
        let frac = word & ((1u64 << FRACTION_BITS) - 1);
        assert_eq!(frac, 1u64 << (FRACTION_BITS - 1));
    }
}
