//! 16.16 fixed-point arithmetic.
//!
//! Every helper uses a 64-bit intermediate and truncates back to `i32`
//! exactly like the classic `FixedMul`/`MulScale`/`DivScale` family, so
//! projections and texture stepping stay bit-for-bit deterministic.

/// Signed 16.16 fixed-point number.
pub type Fixed = i32;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// `a * b` in 16.16.
#[inline(always)]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FRACBITS) as Fixed
}

/// `a / b` in 16.16, saturating to `i32::MIN`/`i32::MAX` when the quotient
/// would not fit (this also covers `b == 0`).
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if (a.unsigned_abs() >> 14) >= b.unsigned_abs() {
        return saturate(a, b);
    }
    (((a as i64) << FRACBITS) / b as i64) as Fixed
}

/// `(a * b) >> shift`.
#[inline(always)]
pub fn mul_scale(a: i32, b: i32, shift: u32) -> i32 {
    ((a as i64 * b as i64) >> shift) as i32
}

/// `(a * b + c * d) >> shift`.
#[inline(always)]
pub fn dmul_scale(a: i32, b: i32, c: i32, d: i32, shift: u32) -> i32 {
    ((a as i64 * b as i64).wrapping_add(c as i64 * d as i64) >> shift) as i32
}

/// `(a << shift) / b`, truncated to 32 bits. A zero divisor saturates.
#[inline]
pub fn div_scale(a: i32, b: i32, shift: u32) -> i32 {
    if b == 0 {
        return saturate(a, 1);
    }
    (((a as i64) << shift) / b as i64) as i32
}

/// Like [`div_scale`] but saturates instead of wrapping when the quotient
/// overflows 32 bits.
#[inline]
pub fn safe_div_scale(a: i32, b: i32, shift: u32) -> i32 {
    if (a.unsigned_abs() >> (31 - shift)) >= b.unsigned_abs() {
        return saturate(a, b);
    }
    div_scale(a, b, shift)
}

/// `a * b / c` with a 64-bit intermediate.
#[inline]
pub fn scale(a: i32, b: i32, c: i32) -> i32 {
    if c == 0 {
        return saturate(a ^ b, 1);
    }
    (a as i64 * b as i64 / c as i64) as i32
}

#[inline(always)]
fn saturate(a: i32, b: i32) -> i32 {
    if (a ^ b) < 0 { i32::MIN } else { i32::MAX }
}

/// Whole map units to 16.16.
#[inline(always)]
pub const fn from_int(v: i32) -> Fixed {
    v << FRACBITS
}
