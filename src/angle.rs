//! Binary angles: the full circle is the whole `u32` range, so wrapping
//! arithmetic is free modulo 360°.

use once_cell::sync::Lazy;

use crate::fixed::Fixed;

pub type Angle = u32;

pub const ANG45: Angle = 0x2000_0000;
pub const ANG90: Angle = 0x4000_0000;
pub const ANG180: Angle = 0x8000_0000;
pub const ANG270: Angle = 0xC000_0000;

const SLOPERANGE: u32 = 2048;

/// `atan(i / SLOPERANGE)` as a binary angle, `i` in `0..=SLOPERANGE`.
static TAN_TO_ANGLE: Lazy<Vec<Angle>> = Lazy::new(|| {
    (0..=SLOPERANGE)
        .map(|i| {
            let rad = (i as f64 / SLOPERANGE as f64).atan();
            (rad / std::f64::consts::TAU * 4_294_967_296.0).round() as Angle
        })
        .collect()
});

#[inline]
fn slope_div(num: u32, den: u32) -> usize {
    if den < 512 {
        return SLOPERANGE as usize;
    }
    let ans = ((num as u64) << 3) / (den >> 8) as u64;
    ans.min(SLOPERANGE as u64) as usize
}

/// Angle of the vector from `(from_x, from_y)` to `(to_x, to_y)`,
/// resolved per octant through the tan→angle table.
pub fn point_to_angle(from_x: Fixed, from_y: Fixed, to_x: Fixed, to_y: Fixed) -> Angle {
    let x = to_x.wrapping_sub(from_x);
    let y = to_y.wrapping_sub(from_y);
    if x == 0 && y == 0 {
        return 0;
    }

    let t = |num: u32, den: u32| TAN_TO_ANGLE[slope_div(num, den)];
    let (ax, ay) = (x.unsigned_abs(), y.unsigned_abs());

    match (x >= 0, y >= 0) {
        (true, true) if ax > ay => t(ay, ax),
        (true, true) => (ANG90 - 1).wrapping_sub(t(ax, ay)),
        (true, false) if ax > ay => 0u32.wrapping_sub(t(ay, ax)),
        (true, false) => ANG270.wrapping_add(t(ax, ay)),
        (false, true) if ax > ay => (ANG180 - 1).wrapping_sub(t(ay, ax)),
        (false, true) => ANG90.wrapping_add(t(ax, ay)),
        (false, false) if ax > ay => ANG180.wrapping_add(t(ay, ax)),
        (false, false) => (ANG270 - 1).wrapping_sub(t(ax, ay)),
    }
}

/// Pick one of the 16 rotation slots of a sprite frame.
///
/// `view_to_thing` is the angle from the viewer to the thing, `facing` the
/// thing's own heading. The half-slice bias is `(ANG45 / 2) * 9`.
#[inline]
pub fn rotation_bucket(view_to_thing: Angle, facing: Angle) -> usize {
    (view_to_thing
        .wrapping_sub(facing)
        .wrapping_add((ANG45 / 2) * 9)
        >> 28) as usize
}

/// Degrees to a binary angle (wraps outside `0..360`).
pub fn from_degrees(deg: f64) -> Angle {
    let turns = (deg / 360.0).rem_euclid(1.0);
    ((turns * 4_294_967_296.0).round() as u64 & 0xFFFF_FFFF) as Angle
}

/// Binary angle to radians in `0..TAU`.
pub fn to_radians(a: Angle) -> f64 {
    a as f64 / 4_294_967_296.0 * std::f64::consts::TAU
}
