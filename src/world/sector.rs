use bitflags::bitflags;

use crate::fixed::{FRACUNIT, Fixed, dmul_scale, fixed_mul};

use super::light::ColormapId;

/// Index into the sector slice handed to the renderer.
pub type SectorId = u16;

bitflags! {
    /// Per-sector render switches.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SectorFlags: u8 {
        /// This sector is a height-transfer control sector whose fake
        /// planes must *not* split sprites (the transfer only affects
        /// lighting and flats).
        const IGNORE_HEIGHTSEC = 0x01;
    }
}

/// Plane equation `a*x + b*y + c*z + d = 0`, with `ic = 1/c` in 16.16.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plane {
    pub a: Fixed,
    pub b: Fixed,
    pub c: Fixed,
    pub d: Fixed,
    pub ic: Fixed,
}

impl Plane {
    /// Level floor at height `h`, facing up.
    pub const fn flat_floor(h: Fixed) -> Self {
        Self { a: 0, b: 0, c: FRACUNIT, d: -h, ic: FRACUNIT }
    }

    /// Level ceiling at height `h`, facing down.
    pub const fn flat_ceiling(h: Fixed) -> Self {
        Self { a: 0, b: 0, c: -FRACUNIT, d: h, ic: -FRACUNIT }
    }

    /// Plane height at map point `(x, y)`.
    #[inline]
    pub fn z_at_point(&self, x: Fixed, y: Fixed) -> Fixed {
        fixed_mul(self.ic, self.d.wrapping_neg().wrapping_sub(dmul_scale(self.a, x, self.b, y, 16)))
    }
}

/// Which side of a height-transfer sector's fake planes the viewer is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FakeSide {
    #[default]
    Center,
    AboveCeiling,
    BelowFloor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sector {
    pub floor: Plane,
    pub ceiling: Plane,
    pub light_level: i32,
    pub colormap: ColormapId,
    /// Control sector providing fake floor/ceiling planes.
    pub heightsec: Option<SectorId>,
    pub flags: SectorFlags,
}

impl Sector {
    pub fn new(floor_h: Fixed, ceiling_h: Fixed, light_level: i32) -> Self {
        Self {
            floor: Plane::flat_floor(floor_h),
            ceiling: Plane::flat_ceiling(ceiling_h),
            light_level,
            colormap: 0,
            heightsec: None,
            flags: SectorFlags::empty(),
        }
    }
}

/// The height-transfer sector of `id`, unless it is absent or flagged
/// [`SectorFlags::IGNORE_HEIGHTSEC`].
pub fn active_heightsec(sectors: &[Sector], id: SectorId) -> Option<SectorId> {
    let hs = sectors.get(id as usize)?.heightsec?;
    let control = sectors.get(hs as usize)?;
    (!control.flags.contains(SectorFlags::IGNORE_HEIGHTSEC)).then_some(hs)
}

/// Point → sector lookup supplied by the level (BSP walk in a full engine).
pub trait SectorLocator {
    fn sector_at(&self, x: Fixed, y: Fixed) -> Option<SectorId>;
}

impl<F> SectorLocator for F
where
    F: Fn(Fixed, Fixed) -> Option<SectorId>,
{
    #[inline]
    fn sector_at(&self, x: Fixed, y: Fixed) -> Option<SectorId> {
        self(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::from_int;

    #[test]
    fn flat_planes_report_their_height() {
        let f = Plane::flat_floor(from_int(-24));
        let c = Plane::flat_ceiling(from_int(128));
        for (x, y) in [(0, 0), (from_int(500), from_int(-77))] {
            assert_eq!(f.z_at_point(x, y), from_int(-24));
            assert_eq!(c.z_at_point(x, y), from_int(128));
        }
    }

    #[test]
    fn ignored_heightsec_is_filtered() {
        let mut sectors = vec![Sector::new(0, from_int(128), 160), Sector::new(0, from_int(64), 160)];
        sectors[0].heightsec = Some(1);
        assert_eq!(active_heightsec(&sectors, 0), Some(1));
        sectors[1].flags |= SectorFlags::IGNORE_HEIGHTSEC;
        assert_eq!(active_heightsec(&sectors, 0), None);
        assert_eq!(active_heightsec(&sectors, 1), None);
        assert_eq!(active_heightsec(&sectors, 9), None);
    }
}
