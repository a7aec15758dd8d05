use glam::Vec3;

use crate::angle::{self, Angle};
use crate::fixed::{FRACBITS, FRACUNIT, Fixed, div_scale, fixed_mul};

use super::actor::RenderFlags;
use super::light::ColormapRef;
use super::sector::SectorId;

/// Per-frame viewer state in fixed point.
///
/// * Only **yaw** is modelled; the horizontal FOV is fixed at 90°, so the
///   focal tangent is `FRACUNIT`.
/// * Everything the projectors read is precomputed once in [`ViewState::new`].
#[derive(Clone, Copy, Debug)]
pub struct ViewState {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    pub sin: Fixed,
    pub cos: Fixed,
    /// `cos` and `sin` scaled by the focal tangent.
    pub tan_cos: Fixed,
    pub tan_sin: Fixed,

    pub view_width: i32,
    pub view_height: i32,
    pub window_left: i32,
    pub window_right: i32,
    pub center_x: i32,
    pub center_y: i32,
    pub center_x_frac: Fixed,
    pub center_y_frac: Fixed,
    pub y_aspect_mul: Fixed,
    pub inv_z_to_scale: Fixed,
    /// World-space slopes of the top/bottom screen edges, consumed with
    /// `mul_scale(clip, tz, 12)`.
    pub global_uclip: Fixed,
    pub global_dclip: Fixed,

    pub sprite_visibility: Fixed,
    pub particle_visibility: Fixed,
    pub wall_visibility: Fixed,

    pub sector: Option<SectorId>,
    pub foggy: bool,
    /// Gun-flash style light boost in map light units (0..).
    pub extra_light: i32,
    /// Forces every lookup to this shade (light-amp goggles).
    pub fixed_light: Option<u8>,
    /// Forces every lookup to this map (invulnerability).
    pub fixed_colormap: Option<ColormapRef>,
    /// `XFLIP` when rendering a mirror pass.
    pub mirror: RenderFlags,
    /// Non-zero for the side views of a multi-screen setup.
    pub angle_offset: Angle,
}

impl ViewState {
    /// Viewer at `pos` (map units) looking along `yaw` (radians, 0 = east,
    /// counter-clockwise) into a `width` × `height` window.
    pub fn new(width: usize, height: usize, pos: Vec3, yaw: f32, base_visibility: Fixed) -> Self {
        let to_fixed = |v: f32| (v as f64 * FRACUNIT as f64).round() as Fixed;
        let angle = angle::from_degrees((yaw as f64).to_degrees());
        Self::from_fixed(
            width,
            height,
            to_fixed(pos.x),
            to_fixed(pos.y),
            to_fixed(pos.z),
            angle,
            base_visibility,
        )
    }

    pub fn from_fixed(
        width: usize,
        height: usize,
        x: Fixed,
        y: Fixed,
        z: Fixed,
        angle: Angle,
        base_visibility: Fixed,
    ) -> Self {
        let view_width = width as i32;
        let view_height = height as i32;
        let center_x = view_width / 2;
        let center_y = view_height / 2;
        let center_x_frac = center_x << FRACBITS;
        let center_y_frac = center_y << FRACBITS;
        let y_aspect_mul = FRACUNIT;
        let inv_z_to_scale = center_x.wrapping_mul(y_aspect_mul);

        let (sin, cos) = fine_sin_cos(angle);
        let focal_tangent = FRACUNIT;

        let sprite_visibility = fixed_mul(base_visibility, center_x_frac);

        Self {
            x,
            y,
            z,
            angle,
            sin,
            cos,
            tan_cos: fixed_mul(focal_tangent, cos),
            tan_sin: fixed_mul(focal_tangent, sin),
            view_width,
            view_height,
            window_left: 0,
            window_right: view_width - 1,
            center_x,
            center_y,
            center_x_frac,
            center_y_frac,
            y_aspect_mul,
            inv_z_to_scale,
            global_uclip: div_scale(-center_y_frac, inv_z_to_scale, 16),
            global_dclip: div_scale((view_height << FRACBITS) - center_y_frac, inv_z_to_scale, 16),
            sprite_visibility,
            particle_visibility: sprite_visibility,
            wall_visibility: base_visibility,
            sector: None,
            foggy: false,
            extra_light: 0,
            fixed_light: None,
            fixed_colormap: None,
            mirror: RenderFlags::empty(),
            angle_offset: 0,
        }
    }

    /// Light boost actually applied to sector light; fog cancels it.
    #[inline]
    pub fn actual_extra_light(&self) -> i32 {
        if self.foggy { 0 } else { self.extra_light << 4 }
    }

    /// Map-space point to view space: `(lateral, depth)`, both with
    /// 4 extra fractional bits dropped (`DMulScale20`).
    #[inline]
    pub fn to_view(&self, x: Fixed, y: Fixed) -> (Fixed, Fixed) {
        let tr_x = x.wrapping_sub(self.x);
        let tr_y = y.wrapping_sub(self.y);
        let lateral =
            crate::fixed::dmul_scale(tr_x, self.sin, tr_y.wrapping_neg(), self.cos, 20);
        let depth = crate::fixed::dmul_scale(tr_x, self.tan_cos, tr_y, self.tan_sin, 20);
        (lateral, depth)
    }
}

fn fine_sin_cos(a: Angle) -> (Fixed, Fixed) {
    let (s, c) = angle::to_radians(a).sin_cos();
    let f = FRACUNIT as f64;
    ((s * f).round() as Fixed, (c * f).round() as Fixed)
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
