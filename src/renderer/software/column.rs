//! Column rasterizer: post walking, per-column clipping and the
//! pixel-combination styles.

use smallvec::SmallVec;

use crate::{
    fixed::{FRACBITS, FRACUNIT, Fixed, fixed_mul},
    renderer::{Canvas, software::blend::BlendTables},
    world::{PatchColumn, RenderStyle, Translation},
};

/// Shade row of the normal colormap used to darken fuzz.
pub const FUZZ_SHADE: u8 = 6;

const FUZZ_TABLE: usize = 50;

/// Row offsets (in rows) sampled by the fuzz effect.
const FUZZ_OFFSETS: [i8; FUZZ_TABLE] = [
    1, -1, 1, -1, 1, 1, -1, 1, 1, -1, 1, 1, 1, -1, 1, 1, 1, -1, -1, -1, -1, 1, -1, -1, 1, 1, 1, 1,
    -1, 1, -1, 1, 1, -1, -1, 1, 1, -1, -1, -1, -1, 1, 1, 1, 1, -1, 1, 1, -1, 1,
];

/// 2/3 opacity, in blend levels.
const TRANSLUC66: u8 = ((FRACUNIT * 2 / 3) >> 10) as u8;
/// Opacity of `SoulTrans` things.
const TRANSSOULS: u8 = ((FRACUNIT * 3 / 4) >> 10) as u8;

/// How a column's texels combine with the frame buffer. Levels are out
/// of 64.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnStyle {
    Skip,
    Normal,
    Fuzz,
    Translucent { fg: u8, bg: u8 },
    Additive { fg: u8 },
    /// `color` at `level` over the background wherever the patch has texels.
    Shadow { level: u8, color: u8 },
}

impl ColumnStyle {
    /// Can go through the 4-column batched path.
    #[inline]
    pub fn batches(self) -> bool {
        !matches!(self, ColumnStyle::Fuzz | ColumnStyle::Skip)
    }
}

#[inline]
fn alpha_level(alpha: Fixed) -> u8 {
    (alpha.clamp(0, FRACUNIT) >> 10) as u8
}

/// Map an actor's render style to the column drawer to use.
pub fn select_style(style: RenderStyle, alpha: Fixed, alpha_color: u8, draw_fuzz: bool) -> ColumnStyle {
    let translucent = |fg: u8| ColumnStyle::Translucent { fg, bg: 64 - fg };
    match style {
        RenderStyle::None => ColumnStyle::Skip,
        RenderStyle::Normal => ColumnStyle::Normal,
        RenderStyle::Fuzzy => ColumnStyle::Fuzz,
        RenderStyle::OptFuzzy if draw_fuzz => ColumnStyle::Fuzz,
        RenderStyle::OptFuzzy => translucent(TRANSLUC66),
        RenderStyle::SoulTrans => translucent(TRANSSOULS),
        RenderStyle::Translucent if alpha >= FRACUNIT => ColumnStyle::Normal,
        RenderStyle::Translucent => match alpha_level(alpha) {
            0 => ColumnStyle::Skip,
            fg => translucent(fg),
        },
        RenderStyle::Add => match alpha_level(alpha) {
            0 => ColumnStyle::Skip,
            fg => ColumnStyle::Additive { fg },
        },
        RenderStyle::Shaded => match alpha_level(alpha) {
            0 => ColumnStyle::Skip,
            level => ColumnStyle::Shadow { level, color: alpha_color },
        },
    }
}

/// Everything needed to turn a texel into a frame-buffer byte.
#[derive(Clone, Copy)]
pub struct Paint<'a> {
    pub style: ColumnStyle,
    pub colormap: &'a [u8; 256],
    pub translation: Option<&'a Translation>,
    pub blend: &'a BlendTables,
    /// Darkening map for [`ColumnStyle::Fuzz`].
    pub fuzz_map: &'a [u8; 256],
}

impl Paint<'_> {
    #[inline(always)]
    fn shade(&self, texel: u8) -> u8 {
        let t = match self.translation {
            Some(tr) => tr[texel as usize],
            None => texel,
        };
        self.colormap[t as usize]
    }

    #[inline(always)]
    fn pixel(&self, texel: u8, dest: u8) -> u8 {
        match self.style {
            ColumnStyle::Normal => self.shade(texel),
            ColumnStyle::Translucent { fg, bg } => {
                self.blend.translucent(self.shade(texel), fg as usize, dest, bg as usize)
            }
            ColumnStyle::Additive { fg } => self.blend.additive(self.shade(texel), fg as usize, dest),
            ColumnStyle::Shadow { level, color } => self.blend.translucent(
                self.colormap[color as usize],
                level as usize,
                dest,
                64 - level as usize,
            ),
            ColumnStyle::Fuzz | ColumnStyle::Skip => dest,
        }
    }
}

/// One clipped vertical run ready to rasterize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpan<'a> {
    pub x: i32,
    pub yl: i32,
    pub yh: i32,
    /// Texture row of `yl` in 16.16, relative to `source`.
    pub frac: Fixed,
    pub iscale: Fixed,
    pub source: &'a [u8],
}

impl ColumnSpan<'_> {
    #[inline(always)]
    fn texel(&self, frac: Fixed) -> u8 {
        let last = self.source.len() - 1;
        self.source[((frac >> FRACBITS) as usize).min(last)]
    }
}

/// Vertical mapping of one sprite or masked-wall column.
#[derive(Clone, Copy, Debug)]
pub struct MaskedColumn {
    /// Screen y (16.16) of texture row 0.
    pub sprtopscreen: Fixed,
    pub spryscale: Fixed,
    /// Texture rows per screen row (negative when flipped).
    pub iscale: Fixed,
    pub texturemid: Fixed,
    pub center_y_frac: Fixed,
    pub flip_vert: bool,
}

/// Walk the posts of `column` and emit the visible part of each between
/// `ceiling` (first visible row) and `floor` (first hidden row).
pub fn masked_column_spans<'a, A>(
    column: PatchColumn<'a>,
    m: &MaskedColumn,
    x: i32,
    ceiling: i32,
    floor: i32,
    out: &mut SmallVec<A>,
) where
    A: smallvec::Array<Item = ColumnSpan<'a>>,
{
    for post in column.posts() {
        let len = post.pixels.len() as i32;
        if len == 0 {
            continue;
        }
        let top = post.top;

        let mut yl = m.sprtopscreen.wrapping_add(m.spryscale.wrapping_mul(top)) >> FRACBITS;
        let mut yh = m
            .sprtopscreen
            .wrapping_add(m.spryscale.wrapping_mul(top + len))
            .wrapping_sub(FRACUNIT)
            >> FRACBITS;
        if m.flip_vert {
            std::mem::swap(&mut yl, &mut yh);
        }
        if yh >= floor {
            yh = floor - 1;
        }
        if yl < ceiling {
            yl = ceiling;
        }
        if yl > yh {
            continue;
        }

        let maxfrac = len << FRACBITS;
        let top_frac = top << FRACBITS;
        let iscale = m.iscale;
        let mut frac;

        if m.flip_vert {
            frac = yl
                .wrapping_mul(iscale)
                .wrapping_sub(top_frac)
                .wrapping_sub(fixed_mul(m.center_y_frac, iscale))
                .wrapping_sub(m.texturemid);
            while frac >= maxfrac {
                yl += 1;
                if yl > yh {
                    break;
                }
                frac = frac.wrapping_add(iscale);
            }
            let mut endfrac = frac.wrapping_add((yh - yl).wrapping_mul(iscale));
            while yl <= yh && endfrac < 0 {
                yh -= 1;
                endfrac = endfrac.wrapping_sub(iscale);
            }
        } else {
            frac = m
                .texturemid
                .wrapping_sub(top_frac)
                .wrapping_add(yl.wrapping_mul(iscale))
                .wrapping_sub(fixed_mul(m.center_y_frac, iscale));
            while frac < 0 {
                yl += 1;
                if yl > yh {
                    break;
                }
                frac = frac.wrapping_add(iscale);
            }
            let mut endfrac = frac.wrapping_add((yh - yl).wrapping_mul(iscale));
            while yl <= yh && endfrac >= maxfrac {
                yh -= 1;
                endfrac = endfrac.wrapping_sub(iscale);
            }
        }

        if yl <= yh {
            out.push(ColumnSpan { x, yl, yh, frac, iscale, source: post.pixels });
        }
    }
}

/// Rasterize one span top to bottom.
pub fn draw_span(canvas: &mut Canvas, paint: &Paint<'_>, span: &ColumnSpan<'_>) {
    let pitch = canvas.pitch();
    let x = span.x as usize;
    let pixels = canvas.pixels_mut();
    let mut frac = span.frac;
    for y in span.yl..=span.yh {
        let i = y as usize * pitch + x;
        pixels[i] = paint.pixel(span.texel(frac), pixels[i]);
        frac = frac.wrapping_add(span.iscale);
    }
}

/// Rasterize the spans of up to four adjacent columns row by row.
/// Produces exactly the pixels [`draw_span`] would.
pub fn draw_quad(canvas: &mut Canvas, paint: &Paint<'_>, spans: &[ColumnSpan<'_>]) {
    let (Some(top), Some(bottom)) =
        (spans.iter().map(|s| s.yl).min(), spans.iter().map(|s| s.yh).max())
    else {
        return;
    };
    let pitch = canvas.pitch();
    let pixels = canvas.pixels_mut();
    for y in top..=bottom {
        let row = y as usize * pitch;
        for s in spans {
            if y < s.yl || y > s.yh {
                continue;
            }
            let frac = s.frac.wrapping_add((y - s.yl).wrapping_mul(s.iscale));
            let i = row + s.x as usize;
            pixels[i] = paint.pixel(s.texel(frac), pixels[i]);
        }
    }
}

/// Fuzz: darken the pixel one row above or below, stepping through the
/// offset table. Rows 0 and `view_height - 1` are never touched.
pub fn draw_fuzz_span(
    canvas: &mut Canvas,
    fuzz_map: &[u8; 256],
    span: &ColumnSpan<'_>,
    view_height: i32,
    fuzz_pos: &mut usize,
) {
    let yl = span.yl.max(1);
    let yh = span.yh.min(view_height - 2);
    if yl > yh {
        return;
    }
    let pitch = canvas.pitch() as isize;
    let x = span.x as isize;
    let pixels = canvas.pixels_mut();
    for y in yl..=yh {
        let i = y as isize * pitch + x;
        let src = i + FUZZ_OFFSETS[*fuzz_pos % FUZZ_TABLE] as isize * pitch;
        pixels[i as usize] = fuzz_map[pixels[src as usize] as usize];
        *fuzz_pos = (*fuzz_pos + 1) % FUZZ_TABLE;
    }
}

/// Flat translucent rectangle `x1..=x2` × `yl..=yh`; `trans` is 0..255.
#[allow(clippy::too_many_arguments)]
pub fn draw_particle_rect(
    canvas: &mut Canvas,
    blend: &BlendTables,
    color: u8,
    trans: u8,
    x1: i32,
    x2: i32,
    yl: i32,
    yh: i32,
) {
    let fglevel = ((trans as i32 + 1) << 8) & !0x3ff;
    let bglevel = FRACUNIT - fglevel;
    let (fg, bg) = ((fglevel >> 10) as usize, (bglevel >> 10) as usize);
    let pitch = canvas.pitch();
    let pixels = canvas.pixels_mut();
    for y in yl..=yh {
        let row = y as usize * pitch;
        for x in x1..=x2 {
            let i = row + x as usize;
            pixels[i] = blend.translucent(color, fg, pixels[i], bg);
        }
    }
}
