//! Sprite rasterization through the per-column clip bands.
//!
//! Patch sprites walk their texture columns left to right; in
//! [`ColumnMethod::Quad`] mode aligned runs of four columns are gathered
//! and written row by row. Particles are flat squares.

use smallvec::SmallVec;

use crate::{
    config::ColumnMethod,
    fixed::{FRACBITS, FRACUNIT, Fixed, fixed_mul},
    renderer::{
        Canvas,
        software::{
            Scene, Software,
            column::{
                self, ColumnSpan, ColumnStyle, FUZZ_SHADE, MaskedColumn, Paint, masked_column_spans,
            },
            sprites::{SpriteKind, VisSprite},
        },
    },
    world::{ColormapRef, Patch, PatchCache, PatchColumn, RenderFlags},
};

/// Per-column vertical limits, indexed by screen x: first visible row and
/// first hidden row.
#[derive(Clone, Copy)]
pub(crate) struct Bands<'a> {
    pub top: &'a [i16],
    pub bottom: &'a [i16],
}

impl Bands<'_> {
    #[inline]
    fn at(&self, x: i32) -> (i32, i32) {
        (self.top[x as usize] as i32, self.bottom[x as usize] as i32)
    }

    /// Last column covered by both the bands and `canvas`.
    #[inline]
    fn last_column(&self, canvas: &Canvas) -> i32 {
        self.top.len().min(self.bottom.len()).min(canvas.width()) as i32 - 1
    }
}

/// `vis` cut down to screen columns `0..=last`; the texture position is
/// advanced past any columns dropped on the left.
fn visible_columns(vis: &VisSprite, last: i32) -> Option<VisSprite> {
    let mut v = *vis;
    if v.x1 < 0 {
        v.startfrac = v.startfrac.wrapping_add(v.xiscale.wrapping_mul(v.x1.wrapping_neg()));
        v.x1 = 0;
    }
    v.x2 = v.x2.min(last);
    (v.x1 <= v.x2).then_some(v)
}

/// Where clipped spans end up.
pub(crate) struct Target<'a> {
    pub canvas: &'a mut Canvas,
    pub fuzz_pos: &'a mut usize,
    pub view_height: i32,
}

impl Target<'_> {
    #[inline]
    fn span(&mut self, paint: &Paint<'_>, span: &ColumnSpan<'_>) {
        if paint.style == ColumnStyle::Fuzz {
            column::draw_fuzz_span(self.canvas, paint.fuzz_map, span, self.view_height, self.fuzz_pos);
        } else {
            column::draw_span(self.canvas, paint, span);
        }
    }

    /// Clip and draw one texture column at screen column `x`.
    pub fn masked_column(
        &mut self,
        paint: &Paint<'_>,
        column: PatchColumn<'_>,
        m: &MaskedColumn,
        x: i32,
        bands: Bands<'_>,
    ) {
        let (top, bottom) = bands.at(x);
        self.clipped_column(paint, column, m, x, top, bottom);
    }

    /// Same, between rows `top` (first visible) and `bottom` (first hidden).
    pub fn clipped_column(
        &mut self,
        paint: &Paint<'_>,
        column: PatchColumn<'_>,
        m: &MaskedColumn,
        x: i32,
        top: i32,
        bottom: i32,
    ) {
        let mut spans: SmallVec<[ColumnSpan<'_>; 4]> = SmallVec::new();
        masked_column_spans(column, m, x, top, bottom, &mut spans);
        for s in &spans {
            self.span(paint, s);
        }
    }
}

fn texture_column(patch: &Patch, frac: Fixed) -> Option<PatchColumn<'_>> {
    let col = frac >> FRACBITS;
    let found = usize::try_from(col).ok().and_then(|c| patch.column(c));
    if found.is_none() {
        log::debug!("draw_vis_sprite: bad texture column {col}");
    }
    found
}

fn single_column(
    target: &mut Target<'_>,
    paint: &Paint<'_>,
    patch: &Patch,
    m: &MaskedColumn,
    bands: Bands<'_>,
    x: i32,
    frac: Fixed,
) {
    if let Some(column) = texture_column(patch, frac) {
        target.masked_column(paint, column, m, x, bands);
    }
}

/// Rasterize a patch sprite. `center_y_frac` is the horizon row in 16.16.
pub(crate) fn draw_patch_sprite(
    target: &mut Target<'_>,
    paint: &Paint<'_>,
    bands: Bands<'_>,
    vis: &VisSprite,
    patch: &Patch,
    center_y_frac: Fixed,
    method: ColumnMethod,
) {
    if paint.style == ColumnStyle::Skip || vis.yscale <= 0 || vis.x1 > vis.x2 {
        return;
    }

    let mut spryscale = vis.yscale;
    let mut iscale = (0xffff_ffffu32 / vis.yscale as u32) as i32;
    let mut texturemid = vis.texturemid;
    let flip_vert = vis.render_flags.contains(RenderFlags::YFLIP);
    let sprtopscreen = if flip_vert {
        spryscale = -spryscale;
        iscale = -iscale;
        texturemid -= (patch.height() as i32) << FRACBITS;
        center_y_frac + fixed_mul(texturemid, spryscale)
    } else {
        center_y_frac - fixed_mul(texturemid, spryscale)
    };
    let m = MaskedColumn { sprtopscreen, spryscale, iscale, texturemid, center_y_frac, flip_vert };

    let mut frac = vis.startfrac;

    if method == ColumnMethod::Single || !paint.style.batches() {
        for x in vis.x1..=vis.x2 {
            single_column(target, paint, patch, &m, bands, x, frac);
            frac = frac.wrapping_add(vis.xiscale);
        }
        return;
    }

    let end = vis.x2 + 1;
    let stop = end & !3;
    let mut x = vis.x1;

    while x < stop && x & 3 != 0 {
        single_column(target, paint, patch, &m, bands, x, frac);
        x += 1;
        frac = frac.wrapping_add(vis.xiscale);
    }

    let mut spans: SmallVec<[ColumnSpan<'_>; 8]> = SmallVec::new();
    while x < stop {
        spans.clear();
        for _ in 0..4 {
            if let Some(column) = texture_column(patch, frac) {
                let (top, bottom) = bands.at(x);
                masked_column_spans(column, &m, x, top, bottom, &mut spans);
            }
            x += 1;
            frac = frac.wrapping_add(vis.xiscale);
        }
        column::draw_quad(target.canvas, paint, &spans);
    }

    while x < end {
        single_column(target, paint, patch, &m, bands, x, frac);
        x += 1;
        frac = frac.wrapping_add(vis.xiscale);
    }
}

/// Flat translucent square. Clipped against the bands of its two edge
/// columns only.
pub(crate) fn draw_particle(
    canvas: &mut Canvas,
    scene: &Scene<'_>,
    bands: Bands<'_>,
    vis: &VisSprite,
    center_y_frac: Fixed,
) {
    let SpriteKind::Particle { color, trans } = vis.kind else {
        return;
    };
    let color = scene.lights.map(vis.colormap)[color as usize];
    if vis.x1 > vis.x2 {
        return;
    }

    let mut yl = center_y_frac
        .wrapping_sub(fixed_mul(vis.texturemid, vis.xscale))
        .wrapping_add(FRACUNIT - 1)
        >> FRACBITS;
    let mut yh = yl.wrapping_add(vis.x2 - vis.x1);

    let (x1, x2) = (vis.x1.max(0), vis.x2.min(bands.last_column(canvas)));
    if x1 > x2 {
        return;
    }
    yl = yl.max(0);
    yh = yh.min(canvas.height() as i32 - 1);
    for x in [x1, x2] {
        let (top, bottom) = bands.at(x);
        yh = yh.min(bottom - 1);
        yl = yl.max(top);
    }
    if yl > yh {
        return;
    }
    column::draw_particle_rect(canvas, scene.blend, color, trans, x1, x2, yl, yh);
}

impl Software {
    /// Draw `vis` through the current clip arrays.
    pub(crate) fn draw_vis_sprite(
        &mut self,
        scene: &Scene<'_>,
        patches: &mut PatchCache,
        vis: &VisSprite,
        center_y_frac: Fixed,
    ) {
        let Software { canvas, frame, config } = self;
        let bands = Bands { top: &frame.clip_top, bottom: &frame.clip_bot };

        let id = match vis.kind {
            SpriteKind::Particle { .. } => {
                draw_particle(canvas, scene, bands, vis, center_y_frac);
                return;
            }
            SpriteKind::Patch(id) => id,
        };
        let Some(vis) = visible_columns(vis, bands.last_column(canvas)) else {
            return;
        };

        let patch = match patches.cache(id) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("draw_vis_sprite: patch {id}: {e}");
                return;
            }
        };

        let style = column::select_style(vis.style, vis.alpha, vis.alpha_color, config.draw_fuzz);
        let target_rows = canvas.height() as i32;
        let paint = Paint {
            style,
            colormap: scene.lights.map(vis.colormap),
            translation: vis.translation.and_then(|t| scene.translations.get(t as usize)),
            blend: scene.blend,
            fuzz_map: scene.lights.map(ColormapRef::new(0, FUZZ_SHADE)),
        };
        let mut target = Target {
            canvas,
            fuzz_pos: &mut frame.fuzz_pos,
            view_height: scene.view.view_height.min(target_rows),
        };
        draw_patch_sprite(&mut target, &paint, bands, &vis, patch, center_y_frac, config.column_method);
    }
}
