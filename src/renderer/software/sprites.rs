use std::ops::Range;

use bitflags::bitflags;

use crate::{
    fixed::Fixed,
    renderer::software::Software,
    world::{
        ColormapId, ColormapRef, FakeSide, PatchId, RenderFlags, RenderStyle, SectorId, TranslationId,
        ViewState,
    },
};

/// Marker in a drawseg's masked-column array: nothing (left) to draw.
pub const MASKED_DONE: i16 = i16::MAX;

/// Shared per-frame `i16` arena for silhouettes and masked columns.
#[derive(Default)]
pub struct FrameScratch {
    openings: Vec<i16>,
    cursor: usize,
}

impl FrameScratch {
    /// Allocate `len` consecutive i16 slots inside `openings`
    /// and return the index range that was handed out.
    pub fn alloc(&mut self, len: usize) -> Range<usize> {
        let start = self.cursor;
        self.cursor += len;

        if self.cursor > self.openings.len() {
            self.openings.resize(self.cursor.next_power_of_two(), 0);
        }
        start..start + len
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Slots handed out so far this frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    #[inline]
    pub fn get(&self, idx: usize) -> i16 {
        self.openings[idx]
    }

    #[inline]
    pub fn set(&mut self, idx: usize, v: i16) {
        self.openings[idx] = v;
    }

    #[inline]
    pub fn slice(&self, r: Range<usize>) -> &[i16] {
        &self.openings[r]
    }

    #[inline]
    pub fn slice_mut(&mut self, r: Range<usize>) -> &mut [i16] {
        &mut self.openings[r]
    }
}

bitflags! {
    /// Which edges of a wall occlude things behind it.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Silhouette: u8 {
        const BOTTOM = 0x01;
        const TOP    = 0x02;
        const BOTH   = 0x03;
    }
}

/// View-space description of a wall segment used to order it against
/// sprites. Units match vissprite `depth`/`cx` (`DMulScale20` space).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegDepth {
    pub near: Fixed,
    pub far: Fixed,
    pub cx: Fixed,
    pub cy: Fixed,
    pub cdx: Fixed,
    pub cdy: Fixed,
}

impl SegDepth {
    /// Depth metrics of the wall from `v1` to `v2` (map space). `v1` must
    /// be the endpoint that appears on the left of the screen.
    pub fn from_wall(view: &ViewState, v1: (Fixed, Fixed), v2: (Fixed, Fixed)) -> Self {
        let (tx1, ty1) = view.to_view(v1.0, v1.1);
        let (tx2, ty2) = view.to_view(v2.0, v2.1);
        Self {
            near: ty1.min(ty2),
            far: ty1.max(ty2),
            cx: tx1,
            cy: ty1,
            cdx: tx2.wrapping_sub(tx1),
            cdy: ty2.wrapping_sub(ty1),
        }
    }
}

/// Masked middle texture of a two-sided wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskedMid {
    pub patch: PatchId,
    pub texturemid: Fixed,
    /// Screen scale at `x1` and its per-column step.
    pub scale1: Fixed,
    pub scale_step: Fixed,
    pub light_level: i32,
    pub colormap: ColormapId,
    /// `FRACUNIT` = opaque.
    pub alpha: Fixed,
}

/// Wall segment record left behind by the wall renderer.
///
/// Openings offsets point at the entry for `x1`. Top silhouettes hold the
/// first visible row, bottom silhouettes the first hidden row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawSeg {
    pub x1: i32,
    pub x2: i32,
    pub depth: SegDepth,
    pub silhouette: Silhouette,
    pub sprite_top_clip: Option<usize>,
    pub sprite_bottom_clip: Option<usize>,
    pub masked_cols: Option<usize>,
    pub masked_mid: Option<MaskedMid>,
    /// Fog remap drawn over the opening.
    pub fog_boundary: Option<ColormapRef>,
}

impl DrawSeg {
    pub fn new(x1: i32, x2: i32, depth: SegDepth) -> Self {
        Self { x1, x2, depth, ..Self::default() }
    }

    /// Has columns for the masked compositor (mid-texture or fog).
    #[inline]
    pub fn has_masked(&self) -> bool {
        self.masked_cols.is_some() && (self.masked_mid.is_some() || self.fog_boundary.is_some())
    }

    #[inline]
    pub fn width(&self) -> usize {
        (self.x2 - self.x1 + 1).max(0) as usize
    }
}

/// What a vissprite rasterizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpriteKind {
    Patch(PatchId),
    /// Flat translucent square of palette `color`.
    Particle { color: u8, trans: u8 },
}

impl Default for SpriteKind {
    fn default() -> Self {
        SpriteKind::Patch(0)
    }
}

/// A projected, screen-space sprite ready to clip and draw.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisSprite {
    pub x1: i32,
    pub x2: i32,
    /// Lateral view-space position, compared against drawseg lines.
    pub cx: Fixed,
    /// View-space depth; larger is farther.
    pub depth: Fixed,
    pub gx: Fixed,
    pub gy: Fixed,
    pub gz: Fixed,
    /// World z of the sprite's top.
    pub gzt: Fixed,
    pub xscale: Fixed,
    pub yscale: Fixed,
    pub xiscale: Fixed,
    pub startfrac: Fixed,
    pub texturemid: Fixed,
    pub floorclip: Fixed,
    pub kind: SpriteKind,
    pub colormap: ColormapRef,
    pub translation: Option<TranslationId>,
    pub render_flags: RenderFlags,
    pub style: RenderStyle,
    pub alpha: Fixed,
    pub alpha_color: u8,
    pub heightsec: Option<SectorId>,
    pub fake_side: FakeSide,
}

impl Software {
    /// Reserve `len` openings slots for the current frame.
    pub fn alloc_openings(&mut self, len: usize) -> Range<usize> {
        self.frame.openings.alloc(len)
    }

    pub fn openings(&self) -> &FrameScratch {
        &self.frame.openings
    }

    pub fn openings_mut(&mut self) -> &mut FrameScratch {
        &mut self.frame.openings
    }

    /// Copy the clip rows `top` / `bottom` (indexed by screen x) for
    /// `ds.x1..=ds.x2` into the openings arena, as selected by the
    /// segment's silhouette bits.
    pub fn store_silhouette(&mut self, ds: &mut DrawSeg, top: &[i16], bottom: &[i16]) {
        let count = ds.width();
        let x1 = ds.x1.max(0) as usize;

        ds.sprite_top_clip = None;
        if ds.silhouette.contains(Silhouette::TOP) {
            if let Some(src) = top.get(x1..x1 + count) {
                let range = self.frame.openings.alloc(count);
                ds.sprite_top_clip = Some(range.start);
                self.frame.openings.slice_mut(range).copy_from_slice(src);
            }
        }

        ds.sprite_bottom_clip = None;
        if ds.silhouette.contains(Silhouette::BOTTOM) {
            if let Some(src) = bottom.get(x1..x1 + count) {
                let range = self.frame.openings.alloc(count);
                ds.sprite_bottom_clip = Some(range.start);
                self.frame.openings.slice_mut(range).copy_from_slice(src);
            }
        }
    }

    /// Store the texture column of every screen column of a masked wall.
    /// Columns missing from `cols` are stored as [`MASKED_DONE`].
    pub fn store_masked_cols(&mut self, ds: &mut DrawSeg, cols: &[i16]) {
        let range = self.frame.openings.alloc(ds.width());
        ds.masked_cols = Some(range.start);
        let dst = self.frame.openings.slice_mut(range);
        let n = dst.len().min(cols.len());
        dst[..n].copy_from_slice(&cols[..n]);
        dst[n..].fill(MASKED_DONE);
    }

    pub fn push_drawseg(&mut self, ds: DrawSeg) {
        self.frame.drawsegs.push(ds);
    }

    pub fn drawsegs(&self) -> &[DrawSeg] {
        &self.frame.drawsegs
    }
}
