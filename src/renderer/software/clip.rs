//! Occlusion clipping of vissprites against drawsegs and fake flats.

use crate::{
    fixed::{FRACBITS, Fixed, dmul_scale, fixed_mul},
    renderer::software::{
        FrameContext, Scene, Software,
        pool::VisSpriteId,
        sprites::{SegDepth, Silhouette, SpriteKind, VisSprite},
    },
    world::{FakeSide, PatchCache},
};

/// Where a wall lies relative to a sprite, judged from depth ranges alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthOrder {
    /// Nearest point of the wall is farther than the sprite.
    Behind,
    /// Whole wall is at or in front of the sprite's depth.
    InFront,
    /// Depth ranges overlap; needs [`sprite_in_front_of_seg`].
    Ambiguous,
}

/// Cheap test: compare the sprite depth with the wall's depth range.
#[inline]
pub fn depth_range_order(seg: &SegDepth, depth: Fixed) -> DepthOrder {
    if seg.near > depth {
        DepthOrder::Behind
    } else if seg.far > depth {
        DepthOrder::Ambiguous
    } else {
        DepthOrder::InFront
    }
}

/// Exact test: which side of the wall line the sprite centre is on.
#[inline]
pub fn sprite_in_front_of_seg(seg: &SegDepth, depth: Fixed, cx: Fixed) -> bool {
    dmul_scale(depth.wrapping_sub(seg.cy), seg.cdx, seg.cdy, seg.cx.wrapping_sub(cx), 24) < 0
}

/// The wall is behind the sprite: draw its masked parts, do not clip.
#[inline]
pub fn seg_behind_sprite(seg: &SegDepth, vis: &VisSprite) -> bool {
    match depth_range_order(seg, vis.depth) {
        DepthOrder::Behind => true,
        DepthOrder::InFront => false,
        DepthOrder::Ambiguous => sprite_in_front_of_seg(seg, vis.depth, vis.cx),
    }
}

/// Lower the bottom band to a silhouette. Never raises it.
#[inline]
pub fn tighten_bottom(band: &mut [i16], silhouette: &[i16]) {
    for (b, &s) in band.iter_mut().zip(silhouette) {
        if *b > s {
            *b = s;
        }
    }
}

/// Raise the top band to a silhouette. Never lowers it.
#[inline]
pub fn tighten_top(band: &mut [i16], silhouette: &[i16]) {
    for (t, &s) in band.iter_mut().zip(silhouette) {
        if *t < s {
            *t = s;
        }
    }
}

/// Screen row of world height `z` on the sprite's plane.
#[inline]
fn plane_row(scene: &Scene<'_>, vis: &VisSprite, z: Fixed) -> i32 {
    scene.view.center_y_frac.wrapping_sub(fixed_mul(z.wrapping_sub(scene.view.z), vis.yscale)) >> FRACBITS
}

/// Band a sprite starts with before any wall is considered: the whole
/// view, narrowed by its height sector or its floor clip.
pub fn initial_band(scene: &Scene<'_>, vis: &VisSprite, patch_height: Option<i32>) -> (i16, i16) {
    let view_height = scene.view.view_height;
    let mut top = 0;
    let mut bottom = view_height;

    if let Some(hs) = vis.heightsec.and_then(|id| scene.sectors.get(id as usize)) {
        if vis.fake_side != FakeSide::AboveCeiling {
            let h = plane_row(scene, vis, hs.floor.z_at_point(vis.gx, vis.gy));
            if vis.fake_side == FakeSide::BelowFloor {
                // Seen from below the fake floor.
                if h > top {
                    top = h.min(view_height);
                }
            } else if h < bottom {
                bottom = h.max(0);
            }
        }
        if vis.fake_side != FakeSide::BelowFloor {
            let h = plane_row(scene, vis, hs.ceiling.z_at_point(vis.gx, vis.gy));
            if vis.fake_side == FakeSide::AboveCeiling {
                if h < bottom {
                    bottom = h.max(0);
                }
            } else if h > top {
                top = h.min(view_height);
            }
        }
    } else if vis.floorclip != 0 {
        if let Some(height) = patch_height {
            let mid = vis.texturemid.wrapping_sub(height << FRACBITS).wrapping_add(vis.floorclip);
            let clip = scene.view.center_y_frac.wrapping_sub(fixed_mul(mid, vis.yscale)) >> FRACBITS;
            if clip < bottom {
                bottom = clip.max(0);
            }
        }
    }

    (top as i16, bottom as i16)
}

impl Software {
    /// Clip one sorted vissprite against every drawseg recorded this frame
    /// (last drawn first) and rasterize it. Walls found behind the sprite
    /// get their masked parts drawn first.
    pub fn draw_sprite(&mut self, scene: &Scene<'_>, patches: &mut PatchCache, id: VisSpriteId) {
        let Some(&vis) = self.frame.pool.get(id) else {
            return;
        };
        // Only columns that exist in both the clip arrays and the canvas.
        let last = self.frame.clip_top.len().min(self.canvas.width()) as i32 - 1;
        let (x1, x2) = (vis.x1.max(0), vis.x2.min(last));
        if x1 > x2 {
            return;
        }

        let patch_height = match vis.kind {
            SpriteKind::Patch(lump) if vis.heightsec.is_none() && vis.floorclip != 0 => {
                patches.measure(lump).ok().map(|s| s.height as i32)
            }
            _ => None,
        };
        let (top, bottom) = initial_band(scene, &vis, patch_height);
        let bottom = bottom.min(self.canvas.height() as i16);
        let cols = x1 as usize..=x2 as usize;
        self.frame.clip_top[cols.clone()].fill(top);
        self.frame.clip_bot[cols].fill(bottom);

        for i in (0..self.frame.drawsegs.len()).rev() {
            let ds = self.frame.drawsegs[i];
            if ds.x1 > x2
                || ds.x2 < x1
                || (!ds.silhouette.intersects(Silhouette::BOTH) && !ds.has_masked())
            {
                continue;
            }

            let r1 = ds.x1.max(x1);
            let r2 = ds.x2.min(x2);

            if seg_behind_sprite(&ds.depth, &vis) {
                if ds.has_masked() {
                    self.render_masked_seg_range(scene, patches, i, r1, r2);
                }
                continue;
            }

            let FrameContext { clip_top, clip_bot, openings, .. } = &mut self.frame;
            let cols = r1 as usize..=r2 as usize;
            let from = (r1 - ds.x1) as usize;
            let n = (r2 - r1 + 1) as usize;
            if ds.silhouette.contains(Silhouette::BOTTOM) {
                if let Some(at) = ds.sprite_bottom_clip {
                    tighten_bottom(&mut clip_bot[cols.clone()], openings.slice(at + from..at + from + n));
                }
            }
            if ds.silhouette.contains(Silhouette::TOP) {
                if let Some(at) = ds.sprite_top_clip {
                    tighten_top(&mut clip_top[cols], openings.slice(at + from..at + from + n));
                }
            }
        }

        self.draw_vis_sprite(scene, patches, &vis, scene.view.center_y_frac);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixed::{FRACUNIT, from_int},
        renderer::software::renderer::tests::{Fixture, view},
        world::{Sector, SectorId},
    };

    fn wall(view: &crate::world::ViewState, v1: (i32, i32), v2: (i32, i32)) -> SegDepth {
        SegDepth::from_wall(view, (from_int(v1.0), from_int(v1.1)), (from_int(v2.0), from_int(v2.1)))
    }

    fn sprite_at(view: &crate::world::ViewState, x: i32, y: i32) -> VisSprite {
        let (cx, depth) = view.to_view(from_int(x), from_int(y));
        VisSprite { cx, depth, ..VisSprite::default() }
    }

    #[test]
    fn range_test_short_circuits() {
        let v = view();
        let seg = wall(&v, (100, 50), (100, -50));
        assert_eq!(depth_range_order(&seg, from_int(50) >> 4), DepthOrder::Behind);
        assert_eq!(depth_range_order(&seg, from_int(150) >> 4), DepthOrder::InFront);
        let far = wall(&v, (200, 50), (200, -50));
        assert_eq!(depth_range_order(&far, from_int(150) >> 4), DepthOrder::Behind);
        let oblique = wall(&v, (50, 50), (150, -50));
        assert_eq!(depth_range_order(&oblique, from_int(100) >> 4), DepthOrder::Ambiguous);
    }

    #[test]
    fn cross_product_decides_oblique_walls() {
        let v = view();
        // Runs from near-left to far-right.
        let seg = wall(&v, (50, 50), (150, -50));
        // Right of centre at depth 100: the wall is farther there.
        let front = sprite_at(&v, 100, -20);
        assert!(sprite_in_front_of_seg(&seg, front.depth, front.cx));
        assert!(seg_behind_sprite(&seg, &front));
        // Left of centre the wall is nearer than the sprite.
        let back = sprite_at(&v, 100, 20);
        assert!(!sprite_in_front_of_seg(&seg, back.depth, back.cx));
        assert!(!seg_behind_sprite(&seg, &back));
    }

    #[test]
    fn clip_bands_never_widen() {
        let mut top = vec![0i16; 16];
        let mut bottom = vec![100i16; 16];
        let sils: [[i16; 16]; 3] = [
            std::array::from_fn(|i| (i * 7 % 13) as i16),
            std::array::from_fn(|i| 100 - (i * 5 % 11) as i16),
            std::array::from_fn(|i| (i * 3 % 40) as i16 + 30),
        ];
        for sil in &sils {
            let (t0, b0) = (top.clone(), bottom.clone());
            tighten_top(&mut top, sil);
            tighten_bottom(&mut bottom, sil);
            for x in 0..16 {
                assert!(top[x] >= t0[x] && bottom[x] <= b0[x], "column {x} widened");
            }
        }
    }

    #[test]
    fn heightsec_bands_follow_fake_side() {
        let mut fx = Fixture::new();
        // Control sector: fake floor at 0, fake ceiling at 32.
        fx.sectors.push(Sector::new(0, from_int(32), 160));
        let hs = (fx.sectors.len() - 1) as SectorId;
        let v = view();
        let (scene, _) = fx.split(&v);

        // yscale 1.0: one row per map unit, horizon at row 100.
        let vis = VisSprite { heightsec: Some(hs), yscale: FRACUNIT, ..VisSprite::default() };

        let centre = initial_band(&scene, &VisSprite { fake_side: FakeSide::Center, ..vis }, None);
        assert_eq!(centre, (68, 100));
        let below = initial_band(&scene, &VisSprite { fake_side: FakeSide::BelowFloor, ..vis }, None);
        assert_eq!(below, (100, 200));
        let above = initial_band(&scene, &VisSprite { fake_side: FakeSide::AboveCeiling, ..vis }, None);
        assert_eq!(above, (0, 68));
    }

    #[test]
    fn floorclip_raises_the_bottom() {
        let mut fx = Fixture::new();
        let v = view();
        let (scene, _) = fx.split(&v);
        // 16 rows tall, top at row 92, sunk by 4.
        let vis = VisSprite {
            yscale: FRACUNIT,
            texturemid: from_int(8),
            floorclip: from_int(4),
            ..VisSprite::default()
        };
        assert_eq!(initial_band(&scene, &vis, Some(16)), (0, 104));
        assert_eq!(initial_band(&scene, &VisSprite { floorclip: 0, ..vis }, Some(16)), (0, 200));
    }

    #[test]
    fn extreme_heights_wrap_instead_of_overflowing() {
        let mut fx = Fixture::new();
        fx.sectors.push(Sector::new(i32::MIN + 1, i32::MAX, 160));
        let hs = (fx.sectors.len() - 1) as SectorId;
        let mut v = view();
        v.z = i32::MAX - 3;
        let (scene, _) = fx.split(&v);

        let sunk = VisSprite {
            yscale: 64 * FRACUNIT,
            texturemid: i32::MIN + 1,
            floorclip: i32::MAX,
            ..VisSprite::default()
        };
        let (top, bottom) = initial_band(&scene, &sunk, Some(i16::MAX as i32));
        assert_eq!(top, 0);
        assert!((0..=200).contains(&bottom));

        for fake_side in [FakeSide::Center, FakeSide::BelowFloor, FakeSide::AboveCeiling] {
            let vis = VisSprite { heightsec: Some(hs), yscale: 64 * FRACUNIT, fake_side, ..VisSprite::default() };
            let (top, bottom) = initial_band(&scene, &vis, None);
            assert!((0..=200).contains(&top) && (0..=200).contains(&bottom), "{fake_side:?}");
        }
    }
}
