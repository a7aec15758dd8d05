use crate::{
    config::RenderConfig,
    fixed::Fixed,
    renderer::{
        Canvas, Renderer,
        software::{
            blend::BlendTables,
            pool::{VisSpritePool, VisSpriteId},
            sort::DepthSorter,
            sprites::{DrawSeg, FrameScratch},
        },
    },
    world::{LightTables, Sector, SpriteDef, Translation, ViewState},
};

/// Read-only inputs of one frame.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub view: &'a ViewState,
    pub sectors: &'a [Sector],
    pub sprites: &'a [SpriteDef],
    pub lights: &'a LightTables,
    pub blend: &'a BlendTables,
    /// Indexed by [`crate::world::TranslationId`].
    pub translations: &'a [Translation],
}

/// Everything that lives for exactly one frame. Reset by
/// [`Renderer::begin_frame`]; storage is kept between frames.
#[derive(Default)]
pub struct FrameContext {
    pub(crate) pool: VisSpritePool,
    pub(crate) sorter: DepthSorter,
    /// Per screen column: first visible row / first hidden row.
    pub(crate) clip_top: Vec<i16>,
    pub(crate) clip_bot: Vec<i16>,
    pub(crate) drawsegs: Vec<DrawSeg>,
    pub(crate) openings: FrameScratch,
    pub(crate) fuzz_pos: usize,
    /// Frame stamp of the last time each sector's things were added.
    pub(crate) sector_stamps: Vec<u32>,
    pub(crate) valid_count: u32,
    /// Shade of the sector whose things are being projected.
    pub(crate) sprite_shade: Fixed,
}

/// Software sprite renderer: owns the paletted canvas and the frame
/// context.
pub struct Software {
    pub(crate) canvas: Canvas,
    pub(crate) frame: FrameContext,
    pub(crate) config: RenderConfig,
}

impl Default for Software {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl Software {
    pub fn new(config: RenderConfig) -> Self {
        let frame = FrameContext {
            pool: VisSpritePool::new(config.initial_vissprites),
            ..FrameContext::default()
        };
        Self { canvas: Canvas::default(), frame, config }
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    /// The frame buffer; the wall renderer draws here before the sprite
    /// pass.
    #[inline]
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    #[inline]
    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    #[inline]
    pub fn vissprites(&self) -> &VisSpritePool {
        &self.frame.pool
    }

    /// Ids of this frame's vissprites, back to front.
    pub fn sorted_vissprites(&mut self) -> &[VisSpriteId] {
        let FrameContext { sorter, pool, .. } = &mut self.frame;
        sorter.sort(pool)
    }

    /// Current clip band of screen column `x`.
    pub fn clip_band(&self, x: usize) -> Option<(i16, i16)> {
        Some((*self.frame.clip_top.get(x)?, *self.frame.clip_bot.get(x)?))
    }
}

impl Renderer for Software {
    fn begin_frame(&mut self, w: usize, h: usize) {
        if w != self.canvas.width() || h != self.canvas.height() {
            self.canvas.resize(w, h);
        }
        self.canvas.fill(0);

        let f = &mut self.frame;
        f.clip_top.clear();
        f.clip_top.resize(w, 0);
        f.clip_bot.clear();
        f.clip_bot.resize(w, h as i16);

        f.pool.reset();
        f.drawsegs.clear();
        f.openings.reset();

        f.valid_count = f.valid_count.wrapping_add(1);
        if f.valid_count == 0 {
            f.sector_stamps.fill(0);
            f.valid_count = 1;
        }
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[u8], usize, usize),
    {
        submit(self.canvas.pixels(), self.canvas.width(), self.canvas.height());
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        angle::ANG90,
        config::ColumnMethod,
        fixed::{FRACBITS, FRACUNIT, Fixed, from_int},
        renderer::software::{
            projection::MINZ,
            sprites::{MASKED_DONE, MaskedMid, SegDepth, Silhouette, SpriteKind, VisSprite},
        },
        world::{
            Actor, BLACK_MAP, ColormapRef, MemorySource, Palette, PatchBuilder, PatchCache, PatchId,
            PlayerSprite, PlayerView, init_sprite_defs,
        },
    };

    /// Palette, tables, one sector, a "TROO" sprite with a single
    /// non-rotating frame (8×16, holes every third texel) and a solid 8×8
    /// mid-texture of colour 30.
    pub(crate) struct Fixture {
        pub lights: LightTables,
        pub blend: BlendTables,
        pub sectors: Vec<Sector>,
        pub sprites: Vec<SpriteDef>,
        pub patches: PatchCache,
        pub wall: PatchId,
    }

    impl Fixture {
        pub fn new() -> Self {
            let palette = Palette::from_fn(|i| (i, i, i));
            let blend = BlendTables::new(&palette);
            let lights = LightTables::generated(palette);

            let mut src = MemorySource::new();
            let troo = PatchBuilder::from_fn(8, 16, |x, y| ((x + y) % 3 != 0).then_some(100 + (x * 16 + y) as u8))
                .offsets(4, 8)
                .build();
            src.push("TROOA0", troo);
            let wall = src.push("MIDWALL", PatchBuilder::solid(8, 8, 30).build());
            let patches = PatchCache::new(Box::new(src));
            let sprites = init_sprite_defs(&["TROO"], &patches).unwrap();

            let sectors = vec![Sector::new(from_int(-64), from_int(64), 255)];
            Self { lights, blend, sectors, sprites, patches, wall }
        }

        /// A scene over the fixture plus its patch cache.
        pub fn split<'a>(&'a mut self, view: &'a ViewState) -> (Scene<'a>, &'a mut PatchCache) {
            let Fixture { lights, blend, sectors, sprites, patches, .. } = self;
            let scene = Scene {
                view,
                sectors: &sectors[..],
                sprites: &sprites[..],
                lights: &*lights,
                blend: &*blend,
                translations: &[],
            };
            (scene, patches)
        }
    }

    pub(crate) fn view() -> ViewState {
        ViewState::from_fixed(320, 200, 0, 0, 0, 0, 8 * FRACUNIT)
    }

    fn render(
        method: ColumnMethod,
        fx: &mut Fixture,
        actor: &Actor,
        setup: impl FnOnce(&mut Software),
    ) -> Software {
        let view = view();
        let mut sw = Software::new(RenderConfig { column_method: method, ..RenderConfig::default() });
        sw.begin_frame(320, 200);
        setup(&mut sw);
        let (scene, patches) = fx.split(&view);
        assert!(sw.project_sprite(&scene, patches, actor, Default::default(), 0).is_some());
        sw.draw_masked(&scene, patches, None);
        sw
    }

    #[test]
    fn begin_frame_resets_frame_state() {
        let mut sw = Software::default();
        sw.begin_frame(16, 8);
        sw.alloc_openings(10);
        sw.push_drawseg(DrawSeg::new(0, 3, SegDepth::default()));
        sw.frame.pool.allocate();
        let stamp = sw.frame.valid_count;

        sw.begin_frame(16, 8);
        assert!(sw.drawsegs().is_empty());
        assert!(sw.openings().is_empty());
        assert!(sw.vissprites().is_empty());
        assert_eq!(sw.frame.valid_count, stamp + 1);
        assert_eq!(sw.clip_band(15), Some((0, 8)));

        let mut seen = None;
        sw.end_frame(|px, w, h| seen = Some((px.len(), w, h)));
        assert_eq!(seen, Some((128, 16, 8)));
    }

    #[test]
    fn centred_sprite_gets_full_band_and_same_pixels_on_both_paths() {
        let mut fx = Fixture::new();
        // tz = 10000 straight ahead.
        let actor = Actor::new(0, 10000 << 4, 0, 0, 0, 0);

        let single = render(ColumnMethod::Single, &mut fx, &actor, |_| {});
        let quad = render(ColumnMethod::Quad, &mut fx, &actor, |_| {});

        let vis = single.vissprites().iter().next().copied().unwrap();
        assert_eq!(vis.depth, 10000);
        for x in vis.x1..=vis.x2 {
            assert_eq!(single.clip_band(x as usize), Some((0, 200)));
        }
        assert!(single.canvas().pixels().iter().any(|&p| p != 0));
        assert_eq!(single.canvas().pixels(), quad.canvas().pixels());
    }

    #[test]
    fn moderate_depth_quad_matches_single() {
        let mut fx = Fixture::new();
        let mut actor = Actor::new(0, from_int(40), from_int(3), from_int(-5), 0, 0);
        actor.angle = ANG90;

        let single = render(ColumnMethod::Single, &mut fx, &actor, |_| {});
        let quad = render(ColumnMethod::Quad, &mut fx, &actor, |_| {});
        let vis = single.vissprites().iter().next().copied().unwrap();
        // Narrow enough to exercise head, batched and tail columns.
        assert!(vis.x2 - vis.x1 > 8 && vis.x2 < 319 && vis.x1 > 0);
        assert_eq!(single.canvas().pixels(), quad.canvas().pixels());
    }

    #[test]
    fn nearer_wall_hides_the_sprite_below_its_silhouette() {
        let mut fx = Fixture::new();
        let actor = Actor::new(0, from_int(40), 0, 0, 0, 0);
        let open = render(ColumnMethod::Quad, &mut fx, &actor, |_| {});
        let vis = open.vissprites().iter().next().copied().unwrap();

        // A low wall 20 units ahead covering the whole screen width whose
        // top edge is the screen centre row.
        let clipped = render(ColumnMethod::Quad, &mut fx, &actor, |sw| {
            let view = view();
            let mut ds = DrawSeg::new(
                0,
                319,
                SegDepth::from_wall(&view, (from_int(20), from_int(100)), (from_int(20), from_int(-100))),
            );
            ds.silhouette = Silhouette::BOTTOM;
            sw.store_silhouette(&mut ds, &[], &[100i16; 320]);
            sw.push_drawseg(ds);
        });

        for x in vis.x1..=vis.x2 {
            assert_eq!(clipped.clip_band(x as usize), Some((0, 100)));
            for y in 100..200 {
                assert_eq!(clipped.canvas().get(x as usize, y), Some(0));
            }
        }
        assert!((0..100).any(|y| clipped.canvas().get(vis.x1 as usize + 2, y) != Some(0)));
    }

    #[test]
    fn minz_boundary() {
        let mut fx = Fixture::new();
        let view = view();
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        let (scene, patches) = fx.split(&view);

        let at_minz = Actor::new(0, MINZ << 4, 0, 0, 0, 0);
        assert!(sw.project_sprite(&scene, patches, &at_minz, Default::default(), 0).is_none());
        let past = Actor::new(0, (MINZ + 1) << 4, 0, 0, 0, 0);
        let id = sw.project_sprite(&scene, patches, &past, Default::default(), 0).unwrap();
        assert_eq!(sw.vissprites()[id].depth, MINZ + 1);
        assert_eq!(sw.vissprites()[id].texturemid, 8 << FRACBITS);
    }

    /// Flat wall `dist` units ahead across the whole view.
    fn facing_wall(dist: i32) -> SegDepth {
        SegDepth::from_wall(&view(), (from_int(dist), from_int(1000)), (from_int(dist), from_int(-1000)))
    }

    /// Particle 40 units ahead covering columns `150..=153`, rows
    /// `100..=103`.
    fn particle_over(segs: &[(i32, i32)]) -> Software {
        let mut fx = Fixture::new();
        let view = view();
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        for &(x1, x2) in segs {
            let mut ds = DrawSeg::new(x1, x2, facing_wall(20));
            ds.silhouette = Silhouette::BOTTOM;
            sw.store_silhouette(&mut ds, &[], &[0i16; 320]);
            sw.push_drawseg(ds);
        }
        let id = sw.frame.pool.push(VisSprite {
            x1: 150,
            x2: 153,
            depth: from_int(40) >> 4,
            xscale: FRACUNIT,
            kind: SpriteKind::Particle { color: 200, trans: 255 },
            ..VisSprite::default()
        });
        let (scene, patches) = fx.split(&view);
        sw.draw_sprite(&scene, patches, id);
        sw
    }

    #[test]
    fn particles_clip_at_their_edge_columns_only() {
        // The middle columns are hidden by a nearer wall, the edges are not:
        // the square is still drawn whole.
        let sw = particle_over(&[(151, 152)]);
        assert_eq!(sw.clip_band(151), Some((0, 0)));
        for x in 150..=153 {
            for y in 100..=103 {
                assert_ne!(sw.canvas().get(x, y), Some(0), "({x}, {y})");
            }
            assert_eq!(sw.canvas().get(x, 99), Some(0));
            assert_eq!(sw.canvas().get(x, 104), Some(0));
        }

        // Both edge columns hidden: nothing at all.
        let sw = particle_over(&[(150, 150), (153, 153)]);
        assert!(sw.canvas().pixels().iter().all(|&p| p == 0));
    }

    /// Masked mid-texture `dist` units ahead spanning the whole view.
    fn masked_wall(sw: &mut Software, wall: PatchId, dist: i32, texturemid: Fixed) {
        let mut ds = DrawSeg::new(0, 319, facing_wall(dist));
        sw.store_masked_cols(&mut ds, &[0i16; 320]);
        ds.masked_mid = Some(MaskedMid {
            patch: wall,
            texturemid,
            scale1: from_int(160 / dist),
            scale_step: 0,
            light_level: 255,
            colormap: 0,
            alpha: FRACUNIT,
        });
        sw.push_drawseg(ds);
    }

    fn pending_masked_columns(sw: &Software) -> Vec<i32> {
        let cols = sw.drawsegs()[0].masked_cols.unwrap();
        (0..320).filter(|&x| sw.openings().get(cols + x as usize) != MASKED_DONE).collect()
    }

    #[test]
    fn farther_masked_wall_is_drawn_under_the_sprite() {
        let mut fx = Fixture::new();
        let wall = fx.wall;
        let actor = Actor::new(0, from_int(40), 0, 0, 0, 0);
        let alone = render(ColumnMethod::Quad, &mut fx, &actor, |_| {});

        let view = view();
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        // 80 units away at scale 2: rows 84..100.
        masked_wall(&mut sw, wall, 80, from_int(8));
        let (scene, patches) = fx.split(&view);
        let id = sw.project_sprite(&scene, patches, &actor, Default::default(), 0).unwrap();
        let vis = sw.vissprites()[id];

        // Clipping the sprite draws exactly the wall columns it overlaps.
        sw.draw_sprite(&scene, patches, id);
        let pending = pending_masked_columns(&sw);
        assert!(pending.iter().all(|x| !(vis.x1..=vis.x2).contains(x)));
        assert_eq!(pending.len(), 320 - (vis.x2 - vis.x1 + 1) as usize);

        sw.draw_masked(&scene, patches, None);
        assert!(pending_masked_columns(&sw).is_empty());
        let wall_px = sw.canvas().get(20, 90).unwrap();
        assert_ne!(wall_px, 0);

        let mut holes = 0;
        for x in vis.x1 as usize..=vis.x2 as usize {
            for y in 84..100 {
                let sprite = alone.canvas().get(x, y).unwrap();
                let got = sw.canvas().get(x, y).unwrap();
                if sprite != 0 {
                    assert_eq!(got, sprite, "sprite at ({x}, {y})");
                } else {
                    holes += 1;
                    assert_eq!(got, wall_px, "wall through hole at ({x}, {y})");
                }
            }
        }
        assert!(holes > 0);
    }

    #[test]
    fn nearer_masked_wall_is_drawn_over_the_sprite() {
        let mut fx = Fixture::new();
        let wall = fx.wall;
        let actor = Actor::new(0, from_int(40), 0, 0, 0, 0);
        let alone = render(ColumnMethod::Quad, &mut fx, &actor, |_| {});

        let view = view();
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        // 20 units away at scale 8: rows 84 and down.
        masked_wall(&mut sw, wall, 20, from_int(2));
        let (scene, patches) = fx.split(&view);
        let id = sw.project_sprite(&scene, patches, &actor, Default::default(), 0).unwrap();
        let vis = sw.vissprites()[id];

        sw.draw_sprite(&scene, patches, id);
        assert_eq!(pending_masked_columns(&sw).len(), 320);

        sw.draw_masked(&scene, patches, None);
        let wall_px = sw.canvas().get(20, 100).unwrap();
        assert_ne!(wall_px, 0);
        for x in vis.x1 as usize..=vis.x2 as usize {
            for y in 68..84 {
                assert_eq!(sw.canvas().get(x, y), alone.canvas().get(x, y), "sprite above the wall at ({x}, {y})");
            }
            for y in 84..132 {
                assert_eq!(sw.canvas().get(x, y), Some(wall_px), "wall over sprite at ({x}, {y})");
            }
        }
    }

    #[test]
    fn canvas_narrower_than_the_view_clips_at_its_edge() {
        let mut fx = Fixture::new();
        let view = view();
        let mut sw = Software::default();
        sw.begin_frame(152, 120);
        let (scene, patches) = fx.split(&view);

        let actor = Actor::new(0, from_int(40), 0, 0, 0, 0);
        let id = sw.project_sprite(&scene, patches, &actor, Default::default(), 0).unwrap();
        assert!(sw.vissprites()[id].x2 >= 152);
        sw.frame.pool.push(VisSprite {
            x1: 140,
            x2: 170,
            depth: from_int(60) >> 4,
            xscale: FRACUNIT,
            kind: SpriteKind::Particle { color: 200, trans: 255 },
            ..VisSprite::default()
        });

        // Fog behind everything, across the whole view.
        let mut ds = DrawSeg::new(0, 319, SegDepth { near: from_int(80) >> 4, far: from_int(80) >> 4, ..SegDepth::default() });
        sw.store_masked_cols(&mut ds, &[0i16; 320]);
        ds.fog_boundary = Some(ColormapRef::new(0, BLACK_MAP as u8));
        sw.push_drawseg(ds);

        let player = PlayerView {
            psprites: smallvec::smallvec![PlayerSprite {
                sprite: 0,
                frame: 0,
                sx: from_int(150),
                sy: from_int(100),
                fullbright: false,
            }],
            ..PlayerView::default()
        };
        sw.draw_masked(&scene, patches, Some(&player));

        assert_eq!(sw.canvas().pixels().len(), 152 * 120);
        assert!((68..120).any(|y| sw.canvas().get(151, y) != Some(0)));
        let cols = sw.drawsegs()[0].masked_cols.unwrap();
        assert_eq!(sw.openings().get(cols + 151), MASKED_DONE);
        assert_ne!(sw.openings().get(cols + 152), MASKED_DONE);
    }
}
