//! World → screen: actors, particles and the player's weapon become
//! vissprites.
//!
//! Depths and lateral offsets are in `DMulScale20` units (map units with
//! 12 fractional bits), the same space [`SegDepth`] uses.
//!
//! [`SegDepth`]: crate::renderer::software::sprites::SegDepth

use hecs::World;

use crate::{
    angle::{point_to_angle, rotation_bucket},
    fixed::{FRACBITS, FRACUNIT, Fixed, div_scale, dmul_scale, fixed_mul, mul_scale, safe_div_scale, scale},
    renderer::software::{
        Scene, Software,
        particles::{Particle, ParticleSlab},
        pool::VisSpriteId,
        sprites::{SpriteKind, VisSprite},
    },
    world::{
        Actor, ColormapId, ColormapRef, FakeSide, PatchCache, PlayerSprite, PlayerView, RenderFlags,
        RenderStyle, SectorId, SectorLocator, active_heightsec, light2shade, palookup,
    },
};

/// Near clip distance. Things at or closer than this are dropped.
pub const MINZ: Fixed = 2048 * 4;

/// Weapon sprites are laid out on a 320×200 screen.
const BASE_WIDTH: i32 = 320;
const BASE_Y_CENTER: i32 = 100;

/// Extra darkening of the weapon relative to its sector.
const PSPRITE_SHADE_BIAS: Fixed = 24 * FRACUNIT;

impl Software {
    /// Project every actor standing in `sector`. Called once per subsector
    /// during the BSP walk; a sector split into several subsectors is only
    /// processed the first time it is reached in a frame.
    pub fn add_sprites(
        &mut self,
        scene: &Scene<'_>,
        patches: &mut PatchCache,
        world: &World,
        sector: SectorId,
        light_level: i32,
        fake_side: FakeSide,
    ) {
        let f = &mut self.frame;
        let slot = sector as usize;
        if f.sector_stamps.len() <= slot {
            f.sector_stamps.resize(scene.sectors.len().max(slot + 1), 0);
        }
        if f.sector_stamps[slot] == f.valid_count {
            return;
        }
        f.sector_stamps[slot] = f.valid_count;
        f.sprite_shade = light2shade(light_level + scene.view.actual_extra_light());

        let base_map = scene.sectors.get(slot).map_or(0, |s| s.colormap);
        for (_, actor) in world.query::<&Actor>().iter() {
            if actor.sector == sector {
                self.project_sprite(scene, patches, actor, fake_side, base_map);
            }
        }
    }

    /// Turn one actor into a vissprite, or reject it. `base_map` is the
    /// colormap of the sector being lit.
    pub fn project_sprite(
        &mut self,
        scene: &Scene<'_>,
        patches: &mut PatchCache,
        actor: &Actor,
        fake_side: FakeSide,
        base_map: ColormapId,
    ) -> Option<VisSpriteId> {
        let view = scene.view;

        if actor.render_flags.contains(RenderFlags::INVISIBLE)
            || actor.style == RenderStyle::None
            || (actor.style.uses_alpha() && actor.alpha == 0)
        {
            return None;
        }

        let tr_x = actor.x.wrapping_sub(view.x);
        let tr_y = actor.y.wrapping_sub(view.y);

        let tz = dmul_scale(tr_x, view.tan_cos, tr_y, view.tan_sin, 20);
        if tz <= MINZ {
            return None;
        }

        let mut tx = dmul_scale(tr_x, view.sin, tr_y.wrapping_neg(), view.cos, 16);
        if view.mirror.contains(RenderFlags::XFLIP) {
            tx = tx.wrapping_neg();
        }
        let cx = tx >> 4;

        // Outside the 90° frustum.
        if (tx.unsigned_abs() >> 6) as i64 > tz as i64 {
            return None;
        }

        let xs = (actor.xscale as i32 + 1) << 6;
        let ys = actor.yscale as i32 + 1;
        let xscale = scale(view.center_x_frac, xs, tz);

        let Some(def) = scene.sprites.get(actor.sprite as usize) else {
            log::debug!("project_sprite: invalid sprite number {}", actor.sprite);
            return None;
        };
        let Some(frame) = def.frames.get(actor.frame as usize) else {
            log::debug!(
                "project_sprite: invalid sprite frame {}: {} (max {})",
                def.name,
                char::from(b'A'.wrapping_add(actor.frame)),
                def.frames.len()
            );
            return None;
        };

        let (lump, mut flip) = if frame.rotate {
            let ang = point_to_angle(view.x, view.y, actor.x, actor.y);
            frame.pick(rotation_bucket(ang, actor.angle))
        } else {
            frame.pick(0)
        };

        let size = match patches.measure(lump) {
            Ok(size) => size,
            Err(e) => {
                log::debug!("project_sprite: {} frame {}: {e}", def.name, actor.frame);
                return None;
            }
        };
        let (width, height) = (size.width as i32, size.height as i32);
        let (left, top) = (size.left_offset as i32, size.top_offset as i32);

        let gzt = actor.z.wrapping_add((top << (FRACBITS - 6)).wrapping_mul(ys));
        let gzb = actor.z.wrapping_add(((top - height) << (FRACBITS - 6)).wrapping_mul(ys));

        // Wholly above or below the screen.
        if mul_scale(view.global_uclip, tz, 12) > view.z.wrapping_sub(gzb)
            || mul_scale(view.global_dclip, tz, 12) < view.z.wrapping_sub(gzt)
        {
            return None;
        }

        tx = tx.wrapping_sub(left << FRACBITS);
        let x1 = view.center_x_frac.wrapping_add(mul_scale(tx, xscale, 16)) >> FRACBITS;
        if x1 > view.window_right {
            return None;
        }
        tx = tx.wrapping_add(width << FRACBITS);
        let x2 = (view.center_x_frac.wrapping_add(mul_scale(tx, xscale, 16)) >> FRACBITS) - 1;
        if x2 < view.window_left || x2 < x1 {
            return None;
        }

        // Things on the far side of a deep-water or fake-ceiling surface.
        let heightsec = active_heightsec(scene.sectors, actor.sector);
        if let Some(hs) = heightsec.and_then(|id| scene.sectors.get(id as usize)) {
            let hidden = match fake_side {
                FakeSide::AboveCeiling => gzt < hs.ceiling.z_at_point(actor.x, actor.y),
                FakeSide::BelowFloor => gzb >= hs.floor.z_at_point(actor.x, actor.y),
                FakeSide::Center => {
                    gzt < hs.floor.z_at_point(actor.x, actor.y)
                        || gzb >= hs.ceiling.z_at_point(actor.x, actor.y)
                }
            };
            if hidden {
                return None;
            }
        }

        if (view.mirror ^ actor.render_flags).contains(RenderFlags::XFLIP) {
            flip = !flip;
        }

        let iscale = div_scale(1, xscale, 32);
        let (mut startfrac, xiscale) = if flip { ((width << FRACBITS) - 1, -iscale) } else { (0, iscale) };
        let vx1 = x1.max(view.window_left);
        let vx2 = x2.min(view.window_right);
        if vx1 > x1 {
            startfrac = startfrac.wrapping_add(xiscale.wrapping_mul(vx1 - x1));
        }

        let colormap = if let Some(shade) = view.fixed_light {
            ColormapRef::new(base_map, shade)
        } else if let Some(fixed) = view.fixed_colormap {
            fixed
        } else if !view.foggy && actor.render_flags.contains(RenderFlags::FULLBRIGHT) {
            ColormapRef::new(base_map, 0)
        } else {
            let vis = div_scale(view.sprite_visibility, tz, 12);
            ColormapRef::new(base_map, palookup(vis, self.frame.sprite_shade))
        };

        let vis = VisSprite {
            x1: vx1,
            x2: vx2,
            cx,
            depth: tz,
            gx: actor.x,
            gy: actor.y,
            gz: gzb,
            gzt,
            xscale,
            yscale: scale(view.inv_z_to_scale, ys << 6, tz),
            xiscale,
            startfrac,
            texturemid: (top << FRACBITS)
                .wrapping_sub(safe_div_scale(view.z.wrapping_sub(actor.z), ys, 6))
                .wrapping_sub(actor.floorclip),
            floorclip: actor.floorclip,
            kind: SpriteKind::Patch(lump),
            colormap,
            translation: actor.translation,
            render_flags: actor.render_flags,
            style: actor.style,
            alpha: actor.alpha,
            alpha_color: actor.alpha_color,
            heightsec,
            fake_side,
        };
        Some(self.frame.pool.push(vis))
    }

    /// Project every live particle. Particles are not linked into sectors,
    /// so `locator` finds the sector each one is in.
    pub fn add_particles(&mut self, scene: &Scene<'_>, particles: &ParticleSlab, locator: &impl SectorLocator) {
        if !self.config.particles {
            return;
        }
        for (_, p) in particles.active() {
            self.project_particle(scene, p, locator);
        }
    }

    pub fn project_particle(
        &mut self,
        scene: &Scene<'_>,
        p: &Particle,
        locator: &impl SectorLocator,
    ) -> Option<VisSpriteId> {
        let view = scene.view;
        let tr_x = p.x.wrapping_sub(view.x);
        let tr_y = p.y.wrapping_sub(view.y);

        let tz = dmul_scale(tr_x, view.tan_cos, tr_y, view.tan_sin, 20);
        if tz < MINZ {
            return None;
        }
        let mut tx = dmul_scale(tr_x, view.sin, tr_y.wrapping_neg(), view.cos, 20);
        if view.mirror.contains(RenderFlags::XFLIP) {
            tx = tx.wrapping_neg();
        }
        if tz <= tx.wrapping_abs() {
            return None;
        }

        let tiz = 268_435_456 / tz;
        let xscale = view.center_x.wrapping_mul(tiz);
        let psize = (p.size as i32) << 9;

        let x1 = view
            .window_left
            .max(view.center_x_frac.wrapping_add(mul_scale(tx.wrapping_sub(psize), xscale, 12)) >> FRACBITS);
        let x2 = view
            .window_right
            .min(view.center_x_frac.wrapping_add(mul_scale(tx.wrapping_add(psize), xscale, 12)) >> FRACBITS);
        if x1 > x2 {
            return None;
        }

        let gzt = p.z.wrapping_add(1);

        let sector_id = locator.sector_at(p.x, p.y);
        let sector = sector_id.and_then(|id| scene.sectors.get(id as usize));
        if let Some(s) = sector {
            if p.z < s.floor.z_at_point(p.x, p.y) || p.z > s.ceiling.z_at_point(p.x, p.y) {
                return None;
            }
        }

        let heightsec = sector_id.and_then(|id| active_heightsec(scene.sectors, id));
        let hs = heightsec.and_then(|id| scene.sectors.get(id as usize));
        if let Some(hs) = hs {
            let phs = view
                .sector
                .and_then(|id| active_heightsec(scene.sectors, id))
                .and_then(|id| scene.sectors.get(id as usize));
            let hs_floor = hs.floor.z_at_point(p.x, p.y);
            let hs_ceiling = hs.ceiling.z_at_point(p.x, p.y);

            let below = match phs {
                Some(phs) if view.z < phs.floor.z_at_point(view.x, view.y) => p.z >= hs_floor,
                _ => gzt < hs_floor,
            };
            if below {
                return None;
            }
            let above = match phs {
                Some(phs) if view.z > phs.ceiling.z_at_point(view.x, view.y) => {
                    gzt < hs_ceiling && view.z >= hs.ceiling.z_at_point(view.x, view.y)
                }
                _ => p.z >= hs_ceiling,
            };
            if above {
                return None;
            }
        }

        let colormap = if let Some(fixed) = view.fixed_colormap {
            fixed
        } else if let Some(s) = sector {
            let map = match hs {
                Some(hs) if p.z <= hs.floor.z_at_point(p.x, p.y) || p.z > hs.ceiling.z_at_point(p.x, p.y) => {
                    hs.colormap
                }
                _ => s.colormap,
            };
            match view.fixed_light {
                Some(shade) => ColormapRef::new(map, shade),
                None => ColormapRef::new(
                    map,
                    palookup(
                        fixed_mul(tiz, view.particle_visibility),
                        light2shade(s.light_level + view.actual_extra_light()),
                    ),
                ),
            }
        } else {
            ColormapRef::new(0, 0)
        };

        let vis = VisSprite {
            x1,
            x2,
            cx: tx,
            depth: tz,
            gx: p.x,
            gy: p.y,
            gz: p.z,
            gzt,
            xscale,
            yscale: fixed_mul(xscale, view.y_aspect_mul),
            texturemid: fixed_mul(view.y_aspect_mul, gzt.wrapping_sub(view.z)),
            kind: SpriteKind::Particle { color: p.color, trans: p.trans },
            colormap,
            heightsec,
            ..VisSprite::default()
        };
        Some(self.frame.pool.push(vis))
    }

    /// Draw the weapon layers over the finished view. Skipped when turned
    /// off or in chase-cam view.
    pub fn draw_player_sprites(&mut self, scene: &Scene<'_>, patches: &mut PatchCache, player: &PlayerView) {
        if !self.config.draw_player_sprites || player.chase_cam {
            return;
        }
        let view = scene.view;
        let shade = light2shade(player.light_level + view.actual_extra_light()) - PSPRITE_SHADE_BIAS;

        let w = (view.view_width.max(0) as usize).min(self.frame.clip_top.len());
        let rows = view.view_height.min(self.canvas.height() as i32);
        self.frame.clip_top[..w].fill(0);
        self.frame.clip_bot[..w].fill(rows as i16);

        let center_y_frac = (view.view_height >> 1) << FRACBITS;
        for psp in &player.psprites {
            if let Some(vis) = project_psprite(scene, patches, psp, player, shade) {
                self.draw_vis_sprite(scene, patches, &vis, center_y_frac);
            }
        }
    }
}

fn project_psprite(
    scene: &Scene<'_>,
    patches: &mut PatchCache,
    psp: &PlayerSprite,
    player: &PlayerView,
    shade: Fixed,
) -> Option<VisSprite> {
    let view = scene.view;

    let Some(def) = scene.sprites.get(psp.sprite as usize) else {
        log::debug!("draw_player_sprites: invalid sprite number {}", psp.sprite);
        return None;
    };
    let Some(frame) = def.frames.get(psp.frame as usize) else {
        log::debug!("draw_player_sprites: invalid sprite frame {}: {}", def.name, psp.frame);
        return None;
    };
    let lump = frame.lumps[0];
    let flip = frame.flip & 1 != 0;

    let size = match patches.measure(lump) {
        Ok(size) => size,
        Err(e) => {
            log::debug!("draw_player_sprites: {}: {e}", def.name);
            return None;
        }
    };
    let width = size.width as i32;

    let xscale = view.center_x_frac / (BASE_WIDTH / 2);
    let yscale = fixed_mul(xscale, view.y_aspect_mul);
    let xiscale = div_scale(1, xscale, 32);

    let mut tx = psp.sx - ((BASE_WIDTH / 2) << FRACBITS);
    tx -= (size.left_offset as i32) << FRACBITS;
    let x1 = (view.center_x_frac + fixed_mul(tx, xscale)) >> FRACBITS;
    if x1 > view.view_width {
        return None;
    }
    tx += width << FRACBITS;
    let x2 = ((view.center_x_frac + fixed_mul(tx, xscale)) >> FRACBITS) - 1;
    if x2 < 0 {
        return None;
    }

    let vx1 = x1.max(0);
    let vx2 = x2.min(view.view_width - 1);
    let (mut startfrac, xiscale) = if flip { ((width << FRACBITS) - 1, -xiscale) } else { (0, xiscale) };
    if vx1 > x1 {
        startfrac = startfrac.wrapping_add(xiscale.wrapping_mul(vx1 - x1));
    }

    let map = player.colormap;
    let colormap = if let Some(s) = view.fixed_light {
        ColormapRef::new(map, s)
    } else if let Some(fixed) = view.fixed_colormap {
        fixed
    } else if psp.fullbright {
        ColormapRef::new(map, 0)
    } else {
        ColormapRef::new(map, palookup(0, shade))
    };

    // Shadow drawing only while the invisibility power is strong.
    let style = if player.invisibility < 4 * 32 && player.invisibility & 8 == 0 {
        RenderStyle::Normal
    } else {
        player.style
    };

    Some(VisSprite {
        x1: vx1,
        x2: vx2,
        xscale,
        yscale,
        xiscale,
        startfrac,
        texturemid: (BASE_Y_CENTER << FRACBITS)
            - (psp.sy - ((size.top_offset as i32) << FRACBITS))
            - player.y_adjust,
        kind: SpriteKind::Patch(lump),
        colormap,
        render_flags: player.render_flags,
        style,
        alpha: player.alpha,
        alpha_color: player.alpha_color,
        ..VisSprite::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        angle::{ANG90, ANG180},
        fixed::from_int,
        renderer::{
            Renderer,
            software::renderer::tests::{Fixture, view},
        },
        world::{MemorySource, PatchBuilder, Sector, ViewState, init_sprite_defs},
    };
    use smallvec::smallvec;

    fn project(fx: &mut Fixture, view: &ViewState, actor: &Actor, side: FakeSide) -> Option<VisSprite> {
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        let (scene, patches) = fx.split(view);
        let id = sw.project_sprite(&scene, patches, actor, side, 0)?;
        Some(sw.vissprites()[id])
    }

    /// Five-lump rotating sprite "POSS", lump ids 0..=4 in the order
    /// A1, A2A8, A3A7, A4A6, A5.
    fn rotating_fixture() -> Fixture {
        let mut fx = Fixture::new();
        let mut src = MemorySource::new();
        for (i, name) in ["POSSA1", "POSSA2A8", "POSSA3A7", "POSSA4A6", "POSSA5"].iter().enumerate() {
            src.push(name, PatchBuilder::solid(4 + i as u16, 8, 10 + i as u8).offsets(2, 8).build());
        }
        fx.patches = PatchCache::new(Box::new(src));
        fx.sprites = init_sprite_defs(&["POSS"], &fx.patches).unwrap();
        fx
    }

    #[test]
    fn rotation_follows_facing() {
        let mut fx = rotating_fixture();
        let v = view();
        let mut actor = Actor::new(0, from_int(100), 0, 0, 0, 0);

        // Facing the viewer: front view.
        actor.angle = ANG180;
        let front = project(&mut fx, &v, &actor, FakeSide::Center).unwrap();
        assert_eq!(front.kind, SpriteKind::Patch(0));
        assert!(front.xiscale > 0);
        assert_eq!(front.startfrac, 0);

        // Facing away: back view.
        actor.angle = 0;
        let back = project(&mut fx, &v, &actor, FakeSide::Center).unwrap();
        assert_eq!(back.kind, SpriteKind::Patch(4));

        // Slot 14 is the mirrored half of A2A8.
        actor.angle = 0xB000_0000;
        let mirrored = project(&mut fx, &v, &actor, FakeSide::Center).unwrap();
        assert_eq!(mirrored.kind, SpriteKind::Patch(1));
        assert!(mirrored.xiscale < 0);
        assert_eq!(mirrored.startfrac, (5 << FRACBITS) - 1);
    }

    #[test]
    fn mirror_pass_flips_side_and_texture() {
        let mut fx = Fixture::new();
        let mut v = view();
        let actor = Actor::new(0, from_int(100), from_int(10), 0, 0, 0);
        let plain = project(&mut fx, &v, &actor, FakeSide::Center).unwrap();
        v.mirror = RenderFlags::XFLIP;
        let mirrored = project(&mut fx, &v, &actor, FakeSide::Center).unwrap();

        assert!(plain.cx < 0);
        assert_eq!(mirrored.cx, -plain.cx);
        assert!(plain.xiscale > 0 && mirrored.xiscale < 0);
        assert!(mirrored.x1 > 160 && plain.x2 < 160);

        // An actor flagged XFLIP in a mirror is drawn unflipped.
        let mut flagged = actor.clone();
        flagged.render_flags = RenderFlags::XFLIP;
        assert!(project(&mut fx, &v, &flagged, FakeSide::Center).unwrap().xiscale > 0);
    }

    #[test]
    fn rejections() {
        let mut fx = Fixture::new();
        let v = view();
        let ok = Actor::new(0, from_int(100), 0, 0, 0, 0);
        assert!(project(&mut fx, &v, &ok, FakeSide::Center).is_some());

        let cases: Vec<(&str, Actor)> = vec![
            ("invisible", Actor { render_flags: RenderFlags::INVISIBLE, ..ok.clone() }),
            ("style none", Actor { style: RenderStyle::None, ..ok.clone() }),
            ("transparent", Actor { style: RenderStyle::Translucent, alpha: 0, ..ok.clone() }),
            ("behind", Actor { x: from_int(-100), ..ok.clone() }),
            ("outside frustum", Actor { x: from_int(10), y: from_int(1000), ..ok.clone() }),
            ("above screen", Actor { z: from_int(1000), ..ok.clone() }),
            ("below screen", Actor { z: from_int(-1000), ..ok.clone() }),
            ("unknown sprite", Actor { sprite: 9, ..ok.clone() }),
            ("unknown frame", Actor { frame: 3, ..ok.clone() }),
        ];
        for (what, actor) in cases {
            assert!(project(&mut fx, &v, &actor, FakeSide::Center).is_none(), "{what}");
        }

        // Translucent with alpha is fine.
        let faint = Actor { style: RenderStyle::Translucent, alpha: FRACUNIT / 4, ..ok };
        assert!(project(&mut fx, &v, &faint, FakeSide::Center).is_some());
    }

    #[test]
    fn height_sector_separates_by_fake_side() {
        let mut fx = Fixture::new();
        fx.sectors[0].heightsec = Some(1);
        fx.sectors.push(Sector::new(from_int(32), from_int(128), 160));
        let v = view();
        // Sprite spans z 32..48 at 100 units.
        let actor = Actor::new(0, from_int(100), 0, from_int(40), 0, 0);

        let centre = project(&mut fx, &v, &actor, FakeSide::Center).unwrap();
        assert_eq!(centre.heightsec, Some(1));
        assert_eq!(centre.fake_side, FakeSide::Center);
        assert!(project(&mut fx, &v, &actor, FakeSide::BelowFloor).is_none());
        assert!(project(&mut fx, &v, &actor, FakeSide::AboveCeiling).is_none());

        let deep = Actor { z: from_int(-24), ..actor };
        assert!(project(&mut fx, &v, &deep, FakeSide::Center).is_none());
        assert!(project(&mut fx, &v, &deep, FakeSide::BelowFloor).is_some());
    }

    #[test]
    fn colormap_precedence() {
        let mut fx = Fixture::new();
        let mut v = view();
        let far = Actor::new(0, from_int(2000), 0, 0, 0, 0);
        let bright = Actor { render_flags: RenderFlags::FULLBRIGHT, ..far.clone() };

        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        sw.frame.sprite_shade = light2shade(96);
        let mut shade_of = |sw: &mut Software, v: &ViewState, a: &Actor| {
            let (scene, patches) = fx.split(v);
            let id = sw.project_sprite(&scene, patches, a, FakeSide::Center, 3).unwrap();
            sw.vissprites()[id].colormap
        };

        let dim = shade_of(&mut sw, &v, &far);
        assert_eq!(dim.map, 3);
        assert!(dim.shade > 0);
        assert_eq!(shade_of(&mut sw, &v, &bright), ColormapRef::new(3, 0));

        v.foggy = true;
        assert_eq!(shade_of(&mut sw, &v, &bright), dim);

        v.fixed_colormap = Some(ColormapRef::new(7, 1));
        assert_eq!(shade_of(&mut sw, &v, &far), ColormapRef::new(7, 1));
        v.fixed_light = Some(5);
        assert_eq!(shade_of(&mut sw, &v, &far), ColormapRef::new(3, 5));
    }

    #[test]
    fn sectors_are_collected_once_per_frame() {
        let mut fx = Fixture::new();
        fx.sectors.push(Sector::new(from_int(-64), from_int(64), 128));
        let v = view();
        let mut world = World::new();
        world.spawn((Actor::new(0, from_int(100), 0, 0, 0, 0),));
        world.spawn((Actor::new(0, from_int(120), 0, 0, 0, 0),));
        world.spawn((Actor::new(1, from_int(140), 0, 0, 0, 0),));

        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        let (scene, patches) = fx.split(&v);
        sw.add_sprites(&scene, patches, &world, 0, 255, FakeSide::Center);
        sw.add_sprites(&scene, patches, &world, 0, 255, FakeSide::Center);
        assert_eq!(sw.vissprites().len(), 2);
        sw.add_sprites(&scene, patches, &world, 1, 128, FakeSide::Center);
        assert_eq!(sw.vissprites().len(), 3);
        assert_eq!(sw.frame.sprite_shade, light2shade(128));

        sw.begin_frame(320, 200);
        sw.add_sprites(&scene, patches, &world, 0, 255, FakeSide::Center);
        assert_eq!(sw.vissprites().len(), 2);
    }

    #[test]
    fn particle_footprint_and_sector_rules() {
        let mut fx = Fixture::new();
        let v = view();
        let (scene, _) = fx.split(&v);
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        let in_room = |_: Fixed, _: Fixed| Some(0 as SectorId);
        let nowhere = |_: Fixed, _: Fixed| -> Option<SectorId> { None };

        let p = Particle::new(from_int(100), 0, 0, 7, 128, 8);
        let id = sw.project_particle(&scene, &p, &in_room).unwrap();
        let vis = sw.vissprites()[id];
        assert_eq!((vis.x1, vis.x2), (158, 161));
        assert_eq!(vis.depth, from_int(100) >> 4);
        assert_eq!(vis.kind, SpriteKind::Particle { color: 7, trans: 128 });
        assert_eq!(vis.gzt, 1);

        // Above the room's ceiling.
        let high = Particle::new(from_int(100), 0, from_int(100), 7, 128, 8);
        assert!(sw.project_particle(&scene, &high, &in_room).is_none());
        // No sector: kept, unlit.
        let id = sw.project_particle(&scene, &high, &nowhere).unwrap();
        assert_eq!(sw.vissprites()[id].colormap, ColormapRef::new(0, 0));
        // Behind and off to the side.
        let behind = Particle::new(from_int(-100), 0, 0, 7, 128, 8);
        assert!(sw.project_particle(&scene, &behind, &in_room).is_none());
        let side = Particle::new(from_int(10), from_int(50), 0, 7, 128, 8);
        assert!(sw.project_particle(&scene, &side, &in_room).is_none());
    }

    #[test]
    fn particles_obey_the_switch() {
        let mut fx = Fixture::new();
        let v = view();
        let (scene, _) = fx.split(&v);
        let mut slab = ParticleSlab::new(100);
        for i in 1..=3 {
            slab.new_particle(Particle::new(from_int(100 * i), 0, 0, 7, 255, 4));
        }
        let locator = |_: Fixed, _: Fixed| Some(0 as SectorId);

        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        sw.add_particles(&scene, &slab, &locator);
        assert_eq!(sw.vissprites().len(), 3);

        sw.config_mut().particles = false;
        sw.begin_frame(320, 200);
        sw.add_particles(&scene, &slab, &locator);
        assert!(sw.vissprites().is_empty());
    }

    fn weapon_player() -> PlayerView {
        PlayerView {
            psprites: smallvec![PlayerSprite {
                sprite: 0,
                frame: 0,
                sx: from_int(160),
                sy: from_int(100),
                fullbright: false,
            }],
            ..PlayerView::default()
        }
    }

    fn draw_weapon(fx: &mut Fixture, player: &PlayerView, setup: impl FnOnce(&mut Software)) -> Software {
        let v = view();
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        setup(&mut sw);
        let (scene, patches) = fx.split(&v);
        sw.draw_masked(&scene, patches, Some(player));
        sw
    }

    #[test]
    fn weapon_is_drawn_at_one_to_one_scale() {
        let mut fx = Fixture::new();
        let sw = draw_weapon(&mut fx, &weapon_player(), |_| {});
        // 8×16 patch, offsets (4, 8): columns 156..=163, rows 92..108.
        let drawn: Vec<(usize, usize)> = (0..320)
            .flat_map(|x| (0..200).map(move |y| (x, y)))
            .filter(|&(x, y)| sw.canvas().get(x, y) != Some(0))
            .collect();
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|&(x, y)| (156..=163).contains(&x) && (92..108).contains(&y)));
        // Texel (1, 0) is 100 + 16.
        assert_eq!(sw.canvas().get(157, 92), Some(116));
    }

    #[test]
    fn weapon_skips() {
        let mut fx = Fixture::new();
        let blank = |sw: &Software| sw.canvas().pixels().iter().all(|&p| p == 0);

        let chase = PlayerView { chase_cam: true, ..weapon_player() };
        assert!(blank(&draw_weapon(&mut fx, &chase, |_| {})));
        assert!(blank(&draw_weapon(&mut fx, &weapon_player(), |sw| {
            sw.config_mut().draw_player_sprites = false
        })));

        let v = ViewState { angle_offset: ANG90, ..view() };
        let mut sw = Software::default();
        sw.begin_frame(320, 200);
        let (scene, patches) = fx.split(&v);
        sw.draw_masked(&scene, patches, Some(&weapon_player()));
        assert!(blank(&sw));
    }

    #[test]
    fn invisibility_power_controls_weapon_style() {
        let mut fx = Fixture::new();
        let blank = |sw: &Software| sw.canvas().pixels().iter().all(|&p| p == 0);
        // A fully transparent style is overridden while the power is weak.
        let ghost = PlayerView { style: RenderStyle::Translucent, alpha: 0, ..weapon_player() };
        assert!(!blank(&draw_weapon(&mut fx, &ghost, |_| {})));
        let strong = PlayerView { invisibility: 200, ..ghost };
        assert!(blank(&draw_weapon(&mut fx, &strong, |_| {})));
    }
}
