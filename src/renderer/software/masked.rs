//! Masked mid-textures and fog boundaries of two-sided walls, and the
//! masked pass that interleaves them with sprites.

use crate::{
    fixed::{FRACUNIT, fixed_mul},
    renderer::software::{
        FrameContext, Scene, Software,
        column::{self, FUZZ_SHADE, MaskedColumn, Paint},
        draw::Target,
        sprites::MASKED_DONE,
    },
    world::{ColormapRef, PatchCache, PlayerView, RenderStyle, light2shade, palookup},
};

impl Software {
    /// Draw the still-pending masked columns of drawseg `ds_index` between
    /// screen columns `x1..=x2`, then mark them done. A column is drawn at
    /// most once per frame whichever sprite asks for it first.
    pub fn render_masked_seg_range(
        &mut self,
        scene: &Scene<'_>,
        patches: &mut PatchCache,
        ds_index: usize,
        x1: i32,
        x2: i32,
    ) {
        let Software { canvas, frame, config } = self;
        let FrameContext { drawsegs, openings, fuzz_pos, .. } = frame;
        let Some(&ds) = drawsegs.get(ds_index) else {
            return;
        };
        let Some(masked_cols) = ds.masked_cols else {
            return;
        };
        let x1 = x1.max(ds.x1).max(0);
        let x2 = x2.min(ds.x2).min(canvas.width() as i32 - 1);
        if x1 > x2 {
            return;
        }

        let view = scene.view;
        let pitch = canvas.pitch();
        let rows = view.view_height.min(canvas.height() as i32);

        let mid = match ds.masked_mid {
            Some(mid) => match patches.cache(mid.patch) {
                Ok(patch) => Some((mid, patch)),
                Err(e) => {
                    log::debug!("render_masked_seg_range: patch {}: {e}", mid.patch);
                    None
                }
            },
            None => None,
        };
        let style = mid.map(|(mid, _)| {
            let style = if mid.alpha >= FRACUNIT { RenderStyle::Normal } else { RenderStyle::Translucent };
            column::select_style(style, mid.alpha, 0, config.draw_fuzz)
        });

        for x in x1..=x2 {
            let i = (x - ds.x1) as usize;
            let slot = masked_cols + i;
            let col = openings.get(slot);
            if col == MASKED_DONE {
                continue;
            }

            let top = ds.sprite_top_clip.map_or(0, |at| openings.get(at + i) as i32).max(0);
            let bottom = ds.sprite_bottom_clip.map_or(rows, |at| openings.get(at + i) as i32).min(rows);

            if let Some(fog) = ds.fog_boundary {
                let map = scene.lights.map(fog);
                let pixels = canvas.pixels_mut();
                for y in top..bottom {
                    let p = y as usize * pitch + x as usize;
                    pixels[p] = map[pixels[p] as usize];
                }
            }

            if let (Some((mid, patch)), Some(style)) = (mid, style) {
                let scale = mid.scale1.wrapping_add((i as i32).wrapping_mul(mid.scale_step));
                if scale > 0 && patch.width() > 0 {
                    let colormap = if let Some(shade) = view.fixed_light {
                        ColormapRef::new(mid.colormap, shade)
                    } else if let Some(fixed) = view.fixed_colormap {
                        fixed
                    } else {
                        let shade = light2shade(mid.light_level + view.actual_extra_light());
                        ColormapRef::new(mid.colormap, palookup(fixed_mul(view.wall_visibility, scale), shade))
                    };
                    let paint = Paint {
                        style,
                        colormap: scene.lights.map(colormap),
                        translation: None,
                        blend: scene.blend,
                        fuzz_map: scene.lights.map(ColormapRef::new(0, FUZZ_SHADE)),
                    };
                    let m = MaskedColumn {
                        sprtopscreen: view.center_y_frac - fixed_mul(mid.texturemid, scale),
                        spryscale: scale,
                        iscale: (0xffff_ffffu32 / scale as u32) as i32,
                        texturemid: mid.texturemid,
                        center_y_frac: view.center_y_frac,
                        flip_vert: false,
                    };
                    let tex = (col as i32).rem_euclid(patch.width() as i32) as usize;
                    if let Some(column) = patch.column(tex) {
                        let mut target =
                            Target { canvas: &mut *canvas, fuzz_pos: &mut *fuzz_pos, view_height: rows };
                        target.clipped_column(&paint, column, &m, x, top, bottom);
                    }
                }
            }

            openings.set(slot, MASKED_DONE);
        }
    }

    /// The masked pass: sprites back to front (each one drawing the masked
    /// walls behind it on the way), then every masked column no sprite
    /// asked for, then the player's weapon.
    pub fn draw_masked(&mut self, scene: &Scene<'_>, patches: &mut PatchCache, player: Option<&PlayerView>) {
        let order = {
            let FrameContext { sorter, pool, .. } = &mut self.frame;
            sorter.sort(pool);
            sorter.take()
        };
        for &id in &order {
            self.draw_sprite(scene, patches, id);
        }
        self.frame.sorter.restore(order);

        for i in (0..self.frame.drawsegs.len()).rev() {
            let ds = self.frame.drawsegs[i];
            if ds.has_masked() {
                self.render_masked_seg_range(scene, patches, i, ds.x1, ds.x2);
            }
        }

        if scene.view.angle_offset == 0 {
            if let Some(player) = player {
                self.draw_player_sprites(scene, patches, player);
            }
        }
    }
}
