//! view_sprites - procedural scene exercising the sprite renderer.
//!
//! USAGE:
//! ```bash
//! cargo run --bin view_sprites -- --width 640 --height 400
//! cargo run --bin view_sprites -- --headless frame.ppm --frames 70
//! ```
//!
//! A few actors orbit in front of a masked fence and a low ledge while
//! particles drift upwards; the camera sways left and right.

use std::{
    f32::consts::TAU,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use glam::{Vec2, Vec3};
use hecs::World;
use minifb::{Key, Window, WindowOptions};
use smallvec::smallvec;

use sprite_raster::{
    angle,
    config::{ColumnMethod, RenderConfig},
    fixed::{FRACUNIT, Fixed, fixed_mul, from_int, scale},
    renderer::{
        Canvas, Renderer,
        software::{BlendTables, DrawSeg, MaskedMid, Particle, ParticleSlab, Scene, SegDepth, Silhouette, Software},
    },
    world::{
        Actor, LightTables, MemorySource, Palette, PatchBuilder, PatchCache, PatchId, PlayerSprite, PlayerView,
        RenderFlags, RenderStyle, Sector, SectorId, SpriteDef, Translation, ViewState, init_sprite_defs,
    },
};

const EYE_HEIGHT: f32 = 41.0;
const ROOM_LIGHT: i32 = 192;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Single,
    Quad,
}

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    #[arg(long, default_value_t = 640)]
    width: usize,

    #[arg(long, default_value_t = 400)]
    height: usize,

    /// Column drawing path
    #[arg(long, value_enum, default_value_t = Method::Quad)]
    column_method: Method,

    /// Particle slab size (0 = default)
    #[arg(long, default_value_t = 0)]
    num_particles: usize,

    /// Draw `OptFuzzy` actors translucent instead of fuzzy
    #[arg(long)]
    no_fuzz: bool,

    #[arg(long)]
    no_particles: bool,

    #[arg(long)]
    no_weapon: bool,

    /// Render without a window and write the last frame here (binary PPM)
    #[arg(long, value_name = "FILE")]
    headless: Option<PathBuf>,

    /// Frames to render in headless mode
    #[arg(long, default_value_t = 35)]
    frames: usize,
}

/// Circular path of a demo actor.
struct Orbit {
    centre: Vec2,
    radius: f32,
    phase: f32,
    speed: f32,
}

/// Palette: grey, red, green and blue ramps of 64 entries each.
fn demo_palette() -> Palette {
    Palette::from_fn(|i| {
        let v = (i % 64) * 4 + 3;
        match i / 64 {
            0 => (v, v, v),
            1 => (v, v / 4, v / 4),
            2 => (v / 4, v, v / 4),
            _ => (v / 3, v / 2, v),
        }
    })
}

/// Assets: a rotating monster, a pickup, a weapon and a fence texture.
struct Assets {
    patches: PatchCache,
    sprites: Vec<SpriteDef>,
    fence: PatchId,
}

fn build_assets() -> anyhow::Result<Assets> {
    let mut src = MemorySource::new();

    // Monster: eight views, each shaded from a different ramp so the
    // rotation is visible.
    let views = ["DEMOA1", "DEMOA2A8", "DEMOA3A7", "DEMOA4A6", "DEMOA5"];
    for (i, name) in views.iter().enumerate() {
        let base = [16u8, 80, 144, 208, 40][i];
        let body = PatchBuilder::from_fn(32, 56, |x, y| {
            let dx = x as i32 - 16;
            let dy = y as i32 - 28;
            // Egg shape with an eye on the side it faces.
            (dx * dx * 3 + dy * dy < 28 * 28).then(|| {
                if y < 16 && x > 18 && x < 24 { 255 } else { base + (y as u8 / 3) }
            })
        })
        .offsets(16, 56)
        .build();
        src.push(name, body);
    }

    let orb = PatchBuilder::from_fn(16, 16, |x, y| {
        let (dx, dy) = (x as i32 - 8, y as i32 - 8);
        (dx * dx + dy * dy < 64).then_some(180 + (dx * dx + dy * dy) as u8 / 4)
    })
    .offsets(8, 20)
    .build();
    src.push("ORBSA0", orb);

    let gun = PatchBuilder::from_fn(48, 40, |x, y| ((x > 16 && x < 32) || y > 24).then_some(20 + (y as u8 / 2)))
        .offsets(24, 40)
        .build();
    src.push("GUNSA0", gun);

    let fence = src.push(
        "GRATE",
        PatchBuilder::from_fn(64, 72, |x, y| (x % 8 < 2 || y % 12 < 2).then_some(60 - (y as u8 / 4))).build(),
    );

    let patches = PatchCache::new(Box::new(src));
    let sprites = init_sprite_defs(&["DEMO", "ORBS", "GUNS"], &patches)?;
    Ok(Assets { patches, sprites, fence })
}

/// Spawn the orbiting actors, one per render style.
fn populate(world: &mut World) {
    let styles = [
        (RenderStyle::Normal, FRACUNIT, None),
        (RenderStyle::Fuzzy, FRACUNIT, None),
        (RenderStyle::Translucent, FRACUNIT / 2, None),
        (RenderStyle::Add, FRACUNIT * 3 / 4, None),
        (RenderStyle::Shaded, FRACUNIT / 2, None),
        (RenderStyle::OptFuzzy, FRACUNIT, None),
        (RenderStyle::Normal, FRACUNIT, Some(0)),
    ];
    for (i, &(style, alpha, translation)) in styles.iter().enumerate() {
        let mut actor = Actor::new(0, 0, 0, 0, 0, 0);
        actor.style = style;
        actor.alpha = alpha;
        actor.translation = translation;
        let orbit = Orbit {
            centre: Vec2::new(-32.0, 0.0),
            radius: 96.0 + 24.0 * i as f32,
            phase: i as f32 * TAU / styles.len() as f32,
            speed: 0.4 + 0.05 * i as f32,
        };
        world.spawn((actor, orbit));
    }

    // Pickups sitting still behind the fence.
    for y in [-64, 0, 64] {
        let mut orb = Actor::new(0, from_int(96), from_int(y), from_int(8), 1, 0);
        orb.render_flags |= RenderFlags::FULLBRIGHT;
        world.spawn((orb,));
    }
}

fn animate(world: &mut World, t: f32) {
    for (_, (actor, orbit)) in world.query_mut::<(&mut Actor, &Orbit)>() {
        let a = orbit.phase + orbit.speed * t;
        let pos = orbit.centre + Vec2::new(a.cos(), a.sin()) * orbit.radius;
        actor.x = (pos.x * FRACUNIT as f32) as Fixed;
        actor.y = (pos.y * FRACUNIT as f32) as Fixed;
        // Face along the path.
        actor.angle = angle::from_degrees((a + TAU / 4.0).to_degrees() as f64);
    }
}

/// Keep the fountain going: age the old particles, emit new ones.
fn spray(particles: &mut ParticleSlab, frame: usize) {
    particles.retain(|p| {
        p.z += FRACUNIT;
        p.trans = p.trans.saturating_sub(4);
        p.trans > 0
    });
    for k in 0..4 {
        let a = (frame * 4 + k) as f32 * 2.4;
        let x = 48.0 + 10.0 * a.cos();
        let y = 10.0 * a.sin();
        let p = Particle::new(from_int(x as i32), from_int(y as i32), 0, 150 + (k as u8) * 8, 255, 4);
        if particles.new_particle(p).is_none() {
            break;
        }
    }
}

/// Screen column of a view-space point, `None` behind the viewer.
fn screen_x(view: &ViewState, lateral: Fixed, depth: Fixed) -> Option<i32> {
    (depth > 0).then(|| view.center_x + (lateral as i64 * view.center_x as i64 / depth as i64) as i32)
}

/// One visible wall span: screen range and per-endpoint scale / depth.
struct WallSpan {
    x1: i32,
    x2: i32,
    scale1: Fixed,
    scale2: Fixed,
    depth: SegDepth,
    /// `1/z` and `u/z` at the clipped ends, `u` in map units along the wall.
    inv_z: (f64, f64),
    u_z: (f64, f64),
}

impl WallSpan {
    /// Project the wall `a`–`b`; endpoints are reordered left to right.
    fn project(view: &ViewState, a: Vec2, b: Vec2) -> Option<Self> {
        let to_fixed = |v: f32| (v * FRACUNIT as f32) as Fixed;
        let (pa, pb) = ((to_fixed(a.x), to_fixed(a.y)), (to_fixed(b.x), to_fixed(b.y)));
        let (la, da) = view.to_view(pa.0, pa.1);
        let (lb, db) = view.to_view(pb.0, pb.1);
        let (xa, xb) = (screen_x(view, la, da)?, screen_x(view, lb, db)?);
        let ((x1, d1, v1), (x2, d2, v2)) = if xa <= xb { ((xa, da, pa), (xb, db, pb)) } else { ((xb, db, pb), (xa, da, pa)) };
        let (cx1, cx2) = (x1.max(0), x2.min(view.view_width - 1));
        if cx1 > cx2 {
            return None;
        }
        let s = |d: Fixed| scale(view.center_x_frac, 4096, d);
        let t = |x: i32| if x2 == x1 { 0.0 } else { (x - x1) as f64 / (x2 - x1) as f64 };
        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
        let (s1, s2) = (s(d1) as f64, s(d2) as f64);
        let (i1, i2) = (1.0 / d1 as f64, 1.0 / d2 as f64);
        let len = (b - a).length() as f64;
        Some(Self {
            x1: cx1,
            x2: cx2,
            scale1: lerp(s1, s2, t(cx1)) as Fixed,
            scale2: lerp(s1, s2, t(cx2)) as Fixed,
            depth: SegDepth::from_wall(view, v1, v2),
            inv_z: (lerp(i1, i2, t(cx1)), lerp(i1, i2, t(cx2))),
            u_z: (lerp(0.0, len * i2, t(cx1)), lerp(0.0, len * i2, t(cx2))),
        })
    }

    fn scale_step(&self) -> Fixed {
        if self.x2 == self.x1 { 0 } else { (self.scale2 - self.scale1) / (self.x2 - self.x1) }
    }

    fn scale_at(&self, x: i32) -> Fixed {
        self.scale1 + self.scale_step() * (x - self.x1)
    }

    /// Screen row of height `z` at column `x`.
    fn row(&self, view: &ViewState, x: i32, z: Fixed) -> i32 {
        (view.center_y_frac - fixed_mul(z - view.z, self.scale_at(x))) >> 16
    }
}

/// The fence: a masked mid-texture across the room at x = 0.
fn add_fence(sw: &mut Software, view: &ViewState, fence: PatchId) {
    let Some(span) = WallSpan::project(view, Vec2::new(0.0, 128.0), Vec2::new(0.0, -128.0)) else {
        return;
    };
    let mut ds = DrawSeg::new(span.x1, span.x2, span.depth);

    // Perspective-correct texture column per screen column.
    let n = (span.x2 - span.x1 + 1) as usize;
    let ((iz1, iz2), (uz1, uz2)) = (span.inv_z, span.u_z);
    let cols: Vec<i16> = (0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            let iz = iz1 + (iz2 - iz1) * t;
            let uz = uz1 + (uz2 - uz1) * t;
            (uz / iz) as i16
        })
        .collect();
    sw.store_masked_cols(&mut ds, &cols);
    ds.masked_mid = Some(MaskedMid {
        patch: fence,
        texturemid: from_int(72) - view.z,
        scale1: span.scale1,
        scale_step: span.scale_step(),
        light_level: ROOM_LIGHT,
        colormap: 0,
        alpha: FRACUNIT,
    });
    sw.push_drawseg(ds);
}

/// A low ledge on the left: painted solid, then recorded with a bottom
/// silhouette so sprites behind it lose their feet.
fn add_ledge(sw: &mut Software, view: &ViewState) {
    let Some(span) = WallSpan::project(view, Vec2::new(-64.0, 320.0), Vec2::new(160.0, 200.0)) else {
        return;
    };
    let w = view.view_width as usize;
    let mut top_rows = vec![0i16; w];
    let height = view.view_height;
    {
        let canvas: &mut Canvas = sw.canvas_mut();
        let pitch = canvas.pitch();
        let px = canvas.pixels_mut();
        for x in span.x1..=span.x2 {
            let top = span.row(view, x, from_int(24)).clamp(0, height);
            let bottom = span.row(view, x, 0).clamp(0, height);
            top_rows[x as usize] = top as i16;
            for y in top..bottom {
                px[y as usize * pitch + x as usize] = 100 + ((y - top) % 16) as u8;
            }
        }
    }
    let mut ds = DrawSeg::new(span.x1, span.x2, span.depth);
    ds.silhouette = Silhouette::BOTTOM;
    sw.store_silhouette(&mut ds, &[], &top_rows);
    sw.push_drawseg(ds);
}

/// Ceiling and floor bands standing in for the wall renderer.
fn paint_background(canvas: &mut Canvas) {
    let (w, h, pitch) = (canvas.width(), canvas.height(), canvas.pitch());
    let px = canvas.pixels_mut();
    for y in 0..h {
        let c = if y < h / 2 { 200 + (y * 16 / h.max(1)) as u8 } else { 8 + ((y - h / 2) * 24 / h.max(1)) as u8 };
        px[y * pitch..y * pitch + w].fill(c);
    }
}

fn write_ppm(path: &Path, rgba: &[u32], w: usize, h: usize) -> anyhow::Result<()> {
    let mut out = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    write!(out, "P6\n{w} {h}\n255\n")?;
    for &c in rgba {
        out.write_all(&[(c >> 16) as u8, (c >> 8) as u8, c as u8])?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder().filter_level(log::LevelFilter::Info).parse_default_env().try_init();
    let opts = Opts::parse();

    let config = RenderConfig {
        draw_fuzz: !opts.no_fuzz,
        draw_player_sprites: !opts.no_weapon,
        particles: !opts.no_particles,
        column_method: match opts.column_method {
            Method::Single => ColumnMethod::Single,
            Method::Quad => ColumnMethod::Quad,
        },
        num_particles: opts.num_particles,
        ..RenderConfig::default()
    };

    let Assets { mut patches, sprites, fence } = build_assets()?;
    let palette = demo_palette();
    let blend = BlendTables::new(&palette);
    let lights = LightTables::generated(palette);
    // Greys to greens.
    let translations: Vec<Translation> =
        vec![std::array::from_fn(|i| if i < 64 { 128 + i as u8 } else { i as u8 })];
    let sectors = vec![Sector::new(0, from_int(128), ROOM_LIGHT)];
    let locate = |_: Fixed, _: Fixed| -> Option<SectorId> { Some(0) };

    let mut world = World::new();
    populate(&mut world);
    let mut particles = ParticleSlab::new(config.particle_capacity());

    let player = PlayerView {
        psprites: smallvec![PlayerSprite { sprite: 2, frame: 0, sx: from_int(160), sy: from_int(200), fullbright: false }],
        light_level: ROOM_LIGHT,
        ..PlayerView::default()
    };

    let mut sw = Software::new(config.clone());
    log::info!(
        "view_sprites: {}x{}, {} actors, {} particle slots, {:?} columns",
        opts.width,
        opts.height,
        world.len(),
        particles.capacity(),
        config.column_method
    );

    let mut window = match opts.headless {
        Some(_) => None,
        None => {
            let mut win = Window::new("sprite_raster", opts.width, opts.height, WindowOptions::default())?;
            win.set_target_fps(35);
            Some(win)
        }
    };

    let mut rgba = Vec::new();
    let mut acc_time = Duration::ZERO;
    let mut acc_frames = 0usize;
    let mut last_print = Instant::now();
    let mut frame = 0usize;

    loop {
        if let Some(win) = &window {
            if !win.is_open() || win.is_key_down(Key::Escape) {
                break;
            }
        } else if frame == opts.frames {
            break;
        }

        let t0 = Instant::now();
        let t = frame as f32 / 35.0;
        animate(&mut world, t);
        spray(&mut particles, frame);

        let yaw = 0.4 * (t * 0.5).sin();
        let view = ViewState {
            sector: Some(0),
            ..ViewState::new(
                opts.width,
                opts.height,
                Vec3::new(-320.0, 0.0, EYE_HEIGHT),
                yaw,
                config.base_visibility,
            )
        };
        let scene = Scene {
            view: &view,
            sectors: &sectors,
            sprites: &sprites,
            lights: &lights,
            blend: &blend,
            translations: &translations,
        };

        sw.begin_frame(opts.width, opts.height);
        paint_background(sw.canvas_mut());
        add_ledge(&mut sw, &view);
        add_fence(&mut sw, &view, fence);
        sw.add_sprites(&scene, &mut patches, &world, 0, ROOM_LIGHT, Default::default());
        sw.add_particles(&scene, &particles, &locate);
        sw.draw_masked(&scene, &mut patches, Some(&player));

        let mut present: anyhow::Result<()> = Ok(());
        sw.end_frame(|pixels, w, h| {
            let canvas_rgba = pixels.iter().map(|&p| lights.palette()[p as usize]);
            rgba.clear();
            rgba.extend(canvas_rgba);
            acc_time += t0.elapsed();
            acc_frames += 1;
            if let Some(win) = window.as_mut() {
                present = win.update_with_buffer(&rgba, w, h).map_err(Into::into);
            }
        });
        present?;

        if last_print.elapsed() >= Duration::from_secs(3) && acc_frames > 0 {
            let avg_ms = acc_time.as_secs_f64() * 1000.0 / acc_frames as f64;
            log::info!("avg render: {:.2} ms  ({:.1} FPS), {} vissprites", avg_ms, 1000.0 / avg_ms, sw.vissprites().len());
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
        frame += 1;
    }

    if let Some(path) = &opts.headless {
        write_ppm(path, &rgba, opts.width, opts.height)?;
        log::info!("wrote {} after {frame} frames", path.display());
    }
    Ok(())
}
