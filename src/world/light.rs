// Palette, light-diminishing colormaps and the light → shade math.
// The renderer only ever asks for "map M at shade S"; how the maps were
// produced (lump, fade colour, generated) is not its business.

use std::ops::{Index, IndexMut};

use crate::fixed::{FRACBITS, FRACUNIT, Fixed};

/// Runtime handle of a colormap (0 = the level's normal light).
pub type ColormapId = u16;

/// 256-entry colour remap applied before lighting (player colours etc.).
pub type Translation = [u8; 256];

pub const NUMCOLORMAPS: usize = 32;
/// Shade index of the greyscale "inverse" map.
pub const INVERSE_MAP: usize = 32;
/// Shade index of the all-black map.
pub const BLACK_MAP: usize = 33;
/// Visibility saturates here: nothing gets brighter than this.
pub const MAXLIGHTVIS: Fixed = 24 * FRACUNIT;

/// Palette as 0x00RRGGBB.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette(pub [u32; 256]);

impl Default for Palette {
    fn default() -> Self {
        Palette([0u32; 256])
    }
}

impl Index<usize> for Palette {
    type Output = u32;
    fn index(&self, idx: usize) -> &u32 {
        &self.0[idx]
    }
}

impl IndexMut<usize> for Palette {
    fn index_mut(&mut self, idx: usize) -> &mut u32 {
        &mut self.0[idx]
    }
}

impl Palette {
    pub fn from_fn(mut f: impl FnMut(u8) -> (u8, u8, u8)) -> Self {
        let mut pal = Palette::default();
        for i in 0..256 {
            let (r, g, b) = f(i as u8);
            pal[i] = (r as u32) << 16 | (g as u32) << 8 | b as u32;
        }
        pal
    }

    /// 768-byte RGB triplets (PLAYPAL layout).
    pub fn from_rgb_bytes(bytes: &[u8]) -> Option<Self> {
        let rgb = bytes.get(..768)?;
        Some(Palette::from_fn(|i| {
            let o = i as usize * 3;
            (rgb[o], rgb[o + 1], rgb[o + 2])
        }))
    }

    #[inline]
    pub fn rgb(&self, idx: u8) -> (u8, u8, u8) {
        let c = self.0[idx as usize];
        ((c >> 16) as u8, (c >> 8) as u8, c as u8)
    }

    /// Nearest palette index by squared RGB distance; first wins on ties.
    pub fn best_match(&self, r: i32, g: i32, b: i32) -> u8 {
        let mut best = 0u8;
        let mut best_dist = i32::MAX;
        for i in 0..256 {
            let (pr, pg, pb) = self.rgb(i as u8);
            let (dr, dg, db) = (r - pr as i32, g - pg as i32, b - pb as i32);
            let dist = dr * dr + dg * dg + db * db;
            if dist < best_dist {
                if dist == 0 {
                    return i as u8;
                }
                best_dist = dist;
                best = i as u8;
            }
        }
        best
    }
}

/// 32 light levels + inverse + black, 256 entries each.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Colormap(pub [[u8; 256]; 34]);

impl Default for Colormap {
    fn default() -> Self {
        Colormap([[0u8; 256]; 34])
    }
}

impl Index<usize> for Colormap {
    type Output = [u8; 256];
    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

impl IndexMut<usize> for Colormap {
    fn index_mut(&mut self, idx: usize) -> &mut [u8; 256] {
        &mut self.0[idx]
    }
}

impl Colormap {
    /// Generate the 34 maps for `palette`, darkening towards `fade`.
    pub fn build(palette: &Palette, fade: (u8, u8, u8)) -> Self {
        let mut map = Colormap::default();
        let (fr, fg, fb) = (fade.0 as i32, fade.1 as i32, fade.2 as i32);
        for level in 0..NUMCOLORMAPS {
            let keep = (NUMCOLORMAPS - level) as i32;
            for c in 0..256 {
                let (r, g, b) = palette.rgb(c as u8);
                let mix = |from: u8, to: i32| to + (from as i32 - to) * keep / NUMCOLORMAPS as i32;
                map[level][c] = palette.best_match(mix(r, fr), mix(g, fg), mix(b, fb));
            }
        }
        for c in 0..256 {
            let (r, g, b) = palette.rgb(c as u8);
            let grey = 255 - (r as i32 * 77 + g as i32 * 143 + b as i32 * 37) / 256;
            map[INVERSE_MAP][c] = palette.best_match(grey, grey, grey);
        }
        map[BLACK_MAP] = [palette.best_match(0, 0, 0); 256];
        map
    }

    /// Interpret a raw COLORMAP lump (34 × 256 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..34 * 256)?;
        let mut map = Colormap::default();
        for (dst, src) in map.0.iter_mut().zip(bytes.chunks_exact(256)) {
            dst.copy_from_slice(src);
        }
        Some(map)
    }
}

/// Selected colormap: which map and which shade row inside it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColormapRef {
    pub map: ColormapId,
    pub shade: u8,
}

impl ColormapRef {
    pub const fn new(map: ColormapId, shade: u8) -> Self {
        Self { map, shade }
    }
}

/// Palette plus every colormap the level uses.
pub struct LightTables {
    palette: Palette,
    maps: Vec<Colormap>,
}

impl LightTables {
    /// Tables whose map 0 is `normal`.
    pub fn new(palette: Palette, normal: Colormap) -> Self {
        Self { palette, maps: vec![normal] }
    }

    /// Tables with a generated black-fade map 0.
    pub fn generated(palette: Palette) -> Self {
        let normal = Colormap::build(&palette, (0, 0, 0));
        Self::new(palette, normal)
    }

    /// Register a coloured-fog map; returns its id.
    pub fn add_fade(&mut self, fade: (u8, u8, u8)) -> ColormapId {
        self.maps.push(Colormap::build(&self.palette, fade));
        (self.maps.len() - 1) as ColormapId
    }

    pub fn add_colormap(&mut self, map: Colormap) -> ColormapId {
        self.maps.push(map);
        (self.maps.len() - 1) as ColormapId
    }

    #[inline]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// 256-entry remap for `r`; unknown map ids fall back to map 0.
    #[inline]
    pub fn map(&self, r: ColormapRef) -> &[u8; 256] {
        let cm = self.maps.get(r.map as usize).unwrap_or(&self.maps[0]);
        &cm[(r.shade as usize).min(BLACK_MAP)]
    }

    pub fn get_color(&self, r: ColormapRef, texel: u8) -> u32 {
        let pal_idx = self.map(r)[texel as usize];
        self.palette[pal_idx as usize]
    }
}

/// Sector light level (0..255) to a 16.16 shade value.
#[inline]
pub fn light2shade(level: i32) -> Fixed {
    (NUMCOLORMAPS as i32 * 2 * FRACUNIT) - (level + 12) * FRACUNIT * NUMCOLORMAPS as i32 / 128
}

/// Shade row for a visibility/shade pair, clamped to `0..NUMCOLORMAPS`.
#[inline]
pub fn palookup(vis: Fixed, shade: Fixed) -> u8 {
    let idx = shade.wrapping_sub(vis.min(MAXLIGHTVIS)) >> FRACBITS;
    idx.clamp(0, NUMCOLORMAPS as i32 - 1) as u8
}
