use crate::world::Palette;

/// Number of alpha steps in the blend tables (0..=64).
pub const BLEND_LEVELS: usize = 65;
/// Value that guards the swizzled channels against borrows during adds.
pub const BLEND_GUARD: u32 = 0x01f0_7c1f;

/// Palette-based translucency tables.
///
/// `col2rgb[a][c]` is palette colour `c` scaled by `a/64` and swizzled to
/// `00RRRRRRRRRRBBBBBBBBBBGGGGGGGGGG` (10 bits per channel), so two entries
/// add without channel crosstalk. `rgb32k` maps the top five bits of each
/// channel back to the nearest palette index.
pub struct BlendTables {
    col2rgb: Vec<[u32; 256]>,
    col2rgb_lp: Vec<[u32; 256]>,
    rgb32k: Vec<u8>,
}

impl BlendTables {
    pub fn new(palette: &Palette) -> Self {
        let mut col2rgb = vec![[0u32; 256]; BLEND_LEVELS];
        let mut col2rgb_lp = vec![[0u32; 256]; BLEND_LEVELS];
        for (level, (row, row_lp)) in col2rgb.iter_mut().zip(col2rgb_lp.iter_mut()).enumerate() {
            let x = level as u32;
            for c in 0..256 {
                let (r, g, b) = palette.rgb(c as u8);
                let (r, g, b) = (r as u32, g as u32, b as u32);
                let v = ((r * x >> 4) << 20) | (g * x >> 4) | ((b * x >> 4) << 10);
                row[c] = v;
                // Drop the low bit of red and blue so additive blends can
                // carry into the guard bits instead of the next channel.
                row_lp[c] = if level == 0 || level == 64 { v } else { v & 0x3fef_fbff };
            }
        }

        let mut rgb32k = vec![0u8; 32 * 32 * 32];
        for r in 0..32i32 {
            for g in 0..32i32 {
                for b in 0..32i32 {
                    rgb32k[((r << 10) | (g << 5) | b) as usize] =
                        palette.best_match((r << 3) | (r >> 2), (g << 3) | (g >> 2), (b << 3) | (b >> 2));
                }
            }
        }

        Self { col2rgb, col2rgb_lp, rgb32k }
    }

    #[inline]
    pub fn col2rgb(&self, level: usize) -> &[u32; 256] {
        &self.col2rgb[level.min(BLEND_LEVELS - 1)]
    }

    #[inline]
    pub fn col2rgb_lp(&self, level: usize) -> &[u32; 256] {
        &self.col2rgb_lp[level.min(BLEND_LEVELS - 1)]
    }

    /// Nearest palette index of a swizzled sum.
    #[inline]
    pub fn pack(&self, v: u32) -> u8 {
        self.rgb32k[(v & (v >> 15) & 0x7fff) as usize]
    }

    /// `fg` at `fg_level` over `bg` at `bg_level` (levels out of 64).
    #[inline]
    pub fn translucent(&self, fg: u8, fg_level: usize, bg: u8, bg_level: usize) -> u8 {
        let v = self.col2rgb(fg_level)[fg as usize]
            .wrapping_add(self.col2rgb(bg_level)[bg as usize])
            | BLEND_GUARD;
        self.pack(v)
    }

    /// `fg` at `fg_level` added to the full-strength background, each
    /// channel saturating.
    #[inline]
    pub fn additive(&self, fg: u8, fg_level: usize, bg: u8) -> u8 {
        let mut a = self.col2rgb_lp(fg_level)[fg as usize]
            .wrapping_add(self.col2rgb_lp(64)[bg as usize]);
        let mut b = a;
        a |= BLEND_GUARD;
        b &= 0x4010_0400;
        a &= 0x3fff_ffff;
        b = b.wrapping_sub(b >> 5);
        a |= b;
        self.pack(a)
    }
}
