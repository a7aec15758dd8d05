//! Rendering abstraction layer.
//!
//! *The rest of the engine never touches a pixel buffer directly.* A
//! type implementing [`Renderer`] owns the frame; callers open it with
//! `begin_frame`, let the wall renderer and the sprite pass paint into
//! it, then loan the result out with `end_frame`.

use crate::world::Palette;

/// Pixel format handed to presentation (0x00RRGGBB).
pub type Rgba = u32;

/// 8-bit paletted frame buffer.
#[derive(Clone, Debug, Default)]
pub struct Canvas {
    width: usize,
    height: usize,
    pitch: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pitch: width, pixels: vec![0; width * height] }
    }

    /// Reallocate for a new resolution; contents are cleared.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pitch = width;
        self.pixels.clear();
        self.pixels.resize(width * height, 0);
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes between the starts of two rows.
    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn fill(&mut self, color: u8) {
        self.pixels.fill(color);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width).then(|| self.pixels.get(y * self.pitch + x).copied()).flatten()
    }

    /// Expand through `palette` into `out` (resized to fit).
    pub fn to_rgba(&self, palette: &Palette, out: &mut Vec<Rgba>) {
        out.clear();
        out.extend(self.pixels.iter().map(|&p| palette[p as usize]));
    }
}

/// A renderer that owns an internal paletted buffer for the whole frame.
///
/// `end_frame` hands the finished buffer to a user-supplied closure.
pub trait Renderer {
    /// (Re)allocate internal scratch for the requested resolution, clear
    /// it and reset every frame-scoped structure.
    fn begin_frame(&mut self, width: usize, height: usize);

    /// Finish the frame and **loan** the finished buffer to `submit`.
    ///
    /// * `submit(&[u8], w, h)` is run exactly once per frame.
    /// * Pixels are palette indices; see [`Canvas::to_rgba`].
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[u8], usize, usize);
}

pub mod software;
