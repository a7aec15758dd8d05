//! Renderer switches, set from the console or the command line.

use crate::fixed::{FRACUNIT, Fixed};

/// How sprite columns are pushed to the frame buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColumnMethod {
    /// One column at a time.
    Single,
    /// Aligned groups of four columns rasterized row by row.
    #[default]
    Quad,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// `OptFuzzy` actors draw as fuzz (else as 2/3 translucency).
    pub draw_fuzz: bool,
    pub draw_player_sprites: bool,
    /// Particle projection on/off.
    pub particles: bool,
    pub column_method: ColumnMethod,
    /// Requested particle slab size; see [`RenderConfig::particle_capacity`].
    pub num_particles: usize,
    /// Light falloff with distance.
    pub base_visibility: Fixed,
    /// Starting size of the vissprite pool.
    pub initial_vissprites: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            draw_fuzz: true,
            draw_player_sprites: true,
            particles: true,
            column_method: ColumnMethod::Quad,
            num_particles: 0,
            base_visibility: 8 * FRACUNIT,
            initial_vissprites: 128,
        }
    }
}

impl RenderConfig {
    /// 0 means the default of 4000; anything below 100 is raised to 100.
    pub fn particle_capacity(&self) -> usize {
        match self.num_particles {
            0 => 4000,
            n if n < 100 => 100,
            n => n,
        }
    }
}
