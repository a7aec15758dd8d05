use bitflags::bitflags;
use smallvec::SmallVec;

use crate::angle::Angle;
use crate::fixed::{FRACUNIT, Fixed};

use super::light::ColormapId;
use super::sector::SectorId;

/// Index into the sprite definition table.
pub type SpriteId = u16;
/// Index into the translation table list.
pub type TranslationId = u16;

/// `xscale`/`yscale` value meaning 1:1 (stored as `scale - 1` in 1/64ths).
pub const SCALE_UNIT: u8 = 63;

bitflags! {
    /// Per-actor render switches.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u16 {
        // Not drawn at all.
        const INVISIBLE  = 0x0001;
        // Mirrored horizontally. Also the view's mirror-pass marker.
        const XFLIP      = 0x0002;
        // Drawn upside down.
        const YFLIP      = 0x0004;
        // Ignores sector light.
        const FULLBRIGHT = 0x0008;
    }
}

/// How an actor's texels combine with the frame buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderStyle {
    None,
    #[default]
    Normal,
    Fuzzy,
    SoulTrans,
    /// Fuzzy when fuzz drawing is on, 2/3 translucent otherwise.
    OptFuzzy,
    Translucent,
    Add,
    /// Stencil of `alpha_color` over the background.
    Shaded,
}

impl RenderStyle {
    /// Styles that read `alpha`; with `alpha == 0` they draw nothing.
    #[inline]
    pub fn uses_alpha(self) -> bool {
        matches!(self, RenderStyle::Translucent | RenderStyle::Add | RenderStyle::Shaded)
    }
}

/// Renderable thing, stored as an ECS component.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    pub sector: SectorId,
    pub sprite: SpriteId,
    /// Frame index (`0` = 'A').
    pub frame: u8,
    pub render_flags: RenderFlags,
    pub style: RenderStyle,
    pub alpha: Fixed,
    pub alpha_color: u8,
    pub translation: Option<TranslationId>,
    pub xscale: u8,
    pub yscale: u8,
    /// Sink depth into liquid floors.
    pub floorclip: Fixed,
}

impl Actor {
    pub fn new(sector: SectorId, x: Fixed, y: Fixed, z: Fixed, sprite: SpriteId, frame: u8) -> Self {
        Self {
            x,
            y,
            z,
            angle: 0,
            sector,
            sprite,
            frame,
            render_flags: RenderFlags::empty(),
            style: RenderStyle::Normal,
            alpha: FRACUNIT,
            alpha_color: 0,
            translation: None,
            xscale: SCALE_UNIT,
            yscale: SCALE_UNIT,
            floorclip: 0,
        }
    }
}

/// One overlay layer of the first-person weapon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerSprite {
    pub sprite: SpriteId,
    pub frame: u8,
    /// Position in 320×200 screen space, 16.16.
    pub sx: Fixed,
    pub sy: Fixed,
    pub fullbright: bool,
}

/// What the weapon layer needs to know about the viewing player.
#[derive(Clone, Debug)]
pub struct PlayerView {
    pub psprites: SmallVec<[PlayerSprite; 2]>,
    pub render_flags: RenderFlags,
    pub style: RenderStyle,
    pub alpha: Fixed,
    pub alpha_color: u8,
    /// Remaining invisibility power tics (0 = none).
    pub invisibility: i32,
    pub chase_cam: bool,
    /// Light level of the player's sector.
    pub light_level: i32,
    pub colormap: ColormapId,
    /// Weapon bob compensation for tall status-bar-less views.
    pub y_adjust: Fixed,
}

impl Default for PlayerView {
    fn default() -> Self {
        Self {
            psprites: SmallVec::new(),
            render_flags: RenderFlags::empty(),
            style: RenderStyle::Normal,
            alpha: FRACUNIT,
            alpha_color: 0,
            invisibility: 0,
            chase_cam: false,
            light_level: 255,
            colormap: 0,
            y_adjust: 0,
        }
    }
}
