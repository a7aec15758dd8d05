mod actor;
mod light;
mod patch;
mod sector;
mod sprite_defs;
mod view;

pub use actor::{
    Actor, PlayerSprite, PlayerView, RenderFlags, RenderStyle, SCALE_UNIT, SpriteId, TranslationId,
};

pub use light::{
    BLACK_MAP, Colormap, ColormapId, ColormapRef, INVERSE_MAP, LightTables, MAXLIGHTVIS,
    NUMCOLORMAPS, Palette, Translation, light2shade, palookup,
};

pub use patch::{
    MemorySource, Patch, PatchBuilder, PatchCache, PatchColumn, PatchError, PatchId, PatchSize,
    PatchSource, Post, Posts, UNMEASURED,
};

pub use sector::{FakeSide, Plane, Sector, SectorFlags, SectorId, SectorLocator, active_heightsec};

pub use sprite_defs::{
    MAX_SPRITE_FRAMES, NUM_ROTATIONS, SpriteDef, SpriteDefBuilder, SpriteError, SpriteFrame,
    init_sprite_defs,
};

pub use view::ViewState;
