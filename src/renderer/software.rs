//! ---------------------------------------------------------------------------
//! Classic software (CPU) sprite renderer
//!
//! * Draws into the 8-bit paletted [`Canvas`](crate::renderer::Canvas) the
//!   wall renderer has already filled.
//! * Relies on the BSP pipeline to hand over its [`DrawSeg`]s in drawing
//!   order, so sprites are clipped against wall silhouettes instead of a
//!   Z-buffer.
//!
//! Frame flow: [`Renderer::begin_frame`](crate::renderer::Renderer) →
//! drawseg intake ([`Software::push_drawseg`]) and sprite collection
//! ([`Software::add_sprites`], [`Software::add_particles`]) →
//! [`Software::draw_masked`] → `end_frame`.
//! ---------------------------------------------------------------------------

mod blend;
mod clip;
mod column;
mod draw;
mod masked;
mod particles;
mod pool;
mod projection;
mod renderer;
mod sort;
mod sprites;

pub use blend::{BLEND_LEVELS, BlendTables};
pub use clip::{DepthOrder, depth_range_order, seg_behind_sprite, sprite_in_front_of_seg, tighten_bottom, tighten_top};
pub use column::{ColumnStyle, select_style};
pub use particles::{Particle, ParticleId, ParticleSlab};
pub use pool::{INITIAL_VISSPRITES, VisSpriteId, VisSpritePool};
pub use projection::MINZ;
pub use renderer::{FrameContext, Scene, Software};
pub use sort::{DepthSorter, back_to_front};
pub use sprites::{
    DrawSeg, FrameScratch, MASKED_DONE, MaskedMid, SegDepth, Silhouette, SpriteKind, VisSprite,
};
