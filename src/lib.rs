//! Software sprite and masked-geometry rasterizer for a Doom-style
//! column renderer.
//!
//! The wall/BSP renderer (a collaborator) fills a paletted frame buffer
//! and hands over its draw segments; this crate projects actors and
//! particles into vissprites, sorts them back to front, clips them
//! against the segments' silhouettes and rasterizes them column by
//! column, interleaving masked mid-textures and fog boundaries.

pub mod angle;
pub mod config;
pub mod fixed;
pub mod renderer;
pub mod world;
