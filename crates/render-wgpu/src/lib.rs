//! wgpu render backend for the arena.
//!
//! Draws a floor grid and instanced, lit boxes for everything
//! `arena_render::extract_scene` returns, seen through the player's eyes.
//!
//! # Invariants
//! - Renderer never mutates world state.
//! - The camera is rebuilt from the world each frame; it has no motion of its own.
//! - Frame rate is independent of the simulation tick.

mod camera;
mod gpu;
mod shaders;

pub use camera::FirstPersonCamera;
pub use gpu::WgpuRenderer;
