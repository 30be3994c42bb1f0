//! Rendering adapter: renderer-agnostic view, scene extraction, text output.
//!
//! # Invariants
//! - Renderers cannot mutate world truth.
//! - Render state derives from world state and view only.

mod renderer;
mod scene;

pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use scene::{DrawBox, DrawKind, extract_scene};
