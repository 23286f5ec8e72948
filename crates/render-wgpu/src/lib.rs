//! wgpu render backend for framebridge.
//!
//! Implements [`framebridge_render::Renderer`] on a `wgpu::Surface`: geometry
//! submitted between presents is batched per clip rectangle and texture, then
//! replayed in one render pass with scissor rectangles.
//!
//! # Invariants
//! - Blending happens in gamma space on a non-sRGB target.
//! - Vertex attributes follow `VERTEX_LAYOUT` exactly.

mod gpu;
mod shaders;

pub use gpu::WgpuRenderer;
