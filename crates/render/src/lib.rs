//! Rendering Adapter: renderer-agnostic 2D geometry interface.
//!
//! # Invariants
//! - Geometry is submitted as indexed triangles over the host [`Vertex`].
//! - Clip rectangles and vertex positions are logical; renderers apply their
//!   own scale.
//! - `None` as a clip rectangle means clipping is disabled, never "nothing
//!   visible".
//!
//! [`RecordingRenderer`] implements the trait without a GPU. The trait is
//! stable; swap in the wgpu implementation without changing consumers.

mod layout;
mod renderer;

pub use layout::{
    LayoutError, VERTEX_ALIGNMENT, VERTEX_LAYOUT, VERTEX_SIZE, Vertex, VertexAttribute,
    VertexFormat, VertexLayoutElement, validate_layout, view_vertices,
};
pub use renderer::{
    BlendMode, ClipRect, Color, RecordingRenderer, RenderCall, RenderError, Renderer,
    RendererInfo, TextureRef, required_bytes,
};
