//! Tessellated egui output packed into the renderer's vertex layout.

use egui::ClippedPrimitive;
use egui::epaint::{Primitive, Vertex as GuiVertex};
use framebridge_render::{
    ClipRect, LayoutError, VertexAttribute, VertexFormat, VertexLayoutElement, validate_layout,
};

use crate::error::DriverError;
use crate::gui::ConvertConfig;

/// One clipped, textured run of indices in [`Scratch::elements`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    /// Clip rectangle in points.
    pub clip_rect: egui::Rect,
    pub texture: egui::TextureId,
    pub elem_count: u32,
}

/// Reusable conversion output: commands plus one shared vertex/index buffer
/// pair. Indices address the whole vertex buffer.
#[derive(Debug, Default)]
pub struct Scratch {
    pub commands: Vec<DrawCommand>,
    pub vertices: Vec<u8>,
    pub elements: Vec<u32>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.vertices.clear();
        self.elements.clear();
    }

    /// Append `primitives`, packing vertices per `config.layout`.
    pub fn convert(
        &mut self,
        primitives: &[ClippedPrimitive],
        config: &ConvertConfig,
    ) -> Result<(), DriverError> {
        validate_layout(config.layout, config.vertex_size, config.vertex_alignment)?;
        for primitive in primitives {
            let mesh = match &primitive.primitive {
                Primitive::Mesh(mesh) => mesh,
                Primitive::Callback(_) => {
                    tracing::debug!("skipping paint callback");
                    continue;
                }
            };
            let base = u32::try_from(self.vertices.len() / config.vertex_size).map_err(|_| {
                LayoutError::Length {
                    len: self.vertices.len(),
                    size: config.vertex_size,
                }
            })?;
            for vertex in &mesh.vertices {
                self.pack(vertex, config);
            }
            self.elements
                .extend(mesh.indices.iter().map(|&index| base + index));
            self.commands.push(DrawCommand {
                clip_rect: primitive.clip_rect,
                texture: mesh.texture_id,
                elem_count: mesh.indices.len() as u32,
            });
        }
        Ok(())
    }

    fn pack(&mut self, vertex: &GuiVertex, config: &ConvertConfig) {
        let start = self.vertices.len();
        self.vertices.resize(start + config.vertex_size, 0);
        let slot = &mut self.vertices[start..];
        for element in config.layout {
            write_element(slot, element, vertex, config.global_alpha);
        }
    }
}

fn write_element(
    slot: &mut [u8],
    element: &VertexLayoutElement,
    vertex: &GuiVertex,
    global_alpha: f32,
) {
    let at = element.offset;
    match (element.attribute, element.format) {
        (VertexAttribute::Position, VertexFormat::Float32x2) => {
            write_f32x2(&mut slot[at..], vertex.pos.x, vertex.pos.y);
        }
        (VertexAttribute::TexCoord, VertexFormat::Float32x2) => {
            write_f32x2(&mut slot[at..], vertex.uv.x, vertex.uv.y);
        }
        (VertexAttribute::Color, VertexFormat::Rgba8Unorm) => {
            let color = if global_alpha < 1.0 {
                vertex.color.gamma_multiply(global_alpha)
            } else {
                vertex.color
            };
            slot[at..at + 4].copy_from_slice(&color.to_array());
        }
        // Rejected by validate_layout.
        _ => {}
    }
}

fn write_f32x2(out: &mut [u8], a: f32, b: f32) {
    out[..4].copy_from_slice(&a.to_ne_bytes());
    out[4..8].copy_from_slice(&b.to_ne_bytes());
}

/// Integer clip rectangle covering the part of `rect` inside `viewport`.
///
/// egui uses infinite rectangles for "no clipping", so the rectangle is cut
/// down to the viewport before it is rounded to integers.
pub fn clip_rect_of(rect: egui::Rect, viewport: ClipRect) -> ClipRect {
    let bounds = egui::Rect::from_min_size(
        egui::pos2(viewport.x as f32, viewport.y as f32),
        egui::vec2(viewport.w.max(0) as f32, viewport.h.max(0) as f32),
    );
    let rect = rect.intersect(bounds);
    let x0 = rect.min.x.floor();
    let y0 = rect.min.y.floor();
    let x1 = rect.max.x.ceil();
    let y1 = rect.max.y.ceil();
    ClipRect::new(
        x0 as i32,
        y0 as i32,
        (x1 - x0).max(0.0) as i32,
        (y1 - y0).max(0.0) as i32,
    )
}

/// Move a clip rectangle's origin to non-negative coordinates, shrinking it
/// by the amount cut off, and cap its size at the viewport's.
pub fn clamp_clip_rect(mut rect: ClipRect, viewport: ClipRect) -> ClipRect {
    if rect.x < 0 {
        rect.w = rect.w.saturating_add(rect.x);
        rect.x = 0;
    }
    if rect.y < 0 {
        rect.h = rect.h.saturating_add(rect.y);
        rect.y = 0;
    }
    rect.w = rect.w.min(viewport.w).max(0);
    rect.h = rect.h.min(viewport.h).max(0);
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::{ConvertOpts, DefaultGuiDriver, GuiDriver, NullTexture};
    use egui::epaint::{Color32, Mesh, Pos2, Rect};
    use framebridge_render::{VERTEX_ALIGNMENT, VERTEX_LAYOUT, VERTEX_SIZE, Vertex, view_vertices};

    fn config(global_alpha: f32) -> ConvertConfig {
        let mut gui = DefaultGuiDriver {
            convert: ConvertOpts {
                global_alpha,
                ..Default::default()
            },
            ..Default::default()
        };
        gui.create_convert_config(
            &VERTEX_LAYOUT,
            VERTEX_SIZE,
            VERTEX_ALIGNMENT,
            NullTexture::default(),
        )
    }

    fn triangle(texture: egui::TextureId, color: Color32) -> Mesh {
        let mut mesh = Mesh::with_texture(texture);
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] {
            mesh.vertices.push(GuiVertex {
                pos: Pos2::new(x, y),
                uv: Pos2::new(x / 10.0, y / 10.0),
                color,
            });
        }
        mesh.indices.extend([0, 1, 2]);
        mesh
    }

    fn clipped(mesh: Mesh, clip: Rect) -> ClippedPrimitive {
        ClippedPrimitive {
            clip_rect: clip,
            primitive: Primitive::Mesh(mesh),
        }
    }

    #[test]
    fn packs_vertices_in_layout_order() {
        let clip = Rect::from_min_max(Pos2::ZERO, Pos2::new(100.0, 100.0));
        let prims = [clipped(
            triangle(egui::TextureId::default(), Color32::from_rgb(255, 0, 0)),
            clip,
        )];
        let mut scratch = Scratch::new();
        scratch.convert(&prims, &config(1.0)).unwrap();
        let vertices = view_vertices(&scratch.vertices).unwrap();
        assert_eq!(vertices.len(), 3);
        assert_eq!(
            vertices[1],
            Vertex {
                position: [10.0, 0.0],
                color: [255, 0, 0, 255],
                tex_coord: [1.0, 0.0],
            }
        );
        assert_eq!(scratch.elements, vec![0, 1, 2]);
        assert_eq!(
            scratch.commands,
            vec![DrawCommand {
                clip_rect: clip,
                texture: egui::TextureId::default(),
                elem_count: 3,
            }]
        );
    }

    #[test]
    fn indices_are_rebased_onto_shared_buffer() {
        let clip = Rect::EVERYTHING;
        let prims = [
            clipped(triangle(egui::TextureId::default(), Color32::WHITE), clip),
            clipped(triangle(egui::TextureId::User(4), Color32::WHITE), clip),
        ];
        let mut scratch = Scratch::new();
        scratch.convert(&prims, &config(1.0)).unwrap();
        assert_eq!(scratch.elements, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(scratch.commands[1].texture, egui::TextureId::User(4));
        assert_eq!(scratch.vertices.len(), 6 * VERTEX_SIZE);
    }

    #[test]
    fn global_alpha_scales_premultiplied_color() {
        let prims = [clipped(
            triangle(egui::TextureId::default(), Color32::WHITE),
            Rect::EVERYTHING,
        )];
        let mut scratch = Scratch::new();
        scratch.convert(&prims, &config(0.5)).unwrap();
        let vertices = view_vertices(&scratch.vertices).unwrap();
        let [r, g, b, a] = vertices[0].color;
        assert!(a < 255 && a > 0);
        assert_eq!((r, g, b), (a, a, a));
    }

    #[test]
    fn empty_mesh_yields_zero_count_command() {
        let prims = [clipped(Mesh::default(), Rect::EVERYTHING)];
        let mut scratch = Scratch::new();
        scratch.convert(&prims, &config(1.0)).unwrap();
        assert_eq!(scratch.commands.len(), 1);
        assert_eq!(scratch.commands[0].elem_count, 0);
        assert!(scratch.vertices.is_empty());
    }

    #[test]
    fn clear_empties_all_buffers() {
        let prims = [clipped(
            triangle(egui::TextureId::default(), Color32::WHITE),
            Rect::EVERYTHING,
        )];
        let mut scratch = Scratch::new();
        scratch.convert(&prims, &config(1.0)).unwrap();
        scratch.clear();
        assert!(scratch.commands.is_empty());
        assert!(scratch.vertices.is_empty());
        assert!(scratch.elements.is_empty());
    }

    #[test]
    fn bad_layout_is_rejected() {
        let mut cfg = config(1.0);
        cfg.vertex_size = 12;
        let mut scratch = Scratch::new();
        assert!(matches!(
            scratch.convert(&[], &cfg),
            Err(DriverError::Layout(LayoutError::Overflow { .. }))
        ));
    }

    #[test]
    fn clip_rect_rounds_outward() {
        let viewport = ClipRect::new(0, 0, 800, 600);
        let rect = Rect::from_min_max(Pos2::new(1.5, 2.2), Pos2::new(10.1, 20.0));
        assert_eq!(clip_rect_of(rect, viewport), ClipRect::new(1, 2, 10, 18));
    }

    #[test]
    fn unbounded_clip_rect_becomes_the_viewport() {
        let viewport = ClipRect::new(0, 0, 800, 600);
        assert_eq!(clip_rect_of(Rect::EVERYTHING, viewport), viewport);
        let clamped = clamp_clip_rect(clip_rect_of(Rect::EVERYTHING, viewport), viewport);
        assert_eq!(clamped, viewport);
    }

    #[test]
    fn clip_rect_outside_viewport_is_empty() {
        let viewport = ClipRect::new(0, 0, 100, 100);
        let rect = Rect::from_min_max(Pos2::new(200.0, 200.0), Pos2::new(300.0, 300.0));
        assert!(clip_rect_of(rect, viewport).is_empty());
    }

    #[test]
    fn clamp_never_goes_negative() {
        let viewport = ClipRect::new(0, 0, 100, 50);
        let clamped = clamp_clip_rect(ClipRect::new(i32::MIN, -5, i32::MAX, 3), viewport);
        assert_eq!(clamped, ClipRect::new(0, 0, 0, 0));
    }

    #[test]
    fn clamp_shrinks_by_the_cut_off_part() {
        let viewport = ClipRect::new(0, 0, 100, 50);
        let clamped = clamp_clip_rect(ClipRect::new(-10, -5, 40, 30), viewport);
        assert_eq!(clamped, ClipRect::new(0, 0, 30, 25));
    }

    #[test]
    fn clamp_caps_at_viewport() {
        let viewport = ClipRect::new(0, 0, 100, 50);
        let clamped = clamp_clip_rect(ClipRect::new(5, 5, 400, 300), viewport);
        assert_eq!(clamped, ClipRect::new(5, 5, 100, 50));
    }
}
