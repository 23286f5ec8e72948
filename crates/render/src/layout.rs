//! Host vertex structure and the layout description the GUI side packs into.

use bytemuck::{Pod, PodCastError, Zeroable};
use std::borrow::Cow;
use std::mem::{align_of, offset_of, size_of};

/// The renderer-native vertex. Positions are logical coordinates, colors are
/// premultiplied RGBA8 and texture coordinates are normalized.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [u8; 4],
    pub tex_coord: [f32; 2],
}

/// Which vertex field an element describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Color,
    TexCoord,
}

impl VertexAttribute {
    /// The only format the packer can write for this attribute.
    pub const fn format(self) -> VertexFormat {
        match self {
            VertexAttribute::Color => VertexFormat::Rgba8Unorm,
            VertexAttribute::Position | VertexAttribute::TexCoord => VertexFormat::Float32x2,
        }
    }
}

/// Numeric format of one attribute inside the vertex stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// Two native-endian `f32`.
    Float32x2,
    /// Four `u8` channels, red first.
    Rgba8Unorm,
}

impl VertexFormat {
    pub const fn size(self) -> usize {
        match self {
            Self::Float32x2 => 8,
            Self::Rgba8Unorm => 4,
        }
    }
}

/// One attribute of a vertex layout: what it is, how it is encoded, and where
/// it lives relative to the start of the vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayoutElement {
    pub attribute: VertexAttribute,
    pub format: VertexFormat,
    pub offset: usize,
}

/// Byte stride of [`Vertex`].
pub const VERTEX_SIZE: usize = size_of::<Vertex>();

/// Alignment of [`Vertex`].
pub const VERTEX_ALIGNMENT: usize = align_of::<Vertex>();

/// Layout of [`Vertex`], derived from its field offsets.
pub static VERTEX_LAYOUT: [VertexLayoutElement; 3] = [
    VertexLayoutElement {
        attribute: VertexAttribute::Position,
        format: VertexFormat::Float32x2,
        offset: offset_of!(Vertex, position),
    },
    VertexLayoutElement {
        attribute: VertexAttribute::Color,
        format: VertexFormat::Rgba8Unorm,
        offset: offset_of!(Vertex, color),
    },
    VertexLayoutElement {
        attribute: VertexAttribute::TexCoord,
        format: VertexFormat::Float32x2,
        offset: offset_of!(Vertex, tex_coord),
    },
];

/// Errors from layout validation and buffer views.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("{attribute:?} at offset {offset} overruns vertex size {vertex_size}")]
    Overflow {
        attribute: VertexAttribute,
        offset: usize,
        vertex_size: usize,
    },
    #[error("{attribute:?} cannot be packed as {format:?}")]
    Format {
        attribute: VertexAttribute,
        format: VertexFormat,
    },
    #[error("{0:?} appears more than once in the layout")]
    Duplicate(VertexAttribute),
    #[error("vertex size must be a non-zero multiple of alignment {alignment}, got {vertex_size}")]
    Stride { vertex_size: usize, alignment: usize },
    #[error("buffer of {len} bytes is not a whole number of {size}-byte elements")]
    Length { len: usize, size: usize },
    #[error("buffer cast failed: {0:?}")]
    Cast(PodCastError),
}

/// Check that every element fits inside `vertex_size`, uses its attribute's
/// format and is described once.
pub fn validate_layout(
    layout: &[VertexLayoutElement],
    vertex_size: usize,
    vertex_alignment: usize,
) -> Result<(), LayoutError> {
    if vertex_size == 0 || vertex_alignment == 0 || vertex_size % vertex_alignment != 0 {
        return Err(LayoutError::Stride {
            vertex_size,
            alignment: vertex_alignment,
        });
    }
    for (i, element) in layout.iter().enumerate() {
        if element.format != element.attribute.format() {
            return Err(LayoutError::Format {
                attribute: element.attribute,
                format: element.format,
            });
        }
        if element.offset + element.format.size() > vertex_size {
            return Err(LayoutError::Overflow {
                attribute: element.attribute,
                offset: element.offset,
                vertex_size,
            });
        }
        if layout[..i].iter().any(|e| e.attribute == element.attribute) {
            return Err(LayoutError::Duplicate(element.attribute));
        }
    }
    Ok(())
}

/// View packed vertex bytes as [`Vertex`] values.
///
/// Borrows when the buffer is aligned for `Vertex`, copies otherwise.
pub fn view_vertices(bytes: &[u8]) -> Result<Cow<'_, [Vertex]>, LayoutError> {
    view(bytes)
}

fn view<T: Pod>(bytes: &[u8]) -> Result<Cow<'_, [T]>, LayoutError> {
    let size = size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(LayoutError::Length {
            len: bytes.len(),
            size,
        });
    }
    match bytemuck::try_cast_slice(bytes) {
        Ok(items) => Ok(Cow::Borrowed(items)),
        Err(PodCastError::TargetAlignmentGreaterAndInputNotAligned) => {
            Ok(Cow::Owned(bytemuck::pod_collect_to_vec(bytes)))
        }
        Err(e) => Err(LayoutError::Cast(e)),
    }
}
