//! GUI resource driver: context, fonts and the vertex conversion config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use egui::epaint::TessellationOptions;
use egui::{FontData, FontDefinitions, FontFamily, FontId};
use framebridge_render::VertexLayoutElement;

use crate::error::DriverError;

/// Creates the GUI-side resources. Implement this, or wrap
/// [`DefaultGuiDriver`], to substitute fonts or conversion settings.
pub trait GuiDriver {
    fn create_context(&mut self) -> Result<egui::Context, DriverError>;

    fn create_font_atlas(&mut self) -> Result<FontAtlas, DriverError>;

    /// Add a font to `atlas`, rasterized at `scale` physical pixels per
    /// point.
    fn create_font(&mut self, atlas: &mut FontAtlas, scale: f32) -> Result<Font, DriverError>;

    fn create_convert_config(
        &mut self,
        layout: &'static [VertexLayoutElement],
        vertex_size: usize,
        vertex_alignment: usize,
        null: NullTexture,
    ) -> ConvertConfig;
}

#[derive(Debug, Clone, Default)]
pub struct FontOpts {
    /// TrueType/OpenType file to load. `None` uses egui's built-in fonts.
    pub path: Option<PathBuf>,
    /// Size in points. Zero means [`FontOpts::DEFAULT_SIZE`].
    pub size: f32,
}

impl FontOpts {
    pub const DEFAULT_SIZE: f32 = 14.0;

    fn size(&self) -> f32 {
        if self.size > 0.0 {
            self.size
        } else {
            Self::DEFAULT_SIZE
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOpts {
    /// Multiplies the alpha of every vertex color, clamped to `[0, 1]`.
    pub global_alpha: f32,
    pub line_aa: bool,
    pub shape_aa: bool,
    /// Width of the anti-aliasing fringe in physical pixels.
    pub feathering_size: f32,
    /// Maximum distance between a curve and its flattened polyline.
    pub curve_tolerance: f32,
    pub round_text_to_pixels: bool,
}

impl Default for ConvertOpts {
    fn default() -> Self {
        Self {
            global_alpha: 1.0,
            line_aa: true,
            shape_aa: true,
            feathering_size: 1.0,
            curve_tolerance: 0.1,
            round_text_to_pixels: true,
        }
    }
}

/// Texture and texel used for untextured primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullTexture {
    pub texture: egui::TextureId,
    pub uv: egui::Pos2,
}

impl Default for NullTexture {
    fn default() -> Self {
        Self {
            texture: egui::TextureId::default(),
            uv: egui::epaint::WHITE_UV,
        }
    }
}

/// Everything the draw-command converter needs.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub layout: &'static [VertexLayoutElement],
    pub vertex_size: usize,
    pub vertex_alignment: usize,
    pub null: NullTexture,
    pub global_alpha: f32,
    pub tessellation: TessellationOptions,
}

/// A font selection: egui font id plus the rasterization scale it was
/// created for.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub id: FontId,
    pub raster_scale: f32,
}

/// Font definitions collected before baking.
///
/// Baking hands the definitions to the GUI context; afterwards the atlas
/// only remembers which families it registered.
#[derive(Debug)]
pub struct FontAtlas {
    definitions: Option<FontDefinitions>,
    files: BTreeMap<PathBuf, FontFamily>,
}

impl Default for FontAtlas {
    fn default() -> Self {
        Self::new()
    }
}

impl FontAtlas {
    pub fn new() -> Self {
        Self {
            definitions: Some(FontDefinitions::default()),
            files: BTreeMap::new(),
        }
    }

    pub fn is_baked(&self) -> bool {
        self.definitions.is_none()
    }

    /// Register font bytes as a new family. Glyphs it lacks fall back to the
    /// built-in proportional fonts.
    pub fn add_font_data(&mut self, name: &str, bytes: Vec<u8>) -> Result<FontFamily, DriverError> {
        if self.is_baked() {
            return Err(DriverError::FontBake("font atlas is already baked".into()));
        }
        check_font(&bytes).map_err(|e| DriverError::FontBake(format!("{name}: {e}")))?;
        let Some(definitions) = self.definitions.as_mut() else {
            return Err(DriverError::FontBake("font atlas is already baked".into()));
        };
        definitions
            .font_data
            .insert(name.to_owned(), Arc::new(FontData::from_owned(bytes)));
        let mut chain = vec![name.to_owned()];
        if let Some(fallback) = definitions.families.get(&FontFamily::Proportional) {
            chain.extend(fallback.iter().cloned());
        }
        let family = FontFamily::Name(name.into());
        definitions.families.insert(family.clone(), chain);
        Ok(family)
    }

    /// Load a font file once; later calls with the same path reuse the
    /// family. Files that do not parse as TrueType/OpenType are rejected.
    pub fn add_font_file(&mut self, path: &Path) -> Result<FontFamily, DriverError> {
        if let Some(family) = self.files.get(path) {
            return Ok(family.clone());
        }
        let file_error = |source| DriverError::FontFile {
            path: path.to_owned(),
            source,
        };
        let bytes = std::fs::read(path).map_err(file_error)?;
        check_font(&bytes)
            .map_err(|e| file_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let name = format!("file:{}", path.display());
        let family = self.add_font_data(&name, bytes)?;
        self.files.insert(path.to_owned(), family.clone());
        tracing::debug!(path = %path.display(), "font file loaded");
        Ok(family)
    }

    pub(crate) fn take_definitions(&mut self) -> Option<FontDefinitions> {
        self.definitions.take()
    }

    /// Drop loading state that baking made redundant.
    pub fn cleanup(&mut self) {
        self.definitions = None;
        self.files.clear();
    }
}

/// epaint panics on font data it cannot parse.
fn check_font(bytes: &[u8]) -> Result<(), ab_glyph::InvalidFont> {
    ab_glyph::FontRef::try_from_slice(bytes).map(|_| ())
}

/// [`GuiDriver`] built from [`FontOpts`] and [`ConvertOpts`].
#[derive(Debug, Clone, Default)]
pub struct DefaultGuiDriver {
    pub font: FontOpts,
    pub convert: ConvertOpts,
}

impl GuiDriver for DefaultGuiDriver {
    fn create_context(&mut self) -> Result<egui::Context, DriverError> {
        Ok(egui::Context::default())
    }

    fn create_font_atlas(&mut self) -> Result<FontAtlas, DriverError> {
        Ok(FontAtlas::new())
    }

    fn create_font(&mut self, atlas: &mut FontAtlas, scale: f32) -> Result<Font, DriverError> {
        let family = match &self.font.path {
            Some(path) => atlas.add_font_file(path)?,
            None => FontFamily::Proportional,
        };
        Ok(Font {
            id: FontId::new(self.font.size(), family),
            raster_scale: scale,
        })
    }

    fn create_convert_config(
        &mut self,
        layout: &'static [VertexLayoutElement],
        vertex_size: usize,
        vertex_alignment: usize,
        null: NullTexture,
    ) -> ConvertConfig {
        let opts = &self.convert;
        ConvertConfig {
            layout,
            vertex_size,
            vertex_alignment,
            null,
            global_alpha: opts.global_alpha.clamp(0.0, 1.0),
            tessellation: TessellationOptions {
                feathering: opts.line_aa || opts.shape_aa,
                feathering_size_in_pixels: opts.feathering_size,
                bezier_tolerance: opts.curve_tolerance,
                round_text_to_pixels: opts.round_text_to_pixels,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framebridge_render::{VERTEX_ALIGNMENT, VERTEX_LAYOUT, VERTEX_SIZE};

    #[test]
    fn default_font_is_builtin() {
        let mut gui = DefaultGuiDriver::default();
        let mut atlas = gui.create_font_atlas().unwrap();
        let font = gui.create_font(&mut atlas, 2.0).unwrap();
        assert_eq!(font.id, FontId::proportional(FontOpts::DEFAULT_SIZE));
        assert_eq!(font.raster_scale, 2.0);
    }

    #[test]
    fn missing_font_file_is_reported() {
        let mut gui = DefaultGuiDriver {
            font: FontOpts {
                path: Some("/nonexistent/font.ttf".into()),
                size: 16.0,
            },
            ..Default::default()
        };
        let mut atlas = gui.create_font_atlas().unwrap();
        let err = gui.create_font(&mut atlas, 1.0).unwrap_err();
        assert!(matches!(err, DriverError::FontFile { .. }));
    }

    /// Bytes of one of egui's built-in fonts.
    fn builtin_font_bytes() -> Vec<u8> {
        let defs = FontDefinitions::default();
        defs.font_data.values().next().unwrap().font.to_vec()
    }

    #[test]
    fn font_data_gets_its_own_family_with_fallback() {
        let mut atlas = FontAtlas::new();
        let family = atlas.add_font_data("custom", builtin_font_bytes()).unwrap();
        assert_eq!(family, FontFamily::Name("custom".into()));
        let defs = atlas.take_definitions().unwrap();
        let chain = &defs.families[&family];
        assert_eq!(chain[0], "custom");
        assert!(chain.len() > 1);
    }

    #[test]
    fn baked_atlas_refuses_fonts() {
        let mut atlas = FontAtlas::new();
        atlas.cleanup();
        assert!(atlas.is_baked());
        assert!(matches!(
            atlas.add_font_data("late", Vec::new()),
            Err(DriverError::FontBake(_))
        ));
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let mut atlas = FontAtlas::new();
        assert!(matches!(
            atlas.add_font_data("garbage", b"this is not a font".to_vec()),
            Err(DriverError::FontBake(_))
        ));
    }

    #[test]
    fn garbage_font_file_is_reported_as_invalid_data() {
        let path = std::env::temp_dir()
            .join(format!("framebridge-garbage-{}.ttf", std::process::id()));
        std::fs::write(&path, b"this is not a font").unwrap();
        let mut atlas = FontAtlas::new();
        let err = atlas.add_font_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        match err {
            DriverError::FontFile { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData)
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn convert_config_from_options() {
        let mut gui = DefaultGuiDriver {
            convert: ConvertOpts {
                global_alpha: 3.0,
                line_aa: false,
                shape_aa: false,
                curve_tolerance: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        let config = gui.create_convert_config(
            &VERTEX_LAYOUT,
            VERTEX_SIZE,
            VERTEX_ALIGNMENT,
            NullTexture::default(),
        );
        assert_eq!(config.global_alpha, 1.0);
        assert!(!config.tessellation.feathering);
        assert_eq!(config.tessellation.bezier_tolerance, 0.5);
        assert_eq!(config.vertex_size, 20);
        assert_eq!(config.null.uv, egui::epaint::WHITE_UV);
    }
}
