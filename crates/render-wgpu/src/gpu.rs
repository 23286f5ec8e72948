use crate::shaders;
use bytemuck::{Pod, Zeroable};
use framebridge_render::{
    BlendMode, ClipRect, Color, RenderError, Renderer, RendererInfo, TextureRef, VERTEX_LAYOUT,
    VERTEX_SIZE, Vertex, VertexAttribute, VertexFormat, required_bytes,
};
use std::collections::HashMap;
use std::ops::Range;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ScreenUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    blend: BlendMode,
}

/// A run of indices sharing clip rectangle, texture and blend mode.
#[derive(Debug, Clone, PartialEq)]
struct Batch {
    /// Clip rectangle in physical pixels.
    clip: Option<ClipRect>,
    texture: Option<TextureRef>,
    blend: BlendMode,
    indices: Range<u32>,
    base_vertex: i32,
}

/// CPU-side geometry accumulated between presents.
#[derive(Debug, Default)]
struct FrameGeometry {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    batches: Vec<Batch>,
}

impl FrameGeometry {
    /// Append one draw. Only the vertex range the indices touch is copied;
    /// positions are multiplied by `scale`.
    fn push(
        &mut self,
        clip: Option<ClipRect>,
        texture: Option<TextureRef>,
        blend: BlendMode,
        scale: (f32, f32),
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), RenderError> {
        if indices.is_empty() {
            return Ok(());
        }
        if indices.len() % 3 != 0 {
            return Err(RenderError::IncompleteTriangle(indices.len()));
        }
        let (mut lo, mut hi) = (u32::MAX, 0u32);
        for &i in indices {
            if i as usize >= vertices.len() {
                return Err(RenderError::IndexOutOfRange {
                    index: i,
                    len: vertices.len(),
                });
            }
            lo = lo.min(i);
            hi = hi.max(i);
        }

        let base = self.vertices.len() as i64 - lo as i64;
        let base_vertex = i32::try_from(base)
            .map_err(|_| RenderError::Backend(format!("vertex base {base} out of range")))?;
        self.vertices.extend(
            vertices[lo as usize..=hi as usize]
                .iter()
                .map(|v| Vertex {
                    position: [v.position[0] * scale.0, v.position[1] * scale.1],
                    ..*v
                }),
        );
        let start = self.indices.len() as u32;
        self.indices.extend_from_slice(indices);
        let end = self.indices.len() as u32;

        if let Some(last) = self.batches.last_mut() {
            if last.clip == clip
                && last.texture == texture
                && last.blend == blend
                && last.base_vertex == base_vertex
                && last.indices.end == start
            {
                last.indices.end = end;
                return Ok(());
            }
        }
        self.batches.push(Batch {
            clip,
            texture,
            blend,
            indices: start..end,
            base_vertex,
        });
        Ok(())
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.batches.clear();
    }
}

/// Vertex attributes for [`Vertex`], taken from `VERTEX_LAYOUT`.
fn vertex_attributes() -> Vec<wgpu::VertexAttribute> {
    VERTEX_LAYOUT
        .iter()
        .map(|element| wgpu::VertexAttribute {
            format: match element.format {
                VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
                VertexFormat::Rgba8Unorm => wgpu::VertexFormat::Unorm8x4,
            },
            offset: element.offset as u64,
            shader_location: match element.attribute {
                VertexAttribute::Position => 0,
                VertexAttribute::Color => 1,
                VertexAttribute::TexCoord => 2,
            },
        })
        .collect()
}

fn to_wgpu_color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64 / 255.0,
        g: c.g as f64 / 255.0,
        b: c.b as f64 / 255.0,
        a: c.a as f64 / 255.0,
    }
}

/// wgpu-based 2D geometry renderer.
pub struct WgpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    adapter_info: wgpu::AdapterInfo,
    blend_pipeline: wgpu::RenderPipeline,
    replace_pipeline: wgpu::RenderPipeline,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: GpuTexture,
    textures: HashMap<TextureRef, GpuTexture>,
    next_texture: u32,
    draw_color: Color,
    scale: (f32, f32),
    clip: Option<ClipRect>,
    clear_color: Option<Color>,
    frame: FrameGeometry,
}

impl WgpuRenderer {
    /// Create a renderer drawing into `surface` through a device requested
    /// from `adapter`.
    pub fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, RenderError> {
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("framebridge_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::Backend(e.to_string()))?;

        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Surface("surface unsupported by adapter".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let screen_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("screen_uniform"),
            contents: bytemuck::bytes_of(&ScreenUniform {
                size: [config.width as f32, config.height as f32],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen_bind_group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("geometry_pipeline_layout"),
            bind_group_layouts: &[&screen_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("geometry_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::GEOMETRY_SHADER.into()),
        });

        let attributes = vertex_attributes();
        let blend_pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            &attributes,
            wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
        );
        let replace_pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            &attributes,
            wgpu::BlendState::REPLACE,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("geometry_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = Self::create_gpu_texture(&device, &texture_layout, &sampler, 1, 1);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &white.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let adapter_info = adapter.get_info();
        tracing::info!(
            "wgpu renderer on {} ({}), surface format {:?}",
            adapter_info.name,
            adapter_info.backend.to_str(),
            surface_format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            adapter_info,
            blend_pipeline,
            replace_pipeline,
            screen_buffer,
            screen_bind_group,
            texture_layout,
            sampler,
            white,
            textures: HashMap::new(),
            next_texture: 1,
            draw_color: Color::BLACK,
            scale: (1.0, 1.0),
            clip: None,
            clear_color: None,
            frame: FrameGeometry::default(),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        attributes: &[wgpu::VertexAttribute],
        blend: wgpu::BlendState,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("geometry_pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: VERTEX_SIZE as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    fn create_gpu_texture(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
    ) -> GpuTexture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("geometry_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("geometry_texture_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        GpuTexture {
            texture,
            bind_group,
            width,
            height,
            blend: BlendMode::Blend,
        }
    }

    fn texture(&self, texture: TextureRef) -> Result<&GpuTexture, RenderError> {
        self.textures
            .get(&texture)
            .ok_or(RenderError::UnknownTexture(texture))
    }

    fn reset_frame(&mut self) {
        self.frame.clear();
        self.clear_color = None;
    }
}

impl Renderer for WgpuRenderer {
    fn info(&self) -> RendererInfo {
        RendererInfo {
            name: self.adapter_info.backend.to_str().into(),
            device: self.adapter_info.name.clone(),
            driver_version: self.adapter_info.driver_info.clone(),
        }
    }

    fn output_size(&self) -> Result<(u32, u32), RenderError> {
        Ok((self.config.width, self.config.height))
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn draw_color(&self) -> Color {
        self.draw_color
    }

    fn set_draw_color(&mut self, color: Color) -> Result<(), RenderError> {
        self.draw_color = color;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.frame.clear();
        self.clear_color = Some(self.draw_color);
        Ok(())
    }

    fn scale(&self) -> (f32, f32) {
        self.scale
    }

    fn set_scale(&mut self, x: f32, y: f32) -> Result<(), RenderError> {
        if !(x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()) {
            return Err(RenderError::Scale { x, y });
        }
        self.scale = (x, y);
        Ok(())
    }

    fn viewport(&self) -> ClipRect {
        ClipRect::new(
            0,
            0,
            (self.config.width as f32 / self.scale.0) as i32,
            (self.config.height as f32 / self.scale.1) as i32,
        )
    }

    fn clip_rect(&self) -> Option<ClipRect> {
        self.clip
    }

    fn set_clip_rect(&mut self, rect: Option<ClipRect>) -> Result<(), RenderError> {
        self.clip = rect;
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureRef, RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::TextureSize { width, height });
        }
        let gpu = Self::create_gpu_texture(
            &self.device,
            &self.texture_layout,
            &self.sampler,
            width,
            height,
        );
        let texture = TextureRef::new(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(texture, gpu);
        Ok(texture)
    }

    fn update_texture(
        &mut self,
        texture: TextureRef,
        region: Option<ClipRect>,
        pixels: &[u8],
        pitch: usize,
    ) -> Result<(), RenderError> {
        let gpu = self.texture(texture)?;
        let region = region.unwrap_or(ClipRect::new(0, 0, gpu.width as i32, gpu.height as i32));
        let fits = region.x >= 0
            && region.y >= 0
            && !region.is_empty()
            && (region.x + region.w) as u32 <= gpu.width
            && (region.y + region.h) as u32 <= gpu.height;
        if !fits {
            return Err(RenderError::TextureSize {
                width: region.w.max(0) as u32,
                height: region.h.max(0) as u32,
            });
        }
        let (width, height) = (region.w as u32, region.h as u32);
        let expected = required_bytes(width, height, pitch);
        if pixels.len() < expected || pitch < width as usize * 4 {
            return Err(RenderError::TextureData {
                expected,
                actual: pixels.len(),
            });
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x as u32,
                    y: region.y as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &pixels[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pitch as u32),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn set_texture_blend_mode(
        &mut self,
        texture: TextureRef,
        mode: BlendMode,
    ) -> Result<(), RenderError> {
        let gpu = self
            .textures
            .get_mut(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        gpu.blend = mode;
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureRef) -> Result<(), RenderError> {
        let gpu = self
            .textures
            .remove(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        gpu.texture.destroy();
        Ok(())
    }

    fn render_geometry(
        &mut self,
        texture: Option<TextureRef>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), RenderError> {
        let blend = match texture {
            Some(t) => self.texture(t)?.blend,
            None => BlendMode::Blend,
        };
        let clip = self.clip.map(|c| c.scaled(self.scale.0, self.scale.1));
        self.frame
            .push(clip, texture, blend, self.scale, vertices, indices)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.reset_frame();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface texture timed out, skipping frame");
                self.reset_frame();
                return Ok(());
            }
            Err(e) => {
                self.reset_frame();
                return Err(RenderError::Surface(e.to_string()));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.queue.write_buffer(
            &self.screen_buffer,
            0,
            bytemuck::bytes_of(&ScreenUniform {
                size: [self.config.width as f32, self.config.height as f32],
                _pad: [0.0; 2],
            }),
        );

        let buffers = if self.frame.batches.is_empty() {
            None
        } else {
            let vertex_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geometry_vertex_buffer"),
                    contents: bytemuck::cast_slice(&self.frame.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let index_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geometry_index_buffer"),
                    contents: bytemuck::cast_slice(&self.frame.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            Some((vertex_buffer, index_buffer))
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("geometry_encoder"),
            });

        {
            let load = match self.clear_color {
                Some(color) => wgpu::LoadOp::Clear(to_wgpu_color(color)),
                None => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("geometry_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            if let Some((vertex_buffer, index_buffer)) = &buffers {
                let full = ClipRect::new(
                    0,
                    0,
                    self.config.width as i32,
                    self.config.height as i32,
                );
                pass.set_bind_group(0, &self.screen_bind_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                for batch in &self.frame.batches {
                    let rect = batch.clip.map_or(full, |c| c.intersect(&full));
                    if rect.is_empty() {
                        continue;
                    }
                    pass.set_scissor_rect(rect.x as u32, rect.y as u32, rect.w as u32, rect.h as u32);
                    pass.set_pipeline(match batch.blend {
                        BlendMode::Blend => &self.blend_pipeline,
                        BlendMode::None => &self.replace_pipeline,
                    });
                    let bind_group = batch
                        .texture
                        .and_then(|t| self.textures.get(&t))
                        .map_or(&self.white.bind_group, |t| &t.bind_group);
                    pass.set_bind_group(1, bind_group, &[]);
                    pass.draw_indexed(batch.indices.clone(), batch.base_vertex, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.reset_frame();
        Ok(())
    }

    fn destroy(mut self) -> Result<(), RenderError> {
        for (_, gpu) in self.textures.drain() {
            gpu.texture.destroy();
        }
        self.white.texture.destroy();
        tracing::debug!("wgpu renderer destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<Vertex> {
        (0..4)
            .map(|i| Vertex {
                position: [i as f32, 2.0 * i as f32],
                color: [255; 4],
                tex_coord: [0.0, 0.0],
            })
            .collect()
    }

    #[test]
    fn attributes_follow_layout() {
        let attrs = vertex_attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attrs[1].format, wgpu::VertexFormat::Unorm8x4);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[2].shader_location, 2);
        assert_eq!(attrs[2].offset, 12);
    }

    #[test]
    fn push_copies_touched_range_and_scales() {
        let mut frame = FrameGeometry::default();
        frame
            .push(None, None, BlendMode::Blend, (2.0, 3.0), &quad(), &[1, 2, 3])
            .unwrap();
        assert_eq!(frame.vertices.len(), 3);
        assert_eq!(frame.vertices[0].position, [2.0, 6.0]);
        assert_eq!(frame.batches[0].base_vertex, -1);
        assert_eq!(frame.batches[0].indices, 0..3);
    }

    #[test]
    fn compatible_draws_merge() {
        let mut frame = FrameGeometry::default();
        let verts = quad();
        frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &verts, &[0, 1, 2])
            .unwrap();
        frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &verts, &[0, 2, 3])
            .unwrap();
        // Second draw copies its own vertices, so the base differs.
        assert_eq!(frame.batches.len(), 2);
        assert_eq!(frame.batches[1].base_vertex, 3);

        let mut frame = FrameGeometry::default();
        frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &verts, &[0, 1, 2])
            .unwrap();
        frame.vertices.clear();
        frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &verts, &[0, 2, 1])
            .unwrap();
        assert_eq!(frame.batches.len(), 1);
        assert_eq!(frame.batches[0].indices, 0..6);
    }

    #[test]
    fn clip_change_starts_new_batch() {
        let mut frame = FrameGeometry::default();
        let verts = quad();
        frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &verts, &[0, 1, 2])
            .unwrap();
        frame
            .push(
                Some(ClipRect::new(0, 0, 5, 5)),
                None,
                BlendMode::Blend,
                (1.0, 1.0),
                &verts,
                &[0, 1, 2],
            )
            .unwrap();
        assert_eq!(frame.batches.len(), 2);
    }

    #[test]
    fn bad_indices_are_rejected() {
        let mut frame = FrameGeometry::default();
        let err = frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &quad(), &[0, 1, 9])
            .unwrap_err();
        assert!(matches!(err, RenderError::IndexOutOfRange { index: 9, len: 4 }));
        assert!(frame.batches.is_empty());
    }

    #[test]
    fn empty_draw_is_ignored() {
        let mut frame = FrameGeometry::default();
        frame
            .push(None, None, BlendMode::Blend, (1.0, 1.0), &quad(), &[])
            .unwrap();
        assert!(frame.batches.is_empty());
    }
}
