// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The wgpu implementation of the render backend contract.

use std::collections::HashMap;
use std::num::NonZeroU64;

use anyhow::Result;
use wgpu::util::DeviceExt;

use umbra_core::backend::{
    AdapterInfo, BackendBufferId, BackendFeature, BackendKind, BackendSurfaceId,
    BackendTextureId, CameraData, IndexFormat, RenderBackend, RenderTargetId, SurfaceUpload,
    TextureBinding, TextureDesc, TextureDimension, ViewportFrame,
};
use umbra_core::config::PowerPreference;
use umbra_core::error::BackendError;
use umbra_core::format::{ArrayFormat, PrimitiveType, TextureFormat};
use umbra_core::image::Image;
use umbra_core::math::{Color, Mat4};
use umbra_core::stats::MemoryUsage;

use super::context::WgpuContext;
use super::conversions::IntoWgpu;
use super::pipelines::{
    CanvasUniforms, DrawUniforms, MeshPipelineKey, MeshVertex, Pipelines, COLOR_FORMAT,
    DEPTH_FORMAT,
};

/// Smallest instance buffer ever allocated, in bytes.
const MIN_BUFFER_SIZE: u64 = 256;

#[derive(Debug)]
struct TextureEntry {
    texture: wgpu::Texture,
    desc: TextureDesc,
    /// Only plain 2D textures of a filterable format can be sampled by the passes.
    bind_group: Option<wgpu::BindGroup>,
    size: u64,
}

#[derive(Debug)]
struct SurfaceEntry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    /// The interleaved bytes as submitted, kept to re-convert updated regions.
    source: Vec<u8>,
    format: ArrayFormat,
    primitive: PrimitiveType,
    vertex_count: u32,
    index_count: u32,
    index_format: IndexFormat,
    size: u64,
}

#[derive(Debug)]
struct BufferEntry {
    buffer: wgpu::Buffer,
    capacity: u64,
}

#[derive(Debug)]
struct TargetEntry {
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    transparent: bool,
}

impl TargetEntry {
    fn byte_size(&self) -> u64 {
        // Color plus depth, both 4 bytes per texel.
        self.width as u64 * self.height as u64 * 8
    }
}

/// Renders viewports into offscreen targets through wgpu.
///
/// The same implementation serves both GPU families: `Explicit` runs on Vulkan,
/// Metal or DX12 and `Compatibility` on OpenGL/GLES. Mesh surfaces are converted to
/// a fixed unlit vertex layout on upload and every viewport is recorded into its
/// own command buffer, submitted at the end of the frame.
#[derive(Debug)]
pub struct WgpuBackend {
    context: WgpuContext,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    white: wgpu::BindGroup,
    identity_instance: wgpu::Buffer,

    textures: HashMap<BackendTextureId, TextureEntry>,
    surfaces: HashMap<BackendSurfaceId, SurfaceEntry>,
    buffers: HashMap<BackendBufferId, BufferEntry>,
    targets: HashMap<RenderTargetId, TargetEntry>,
    next_id: u64,

    texture_bytes: u64,
    buffer_bytes: u64,

    /// Viewports recorded since `begin_frame`.
    pending: Vec<wgpu::CommandBuffer>,
}

impl WgpuBackend {
    /// Creates a backend of the given family.
    ///
    /// ## Arguments
    /// * `kind` - `Explicit` or `Compatibility`.
    /// * `power` - Adapter selection hint.
    ///
    /// ## Errors
    /// Fails if no adapter of that family is available or device creation fails.
    pub fn new(kind: BackendKind, power: PowerPreference) -> Result<Self> {
        let context = WgpuContext::new(kind, power)?;
        let pipelines = Pipelines::new(&context.device);

        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Umbra Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white_texture = context.device.create_texture_with_data(
            &context.queue,
            &wgpu::TextureDescriptor {
                label: Some("Umbra White Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let white_view = white_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let white = texture_bind_group(&context.device, &pipelines, &white_view, &sampler);

        let mut identity = Mat4::IDENTITY.to_rows_3x4().to_vec();
        identity.extend_from_slice(&Color::WHITE.to_array());
        let identity_instance = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Umbra Identity Instance"),
                contents: bytemuck::cast_slice(&identity),
                usage: wgpu::BufferUsages::VERTEX,
            });

        log::info!(
            "WgpuBackend ready on \"{}\" ({}).",
            context.adapter_info.name,
            kind.driver_name()
        );

        Ok(Self {
            context,
            pipelines,
            sampler,
            white,
            identity_instance,
            textures: HashMap::new(),
            surfaces: HashMap::new(),
            buffers: HashMap::new(),
            targets: HashMap::new(),
            next_id: 0,
            texture_bytes: 0,
            buffer_bytes: 0,
            pending: Vec::new(),
        })
    }

    fn generate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn can_sample(&self, format: TextureFormat) -> bool {
        match format {
            TextureFormat::R32F | TextureFormat::Rgba32F => {
                self.supports_feature(BackendFeature::Float32Filterable)
            }
            _ => true,
        }
    }

    fn create_target(&self, width: u32, height: u32, transparent: bool) -> TargetEntry {
        let device = &self.context.device;
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Umbra Render Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Umbra Render Target Depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = texture_bind_group(device, &self.pipelines, &color_view, &self.sampler);
        TargetEntry {
            color_view,
            depth_view,
            bind_group,
            width: size.width,
            height: size.height,
            transparent,
        }
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    pipelines: &Pipelines,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Umbra Texture Bind Group"),
        layout: &pipelines.texture_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// The bind group sampling `binding`, falling back to white.
fn resolve_binding<'a>(
    textures: &'a HashMap<BackendTextureId, TextureEntry>,
    targets: &'a HashMap<RenderTargetId, TargetEntry>,
    white: &'a wgpu::BindGroup,
    binding: TextureBinding,
) -> &'a wgpu::BindGroup {
    match binding {
        TextureBinding::White => white,
        TextureBinding::Texture(id) => textures
            .get(&id)
            .and_then(|t| t.bind_group.as_ref())
            .unwrap_or(white),
        TextureBinding::RenderTarget(id) => targets.get(&id).map_or(white, |t| &t.bind_group),
    }
}

fn read_floats<const N: usize>(data: &[u8], offset: usize) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (i, value) in out.iter_mut().enumerate() {
        let start = offset + i * 4;
        *value = bytemuck::pod_read_unaligned(data.get(start..start + 4)?);
    }
    Some(out)
}

/// Converts `count` interleaved vertices starting at `first` to the unlit layout.
/// Missing attributes take neutral values.
fn convert_vertices(format: ArrayFormat, data: &[u8], first: usize, count: usize) -> Vec<MeshVertex> {
    let stride = format.vertex_stride();
    let position = format.attribute_offset(ArrayFormat::VERTEX);
    let uv = format.attribute_offset(ArrayFormat::TEX_UV);
    let color = format.attribute_offset(ArrayFormat::COLOR);
    (first..first + count)
        .map(|index| {
            let base = index * stride;
            MeshVertex {
                position: position
                    .and_then(|o| read_floats(data, base + o))
                    .unwrap_or([0.0; 3]),
                uv: uv.and_then(|o| read_floats(data, base + o)).unwrap_or([0.0; 2]),
                color: color
                    .and_then(|o| read_floats(data, base + o))
                    .unwrap_or([1.0; 4]),
            }
        })
        .collect()
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment.max(1)) * alignment.max(1)
}

/// Compressed textures are sized in whole blocks.
fn physical_extent(format: TextureFormat, width: u32, height: u32) -> (u32, u32) {
    if format.is_compressed() {
        (width.div_ceil(4) * 4, height.div_ceil(4) * 4)
    } else {
        (width.max(1), height.max(1))
    }
}

fn draw_uniforms(camera: &CameraData, model: &Mat4, color: Color) -> DrawUniforms {
    DrawUniforms {
        view_projection: (camera.projection * camera.view).to_cols_array(),
        model: model.to_cols_array(),
        color: color.to_array(),
    }
}

impl RenderBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        self.context.kind
    }

    fn adapter_info(&self) -> AdapterInfo {
        self.context.adapter_info.clone()
    }

    fn supports_feature(&self, feature: BackendFeature) -> bool {
        let features = self.context.active_device_features;
        match feature {
            BackendFeature::TextureCompressionBc => {
                features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
            }
            BackendFeature::TextureCompressionEtc2 => {
                features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2)
            }
            BackendFeature::Compute => {
                self.context.kind == BackendKind::Explicit
                    && self
                        .context
                        .downlevel_flags
                        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
            }
            BackendFeature::Float32Filterable => {
                features.contains(wgpu::Features::FLOAT32_FILTERABLE)
            }
            BackendFeature::Texture3D => true,
        }
    }

    fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage {
            texture_bytes: self.texture_bytes,
            buffer_bytes: self.buffer_bytes,
        }
    }

    fn texture_allocate(&mut self, desc: &TextureDesc) -> Result<BackendTextureId, BackendError> {
        if let Some(feature) = BackendFeature::required_for(desc.format) {
            if !self.supports_feature(feature) {
                return Err(BackendError::Unsupported(format!(
                    "{:?} textures",
                    desc.format
                )));
            }
        }
        let max = self.context.device_limits.max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(BackendError::Unsupported(format!(
                "{}x{} exceeds the maximum texture size {max}",
                desc.width, desc.height
            )));
        }

        let (width, height) = physical_extent(desc.format, desc.width, desc.height);
        let dimension = match desc.dimension {
            TextureDimension::D3 => wgpu::TextureDimension::D3,
            _ => wgpu::TextureDimension::D2,
        };
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Umbra Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: desc.depth_or_layers.max(1),
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension,
            format: desc.format.into_wgpu(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let bind_group = (desc.dimension == TextureDimension::D2
            && desc.depth_or_layers <= 1
            && self.can_sample(desc.format))
        .then(|| {
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            texture_bind_group(&self.context.device, &self.pipelines, &view, &self.sampler)
        });

        let size = desc.byte_size();
        let id = BackendTextureId(self.generate_id());
        self.texture_bytes += size;
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                desc: desc.clone(),
                bind_group,
                size,
            },
        );
        log::debug!("WgpuBackend: Created texture {id}, size: {size} bytes (VRAM)");
        Ok(id)
    }

    fn texture_upload(
        &mut self,
        id: BackendTextureId,
        layer: u32,
        image: &Image,
    ) -> Result<(), BackendError> {
        let entry = self
            .textures
            .get(&id)
            .ok_or_else(|| BackendError::InvalidResource(id.to_string()))?;
        if layer >= entry.desc.depth_or_layers.max(1) {
            return Err(BackendError::InvalidResource(format!(
                "layer {layer} of {id}"
            )));
        }
        let levels = image.mip_count().min(entry.desc.mip_levels.max(1));
        for level in 0..levels {
            let (width, height) = image.level_extent(level);
            let bytes = image.data.get(image.level_range(level)).ok_or_else(|| {
                BackendError::InvalidResource(format!("mip {level} missing from image data"))
            })?;
            let (copy_width, copy_height) = physical_extent(image.format, width, height);
            self.context.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &entry.texture,
                    mip_level: level,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(image.format.bytes_per_row(width)),
                    rows_per_image: Some(image.format.rows(height)),
                },
                wgpu::Extent3d {
                    width: copy_width,
                    height: copy_height,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    fn texture_free(&mut self, id: BackendTextureId) {
        if let Some(entry) = self.textures.remove(&id) {
            self.texture_bytes = self.texture_bytes.saturating_sub(entry.size);
            log::debug!("WgpuBackend: Destroyed texture {id}");
        }
    }

    fn surface_upload(
        &mut self,
        surface: &SurfaceUpload<'_>,
    ) -> Result<BackendSurfaceId, BackendError> {
        let vertices = convert_vertices(
            surface.format,
            surface.vertex_data,
            0,
            surface.vertex_count as usize,
        );
        let device = &self.context.device;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Umbra Surface Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = (surface.index_count > 0).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Umbra Surface Indices"),
                contents: surface.index_data,
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        let size = (vertices.len() * std::mem::size_of::<MeshVertex>()
            + surface.index_data.len()) as u64;
        let id = BackendSurfaceId(self.generate_id());
        self.buffer_bytes += size;
        self.surfaces.insert(
            id,
            SurfaceEntry {
                vertex_buffer,
                index_buffer,
                source: surface.vertex_data.to_vec(),
                format: surface.format,
                primitive: surface.primitive,
                vertex_count: surface.vertex_count,
                index_count: surface.index_count,
                index_format: surface.index_format,
                size,
            },
        );
        Ok(id)
    }

    fn surface_update_region(
        &mut self,
        id: BackendSurfaceId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let entry = self
            .surfaces
            .get_mut(&id)
            .ok_or_else(|| BackendError::InvalidResource(id.to_string()))?;
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= entry.source.len())
            .ok_or_else(|| {
                BackendError::InvalidResource(format!(
                    "region {offset}+{} out of bounds of {id}",
                    data.len()
                ))
            })?;
        entry.source[offset..end].copy_from_slice(data);

        let stride = entry.format.vertex_stride();
        if stride == 0 || data.is_empty() {
            return Ok(());
        }
        let first = offset / stride;
        let last = end.div_ceil(stride);
        let vertices = convert_vertices(entry.format, &entry.source, first, last - first);
        self.context.queue.write_buffer(
            &entry.vertex_buffer,
            (first * std::mem::size_of::<MeshVertex>()) as wgpu::BufferAddress,
            bytemuck::cast_slice(&vertices),
        );
        Ok(())
    }

    fn surface_free(&mut self, id: BackendSurfaceId) {
        if let Some(entry) = self.surfaces.remove(&id) {
            self.buffer_bytes = self.buffer_bytes.saturating_sub(entry.size);
        }
    }

    fn buffer_upload(
        &mut self,
        existing: Option<BackendBufferId>,
        data: &[f32],
    ) -> Result<BackendBufferId, BackendError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = (bytes.len() as u64).max(MIN_BUFFER_SIZE);

        if let Some(id) = existing {
            if let Some(entry) = self.buffers.get(&id) {
                if entry.capacity >= needed {
                    if !bytes.is_empty() {
                        self.context.queue.write_buffer(&entry.buffer, 0, bytes);
                    }
                    return Ok(id);
                }
            }
            self.buffer_free(id);
        }

        let capacity = needed.next_power_of_two();
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Umbra Instance Buffer"),
            size: capacity,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !bytes.is_empty() {
            self.context.queue.write_buffer(&buffer, 0, bytes);
        }
        let id = BackendBufferId(self.generate_id());
        self.buffer_bytes += capacity;
        self.buffers.insert(id, BufferEntry { buffer, capacity });
        Ok(id)
    }

    fn buffer_free(&mut self, id: BackendBufferId) {
        if let Some(entry) = self.buffers.remove(&id) {
            self.buffer_bytes = self.buffer_bytes.saturating_sub(entry.capacity);
        }
    }

    fn render_target_create(
        &mut self,
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Result<RenderTargetId, BackendError> {
        let target = self.create_target(width, height, transparent);
        let id = RenderTargetId(self.generate_id());
        self.texture_bytes += target.byte_size();
        self.targets.insert(id, target);
        log::debug!("WgpuBackend: Created render target {id} ({width}x{height})");
        Ok(id)
    }

    fn render_target_resize(
        &mut self,
        id: RenderTargetId,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        let transparent = self
            .targets
            .get(&id)
            .map(|t| t.transparent)
            .ok_or_else(|| BackendError::InvalidResource(id.to_string()))?;
        let target = self.create_target(width, height, transparent);
        self.texture_bytes += target.byte_size();
        if let Some(old) = self.targets.insert(id, target) {
            self.texture_bytes = self.texture_bytes.saturating_sub(old.byte_size());
        }
        Ok(())
    }

    fn render_target_free(&mut self, id: RenderTargetId) {
        if let Some(old) = self.targets.remove(&id) {
            self.texture_bytes = self.texture_bytes.saturating_sub(old.byte_size());
        }
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        if !self.pending.is_empty() {
            log::warn!(
                "WgpuBackend: {} viewport(s) recorded outside a frame were dropped",
                self.pending.len()
            );
            self.pending.clear();
        }
        Ok(())
    }

    fn draw_viewport(&mut self, frame: &ViewportFrame<'_>) -> Result<(), BackendError> {
        if !self.targets.contains_key(&frame.target) {
            return Err(BackendError::InvalidResource(frame.target.to_string()));
        }

        // Mesh pipelines are created lazily, before anything borrows the stores.
        let mut mesh_pipelines: HashMap<MeshPipelineKey, wgpu::RenderPipeline> = HashMap::new();
        if frame.camera.is_some() {
            for item in frame.items_3d {
                if let Some(surface) = self.surfaces.get(&item.surface) {
                    let key = mesh_key(surface);
                    if !mesh_pipelines.contains_key(&key) {
                        let pipeline = self.pipelines.mesh(&self.context.device, key);
                        mesh_pipelines.insert(key, pipeline);
                    }
                }
            }
        }

        let device = &self.context.device;
        let Some(target) = self.targets.get(&frame.target) else {
            return Err(BackendError::InvalidResource(frame.target.to_string()));
        };
        let clear_load = match frame.clear {
            Some(color) => wgpu::LoadOp::Clear(color.into_wgpu()),
            None => wgpu::LoadOp::Load,
        };
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Umbra Viewport Encoder"),
        });

        // --- 3D pass ---
        let mut color_load = clear_load;
        if let Some(camera) = frame.camera {
            let draws: Vec<SceneDraw<'_>> = frame
                .items_3d
                .iter()
                .filter_map(|item| {
                    let surface = self.surfaces.get(&item.surface)?;
                    if surface.vertex_count == 0 {
                        return None;
                    }
                    let (instances, count) = match item.instances {
                        Some(range) => (&self.buffers.get(&range.buffer)?.buffer, range.count),
                        None => (&self.identity_instance, 1),
                    };
                    (count > 0).then(|| SceneDraw {
                        surface,
                        instances,
                        count,
                        texture: resolve_binding(
                            &self.textures,
                            &self.targets,
                            &self.white,
                            item.texture,
                        ),
                        uniforms: draw_uniforms(&camera, &item.transform, item.color),
                    })
                })
                .collect();

            let alignment = self.context.device_limits.min_uniform_buffer_offset_alignment as u64;
            let stride = align_to(std::mem::size_of::<DrawUniforms>() as u64, alignment);
            let mut uniform_bytes = vec![0u8; (stride as usize) * draws.len().max(1)];
            for (i, draw) in draws.iter().enumerate() {
                let start = i * stride as usize;
                let bytes = bytemuck::bytes_of(&draw.uniforms);
                uniform_bytes[start..start + bytes.len()].copy_from_slice(bytes);
            }
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Umbra Draw Uniforms"),
                contents: &uniform_bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Umbra Draw Uniforms Bind Group"),
                layout: &self.pipelines.draw_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &uniform_buffer,
                        offset: 0,
                        size: NonZeroU64::new(std::mem::size_of::<DrawUniforms>() as u64),
                    }),
                }],
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Umbra Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: clear_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            for (i, draw) in draws.iter().enumerate() {
                let Some(pipeline) = mesh_pipelines.get(&mesh_key(draw.surface)) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &uniform_group, &[(i as u64 * stride) as u32]);
                pass.set_bind_group(1, draw.texture, &[]);
                pass.set_vertex_buffer(0, draw.surface.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, draw.instances.slice(..));
                match &draw.surface.index_buffer {
                    Some(indices) => {
                        pass.set_index_buffer(
                            indices.slice(..),
                            draw.surface.index_format.into_wgpu(),
                        );
                        pass.draw_indexed(0..draw.surface.index_count, 0, 0..draw.count);
                    }
                    None => pass.draw(0..draw.surface.vertex_count, 0..draw.count),
                }
            }
            drop(pass);
            color_load = wgpu::LoadOp::Load;
        }

        // --- 2D pass ---
        let needs_canvas_pass = !frame.canvas.is_empty() || frame.camera.is_none();
        if needs_canvas_pass {
            let mut vertices = Vec::new();
            let mut indices: Vec<u32> = Vec::new();
            let mut ranges = Vec::with_capacity(frame.canvas.len());
            for batch in frame.canvas {
                let base_vertex = vertices.len() as i32;
                let start = indices.len() as u32;
                vertices.extend_from_slice(&batch.vertices);
                indices.extend_from_slice(&batch.indices);
                ranges.push((base_vertex, start..indices.len() as u32));
            }

            let uniforms = CanvasUniforms {
                viewport_size: [target.width as f32, target.height as f32, 0.0, 0.0],
            };
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Umbra Canvas Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Umbra Canvas Uniforms Bind Group"),
                layout: &self.pipelines.canvas_uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            let buffers = (!indices.is_empty()).then(|| {
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Umbra Canvas Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Umbra Canvas Indices"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                (vertex_buffer, index_buffer)
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Umbra Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            if let Some((vertex_buffer, index_buffer)) = &buffers {
                pass.set_bind_group(0, &uniform_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                for (batch, (base_vertex, range)) in frame.canvas.iter().zip(ranges) {
                    if range.is_empty() {
                        continue;
                    }
                    pass.set_pipeline(self.pipelines.canvas(batch.primitive));
                    pass.set_bind_group(
                        1,
                        resolve_binding(&self.textures, &self.targets, &self.white, batch.texture),
                        &[],
                    );
                    pass.draw_indexed(range, base_vertex, 0..1);
                }
            }
        }

        self.pending.push(encoder.finish());
        Ok(())
    }

    fn end_frame(&mut self, swap_buffers: bool) {
        if !self.pending.is_empty() {
            self.context.queue.submit(self.pending.drain(..));
        }
        self.context.poll_device_non_blocking();
        if swap_buffers {
            log::trace!("WgpuBackend: frame ready for presentation");
        }
    }

    fn sync(&mut self) {
        self.context.poll_device_blocking();
    }
}

/// One resolved 3D draw.
struct SceneDraw<'a> {
    surface: &'a SurfaceEntry,
    instances: &'a wgpu::Buffer,
    count: u32,
    texture: &'a wgpu::BindGroup,
    uniforms: DrawUniforms,
}

fn mesh_key(surface: &SurfaceEntry) -> MeshPipelineKey {
    let strip = matches!(
        surface.primitive,
        PrimitiveType::LineStrip | PrimitiveType::TriangleStrip
    );
    let strip_index_format =
        (strip && surface.index_buffer.is_some()).then(|| surface.index_format.into_wgpu());
    (surface.primitive.into_wgpu(), strip_index_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interleave(format: ArrayFormat, vertices: &[&[f32]]) -> Vec<u8> {
        let mut out = Vec::new();
        for vertex in vertices {
            assert_eq!(vertex.len() * 4, format.vertex_stride());
            out.extend_from_slice(bytemuck::cast_slice(vertex));
        }
        out
    }

    #[test]
    fn conversion_fills_missing_attributes() {
        let format = ArrayFormat::VERTEX;
        let data = interleave(format, &[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let vertices = convert_vertices(format, &data, 0, 2);
        assert_eq!(vertices[1].position, [4.0, 5.0, 6.0]);
        assert_eq!(vertices[1].uv, [0.0, 0.0]);
        assert_eq!(vertices[1].color, [1.0; 4]);
    }

    #[test]
    fn conversion_reads_interleaved_color_and_uv() {
        let format = ArrayFormat::VERTEX | ArrayFormat::COLOR | ArrayFormat::TEX_UV;
        let data = interleave(
            format,
            &[&[0.0, 0.0, 0.0, 0.5, 0.25, 0.125, 1.0, 0.75, 0.5]],
        );
        let vertices = convert_vertices(format, &data, 0, 1);
        assert_eq!(vertices[0].color, [0.5, 0.25, 0.125, 1.0]);
        assert_eq!(vertices[0].uv, [0.75, 0.5]);
    }

    #[test]
    fn conversion_of_a_window_starts_at_first() {
        let format = ArrayFormat::VERTEX;
        let data = interleave(format, &[&[1.0, 0.0, 0.0], &[2.0, 0.0, 0.0], &[3.0, 0.0, 0.0]]);
        let vertices = convert_vertices(format, &data, 1, 2);
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].position[0], 2.0);
        assert_eq!(vertices[1].position[0], 3.0);
    }

    #[test]
    fn uniform_stride_respects_alignment() {
        assert_eq!(align_to(144, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(300, 256), 512);
        assert_eq!(align_to(144, 0), 144);
    }

    #[test]
    fn compressed_extents_round_to_blocks() {
        assert_eq!(physical_extent(TextureFormat::Bc1, 2, 6), (4, 8));
        assert_eq!(physical_extent(TextureFormat::Rgba8, 2, 6), (2, 6));
    }
}
