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

//! Bind group layouts, vertex layouts and render pipelines of the two passes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use umbra_core::backend::{CanvasPrimitive, CanvasVertex, INSTANCE_FLOATS};

use super::shaders::{CANVAS_WGSL, MESH_WGSL};

/// Color format of every render target.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format of the 3D pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The vertex layout every mesh surface is converted to on upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4
];

fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: (INSTANCE_FLOATS * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

const CANVAS_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

fn canvas_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<CanvasVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &CANVAS_ATTRIBUTES,
    }
}

/// Per-draw uniforms of the 3D pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniforms {
    pub view_projection: [f32; 16],
    pub model: [f32; 16],
    pub color: [f32; 4],
}

/// Per-viewport uniforms of the 2D pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CanvasUniforms {
    pub viewport_size: [f32; 4],
}

/// Identifies a mesh pipeline. Strip topologies drawn with indices need the index
/// width baked into the pipeline.
pub type MeshPipelineKey = (wgpu::PrimitiveTopology, Option<wgpu::IndexFormat>);

fn uniform_entry(min_size: u64, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}

/// Every GPU object shared by all viewports.
#[derive(Debug)]
pub struct Pipelines {
    pub draw_layout: wgpu::BindGroupLayout,
    pub canvas_uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    mesh_module: wgpu::ShaderModule,
    mesh_pipeline_layout: wgpu::PipelineLayout,
    mesh: HashMap<MeshPipelineKey, wgpu::RenderPipeline>,
    canvas_triangles: wgpu::RenderPipeline,
    canvas_lines: wgpu::RenderPipeline,
}

impl Pipelines {
    /// Compiles the shaders and builds the 2D pipelines. Mesh pipelines are built
    /// on first use.
    pub fn new(device: &wgpu::Device) -> Self {
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Umbra Draw Uniforms Layout"),
            entries: &[uniform_entry(
                std::mem::size_of::<DrawUniforms>() as u64,
                true,
            )],
        });
        let canvas_uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Umbra Canvas Uniforms Layout"),
                entries: &[uniform_entry(
                    std::mem::size_of::<CanvasUniforms>() as u64,
                    false,
                )],
            });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Umbra Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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

        let mesh_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Umbra Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(MESH_WGSL)),
        });
        let canvas_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Umbra Canvas Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(CANVAS_WGSL)),
        });

        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Umbra Mesh Pipeline Layout"),
            bind_group_layouts: &[Some(&draw_layout), Some(&texture_layout)],
            immediate_size: 0,
        });
        let canvas_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Umbra Canvas Pipeline Layout"),
                bind_group_layouts: &[Some(&canvas_uniform_layout), Some(&texture_layout)],
                immediate_size: 0,
            });

        let canvas_pipeline = |topology: wgpu::PrimitiveTopology, label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&canvas_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &canvas_module,
                    entry_point: Some("vs_main"),
                    buffers: &[canvas_layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &canvas_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };
        let canvas_triangles = canvas_pipeline(
            wgpu::PrimitiveTopology::TriangleList,
            "Umbra Canvas Triangles",
        );
        let canvas_lines = canvas_pipeline(wgpu::PrimitiveTopology::LineList, "Umbra Canvas Lines");
        log::debug!("Canvas pipelines created.");

        Self {
            draw_layout,
            canvas_uniform_layout,
            texture_layout,
            mesh_module,
            mesh_pipeline_layout,
            mesh: HashMap::new(),
            canvas_triangles,
            canvas_lines,
        }
    }

    /// The 2D pipeline of a batch topology.
    pub fn canvas(&self, primitive: CanvasPrimitive) -> &wgpu::RenderPipeline {
        match primitive {
            CanvasPrimitive::Triangles => &self.canvas_triangles,
            CanvasPrimitive::Lines => &self.canvas_lines,
        }
    }

    /// The 3D pipeline for a topology, built on first request.
    pub fn mesh(&mut self, device: &wgpu::Device, key: MeshPipelineKey) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.mesh.get(&key) {
            return pipeline.clone();
        }
        let (topology, strip_index_format) = key;
        log::debug!("Creating mesh pipeline for {topology:?}");
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Umbra Mesh Pipeline"),
            layout: Some(&self.mesh_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.mesh_module,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::layout(), instance_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.mesh_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Less),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.mesh.insert(key, pipeline.clone());
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_structs_match_wgsl_sizes() {
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 144);
        assert_eq!(std::mem::size_of::<CanvasUniforms>(), 16);
        assert_eq!(std::mem::size_of::<MeshVertex>(), 36);
    }

    #[test]
    fn vertex_layouts_cover_every_location() {
        assert_eq!(MeshVertex::layout().array_stride, 36);
        assert_eq!(instance_layout().array_stride, 64);
        assert_eq!(canvas_layout().array_stride, 32);
        let locations: Vec<u32> = MeshVertex::ATTRIBUTES
            .iter()
            .chain(INSTANCE_ATTRIBUTES.iter())
            .map(|a| a.shader_location)
            .collect();
        assert_eq!(locations, vec![0, 1, 2, 3, 4, 5, 6]);
    }
}
