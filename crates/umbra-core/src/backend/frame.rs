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

//! Data handed to a backend: surface uploads and per-viewport draw lists.

use super::info::{BackendBufferId, BackendSurfaceId, BackendTextureId, RenderTargetId};
use crate::format::{ArrayFormat, PrimitiveType};
use crate::math::{Color, Mat4};

/// Floats per instance in a backend instance buffer: a 3x4 row-major transform
/// followed by an RGBA color.
pub const INSTANCE_FLOATS: usize = 16;

/// Width of the indices of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices, used when the surface has at most 65535 vertices.
    U16,
    /// 32-bit indices.
    U32,
}

impl IndexFormat {
    /// The index width required by a surface with `vertex_count` vertices.
    pub fn for_vertex_count(vertex_count: usize) -> Self {
        if vertex_count <= u16::MAX as usize {
            IndexFormat::U16
        } else {
            IndexFormat::U32
        }
    }

    /// Bytes per index.
    pub fn size(self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// A validated mesh surface ready for upload.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceUpload<'a> {
    /// Attributes present in `vertex_data`.
    pub format: ArrayFormat,
    /// Topology.
    pub primitive: PrimitiveType,
    /// Interleaved vertex bytes.
    pub vertex_data: &'a [u8],
    /// Number of vertices.
    pub vertex_count: u32,
    /// Index bytes; empty when the surface is not indexed.
    pub index_data: &'a [u8],
    /// Number of indices.
    pub index_count: u32,
    /// Width of the indices.
    pub index_format: IndexFormat,
}

/// What a draw samples as its albedo texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureBinding {
    /// The backend's built-in white texture.
    #[default]
    White,
    /// A texture resource.
    Texture(BackendTextureId),
    /// The color output of another viewport.
    RenderTarget(RenderTargetId),
}

/// View and projection of a 3D pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    /// World-to-view transform.
    pub view: Mat4,
    /// View-to-clip transform.
    pub projection: Mat4,
}

/// A range of instances in an instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRange {
    /// The buffer holding [`INSTANCE_FLOATS`] floats per instance.
    pub buffer: BackendBufferId,
    /// Number of instances to draw, starting at the first.
    pub count: u32,
}

/// One draw of one mesh surface in a 3D pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem3D {
    /// The surface to draw.
    pub surface: BackendSurfaceId,
    /// Object-to-world transform.
    pub transform: Mat4,
    /// Albedo tint.
    pub color: Color,
    /// Albedo texture.
    pub texture: TextureBinding,
    /// Instanced draws read per-instance transforms from here.
    pub instances: Option<InstanceRange>,
    /// Material render priority; lower draws first.
    pub priority: i8,
}

/// A vertex of a 2D batch, in viewport pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CanvasVertex {
    /// Position in pixels, origin at the top-left corner.
    pub position: [f32; 2],
    /// Texture coordinates.
    pub uv: [f32; 2],
    /// Final, fully modulated color.
    pub color: [f32; 4],
}

/// Topology of a 2D batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanvasPrimitive {
    /// Triangle list.
    Triangles,
    /// Line list.
    Lines,
}

/// Consecutive 2D geometry sharing a texture and topology. Drawn in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasBatch {
    /// Sampled texture.
    pub texture: TextureBinding,
    /// Topology.
    pub primitive: CanvasPrimitive,
    /// Vertices in pixel space.
    pub vertices: Vec<CanvasVertex>,
    /// Indices into `vertices`.
    pub indices: Vec<u32>,
}

impl CanvasBatch {
    /// Number of primitives in the batch.
    pub fn primitive_count(&self) -> u64 {
        match self.primitive {
            CanvasPrimitive::Triangles => self.indices.len() as u64 / 3,
            CanvasPrimitive::Lines => self.indices.len() as u64 / 2,
        }
    }
}

/// Everything needed to render one viewport into its render target.
#[derive(Debug, Clone, Copy)]
pub struct ViewportFrame<'a> {
    /// Destination.
    pub target: RenderTargetId,
    /// Size of the target in pixels.
    pub width: u32,
    /// Size of the target in pixels.
    pub height: u32,
    /// Clear color, or `None` to keep the previous contents.
    pub clear: Option<Color>,
    /// Camera of the 3D pass. Without a camera the 3D pass is skipped.
    pub camera: Option<CameraData>,
    /// 3D draws, already culled and sorted.
    pub items_3d: &'a [DrawItem3D],
    /// 2D batches, drawn after the 3D pass in order.
    pub canvas: &'a [CanvasBatch],
}

impl ViewportFrame<'_> {
    /// Number of draw calls this frame results in.
    pub fn draw_call_count(&self) -> u64 {
        let draws_3d = if self.camera.is_some() {
            self.items_3d.len() as u64
        } else {
            0
        };
        draws_3d + self.canvas.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_format_switches_above_u16_range() {
        assert_eq!(IndexFormat::for_vertex_count(65_535), IndexFormat::U16);
        assert_eq!(IndexFormat::for_vertex_count(65_536), IndexFormat::U32);
        assert_eq!(IndexFormat::U32.size(), 4);
    }

    #[test]
    fn draw_calls_skip_3d_without_camera() {
        let item = DrawItem3D {
            surface: BackendSurfaceId(1),
            transform: Mat4::IDENTITY,
            color: Color::WHITE,
            texture: TextureBinding::White,
            instances: None,
            priority: 0,
        };
        let batch = CanvasBatch {
            texture: TextureBinding::White,
            primitive: CanvasPrimitive::Triangles,
            vertices: Vec::new(),
            indices: vec![0, 1, 2],
        };
        let items = [item];
        let canvas = [batch];
        let mut frame = ViewportFrame {
            target: RenderTargetId(1),
            width: 8,
            height: 8,
            clear: None,
            camera: None,
            items_3d: &items,
            canvas: &canvas,
        };
        assert_eq!(frame.draw_call_count(), 1);
        frame.camera = Some(CameraData {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        });
        assert_eq!(frame.draw_call_count(), 2);
        assert_eq!(canvas[0].primitive_count(), 1);
    }
}
