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

use super::frame::{SurfaceUpload, ViewportFrame};
use super::info::*;
use crate::error::BackendError;
use crate::image::Image;
use crate::stats::MemoryUsage;

/// A concrete graphics backend driven by the server's render thread.
///
/// Backends are owned by the render thread, so methods take `&mut self` and the
/// trait only requires `Send`.
pub trait RenderBackend: Send {
    /// The family of this backend.
    fn kind(&self) -> BackendKind;

    /// Information about the adapter in use.
    fn adapter_info(&self) -> AdapterInfo;

    /// Checks whether an optional capability is available.
    /// ## Arguments
    /// * `feature` - The capability to query.
    /// ## Returns
    /// `true` if operations depending on `feature` will do real work.
    fn supports_feature(&self, feature: BackendFeature) -> bool;

    /// Video memory currently held by backend resources.
    fn memory_usage(&self) -> MemoryUsage;

    /// Allocates an uninitialized texture.
    /// ## Arguments
    /// * `desc` - Size, format and shape of the texture.
    /// ## Returns
    /// The id of the new texture.
    /// ## Errors
    /// * `BackendError::OutOfMemory` - If the allocation cannot be satisfied.
    /// * `BackendError::Unsupported` - If the format or shape is not available.
    fn texture_allocate(&mut self, desc: &TextureDesc) -> Result<BackendTextureId, BackendError>;

    /// Uploads every mip level of `image` into one layer of a texture.
    /// ## Arguments
    /// * `id` - The destination texture.
    /// * `layer` - The array layer, cube face or depth slice.
    /// * `image` - Data matching the texture's size and format.
    /// ## Errors
    /// * `BackendError::InvalidResource` - If `id` is unknown.
    fn texture_upload(
        &mut self,
        id: BackendTextureId,
        layer: u32,
        image: &Image,
    ) -> Result<(), BackendError>;

    /// Releases a texture. Unknown ids are ignored.
    fn texture_free(&mut self, id: BackendTextureId);

    /// Creates GPU buffers for a mesh surface.
    /// ## Arguments
    /// * `surface` - Validated vertex and index data.
    /// ## Returns
    /// The id of the new surface.
    /// ## Errors
    /// * `BackendError::OutOfMemory` - If the buffers cannot be allocated.
    fn surface_upload(&mut self, surface: &SurfaceUpload<'_>)
        -> Result<BackendSurfaceId, BackendError>;

    /// Overwrites part of a surface's vertex buffer.
    /// ## Arguments
    /// * `id` - The surface.
    /// * `offset` - Byte offset into the vertex buffer.
    /// * `data` - Replacement bytes.
    /// ## Errors
    /// * `BackendError::InvalidResource` - If `id` is unknown or the range is out of bounds.
    fn surface_update_region(
        &mut self,
        id: BackendSurfaceId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Releases a surface. Unknown ids are ignored.
    fn surface_free(&mut self, id: BackendSurfaceId);

    /// Creates or refreshes an instance buffer.
    /// ## Arguments
    /// * `existing` - The buffer to overwrite, if any. It is reallocated when too small.
    /// * `data` - `INSTANCE_FLOATS` floats per instance.
    /// ## Returns
    /// The id of the buffer now holding `data`, which may differ from `existing`.
    fn buffer_upload(
        &mut self,
        existing: Option<BackendBufferId>,
        data: &[f32],
    ) -> Result<BackendBufferId, BackendError>;

    /// Releases an instance buffer. Unknown ids are ignored.
    fn buffer_free(&mut self, id: BackendBufferId);

    /// Allocates an offscreen color target.
    /// ## Errors
    /// * `BackendError::OutOfMemory` - If the target cannot be allocated.
    fn render_target_create(
        &mut self,
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Result<RenderTargetId, BackendError>;

    /// Resizes a render target. Its contents are discarded.
    fn render_target_resize(
        &mut self,
        id: RenderTargetId,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    /// Releases a render target. Unknown ids are ignored.
    fn render_target_free(&mut self, id: RenderTargetId);

    /// Starts a frame. Called once before any [`RenderBackend::draw_viewport`].
    fn begin_frame(&mut self) -> Result<(), BackendError>;

    /// Renders one viewport into its render target.
    /// ## Errors
    /// Any failure only affects this viewport; the server skips it and continues.
    fn draw_viewport(&mut self, frame: &ViewportFrame<'_>) -> Result<(), BackendError>;

    /// Ends a frame and submits recorded work.
    /// ## Arguments
    /// * `swap_buffers` - Whether the platform layer should present afterwards.
    fn end_frame(&mut self, swap_buffers: bool);

    /// Blocks until the device has finished all submitted work.
    fn sync(&mut self);
}
