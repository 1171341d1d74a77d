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

//! A backend that renders nothing.

use umbra_core::backend::{
    AdapterInfo, BackendBufferId, BackendFeature, BackendKind, BackendSurfaceId,
    BackendTextureId, GraphicsApi, RenderBackend, RenderTargetId, SurfaceUpload, TextureDesc,
    ViewportFrame,
};
use umbra_core::error::BackendError;
use umbra_core::image::Image;
use umbra_core::stats::MemoryUsage;

/// Accepts every call and never touches a GPU.
///
/// Every allocation returns a fresh id, distinct from all ids returned before, so
/// server-side bookkeeping behaves exactly as with a real device. Queries return
/// zeroed or default data.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
}

impl HeadlessBackend {
    /// Creates a headless backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            api: GraphicsApi::None,
            ..AdapterInfo::default()
        }
    }

    fn supports_feature(&self, _feature: BackendFeature) -> bool {
        false
    }

    fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage::default()
    }

    fn texture_allocate(&mut self, _desc: &TextureDesc) -> Result<BackendTextureId, BackendError> {
        Ok(BackendTextureId(self.generate_id()))
    }

    fn texture_upload(
        &mut self,
        _id: BackendTextureId,
        _layer: u32,
        _image: &Image,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn texture_free(&mut self, _id: BackendTextureId) {}

    fn surface_upload(
        &mut self,
        _surface: &SurfaceUpload<'_>,
    ) -> Result<BackendSurfaceId, BackendError> {
        Ok(BackendSurfaceId(self.generate_id()))
    }

    fn surface_update_region(
        &mut self,
        _id: BackendSurfaceId,
        _offset: usize,
        _data: &[u8],
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn surface_free(&mut self, _id: BackendSurfaceId) {}

    fn buffer_upload(
        &mut self,
        existing: Option<BackendBufferId>,
        _data: &[f32],
    ) -> Result<BackendBufferId, BackendError> {
        match existing {
            Some(id) => Ok(id),
            None => Ok(BackendBufferId(self.generate_id())),
        }
    }

    fn buffer_free(&mut self, _id: BackendBufferId) {}

    fn render_target_create(
        &mut self,
        _width: u32,
        _height: u32,
        _transparent: bool,
    ) -> Result<RenderTargetId, BackendError> {
        Ok(RenderTargetId(self.generate_id()))
    }

    fn render_target_resize(
        &mut self,
        _id: RenderTargetId,
        _width: u32,
        _height: u32,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn render_target_free(&mut self, _id: RenderTargetId) {}

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn draw_viewport(&mut self, _frame: &ViewportFrame<'_>) -> Result<(), BackendError> {
        Ok(())
    }

    fn end_frame(&mut self, _swap_buffers: bool) {}

    fn sync(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::backend::{IndexFormat, TextureDimension};
    use umbra_core::format::{ArrayFormat, PrimitiveType, TextureFormat};

    #[test]
    fn ids_are_distinct_across_kinds() {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc {
            width: 4,
            height: 4,
            depth_or_layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8,
            dimension: TextureDimension::D2,
        };
        let a = backend.texture_allocate(&desc).unwrap();
        let b = backend.texture_allocate(&desc).unwrap();
        assert_ne!(a, b);

        let upload = SurfaceUpload {
            format: ArrayFormat::VERTEX,
            primitive: PrimitiveType::Triangles,
            vertex_data: &[0; 36],
            vertex_count: 3,
            index_data: &[],
            index_count: 0,
            index_format: IndexFormat::U16,
        };
        let surface = backend.surface_upload(&upload).unwrap();
        let target = backend.render_target_create(8, 8, false).unwrap();
        assert_ne!(surface.0, target.0);
        assert_ne!(surface.0, b.0);
    }

    #[test]
    fn buffer_upload_keeps_existing_id() {
        let mut backend = HeadlessBackend::new();
        let first = backend.buffer_upload(None, &[0.0; 16]).unwrap();
        let second = backend.buffer_upload(Some(first), &[0.0; 32]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reports_nothing() {
        let backend = HeadlessBackend::new();
        assert_eq!(backend.kind(), BackendKind::Headless);
        assert_eq!(backend.memory_usage().total(), 0);
        assert_eq!(backend.adapter_info().api, GraphicsApi::None);
        assert!(backend.adapter_info().name.is_empty());
        assert!(!backend.supports_feature(BackendFeature::Compute));
    }
}
