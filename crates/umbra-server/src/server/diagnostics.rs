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

//! Adapter information, frame counters and server-wide settings.

use super::RenderingServer;
use crate::queue::lock;
use umbra_core::backend::{BackendFeature, DeviceType};
use umbra_core::format::TextureFormat;
use umbra_core::image::Image;
use umbra_core::math::Color;
use umbra_core::stats::{FrameStats, RenderingInfo, ViewportRenderInfo, ViewportRenderInfoType};
use umbra_core::{ResourceKind, Rid};

/// Side of the checker texture.
const TEST_TEXTURE_SIZE: u32 = 8;

fn checker_image() -> Image {
    let mut data = Vec::with_capacity((TEST_TEXTURE_SIZE * TEST_TEXTURE_SIZE * 4) as usize);
    for y in 0..TEST_TEXTURE_SIZE {
        for x in 0..TEST_TEXTURE_SIZE {
            let texel = if (x + y) % 2 == 0 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            };
            data.extend_from_slice(&texel);
        }
    }
    Image::new(TEST_TEXTURE_SIZE, TEST_TEXTURE_SIZE, false, TextureFormat::Rgba8, data)
}

impl RenderingServer {
    /// Name of the active adapter.
    pub fn get_video_adapter_name(&self) -> String {
        self.read(|s| s.backend().adapter_info().name)
    }

    /// Vendor of the active adapter.
    pub fn get_video_adapter_vendor(&self) -> String {
        self.read(|s| s.backend().adapter_info().vendor)
    }

    /// Physical type of the active adapter.
    pub fn get_video_adapter_type(&self) -> DeviceType {
        self.read(|s| s.backend().adapter_info().device_type)
    }

    /// Driver and API version of the active adapter.
    pub fn get_video_adapter_api_version(&self) -> String {
        self.read(|s| s.backend().adapter_info().api_version)
    }

    /// `explicit`, `compatibility` or `headless`.
    pub fn get_current_rendering_driver_name(&self) -> &'static str {
        self.read(|s| s.backend().kind().driver_name())
    }

    /// Whether the backend supports an optional capability.
    pub fn has_feature(&self, feature: BackendFeature) -> bool {
        self.read(|s| s.backend().supports_feature(feature))
    }

    /// A counter of the last frame, or a memory figure of the backend.
    pub fn get_rendering_info(&self, info: RenderingInfo) -> u64 {
        self.read(|s| match info {
            RenderingInfo::TotalObjectsInFrame => s.last_stats.objects,
            RenderingInfo::TotalPrimitivesInFrame => s.last_stats.primitives,
            RenderingInfo::TotalDrawCallsInFrame => s.last_stats.draw_calls,
            RenderingInfo::TextureMemUsed => s.backend().memory_usage().texture_bytes,
            RenderingInfo::BufferMemUsed => s.backend().memory_usage().buffer_bytes,
            RenderingInfo::VideoMemUsed => s.backend().memory_usage().total(),
        })
    }

    /// A counter of the last frame `viewport` was drawn in.
    pub fn viewport_get_render_info(
        &self,
        viewport: Rid,
        kind: ViewportRenderInfoType,
        info: ViewportRenderInfo,
    ) -> u64 {
        self.query("viewport_get_render_info", viewport, ResourceKind::Viewport, |s| {
            s.viewports.render_info(viewport, kind, info)
        })
    }

    /// Statistics of the last frame.
    pub fn get_frame_stats(&self) -> FrameStats {
        self.read(|s| s.last_stats)
    }

    /// Commands waiting for the render thread.
    pub fn get_pending_command_count(&self) -> usize {
        self.shared().marshal.queue().pending()
    }

    /// Number of live handles.
    pub fn get_live_handle_count(&self) -> usize {
        self.shared().allocator.live_count()
    }

    /// Clear color of viewports whose environment does not impose one.
    pub fn get_default_clear_color(&self) -> Color {
        self.read(|s| s.default_clear_color)
    }

    /// Sets the default clear color.
    pub fn set_default_clear_color(&self, color: Color) {
        self.apply("set_default_clear_color", move |s| {
            s.default_clear_color = color;
            Ok(())
        });
    }

    /// An 8x8 black and white checker texture, created on first use.
    pub fn get_test_texture(&self) -> Rid {
        let mut slot = lock(&self.shared().test_texture);
        if slot.is_valid() && self.shared().allocator.is_live(*slot) {
            return *slot;
        }
        *slot = self.texture_2d_create(checker_image());
        *slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_alternates_texels() {
        let image = checker_image();
        assert_eq!(image.width, TEST_TEXTURE_SIZE);
        assert_eq!(image.data.len(), 8 * 8 * 4);
        assert_eq!(&image.data[0..4], &[255, 255, 255, 255]);
        assert_eq!(&image.data[4..8], &[0, 0, 0, 255]);
        // Second row starts with black.
        assert_eq!(&image.data[32..36], &[0, 0, 0, 255]);
    }
}
