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

//! Rendering statistics counters.

use serde::{Deserialize, Serialize};

/// Global counters reported by `get_rendering_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderingInfo {
    /// Objects drawn in the last frame, across viewports.
    TotalObjectsInFrame,
    /// Primitives (triangles, lines) drawn in the last frame.
    TotalPrimitivesInFrame,
    /// Draw calls submitted in the last frame.
    TotalDrawCallsInFrame,
    /// Bytes of texture memory held by the backend.
    TextureMemUsed,
    /// Bytes of buffer memory held by the backend.
    BufferMemUsed,
    /// Total bytes of video memory held by the backend.
    VideoMemUsed,
}

/// The pass a viewport counter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewportRenderInfoType {
    /// The main 3D pass.
    Visible,
    /// Shadow passes.
    Shadow,
    /// The 2D canvas pass.
    Canvas,
}

/// The quantity a viewport counter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewportRenderInfo {
    /// Objects drawn.
    Objects,
    /// Primitives drawn.
    Primitives,
    /// Draw calls submitted.
    DrawCalls,
}

/// Per-viewport counters for the last frame the viewport was drawn in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportRenderStats {
    counters: [[u64; 3]; 3],
}

impl ViewportRenderStats {
    fn slot(kind: ViewportRenderInfoType, info: ViewportRenderInfo) -> (usize, usize) {
        let k = match kind {
            ViewportRenderInfoType::Visible => 0,
            ViewportRenderInfoType::Shadow => 1,
            ViewportRenderInfoType::Canvas => 2,
        };
        let i = match info {
            ViewportRenderInfo::Objects => 0,
            ViewportRenderInfo::Primitives => 1,
            ViewportRenderInfo::DrawCalls => 2,
        };
        (k, i)
    }

    /// Reads one counter.
    pub fn get(&self, kind: ViewportRenderInfoType, info: ViewportRenderInfo) -> u64 {
        let (k, i) = Self::slot(kind, info);
        self.counters[k][i]
    }

    /// Adds to one counter.
    pub fn add(&mut self, kind: ViewportRenderInfoType, info: ViewportRenderInfo, amount: u64) {
        let (k, i) = Self::slot(kind, info);
        self.counters[k][i] += amount;
    }

    /// Sum of a quantity over every pass.
    pub fn total(&self, info: ViewportRenderInfo) -> u64 {
        let (_, i) = Self::slot(ViewportRenderInfoType::Visible, info);
        self.counters.iter().map(|pass| pass[i]).sum()
    }
}

/// Video memory held by a backend, in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Bytes held by textures and render targets.
    pub texture_bytes: u64,
    /// Bytes held by vertex, index and instance buffers.
    pub buffer_bytes: u64,
}

impl MemoryUsage {
    /// Total bytes.
    pub fn total(&self) -> u64 {
        self.texture_bytes + self.buffer_bytes
    }
}

/// Summary of one scheduler frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Monotonic frame number, starting at 1 for the first drawn frame.
    pub frame: u64,
    /// Objects drawn across all viewports.
    pub objects: u64,
    /// Primitives drawn across all viewports.
    pub primitives: u64,
    /// Draw calls across all viewports.
    pub draw_calls: u64,
    /// Viewports that rendered successfully.
    pub viewports_drawn: u32,
    /// Viewports whose submission failed and were skipped.
    pub viewports_skipped: u32,
    /// Queued commands executed at the start of the frame.
    pub commands_executed: u64,
    /// CPU time spent in the frame, in milliseconds.
    pub cpu_time_ms: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_counters_are_independent() {
        let mut stats = ViewportRenderStats::default();
        stats.add(
            ViewportRenderInfoType::Visible,
            ViewportRenderInfo::DrawCalls,
            2,
        );
        stats.add(ViewportRenderInfoType::Canvas, ViewportRenderInfo::DrawCalls, 1);
        assert_eq!(
            stats.get(ViewportRenderInfoType::Visible, ViewportRenderInfo::DrawCalls),
            2
        );
        assert_eq!(
            stats.get(ViewportRenderInfoType::Shadow, ViewportRenderInfo::DrawCalls),
            0
        );
        assert_eq!(stats.total(ViewportRenderInfo::DrawCalls), 3);
        assert_eq!(stats.total(ViewportRenderInfo::Objects), 0);
    }

    #[test]
    fn memory_total() {
        let usage = MemoryUsage {
            texture_bytes: 10,
            buffer_bytes: 5,
        };
        assert_eq!(usage.total(), 15);
    }
}
