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

//! Built-in WGSL sources of the wgpu backend.

/// The 2D pass: pixel-space positions, per-vertex color, one texture.
pub const CANVAS_WGSL: &str = include_str!("canvas.wgsl");

/// The 3D pass: unlit, instanced, one texture.
pub const MESH_WGSL: &str = include_str!("mesh.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_declare_both_entry_points() {
        for source in [CANVAS_WGSL, MESH_WGSL] {
            assert!(source.contains("fn vs_main"));
            assert!(source.contains("fn fs_main"));
        }
    }
}
