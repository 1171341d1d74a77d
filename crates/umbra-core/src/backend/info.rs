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

//! Backend identity, adapter information, capabilities and resource ids.

use crate::format::TextureFormat;
use std::fmt;

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

backend_id!(
    /// A texture owned by the backend.
    BackendTextureId
);
backend_id!(
    /// A mesh surface (vertex + optional index buffer) owned by the backend.
    BackendSurfaceId
);
backend_id!(
    /// An instance buffer owned by the backend.
    BackendBufferId
);
backend_id!(
    /// An offscreen color target owned by the backend.
    RenderTargetId
);

/// The family of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// A modern explicit API (Vulkan, Metal, DX12).
    Explicit,
    /// A legacy immediate-mode class API (OpenGL, GLES).
    Compatibility,
    /// No GPU. Every call succeeds and does nothing.
    Headless,
}

impl BackendKind {
    /// The driver name reported by `get_current_rendering_driver_name`.
    pub fn driver_name(self) -> &'static str {
        match self {
            BackendKind::Explicit => "explicit",
            BackendKind::Compatibility => "compatibility",
            BackendKind::Headless => "headless",
        }
    }
}

/// The graphics API an adapter is driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsApi {
    /// Vulkan API.
    Vulkan,
    /// Apple's Metal API.
    Metal,
    /// Microsoft's DirectX 12 API.
    Dx12,
    /// OpenGL or OpenGL ES.
    OpenGL,
    /// WebGPU API (for web builds).
    WebGpu,
    /// No API; used by the headless backend.
    None,
    /// An unknown or unsupported API.
    #[default]
    Unknown,
}

/// The physical type of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized GPU.
    VirtualGpu,
    /// A software renderer running on the CPU.
    Cpu,
    /// An unknown device type.
    #[default]
    Unknown,
}

/// Backend-agnostic information about the active adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterInfo {
    /// The adapter name (e.g., "NVIDIA GeForce RTX 4090").
    pub name: String,
    /// The vendor name, derived from the PCI vendor id when known.
    pub vendor: String,
    /// The PCI vendor id, or 0.
    pub vendor_id: u32,
    /// The physical type of the adapter.
    pub device_type: DeviceType,
    /// The API the adapter is driven through.
    pub api: GraphicsApi,
    /// Driver and API version string.
    pub api_version: String,
}

/// Optional backend capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendFeature {
    /// BC1/BC3 compressed textures.
    TextureCompressionBc,
    /// ETC2 compressed textures.
    TextureCompressionEtc2,
    /// Compute shaders.
    Compute,
    /// Linear filtering of 32-bit float textures.
    Float32Filterable,
    /// 3D textures.
    Texture3D,
}

impl BackendFeature {
    /// The feature a texture format depends on, if any.
    pub fn required_for(format: TextureFormat) -> Option<BackendFeature> {
        match format {
            TextureFormat::Bc1 | TextureFormat::Bc3 => Some(BackendFeature::TextureCompressionBc),
            TextureFormat::Etc2Rgb8 => Some(BackendFeature::TextureCompressionEtc2),
            _ => None,
        }
    }
}

/// The shape of a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A single 2D image.
    D2,
    /// An array of 2D layers.
    D2Array,
    /// Six cube faces.
    Cube,
    /// A multiple of six cube faces.
    CubeArray,
    /// A volume.
    D3,
}

/// Parameters of a backend texture allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    /// Width of the base level.
    pub width: u32,
    /// Height of the base level.
    pub height: u32,
    /// Layer count for arrays and cubes, depth for volumes, 1 otherwise.
    pub depth_or_layers: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Shape of the texture.
    pub dimension: TextureDimension,
}

impl TextureDesc {
    /// Bytes needed on the device, assuming tightly packed levels.
    pub fn byte_size(&self) -> u64 {
        let mut total = 0u64;
        for level in 0..self.mip_levels.max(1) {
            let w = (self.width >> level).max(1);
            let h = (self.height >> level).max(1);
            total += self.format.level_size(w, h) as u64;
        }
        total * self.depth_or_layers.max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_type_name() {
        assert_eq!(BackendSurfaceId(7).to_string(), "BackendSurfaceId#7");
    }

    #[test]
    fn compressed_formats_map_to_features() {
        assert_eq!(
            BackendFeature::required_for(TextureFormat::Bc3),
            Some(BackendFeature::TextureCompressionBc)
        );
        assert_eq!(BackendFeature::required_for(TextureFormat::Rgba8), None);
    }

    #[test]
    fn texture_desc_size_counts_layers_and_mips() {
        let desc = TextureDesc {
            width: 4,
            height: 4,
            depth_or_layers: 6,
            mip_levels: 2,
            format: TextureFormat::Rgba8,
            dimension: TextureDimension::Cube,
        };
        assert_eq!(desc.byte_size(), (64 + 16) * 6);
    }
}
