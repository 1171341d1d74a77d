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

use umbra_core::backend::{DeviceType, GraphicsApi, IndexFormat};
use umbra_core::config::PowerPreference;
use umbra_core::format::{PrimitiveType, TextureFormat};
use umbra_core::math::Color;

/// A local extension trait to convert server types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
            TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::R32F => wgpu::TextureFormat::R32Float,
            TextureFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32F => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Bc1 => wgpu::TextureFormat::Bc1RgbaUnorm,
            TextureFormat::Bc3 => wgpu::TextureFormat::Bc3RgbaUnorm,
            TextureFormat::Etc2Rgb8 => wgpu::TextureFormat::Etc2Rgb8Unorm,
        }
    }
}

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveType {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
            PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
            PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::U16 => wgpu::IndexFormat::Uint16,
            IndexFormat::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::Color> for Color {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

impl IntoWgpu<wgpu::PowerPreference> for PowerPreference {
    fn into_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}

/// Converts a wgpu device type into the server's.
pub fn device_type_from_wgpu(device_type: wgpu::DeviceType) -> DeviceType {
    match device_type {
        wgpu::DeviceType::IntegratedGpu => DeviceType::IntegratedGpu,
        wgpu::DeviceType::DiscreteGpu => DeviceType::DiscreteGpu,
        wgpu::DeviceType::VirtualGpu => DeviceType::VirtualGpu,
        wgpu::DeviceType::Cpu => DeviceType::Cpu,
        _ => DeviceType::Unknown,
    }
}

/// Converts a wgpu backend into the graphics API it drives.
pub fn graphics_api_from_wgpu(backend: wgpu::Backend) -> GraphicsApi {
    match backend {
        wgpu::Backend::Vulkan => GraphicsApi::Vulkan,
        wgpu::Backend::Metal => GraphicsApi::Metal,
        wgpu::Backend::Dx12 => GraphicsApi::Dx12,
        wgpu::Backend::Gl => GraphicsApi::OpenGL,
        wgpu::Backend::BrowserWebGpu => GraphicsApi::WebGpu,
        #[allow(unreachable_patterns)]
        _ => GraphicsApi::Unknown,
    }
}

/// Vendor name for a PCI vendor id.
pub fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x10DE => "NVIDIA",
        0x1002 => "AMD",
        0x8086 => "Intel",
        0x106B => "Apple",
        0x13B5 => "ARM",
        0x5143 => "Qualcomm",
        0x1010 => "Imagination Technologies",
        0x10005 => "Mesa",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_formats_keep_their_encoding() {
        assert_eq!(
            TextureFormat::Rgba8Srgb.into_wgpu(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(TextureFormat::Bc3.into_wgpu(), wgpu::TextureFormat::Bc3RgbaUnorm);
    }

    #[test]
    fn strips_map_to_strip_topologies() {
        assert_eq!(
            PrimitiveType::LineStrip.into_wgpu(),
            wgpu::PrimitiveTopology::LineStrip
        );
        assert_eq!(
            PrimitiveType::Points.into_wgpu(),
            wgpu::PrimitiveTopology::PointList
        );
    }

    #[test]
    fn adapter_descriptions() {
        assert_eq!(graphics_api_from_wgpu(wgpu::Backend::Gl), GraphicsApi::OpenGL);
        assert_eq!(
            device_type_from_wgpu(wgpu::DeviceType::Other),
            DeviceType::Unknown
        );
        assert_eq!(vendor_name(0x10DE), "NVIDIA");
        assert_eq!(vendor_name(0xFFFF), "Unknown");
    }
}
