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

//! Resource data layouts: vertex attribute masks, primitive topologies, instance
//! transform layouts and texel formats.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The attributes present in a mesh surface.
    ///
    /// Vertex data is interleaved in the order the attribute flags are declared.
    /// `INDEX` carries no per-vertex data; it marks the presence of an index buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ArrayFormat: u32 {
        /// Position, 3 x f32.
        const VERTEX = 1 << 0;
        /// Normal, 3 x f32.
        const NORMAL = 1 << 1;
        /// Tangent with binormal sign, 4 x f32.
        const TANGENT = 1 << 2;
        /// Vertex color, 4 x f32.
        const COLOR = 1 << 3;
        /// Primary texture coordinates, 2 x f32.
        const TEX_UV = 1 << 4;
        /// Secondary texture coordinates, 2 x f32.
        const TEX_UV2 = 1 << 5;
        /// Custom channel 0, 4 x f32.
        const CUSTOM0 = 1 << 6;
        /// Custom channel 1, 4 x f32.
        const CUSTOM1 = 1 << 7;
        /// Custom channel 2, 4 x f32.
        const CUSTOM2 = 1 << 8;
        /// Custom channel 3, 4 x f32.
        const CUSTOM3 = 1 << 9;
        /// Bone indices, 4 x u16.
        const BONES = 1 << 10;
        /// Bone weights, 4 x f32.
        const WEIGHTS = 1 << 11;
        /// The surface has an index buffer.
        const INDEX = 1 << 12;
    }
}

impl ArrayFormat {
    /// Per-vertex attributes with their size in bytes, in interleaving order.
    pub const VERTEX_ATTRIBUTES: [(ArrayFormat, usize); 12] = [
        (ArrayFormat::VERTEX, 12),
        (ArrayFormat::NORMAL, 12),
        (ArrayFormat::TANGENT, 16),
        (ArrayFormat::COLOR, 16),
        (ArrayFormat::TEX_UV, 8),
        (ArrayFormat::TEX_UV2, 8),
        (ArrayFormat::CUSTOM0, 16),
        (ArrayFormat::CUSTOM1, 16),
        (ArrayFormat::CUSTOM2, 16),
        (ArrayFormat::CUSTOM3, 16),
        (ArrayFormat::BONES, 8),
        (ArrayFormat::WEIGHTS, 16),
    ];

    /// Size in bytes of one interleaved vertex.
    pub fn vertex_stride(self) -> usize {
        Self::VERTEX_ATTRIBUTES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, size)| size)
            .sum()
    }

    /// Byte offset of `attribute` inside one interleaved vertex.
    ///
    /// ## Returns
    /// `None` if the attribute is absent or is not a per-vertex attribute.
    pub fn attribute_offset(self, attribute: ArrayFormat) -> Option<usize> {
        if !self.contains(attribute) {
            return None;
        }
        let mut offset = 0;
        for (flag, size) in Self::VERTEX_ATTRIBUTES {
            if flag == attribute {
                return Some(offset);
            }
            if self.contains(flag) {
                offset += size;
            }
        }
        None
    }
}

/// Primitive topology of a mesh surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// Independent points.
    Points,
    /// Independent line segments.
    Lines,
    /// A connected polyline.
    LineStrip,
    /// Independent triangles.
    #[default]
    Triangles,
    /// A triangle strip.
    TriangleStrip,
}

impl PrimitiveType {
    /// The element count of a list-type topology must be a multiple of this.
    pub fn element_multiple(self) -> usize {
        match self {
            PrimitiveType::Lines => 2,
            PrimitiveType::Triangles => 3,
            _ => 1,
        }
    }

    /// Number of primitives drawn from `elements` vertices or indices.
    pub fn primitive_count(self, elements: usize) -> usize {
        match self {
            PrimitiveType::Points => elements,
            PrimitiveType::Lines => elements / 2,
            PrimitiveType::LineStrip => elements.saturating_sub(1),
            PrimitiveType::Triangles => elements / 3,
            PrimitiveType::TriangleStrip => elements.saturating_sub(2),
        }
    }
}

/// Layout of the transform part of a multimesh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultimeshTransformFormat {
    /// 2 rows of 4 floats.
    Transform2D,
    /// 3 rows of 4 floats.
    #[default]
    Transform3D,
}

impl MultimeshTransformFormat {
    /// Floats occupied by the transform of one instance.
    pub fn float_count(self) -> usize {
        match self {
            MultimeshTransformFormat::Transform2D => 8,
            MultimeshTransformFormat::Transform3D => 12,
        }
    }
}

/// Texel format of an image or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFormat {
    /// One 8-bit channel.
    R8,
    /// Two 8-bit channels.
    Rg8,
    /// Four 8-bit channels.
    #[default]
    Rgba8,
    /// Four 8-bit channels, sRGB encoded.
    Rgba8Srgb,
    /// One 32-bit float channel.
    R32F,
    /// Four 16-bit float channels.
    Rgba16F,
    /// Four 32-bit float channels.
    Rgba32F,
    /// BC1 (DXT1) block compression.
    Bc1,
    /// BC3 (DXT5) block compression.
    Bc3,
    /// ETC2 RGB8 block compression.
    Etc2Rgb8,
}

impl TextureFormat {
    /// Returns `true` for block-compressed formats.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            TextureFormat::Bc1 | TextureFormat::Bc3 | TextureFormat::Etc2Rgb8
        )
    }

    /// For uncompressed formats, bytes per texel. For compressed formats, bytes per
    /// 4x4 block.
    pub fn unit_size(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 => 2,
            TextureFormat::Rgba8 | TextureFormat::Rgba8Srgb | TextureFormat::R32F => 4,
            TextureFormat::Rgba16F => 8,
            TextureFormat::Rgba32F => 16,
            TextureFormat::Bc1 | TextureFormat::Etc2Rgb8 => 8,
            TextureFormat::Bc3 => 16,
        }
    }

    /// Bytes of one mip level of the given size.
    pub fn level_size(self, width: u32, height: u32) -> usize {
        if self.is_compressed() {
            let bw = width.div_ceil(4).max(1) as usize;
            let bh = height.div_ceil(4).max(1) as usize;
            bw * bh * self.unit_size()
        } else {
            width.max(1) as usize * height.max(1) as usize * self.unit_size()
        }
    }

    /// Bytes of one row of a mip level, counted in block rows for compressed formats.
    pub fn bytes_per_row(self, width: u32) -> u32 {
        if self.is_compressed() {
            width.div_ceil(4).max(1) * self.unit_size() as u32
        } else {
            width.max(1) * self.unit_size() as u32
        }
    }

    /// Number of block rows (compressed) or texel rows in a level of `height`.
    pub fn rows(self, height: u32) -> u32 {
        if self.is_compressed() {
            height.div_ceil(4).max(1)
        } else {
            height.max(1)
        }
    }
}

/// Number of mip levels of a full chain for an image of the given size.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// How the layers of a layered texture are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureLayeredType {
    /// Any number of independent layers.
    #[default]
    Array2D,
    /// Exactly six faces.
    Cubemap,
    /// A multiple of six faces.
    CubemapArray,
}

impl TextureLayeredType {
    /// Returns `true` if `layers` is a legal layer count for this type.
    pub fn accepts_layer_count(self, layers: usize) -> bool {
        match self {
            TextureLayeredType::Array2D => layers > 0,
            TextureLayeredType::Cubemap => layers == 6,
            TextureLayeredType::CubemapArray => layers > 0 && layers % 6 == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_sums_present_attributes() {
        let format = ArrayFormat::VERTEX | ArrayFormat::NORMAL | ArrayFormat::TEX_UV;
        assert_eq!(format.vertex_stride(), 32);
        assert_eq!((format | ArrayFormat::INDEX).vertex_stride(), 32);
        assert_eq!(ArrayFormat::all().vertex_stride(), 160);
    }

    #[test]
    fn attribute_offsets_follow_declaration_order() {
        let format = ArrayFormat::VERTEX | ArrayFormat::COLOR | ArrayFormat::TEX_UV;
        assert_eq!(format.attribute_offset(ArrayFormat::VERTEX), Some(0));
        assert_eq!(format.attribute_offset(ArrayFormat::COLOR), Some(12));
        assert_eq!(format.attribute_offset(ArrayFormat::TEX_UV), Some(28));
        assert_eq!(format.attribute_offset(ArrayFormat::NORMAL), None);
        assert_eq!(format.attribute_offset(ArrayFormat::INDEX), None);
    }

    #[test]
    fn primitive_counts() {
        assert_eq!(PrimitiveType::Triangles.primitive_count(6), 2);
        assert_eq!(PrimitiveType::TriangleStrip.primitive_count(6), 4);
        assert_eq!(PrimitiveType::LineStrip.primitive_count(0), 0);
        assert_eq!(PrimitiveType::Lines.element_multiple(), 2);
    }

    #[test]
    fn texture_level_sizes() {
        assert_eq!(TextureFormat::Rgba8.level_size(4, 2), 32);
        assert_eq!(TextureFormat::Bc1.level_size(4, 4), 8);
        assert_eq!(TextureFormat::Bc3.level_size(5, 5), 64);
        assert_eq!(TextureFormat::Bc1.bytes_per_row(8), 16);
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(8, 8), 4);
        assert_eq!(mip_level_count(256, 3), 9);
    }

    #[test]
    fn layered_counts() {
        assert!(TextureLayeredType::Cubemap.accepts_layer_count(6));
        assert!(!TextureLayeredType::Cubemap.accepts_layer_count(12));
        assert!(TextureLayeredType::CubemapArray.accepts_layer_count(12));
        assert!(!TextureLayeredType::Array2D.accepts_layer_count(0));
    }
}
