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

//! Raw CPU-side image data as supplied by the asset layer.

use crate::format::{mip_level_count, TextureFormat};
use std::sync::Arc;

/// A CPU image: dimensions, format, an optional mip chain, and tightly packed bytes.
///
/// The pixel bytes are shared, so retaining an image in a store and handing it to a
/// backend for upload does not copy the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Width of the base level, in texels.
    pub width: u32,
    /// Height of the base level, in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Whether `data` holds a full mip chain after the base level.
    pub mipmaps: bool,
    /// Every level, base level first, tightly packed.
    pub data: Arc<[u8]>,
}

impl Image {
    /// Creates an image. The data is not checked; see [`Image::expected_len`].
    pub fn new(
        width: u32,
        height: u32,
        mipmaps: bool,
        format: TextureFormat,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            mipmaps,
            data: data.into(),
        }
    }

    /// Creates a single-level image filled with one RGBA8 color.
    pub fn filled_rgba8(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let texels = width as usize * height as usize;
        let data: Vec<u8> = rgba.iter().copied().cycle().take(texels * 4).collect();
        Self::new(width, height, false, TextureFormat::Rgba8, data)
    }

    /// Number of mip levels held in `data`.
    pub fn mip_count(&self) -> u32 {
        if self.mipmaps {
            mip_level_count(self.width, self.height)
        } else {
            1
        }
    }

    /// Byte length `data` must have for the declared size, format and mip chain.
    pub fn expected_len(&self) -> usize {
        (0..self.mip_count())
            .map(|level| {
                let (w, h) = self.level_extent(level);
                self.format.level_size(w, h)
            })
            .sum()
    }

    /// Size of mip `level`.
    pub fn level_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Byte range of mip `level` inside `data`.
    pub fn level_range(&self, level: u32) -> std::ops::Range<usize> {
        let start: usize = (0..level)
            .map(|l| {
                let (w, h) = self.level_extent(l);
                self.format.level_size(w, h)
            })
            .sum();
        let (w, h) = self.level_extent(level);
        start..start + self.format.level_size(w, h)
    }

    /// Returns `true` if both images have the same size, format and mip chain.
    pub fn same_shape(&self, other: &Image) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.mipmaps == other.mipmaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_covers_mip_chain() {
        let image = Image::new(4, 4, true, TextureFormat::Rgba8, vec![0u8; 0]);
        assert_eq!(image.mip_count(), 3);
        assert_eq!(image.expected_len(), 64 + 16 + 4);
        assert_eq!(image.level_range(1), 64..80);
        assert_eq!(image.level_range(2), 80..84);
    }

    #[test]
    fn filled_image_has_expected_len() {
        let image = Image::filled_rgba8(3, 2, [1, 2, 3, 4]);
        assert_eq!(image.data.len(), image.expected_len());
        assert_eq!(&image.data[4..8], &[1, 2, 3, 4]);
    }
}
