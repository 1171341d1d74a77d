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

//! Texture store.

use crate::handle::HandleTable;
use thiserror::Error;
use umbra_core::backend::{BackendTextureId, TextureDesc, TextureDimension};
use umbra_core::format::{TextureFormat, TextureLayeredType};
use umbra_core::image::Image;
use umbra_core::{ResourceKind, Rid, ServerError};

/// Rejections of image data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageError {
    /// One dimension is zero.
    #[error("image has a zero dimension ({width}x{height})")]
    ZeroSized {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// The data length disagrees with size, format and mip chain.
    #[error("image data is {actual} bytes, expected {expected}")]
    LengthMismatch {
        /// Bytes implied by the declared shape.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// An update does not match the shape the texture was created with.
    #[error("image is {width}x{height} {format:?}, texture expects {expected_width}x{expected_height} {expected_format:?}")]
    ShapeMismatch {
        /// Supplied width.
        width: u32,
        /// Supplied height.
        height: u32,
        /// Supplied format.
        format: TextureFormat,
        /// Texture width.
        expected_width: u32,
        /// Texture height.
        expected_height: u32,
        /// Texture format.
        expected_format: TextureFormat,
    },
    /// Images of one texture disagree on shape.
    #[error("all layers of a texture must share size, format and mipmaps")]
    InconsistentLayers,
    /// The layer index is past the end.
    #[error("layer {layer} out of range (texture has {layers})")]
    LayerOutOfRange {
        /// Requested layer.
        layer: usize,
        /// Layer count.
        layers: usize,
    },
    /// The layer count does not suit the layered type.
    #[error("{count} layers is not valid for a {layered:?} texture")]
    LayerCount {
        /// Supplied count.
        count: usize,
        /// Requested layered type.
        layered: TextureLayeredType,
    },
    /// The texture has no CPU image that can be updated.
    #[error("texture content cannot be updated from the CPU")]
    NotUpdatable,
}

impl From<ImageError> for ServerError {
    fn from(err: ImageError) -> Self {
        ServerError::MalformedData(err.to_string())
    }
}

/// Where the content of a texture comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    /// A single 2D image.
    Image2D,
    /// Several 2D layers.
    Layered(TextureLayeredType),
    /// A volume built from depth slices.
    Volume,
    /// No content; samples as white.
    Placeholder,
    /// The color output of a viewport.
    ViewportProxy(Rid),
}

/// A texture and its retained CPU data.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Where the content comes from.
    pub source: TextureSource,
    /// Width of the base level.
    pub width: u32,
    /// Height of the base level.
    pub height: u32,
    /// Layers or depth slices; 1 for plain 2D textures.
    pub depth: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Whether the images carry a mip chain.
    pub mipmaps: bool,
    /// One image per layer or slice. Empty for placeholders and proxies.
    pub images: Vec<Image>,
    /// Resource path for tooling.
    pub path: String,
    /// Layers that must be uploaded on the next frame.
    pub dirty_layers: Vec<u32>,
    /// Whether the backend texture must be (re)allocated.
    pub needs_allocation: bool,
    /// The backend texture, once realized.
    pub backend: Option<BackendTextureId>,
    /// Set when the backend cannot hold this format; the texture then samples as white.
    pub cpu_only: bool,
}

impl Texture {
    fn from_images(source: TextureSource, images: Vec<Image>, depth: u32) -> Self {
        let first = &images[0];
        Self {
            source,
            width: first.width,
            height: first.height,
            depth,
            format: first.format,
            mipmaps: first.mipmaps,
            dirty_layers: (0..images.len() as u32).collect(),
            images,
            path: String::new(),
            needs_allocation: true,
            backend: None,
            cpu_only: false,
        }
    }

    /// Whether this texture is realized through the backend at all.
    pub fn has_content(&self) -> bool {
        !self.images.is_empty()
    }

    /// The backend allocation matching this texture.
    pub fn desc(&self) -> TextureDesc {
        let dimension = match self.source {
            TextureSource::Layered(TextureLayeredType::Array2D) => TextureDimension::D2Array,
            TextureSource::Layered(TextureLayeredType::Cubemap) => TextureDimension::Cube,
            TextureSource::Layered(TextureLayeredType::CubemapArray) => {
                TextureDimension::CubeArray
            }
            TextureSource::Volume => TextureDimension::D3,
            _ => TextureDimension::D2,
        };
        TextureDesc {
            width: self.width,
            height: self.height,
            depth_or_layers: self.depth,
            mip_levels: self.images.first().map_or(1, Image::mip_count),
            format: self.format,
            dimension,
        }
    }
}

/// Checks that an image's bytes match its declared shape.
pub fn validate_image(image: &Image) -> Result<(), ImageError> {
    if image.width == 0 || image.height == 0 {
        return Err(ImageError::ZeroSized {
            width: image.width,
            height: image.height,
        });
    }
    let expected = image.expected_len();
    if image.data.len() != expected {
        return Err(ImageError::LengthMismatch {
            expected,
            actual: image.data.len(),
        });
    }
    Ok(())
}

fn validate_layers(images: &[Image]) -> Result<(), ImageError> {
    let first = images.first().ok_or(ImageError::LayerCount {
        count: 0,
        layered: TextureLayeredType::Array2D,
    })?;
    for image in images {
        validate_image(image)?;
        if !image.same_shape(first) {
            return Err(ImageError::InconsistentLayers);
        }
    }
    Ok(())
}

/// Storage for every texture.
#[derive(Debug)]
pub struct TextureStore {
    textures: HandleTable<Texture>,
}

impl Default for TextureStore {
    fn default() -> Self {
        Self {
            textures: HandleTable::new(ResourceKind::Texture),
        }
    }
}

store_access!(TextureStore, Texture, textures);

impl TextureStore {
    /// Creates a 2D texture from one image.
    pub fn create_2d(&mut self, rid: Rid, image: Image) -> Result<(), ServerError> {
        validate_image(&image)?;
        self.textures
            .insert(rid, Texture::from_images(TextureSource::Image2D, vec![image], 1))
    }

    /// Creates a layered texture (array, cubemap, cubemap array).
    pub fn create_layered(
        &mut self,
        rid: Rid,
        images: Vec<Image>,
        layered: TextureLayeredType,
    ) -> Result<(), ServerError> {
        if !layered.accepts_layer_count(images.len()) {
            return Err(ImageError::LayerCount {
                count: images.len(),
                layered,
            }
            .into());
        }
        validate_layers(&images)?;
        let depth = images.len() as u32;
        self.textures.insert(
            rid,
            Texture::from_images(TextureSource::Layered(layered), images, depth),
        )
    }

    /// Creates a 3D texture from `depth` slices of `width` x `height` texels.
    pub fn create_3d(
        &mut self,
        rid: Rid,
        format: TextureFormat,
        width: u32,
        height: u32,
        depth: u32,
        images: Vec<Image>,
    ) -> Result<(), ServerError> {
        if images.len() != depth as usize || depth == 0 {
            return Err(ServerError::MalformedData(format!(
                "3D texture of depth {depth} received {} slices",
                images.len()
            )));
        }
        validate_layers(&images)?;
        let first = &images[0];
        if first.width != width || first.height != height || first.format != format {
            return Err(ImageError::ShapeMismatch {
                width: first.width,
                height: first.height,
                format: first.format,
                expected_width: width,
                expected_height: height,
                expected_format: format,
            }
            .into());
        }
        if first.mipmaps {
            return Err(ServerError::MalformedData(
                "3D texture slices cannot carry their own mip chains".to_string(),
            ));
        }
        self.textures
            .insert(rid, Texture::from_images(TextureSource::Volume, images, depth))
    }

    /// Creates a texture with no content that samples as white.
    pub fn create_placeholder(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.textures.insert(
            rid,
            Texture {
                source: TextureSource::Placeholder,
                width: 1,
                height: 1,
                depth: 1,
                format: TextureFormat::Rgba8,
                mipmaps: false,
                images: Vec::new(),
                path: String::new(),
                dirty_layers: Vec::new(),
                needs_allocation: false,
                backend: None,
                cpu_only: false,
            },
        )
    }

    /// Creates the texture standing for a viewport's color output.
    pub fn create_proxy(
        &mut self,
        rid: Rid,
        viewport: Rid,
        width: u32,
        height: u32,
    ) -> Result<(), ServerError> {
        self.textures.insert(
            rid,
            Texture {
                source: TextureSource::ViewportProxy(viewport),
                width,
                height,
                depth: 1,
                format: TextureFormat::Rgba8,
                mipmaps: false,
                images: Vec::new(),
                path: String::new(),
                dirty_layers: Vec::new(),
                needs_allocation: false,
                backend: None,
                cpu_only: false,
            },
        )
    }

    /// Replaces the content of one layer. The image must match the texture's shape.
    pub fn update(&mut self, rid: Rid, image: Image, layer: usize) -> Result<(), ServerError> {
        let texture = self.textures.lookup_mut(rid)?;
        if !texture.has_content() {
            return Err(ImageError::NotUpdatable.into());
        }
        if layer >= texture.images.len() {
            return Err(ImageError::LayerOutOfRange {
                layer,
                layers: texture.images.len(),
            }
            .into());
        }
        validate_image(&image)?;
        if !image.same_shape(&texture.images[layer]) {
            return Err(ImageError::ShapeMismatch {
                width: image.width,
                height: image.height,
                format: image.format,
                expected_width: texture.width,
                expected_height: texture.height,
                expected_format: texture.format,
            }
            .into());
        }
        texture.images[layer] = image;
        if !texture.dirty_layers.contains(&(layer as u32)) {
            texture.dirty_layers.push(layer as u32);
        }
        Ok(())
    }

    /// Returns the image of a 2D texture.
    pub fn get_2d(&self, rid: Rid) -> Option<Image> {
        let texture = self.textures.get(rid)?;
        match texture.source {
            TextureSource::Image2D => texture.images.first().cloned(),
            _ => None,
        }
    }

    /// Returns one layer of a layered texture or one slice of a volume.
    pub fn get_layer(&self, rid: Rid, layer: usize) -> Option<Image> {
        self.textures.get(rid)?.images.get(layer).cloned()
    }

    /// Size of the base level.
    pub fn size(&self, rid: Rid) -> Option<(u32, u32)> {
        self.textures.get(rid).map(|t| (t.width, t.height))
    }

    /// Texel format.
    pub fn format(&self, rid: Rid) -> Option<TextureFormat> {
        self.textures.get(rid).map(|t| t.format)
    }

    /// Sets the resource path reported to tooling.
    pub fn set_path(&mut self, rid: Rid, path: String) -> Result<(), ServerError> {
        self.textures.lookup_mut(rid)?.path = path;
        Ok(())
    }

    /// Handles of textures with pending uploads or allocations.
    pub fn dirty_handles(&self) -> Vec<Rid> {
        self.textures
            .iter()
            .filter(|(_, t)| !t.cpu_only && (t.needs_allocation || !t.dirty_layers.is_empty()))
            .map(|(rid, _)| rid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(index: u32) -> Rid {
        Rid::from_parts(index, 1, ResourceKind::Texture)
    }

    #[test]
    fn create_2d_validates_length() {
        let mut store = TextureStore::default();
        let bad = Image::new(2, 2, false, TextureFormat::Rgba8, vec![0u8; 15]);
        assert!(matches!(
            store.create_2d(rid(0), bad),
            Err(ServerError::MalformedData(_))
        ));
        assert!(store.is_empty());

        store
            .create_2d(rid(0), Image::filled_rgba8(2, 2, [255; 4]))
            .unwrap();
        assert_eq!(store.size(rid(0)), Some((2, 2)));
        assert_eq!(store.dirty_handles(), vec![rid(0)]);
    }

    #[test]
    fn update_requires_same_shape() {
        let mut store = TextureStore::default();
        store
            .create_2d(rid(0), Image::filled_rgba8(2, 2, [0; 4]))
            .unwrap();
        let texture = store.get_mut(rid(0)).unwrap();
        texture.dirty_layers.clear();

        let wrong = Image::filled_rgba8(4, 4, [0; 4]);
        assert!(store.update(rid(0), wrong, 0).is_err());
        assert!(store.get(rid(0)).unwrap().dirty_layers.is_empty());

        let right = Image::filled_rgba8(2, 2, [9; 4]);
        store.update(rid(0), right.clone(), 0).unwrap();
        assert_eq!(store.get_2d(rid(0)), Some(right));
        assert_eq!(store.get(rid(0)).unwrap().dirty_layers, vec![0]);
        assert!(store
            .update(rid(0), Image::filled_rgba8(2, 2, [0; 4]), 1)
            .is_err());
    }

    #[test]
    fn cubemap_needs_six_matching_faces() {
        let mut store = TextureStore::default();
        let face = Image::filled_rgba8(4, 4, [0; 4]);
        assert!(store
            .create_layered(rid(1), vec![face.clone(); 5], TextureLayeredType::Cubemap)
            .is_err());

        let mut faces = vec![face.clone(); 6];
        faces[3] = Image::filled_rgba8(2, 2, [0; 4]);
        assert!(store
            .create_layered(rid(1), faces, TextureLayeredType::Cubemap)
            .is_err());

        store
            .create_layered(rid(1), vec![face; 6], TextureLayeredType::Cubemap)
            .unwrap();
        let desc = store.get(rid(1)).unwrap().desc();
        assert_eq!(desc.dimension, TextureDimension::Cube);
        assert_eq!(desc.depth_or_layers, 6);
        assert!(store.get_2d(rid(1)).is_none());
        assert!(store.get_layer(rid(1), 5).is_some());
    }

    #[test]
    fn placeholder_and_proxy_are_not_updatable() {
        let mut store = TextureStore::default();
        store.create_placeholder(rid(0)).unwrap();
        let viewport = Rid::from_parts(9, 1, ResourceKind::Viewport);
        store.create_proxy(rid(1), viewport, 64, 32).unwrap();

        assert!(store
            .update(rid(0), Image::filled_rgba8(1, 1, [0; 4]), 0)
            .is_err());
        assert_eq!(store.size(rid(1)), Some((64, 32)));
        assert!(store.dirty_handles().is_empty());
    }

    #[test]
    fn volume_checks_slice_count() {
        let mut store = TextureStore::default();
        let slice = Image::filled_rgba8(2, 2, [0; 4]);
        assert!(store
            .create_3d(rid(0), TextureFormat::Rgba8, 2, 2, 3, vec![slice.clone(); 2])
            .is_err());
        store
            .create_3d(rid(0), TextureFormat::Rgba8, 2, 2, 3, vec![slice; 3])
            .unwrap();
        assert_eq!(store.get(rid(0)).unwrap().desc().dimension, TextureDimension::D3);
    }
}
