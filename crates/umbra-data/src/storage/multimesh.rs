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

//! MultiMesh store: one mesh drawn many times from a fixed-stride float buffer.
//!
//! Per instance the buffer holds the transform (8 floats for 2D, 12 for 3D, row
//! major), then the color (4 floats) if enabled, then the custom data (4 floats)
//! if enabled.

use crate::handle::HandleTable;
use thiserror::Error;
use umbra_core::backend::{BackendBufferId, INSTANCE_FLOATS};
use umbra_core::format::MultimeshTransformFormat;
use umbra_core::math::{Aabb, Color, Mat4, Transform2D};
use umbra_core::{ResourceKind, Rid, ServerError};

/// Rejections of multimesh operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MultiMeshError {
    /// The instance index is past the end.
    #[error("instance {index} out of range for {count} instances")]
    InstanceOutOfRange {
        /// Requested index.
        index: usize,
        /// Allocated instances.
        count: usize,
    },
    /// The setter does not match the allocated transform format.
    #[error("multimesh stores {actual:?} transforms")]
    TransformFormat {
        /// The allocated format.
        actual: MultimeshTransformFormat,
    },
    /// Colors were not enabled at allocation.
    #[error("multimesh has no per-instance colors")]
    NoColors,
    /// Custom data was not enabled at allocation.
    #[error("multimesh has no per-instance custom data")]
    NoCustomData,
    /// A whole-buffer write has the wrong length.
    #[error("buffer has {actual} floats, expected {expected}")]
    BufferLength {
        /// instances x stride.
        expected: usize,
        /// Floats supplied.
        actual: usize,
    },
    /// The visible count is neither -1 nor within the allocation.
    #[error("visible instance count {requested} exceeds {count}")]
    VisibleInstances {
        /// Requested count.
        requested: i32,
        /// Allocated instances.
        count: usize,
    },
}

impl From<MultiMeshError> for ServerError {
    fn from(err: MultiMeshError) -> Self {
        ServerError::MalformedData(err.to_string())
    }
}

/// A multimesh resource.
#[derive(Debug, Clone, Default)]
pub struct MultiMesh {
    /// The mesh drawn per instance, or [`Rid::INVALID`].
    pub mesh: Rid,
    /// Allocated instances.
    pub instance_count: usize,
    /// 2D or 3D transforms.
    pub transform_format: MultimeshTransformFormat,
    /// Whether a color follows each transform.
    pub use_colors: bool,
    /// Whether custom data follows each color.
    pub use_custom_data: bool,
    /// The instance buffer.
    pub buffer: Vec<f32>,
    /// Instances drawn; -1 draws all.
    pub visible_instances: i32,
    /// The realized instance buffer.
    pub backend: Option<BackendBufferId>,
    /// The instance buffer must be uploaded again.
    pub dirty: bool,
}

impl MultiMesh {
    /// Floats per instance.
    pub fn stride(&self) -> usize {
        self.transform_format.float_count()
            + if self.use_colors { 4 } else { 0 }
            + if self.use_custom_data { 4 } else { 0 }
    }

    /// Number of instances drawn.
    pub fn visible_count(&self) -> usize {
        if self.visible_instances < 0 {
            self.instance_count
        } else {
            (self.visible_instances as usize).min(self.instance_count)
        }
    }

    fn instance(&self, index: usize) -> Result<&[f32], MultiMeshError> {
        if index >= self.instance_count {
            return Err(MultiMeshError::InstanceOutOfRange {
                index,
                count: self.instance_count,
            });
        }
        let stride = self.stride();
        Ok(&self.buffer[index * stride..(index + 1) * stride])
    }

    fn instance_mut(&mut self, index: usize) -> Result<&mut [f32], MultiMeshError> {
        if index >= self.instance_count {
            return Err(MultiMeshError::InstanceOutOfRange {
                index,
                count: self.instance_count,
            });
        }
        let stride = self.stride();
        self.dirty = true;
        Ok(&mut self.buffer[index * stride..(index + 1) * stride])
    }

    fn color_offset(&self) -> Result<usize, MultiMeshError> {
        if !self.use_colors {
            return Err(MultiMeshError::NoColors);
        }
        Ok(self.transform_format.float_count())
    }

    fn custom_offset(&self) -> Result<usize, MultiMeshError> {
        if !self.use_custom_data {
            return Err(MultiMeshError::NoCustomData);
        }
        Ok(self.transform_format.float_count() + if self.use_colors { 4 } else { 0 })
    }

    fn require(&self, format: MultimeshTransformFormat) -> Result<(), MultiMeshError> {
        if self.transform_format != format {
            return Err(MultiMeshError::TransformFormat {
                actual: self.transform_format,
            });
        }
        Ok(())
    }

    /// Transform of one instance as a 3D matrix, whatever the stored format.
    pub fn instance_matrix(&self, index: usize) -> Option<Mat4> {
        let floats = self.instance(index).ok()?;
        let mut rows = [0.0f32; 12];
        match self.transform_format {
            MultimeshTransformFormat::Transform3D => rows.copy_from_slice(&floats[..12]),
            MultimeshTransformFormat::Transform2D => {
                rows[..8].copy_from_slice(&floats[..8]);
                rows[10] = 1.0;
            }
        }
        Some(Mat4::from_rows_3x4(&rows))
    }

    /// Visible instances in the backend layout: a 3x4 row-major transform followed
    /// by an RGBA color (white without per-instance colors).
    pub fn canonical_instances(&self) -> Vec<f32> {
        let count = self.visible_count();
        let mut out = Vec::with_capacity(count * INSTANCE_FLOATS);
        for index in 0..count {
            let Some(matrix) = self.instance_matrix(index) else {
                break;
            };
            out.extend_from_slice(&matrix.to_rows_3x4());
            let color = match self.color_offset() {
                Ok(offset) => {
                    let floats = &self.buffer[index * self.stride()..];
                    [
                        floats[offset],
                        floats[offset + 1],
                        floats[offset + 2],
                        floats[offset + 3],
                    ]
                }
                Err(_) => Color::WHITE.to_array(),
            };
            out.extend_from_slice(&color);
        }
        out
    }

    /// Bounds of the visible instances given the bounds of the drawn mesh.
    pub fn aabb(&self, mesh_aabb: Aabb) -> Aabb {
        if !mesh_aabb.is_valid() {
            return Aabb::INVALID;
        }
        (0..self.visible_count())
            .filter_map(|i| self.instance_matrix(i))
            .fold(Aabb::INVALID, |acc, m| acc.merge(&mesh_aabb.transform(&m)))
    }
}

/// Storage for every multimesh.
#[derive(Debug)]
pub struct MultiMeshStore {
    multimeshes: HandleTable<MultiMesh>,
}

impl Default for MultiMeshStore {
    fn default() -> Self {
        Self {
            multimeshes: HandleTable::new(ResourceKind::MultiMesh),
        }
    }
}

store_access!(MultiMeshStore, MultiMesh, multimeshes);

impl MultiMeshStore {
    /// Creates an empty multimesh.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.multimeshes.insert(
            rid,
            MultiMesh {
                visible_instances: -1,
                ..MultiMesh::default()
            },
        )
    }

    /// (Re)allocates the instance buffer. Every instance starts with the identity
    /// transform, white color and zero custom data; all instances become visible.
    pub fn allocate_data(
        &mut self,
        rid: Rid,
        instances: usize,
        transform_format: MultimeshTransformFormat,
        use_colors: bool,
        use_custom_data: bool,
    ) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        mm.instance_count = instances;
        mm.transform_format = transform_format;
        mm.use_colors = use_colors;
        mm.use_custom_data = use_custom_data;
        mm.visible_instances = -1;

        let mut template = match transform_format {
            MultimeshTransformFormat::Transform2D => Transform2D::IDENTITY.to_rows_2x4().to_vec(),
            MultimeshTransformFormat::Transform3D => Mat4::IDENTITY.to_rows_3x4().to_vec(),
        };
        if use_colors {
            template.extend_from_slice(&Color::WHITE.to_array());
        }
        if use_custom_data {
            template.extend_from_slice(&[0.0; 4]);
        }
        mm.buffer = template.repeat(instances);
        mm.dirty = true;
        Ok(())
    }

    /// Allocated instances; 0 for unknown handles.
    pub fn instance_count(&self, rid: Rid) -> usize {
        self.multimeshes.get(rid).map_or(0, |m| m.instance_count)
    }

    /// Sets the drawn mesh.
    pub fn set_mesh(&mut self, rid: Rid, mesh: Rid) -> Result<(), ServerError> {
        if mesh.is_valid() {
            ServerError::check_kind(mesh, ResourceKind::Mesh)?;
        }
        self.multimeshes.lookup_mut(rid)?.mesh = mesh;
        Ok(())
    }

    /// The drawn mesh.
    pub fn mesh(&self, rid: Rid) -> Rid {
        self.multimeshes.get(rid).map_or(Rid::INVALID, |m| m.mesh)
    }

    /// Sets the 3D transform of one instance.
    pub fn instance_set_transform(
        &mut self,
        rid: Rid,
        index: usize,
        transform: &Mat4,
    ) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        mm.require(MultimeshTransformFormat::Transform3D)?;
        mm.instance_mut(index)?[..12].copy_from_slice(&transform.to_rows_3x4());
        Ok(())
    }

    /// The 3D transform of one instance.
    pub fn instance_get_transform(&self, rid: Rid, index: usize) -> Result<Mat4, ServerError> {
        let mm = self.multimeshes.lookup(rid)?;
        mm.require(MultimeshTransformFormat::Transform3D)?;
        let mut rows = [0.0; 12];
        rows.copy_from_slice(&mm.instance(index)?[..12]);
        Ok(Mat4::from_rows_3x4(&rows))
    }

    /// Sets the 2D transform of one instance.
    pub fn instance_set_transform_2d(
        &mut self,
        rid: Rid,
        index: usize,
        transform: &Transform2D,
    ) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        mm.require(MultimeshTransformFormat::Transform2D)?;
        mm.instance_mut(index)?[..8].copy_from_slice(&transform.to_rows_2x4());
        Ok(())
    }

    /// The 2D transform of one instance.
    pub fn instance_get_transform_2d(
        &self,
        rid: Rid,
        index: usize,
    ) -> Result<Transform2D, ServerError> {
        let mm = self.multimeshes.lookup(rid)?;
        mm.require(MultimeshTransformFormat::Transform2D)?;
        let mut rows = [0.0; 8];
        rows.copy_from_slice(&mm.instance(index)?[..8]);
        Ok(Transform2D::from_rows_2x4(&rows))
    }

    /// Sets the color of one instance.
    pub fn instance_set_color(
        &mut self,
        rid: Rid,
        index: usize,
        color: Color,
    ) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        let offset = mm.color_offset()?;
        mm.instance_mut(index)?[offset..offset + 4].copy_from_slice(&color.to_array());
        Ok(())
    }

    /// The color of one instance.
    pub fn instance_get_color(&self, rid: Rid, index: usize) -> Result<Color, ServerError> {
        let mm = self.multimeshes.lookup(rid)?;
        let offset = mm.color_offset()?;
        let c = &mm.instance(index)?[offset..offset + 4];
        Ok(Color::rgba(c[0], c[1], c[2], c[3]))
    }

    /// Sets the custom data of one instance.
    pub fn instance_set_custom_data(
        &mut self,
        rid: Rid,
        index: usize,
        data: [f32; 4],
    ) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        let offset = mm.custom_offset()?;
        mm.instance_mut(index)?[offset..offset + 4].copy_from_slice(&data);
        Ok(())
    }

    /// The custom data of one instance.
    pub fn instance_get_custom_data(&self, rid: Rid, index: usize) -> Result<[f32; 4], ServerError> {
        let mm = self.multimeshes.lookup(rid)?;
        let offset = mm.custom_offset()?;
        let mut out = [0.0; 4];
        out.copy_from_slice(&mm.instance(index)?[offset..offset + 4]);
        Ok(out)
    }

    /// Replaces the whole instance buffer.
    ///
    /// ## Errors
    /// * `ServerError::MalformedData` - If `buffer.len()` is not instances x stride.
    pub fn set_buffer(&mut self, rid: Rid, buffer: Vec<f32>) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        let expected = mm.instance_count * mm.stride();
        if buffer.len() != expected {
            return Err(MultiMeshError::BufferLength {
                expected,
                actual: buffer.len(),
            }
            .into());
        }
        mm.buffer = buffer;
        mm.dirty = true;
        Ok(())
    }

    /// A copy of the instance buffer.
    pub fn buffer(&self, rid: Rid) -> Vec<f32> {
        self.multimeshes
            .get(rid)
            .map(|m| m.buffer.clone())
            .unwrap_or_default()
    }

    /// Limits the drawn instances. -1 draws all.
    pub fn set_visible_instances(&mut self, rid: Rid, visible: i32) -> Result<(), ServerError> {
        let mm = self.multimeshes.lookup_mut(rid)?;
        if visible < -1 || (visible >= 0 && visible as usize > mm.instance_count) {
            return Err(MultiMeshError::VisibleInstances {
                requested: visible,
                count: mm.instance_count,
            }
            .into());
        }
        mm.visible_instances = visible;
        mm.dirty = true;
        Ok(())
    }

    /// The visible instance setting; -1 for unknown handles.
    pub fn visible_instances(&self, rid: Rid) -> i32 {
        self.multimeshes.get(rid).map_or(-1, |m| m.visible_instances)
    }

    /// Handles with instance buffers waiting for upload.
    pub fn dirty_handles(&self) -> Vec<Rid> {
        self.multimeshes
            .iter()
            .filter(|(_, m)| m.dirty)
            .map(|(rid, _)| rid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::{Vec2, Vec3};

    fn mm(index: u32) -> Rid {
        Rid::from_parts(index, 1, ResourceKind::MultiMesh)
    }

    #[test]
    fn stride_follows_flags() {
        let mut store = MultiMeshStore::default();
        store.create(mm(0)).unwrap();
        store
            .allocate_data(mm(0), 4, MultimeshTransformFormat::Transform3D, true, true)
            .unwrap();
        assert_eq!(store.get(mm(0)).unwrap().stride(), 20);
        assert_eq!(store.buffer(mm(0)).len(), 80);

        store
            .allocate_data(mm(0), 4, MultimeshTransformFormat::Transform2D, false, true)
            .unwrap();
        assert_eq!(store.get(mm(0)).unwrap().stride(), 12);
    }

    #[test]
    fn buffer_length_is_validated() {
        let mut store = MultiMeshStore::default();
        store.create(mm(0)).unwrap();
        store
            .allocate_data(mm(0), 2, MultimeshTransformFormat::Transform3D, true, false)
            .unwrap();
        let before = store.buffer(mm(0));
        assert!(matches!(
            store.set_buffer(mm(0), vec![0.0; 31]),
            Err(ServerError::MalformedData(_))
        ));
        assert_eq!(store.buffer(mm(0)), before);
        store.set_buffer(mm(0), vec![0.0; 32]).unwrap();
    }

    #[test]
    fn transform_format_must_match() {
        let mut store = MultiMeshStore::default();
        store.create(mm(0)).unwrap();
        store
            .allocate_data(mm(0), 1, MultimeshTransformFormat::Transform2D, false, false)
            .unwrap();
        assert!(store
            .instance_set_transform(mm(0), 0, &Mat4::IDENTITY)
            .is_err());
        let t = Transform2D::from_translation(Vec2::new(3.0, 4.0));
        store.instance_set_transform_2d(mm(0), 0, &t).unwrap();
        assert_eq!(store.instance_get_transform_2d(mm(0), 0).unwrap(), t);
        assert!(store.instance_set_transform_2d(mm(0), 1, &t).is_err());
    }

    #[test]
    fn colors_require_the_flag() {
        let mut store = MultiMeshStore::default();
        store.create(mm(0)).unwrap();
        store
            .allocate_data(mm(0), 2, MultimeshTransformFormat::Transform3D, false, false)
            .unwrap();
        assert!(store.instance_set_color(mm(0), 0, Color::BLACK).is_err());

        store
            .allocate_data(mm(0), 2, MultimeshTransformFormat::Transform3D, true, true)
            .unwrap();
        store.instance_set_color(mm(0), 1, Color::BLACK).unwrap();
        store
            .instance_set_custom_data(mm(0), 1, [1.0, 2.0, 3.0, 4.0])
            .unwrap();
        assert_eq!(store.instance_get_color(mm(0), 1).unwrap(), Color::BLACK);
        assert_eq!(store.instance_get_color(mm(0), 0).unwrap(), Color::WHITE);
        assert_eq!(
            store.instance_get_custom_data(mm(0), 1).unwrap(),
            [1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn canonical_layout_and_bounds() {
        let mut store = MultiMeshStore::default();
        store.create(mm(0)).unwrap();
        store
            .allocate_data(mm(0), 3, MultimeshTransformFormat::Transform3D, false, false)
            .unwrap();
        store
            .instance_set_transform(mm(0), 1, &Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        store.set_visible_instances(mm(0), 2).unwrap();

        let mm0 = store.get(mm(0)).unwrap();
        let instances = mm0.canonical_instances();
        assert_eq!(instances.len(), 2 * INSTANCE_FLOATS);
        assert_eq!(instances[16 + 3], 10.0);
        assert_eq!(&instances[12..16], &[1.0, 1.0, 1.0, 1.0]);

        let unit = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let bounds = mm0.aabb(unit);
        assert_eq!(bounds.min, Vec3::splat(-1.0));
        assert_eq!(bounds.max, Vec3::new(11.0, 1.0, 1.0));

        assert!(store.set_visible_instances(mm(0), 4).is_err());
        assert_eq!(store.visible_instances(mm(0)), 2);
    }
}
