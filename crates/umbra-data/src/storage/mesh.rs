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

//! Mesh store.
//!
//! A mesh is a list of surfaces. Each surface carries interleaved vertex bytes laid
//! out according to its [`ArrayFormat`], an optional index buffer, a bounding box and
//! a material. Every surface is validated in full before it is accepted.

use crate::handle::HandleTable;
use std::ops::Range;
use thiserror::Error;
use umbra_core::backend::{BackendSurfaceId, IndexFormat, SurfaceUpload};
use umbra_core::format::{ArrayFormat, PrimitiveType};
use umbra_core::math::{Aabb, Color, Vec2, Vec3};
use umbra_core::{ResourceKind, Rid, ServerError};

/// Maximum number of surfaces per mesh.
pub const MAX_SURFACES: usize = 256;

/// Rejections of surface data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SurfaceError {
    /// Every surface needs positions.
    #[error("surface format lacks VERTEX")]
    MissingVertex,
    /// Tangents are only meaningful with normals.
    #[error("surface format has TANGENT without NORMAL")]
    TangentWithoutNormal,
    /// Skinning needs both bone indices and weights.
    #[error("surface format must have both BONES and WEIGHTS or neither")]
    BonesWithoutWeights,
    /// The INDEX flag disagrees with the presence of index data.
    #[error("INDEX flag is {flag} but index data present is {has_data}")]
    IndexFlagMismatch {
        /// Whether the format has INDEX.
        flag: bool,
        /// Whether index bytes were supplied.
        has_data: bool,
    },
    /// A surface needs at least one vertex.
    #[error("surface has no vertices")]
    Empty,
    /// The vertex bytes disagree with the format and count.
    #[error("vertex data is {actual} bytes, expected {expected}")]
    VertexLength {
        /// vertex_count x stride.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// The index bytes disagree with the count and index width.
    #[error("index data is {actual} bytes, expected {expected}")]
    IndexLength {
        /// index_count x index width.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// An index points past the last vertex.
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// Vertex count of the surface.
        vertex_count: usize,
    },
    /// The element count does not form whole primitives.
    #[error("{count} elements do not form whole {primitive:?}")]
    PrimitiveCount {
        /// Topology.
        primitive: PrimitiveType,
        /// Vertex or index count.
        count: usize,
    },
    /// A typed array has the wrong length.
    #[error("{attribute} array has {actual} entries, expected {expected}")]
    ArrayLength {
        /// Attribute name.
        attribute: &'static str,
        /// Number of positions.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },
    /// The mesh already has the maximum number of surfaces.
    #[error("mesh already has {MAX_SURFACES} surfaces")]
    TooManySurfaces,
    /// The surface index is past the end.
    #[error("surface {0} does not exist")]
    NoSuchSurface(usize),
    /// A region update falls outside the vertex buffer.
    #[error("region {offset}..{end} exceeds vertex buffer of {size} bytes")]
    RegionOutOfBounds {
        /// Start of the region.
        offset: usize,
        /// End of the region.
        end: usize,
        /// Size of the vertex buffer.
        size: usize,
    },
}

impl From<SurfaceError> for ServerError {
    fn from(err: SurfaceError) -> Self {
        ServerError::MalformedData(err.to_string())
    }
}

/// Raw surface input: interleaved vertex bytes plus optional index bytes.
#[derive(Debug, Clone, Default)]
pub struct SurfaceData {
    /// Attributes present in `vertex_data`.
    pub format: ArrayFormat,
    /// Topology.
    pub primitive: PrimitiveType,
    /// Interleaved vertex bytes.
    pub vertex_data: Vec<u8>,
    /// Number of vertices.
    pub vertex_count: usize,
    /// Index bytes: `u16` when `vertex_count <= 65535`, `u32` otherwise.
    pub index_data: Vec<u8>,
    /// Number of indices.
    pub index_count: usize,
    /// Bounding box; computed from positions when `None`.
    pub aabb: Option<Aabb>,
    /// Material, or [`Rid::INVALID`].
    pub material: Rid,
}

/// Typed per-attribute arrays, packed into [`SurfaceData`] by [`SurfaceArrays::pack`].
///
/// An empty array means the attribute is absent. Non-empty arrays must have one entry
/// per position.
#[derive(Debug, Clone, Default)]
pub struct SurfaceArrays {
    /// Positions.
    pub positions: Vec<Vec3>,
    /// Normals.
    pub normals: Vec<Vec3>,
    /// Tangents, `w` holding the binormal sign.
    pub tangents: Vec<[f32; 4]>,
    /// Vertex colors.
    pub colors: Vec<Color>,
    /// Primary texture coordinates.
    pub uvs: Vec<Vec2>,
    /// Secondary texture coordinates.
    pub uv2s: Vec<Vec2>,
    /// Custom channels 0 to 3.
    pub custom: [Vec<[f32; 4]>; 4],
    /// Bone indices.
    pub bones: Vec<[u16; 4]>,
    /// Bone weights.
    pub weights: Vec<[f32; 4]>,
    /// Indices; empty for non-indexed surfaces.
    pub indices: Vec<u32>,
}

impl SurfaceArrays {
    /// Derives the format from the non-empty arrays and interleaves them.
    ///
    /// ## Errors
    /// * `SurfaceError::ArrayLength` - If an array length differs from the position count.
    pub fn pack(&self, primitive: PrimitiveType) -> Result<SurfaceData, SurfaceError> {
        let n = self.positions.len();
        let mut format = ArrayFormat::empty();
        let mut check = |flag: ArrayFormat, attribute: &'static str, len: usize| {
            if len == 0 {
                Ok(())
            } else if len != n {
                Err(SurfaceError::ArrayLength {
                    attribute,
                    expected: n,
                    actual: len,
                })
            } else {
                format |= flag;
                Ok(())
            }
        };
        check(ArrayFormat::VERTEX, "positions", n)?;
        check(ArrayFormat::NORMAL, "normals", self.normals.len())?;
        check(ArrayFormat::TANGENT, "tangents", self.tangents.len())?;
        check(ArrayFormat::COLOR, "colors", self.colors.len())?;
        check(ArrayFormat::TEX_UV, "uvs", self.uvs.len())?;
        check(ArrayFormat::TEX_UV2, "uv2s", self.uv2s.len())?;
        let custom_flags = [
            ArrayFormat::CUSTOM0,
            ArrayFormat::CUSTOM1,
            ArrayFormat::CUSTOM2,
            ArrayFormat::CUSTOM3,
        ];
        for (flag, channel) in custom_flags.iter().zip(self.custom.iter()) {
            check(*flag, "custom", channel.len())?;
        }
        check(ArrayFormat::BONES, "bones", self.bones.len())?;
        check(ArrayFormat::WEIGHTS, "weights", self.weights.len())?;

        let mut vertex_data = Vec::with_capacity(n * format.vertex_stride());
        for i in 0..n {
            let mut put = |flag: ArrayFormat, bytes: &[u8]| {
                if format.contains(flag) {
                    vertex_data.extend_from_slice(bytes);
                }
            };
            put(ArrayFormat::VERTEX, bytemuck::bytes_of(&self.positions[i]));
            if let Some(v) = self.normals.get(i) {
                put(ArrayFormat::NORMAL, bytemuck::bytes_of(v));
            }
            if let Some(v) = self.tangents.get(i) {
                put(ArrayFormat::TANGENT, bytemuck::bytes_of(v));
            }
            if let Some(v) = self.colors.get(i) {
                put(ArrayFormat::COLOR, bytemuck::bytes_of(v));
            }
            if let Some(v) = self.uvs.get(i) {
                put(ArrayFormat::TEX_UV, bytemuck::bytes_of(v));
            }
            if let Some(v) = self.uv2s.get(i) {
                put(ArrayFormat::TEX_UV2, bytemuck::bytes_of(v));
            }
            for (flag, channel) in custom_flags.iter().zip(self.custom.iter()) {
                if let Some(v) = channel.get(i) {
                    put(*flag, bytemuck::bytes_of(v));
                }
            }
            if let Some(v) = self.bones.get(i) {
                put(ArrayFormat::BONES, bytemuck::bytes_of(v));
            }
            if let Some(v) = self.weights.get(i) {
                put(ArrayFormat::WEIGHTS, bytemuck::bytes_of(v));
            }
        }

        let index_data = match IndexFormat::for_vertex_count(n) {
            IndexFormat::U16 => self
                .indices
                .iter()
                .flat_map(|&i| (i.min(u16::MAX as u32) as u16).to_ne_bytes())
                .collect(),
            IndexFormat::U32 => self.indices.iter().flat_map(|i| i.to_ne_bytes()).collect(),
        };
        if !self.indices.is_empty() {
            format |= ArrayFormat::INDEX;
        }

        Ok(SurfaceData {
            format,
            primitive,
            vertex_data,
            vertex_count: n,
            index_data,
            index_count: self.indices.len(),
            aabb: None,
            material: Rid::INVALID,
        })
    }
}

/// A validated surface.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Attributes present.
    pub format: ArrayFormat,
    /// Topology.
    pub primitive: PrimitiveType,
    /// Interleaved vertex bytes.
    pub vertex_data: Vec<u8>,
    /// Number of vertices.
    pub vertex_count: usize,
    /// Index bytes.
    pub index_data: Vec<u8>,
    /// Number of indices.
    pub index_count: usize,
    /// Width of the indices.
    pub index_format: IndexFormat,
    /// Bounding box in mesh space.
    pub aabb: Aabb,
    /// Material, or [`Rid::INVALID`].
    pub material: Rid,
    /// The backend surface, once realized.
    pub backend: Option<BackendSurfaceId>,
    /// The whole surface must be uploaded.
    pub needs_upload: bool,
    /// Vertex byte ranges to refresh on an already uploaded surface.
    pub dirty_regions: Vec<Range<usize>>,
}

impl Surface {
    /// Number of elements drawn: indices when indexed, vertices otherwise.
    pub fn element_count(&self) -> usize {
        if self.format.contains(ArrayFormat::INDEX) {
            self.index_count
        } else {
            self.vertex_count
        }
    }

    /// Number of primitives one draw of this surface produces.
    pub fn primitive_count(&self) -> u64 {
        self.primitive.primitive_count(self.element_count()) as u64
    }

    fn read_attribute<T: bytemuck::Pod>(&self, attribute: ArrayFormat, vertex: usize) -> Option<T> {
        let offset = self.format.attribute_offset(attribute)?;
        let start = vertex * self.format.vertex_stride() + offset;
        let bytes = self.vertex_data.get(start..start + std::mem::size_of::<T>())?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Position of one vertex.
    pub fn position(&self, vertex: usize) -> Vec3 {
        self.read_attribute(ArrayFormat::VERTEX, vertex)
            .unwrap_or(Vec3::ZERO)
    }

    /// Primary UV of one vertex, zero when absent.
    pub fn uv(&self, vertex: usize) -> Vec2 {
        self.read_attribute(ArrayFormat::TEX_UV, vertex)
            .unwrap_or(Vec2::ZERO)
    }

    /// Color of one vertex, white when absent.
    pub fn color(&self, vertex: usize) -> Color {
        self.read_attribute(ArrayFormat::COLOR, vertex)
            .unwrap_or(Color::WHITE)
    }

    /// Decoded indices; `0..vertex_count` for non-indexed surfaces.
    pub fn indices(&self) -> Vec<u32> {
        if !self.format.contains(ArrayFormat::INDEX) {
            return (0..self.vertex_count as u32).collect();
        }
        match self.index_format {
            IndexFormat::U16 => self
                .index_data
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
                .collect(),
            IndexFormat::U32 => self
                .index_data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        }
    }

    fn compute_aabb(&self) -> Aabb {
        Aabb::from_points((0..self.vertex_count).map(|v| self.position(v)))
            .unwrap_or(Aabb::INVALID)
    }

    /// The data handed to the backend for upload.
    pub fn upload(&self) -> SurfaceUpload<'_> {
        SurfaceUpload {
            format: self.format,
            primitive: self.primitive,
            vertex_data: &self.vertex_data,
            vertex_count: self.vertex_count as u32,
            index_data: &self.index_data,
            index_count: self.index_count as u32,
            index_format: self.index_format,
        }
    }
}

/// Checks every consistency rule of a surface.
pub fn validate_surface(data: &SurfaceData) -> Result<IndexFormat, SurfaceError> {
    let format = data.format;
    if !format.contains(ArrayFormat::VERTEX) {
        return Err(SurfaceError::MissingVertex);
    }
    if format.contains(ArrayFormat::TANGENT) && !format.contains(ArrayFormat::NORMAL) {
        return Err(SurfaceError::TangentWithoutNormal);
    }
    if format.contains(ArrayFormat::BONES) != format.contains(ArrayFormat::WEIGHTS) {
        return Err(SurfaceError::BonesWithoutWeights);
    }
    let indexed = format.contains(ArrayFormat::INDEX);
    let has_index_data = data.index_count > 0 || !data.index_data.is_empty();
    if indexed != has_index_data {
        return Err(SurfaceError::IndexFlagMismatch {
            flag: indexed,
            has_data: has_index_data,
        });
    }
    if data.vertex_count == 0 {
        return Err(SurfaceError::Empty);
    }
    let expected = data.vertex_count * format.vertex_stride();
    if data.vertex_data.len() != expected {
        return Err(SurfaceError::VertexLength {
            expected,
            actual: data.vertex_data.len(),
        });
    }
    let index_format = IndexFormat::for_vertex_count(data.vertex_count);
    let element_count = if indexed {
        let expected = data.index_count * index_format.size();
        if data.index_data.len() != expected {
            return Err(SurfaceError::IndexLength {
                expected,
                actual: data.index_data.len(),
            });
        }
        let out_of_range = match index_format {
            IndexFormat::U16 => data
                .index_data
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
                .find(|&i| i as usize >= data.vertex_count),
            IndexFormat::U32 => data
                .index_data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .find(|&i| i as usize >= data.vertex_count),
        };
        if let Some(index) = out_of_range {
            return Err(SurfaceError::IndexOutOfRange {
                index,
                vertex_count: data.vertex_count,
            });
        }
        data.index_count
    } else {
        data.vertex_count
    };
    if element_count % data.primitive.element_multiple() != 0 {
        return Err(SurfaceError::PrimitiveCount {
            primitive: data.primitive,
            count: element_count,
        });
    }
    Ok(index_format)
}

/// A mesh resource.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Surfaces in insertion order.
    pub surfaces: Vec<Surface>,
    /// Bounds overriding the computed ones.
    pub custom_aabb: Option<Aabb>,
    /// Cached bounds: the custom AABB, or the union of surface bounds.
    pub aabb: Aabb,
}

impl Mesh {
    fn recompute_aabb(&mut self) {
        self.aabb = match self.custom_aabb {
            Some(custom) => custom,
            None => self
                .surfaces
                .iter()
                .fold(Aabb::INVALID, |acc, s| acc.merge(&s.aabb)),
        };
    }

    fn surface_mut(&mut self, index: usize) -> Result<&mut Surface, SurfaceError> {
        self.surfaces
            .get_mut(index)
            .ok_or(SurfaceError::NoSuchSurface(index))
    }
}

/// Storage for every mesh.
#[derive(Debug)]
pub struct MeshStore {
    meshes: HandleTable<Mesh>,
}

impl Default for MeshStore {
    fn default() -> Self {
        Self {
            meshes: HandleTable::new(ResourceKind::Mesh),
        }
    }
}

store_access!(MeshStore, Mesh, meshes);

impl MeshStore {
    /// Creates a mesh with no surfaces.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.meshes.insert(
            rid,
            Mesh {
                aabb: Aabb::INVALID,
                ..Mesh::default()
            },
        )
    }

    /// Validates and appends a surface. The mesh bounds are recomputed.
    ///
    /// ## Returns
    /// The index of the new surface.
    pub fn add_surface(&mut self, rid: Rid, data: SurfaceData) -> Result<usize, ServerError> {
        if data.material.is_valid() {
            ServerError::check_kind(data.material, ResourceKind::Material)?;
        }
        let mesh = self.meshes.lookup_mut(rid)?;
        if mesh.surfaces.len() >= MAX_SURFACES {
            return Err(SurfaceError::TooManySurfaces.into());
        }
        let index_format = validate_surface(&data)?;
        let mut surface = Surface {
            format: data.format,
            primitive: data.primitive,
            vertex_data: data.vertex_data,
            vertex_count: data.vertex_count,
            index_data: data.index_data,
            index_count: data.index_count,
            index_format,
            aabb: Aabb::INVALID,
            material: data.material,
            backend: None,
            needs_upload: true,
            dirty_regions: Vec::new(),
        };
        surface.aabb = data.aabb.unwrap_or_else(|| surface.compute_aabb());
        mesh.surfaces.push(surface);
        mesh.recompute_aabb();
        Ok(mesh.surfaces.len() - 1)
    }

    /// Packs typed arrays and appends them as a surface.
    pub fn add_surface_from_arrays(
        &mut self,
        rid: Rid,
        primitive: PrimitiveType,
        arrays: &SurfaceArrays,
        material: Rid,
    ) -> Result<usize, ServerError> {
        let mut data = arrays.pack(primitive)?;
        data.material = material;
        self.add_surface(rid, data)
    }

    /// Number of surfaces; 0 for unknown handles.
    pub fn surface_count(&self, rid: Rid) -> usize {
        self.meshes.get(rid).map_or(0, |m| m.surfaces.len())
    }

    /// A surface of a mesh.
    pub fn surface(&self, rid: Rid, index: usize) -> Option<&Surface> {
        self.meshes.get(rid)?.surfaces.get(index)
    }

    /// Assigns a material to a surface.
    pub fn surface_set_material(
        &mut self,
        rid: Rid,
        index: usize,
        material: Rid,
    ) -> Result<(), ServerError> {
        if material.is_valid() {
            ServerError::check_kind(material, ResourceKind::Material)?;
        }
        self.meshes.lookup_mut(rid)?.surface_mut(index)?.material = material;
        Ok(())
    }

    /// Overwrites part of a surface's vertex bytes. The bounds are recomputed unless a
    /// custom AABB is set.
    pub fn surface_update_vertex_region(
        &mut self,
        rid: Rid,
        index: usize,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), ServerError> {
        let mesh = self.meshes.lookup_mut(rid)?;
        let surface = mesh.surface_mut(index)?;
        let size = surface.vertex_data.len();
        let end = match offset.checked_add(bytes.len()) {
            Some(end) if end <= size => end,
            end => {
                return Err(SurfaceError::RegionOutOfBounds {
                    offset,
                    end: end.unwrap_or(usize::MAX),
                    size,
                }
                .into())
            }
        };
        surface.vertex_data[offset..end].copy_from_slice(bytes);
        if !surface.needs_upload {
            surface.dirty_regions.push(offset..end);
        }
        surface.aabb = surface.compute_aabb();
        mesh.recompute_aabb();
        Ok(())
    }

    /// Removes one surface.
    ///
    /// ## Returns
    /// The backend surface to release, if it was realized.
    pub fn surface_remove(
        &mut self,
        rid: Rid,
        index: usize,
    ) -> Result<Option<BackendSurfaceId>, ServerError> {
        let mesh = self.meshes.lookup_mut(rid)?;
        if index >= mesh.surfaces.len() {
            return Err(SurfaceError::NoSuchSurface(index).into());
        }
        let surface = mesh.surfaces.remove(index);
        mesh.recompute_aabb();
        Ok(surface.backend)
    }

    /// Removes every surface.
    ///
    /// ## Returns
    /// The backend surfaces to release.
    pub fn clear(&mut self, rid: Rid) -> Result<Vec<BackendSurfaceId>, ServerError> {
        let mesh = self.meshes.lookup_mut(rid)?;
        let freed = mesh.surfaces.drain(..).filter_map(|s| s.backend).collect();
        mesh.recompute_aabb();
        Ok(freed)
    }

    /// Overrides the computed bounds. An invalid box restores the computed bounds.
    pub fn set_custom_aabb(&mut self, rid: Rid, aabb: Aabb) -> Result<(), ServerError> {
        let mesh = self.meshes.lookup_mut(rid)?;
        mesh.custom_aabb = aabb.is_valid().then_some(aabb);
        mesh.recompute_aabb();
        Ok(())
    }

    /// The custom bounds, or [`Aabb::INVALID`].
    pub fn custom_aabb(&self, rid: Rid) -> Aabb {
        self.meshes
            .get(rid)
            .and_then(|m| m.custom_aabb)
            .unwrap_or(Aabb::INVALID)
    }

    /// The cached bounds, or [`Aabb::INVALID`].
    pub fn aabb(&self, rid: Rid) -> Aabb {
        self.meshes.get(rid).map_or(Aabb::INVALID, |m| m.aabb)
    }

    /// Handles of meshes with surfaces waiting for upload.
    pub fn dirty_handles(&self) -> Vec<Rid> {
        self.meshes
            .iter()
            .filter(|(_, m)| {
                m.surfaces
                    .iter()
                    .any(|s| s.needs_upload || !s.dirty_regions.is_empty())
            })
            .map(|(rid, _)| rid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(index: u32) -> Rid {
        Rid::from_parts(index, 1, ResourceKind::Mesh)
    }

    fn triangle() -> SurfaceArrays {
        SurfaceArrays {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 2.0, -1.0),
            ],
            uvs: vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            ..SurfaceArrays::default()
        }
    }

    #[test]
    fn packs_and_computes_bounds() {
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        let index = store
            .add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &triangle(), Rid::INVALID)
            .unwrap();
        assert_eq!(index, 0);

        let surface = store.surface(mesh(0), 0).unwrap();
        assert_eq!(surface.format, ArrayFormat::VERTEX | ArrayFormat::TEX_UV);
        assert_eq!(surface.vertex_data.len(), 3 * 20);
        assert_eq!(surface.position(2), Vec3::new(0.0, 2.0, -1.0));
        assert_eq!(surface.uv(1), Vec2::new(1.0, 0.0));
        assert_eq!(surface.primitive_count(), 1);

        let aabb = store.aabb(mesh(0));
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn tangent_without_normal_is_rejected() {
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        let mut arrays = triangle();
        arrays.tangents = vec![[1.0, 0.0, 0.0, 1.0]; 3];
        let result =
            store.add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &arrays, Rid::INVALID);
        assert!(matches!(result, Err(ServerError::MalformedData(_))));
        assert_eq!(store.surface_count(mesh(0)), 0);
    }

    #[test]
    fn raw_format_rules() {
        let base = SurfaceData {
            format: ArrayFormat::VERTEX,
            primitive: PrimitiveType::Triangles,
            vertex_data: vec![0; 36],
            vertex_count: 3,
            ..SurfaceData::default()
        };
        assert!(validate_surface(&base).is_ok());

        let no_vertex = SurfaceData {
            format: ArrayFormat::NORMAL,
            ..base.clone()
        };
        assert_eq!(validate_surface(&no_vertex), Err(SurfaceError::MissingVertex));

        let bones = SurfaceData {
            format: ArrayFormat::VERTEX | ArrayFormat::BONES,
            vertex_data: vec![0; 60],
            ..base.clone()
        };
        assert_eq!(
            validate_surface(&bones),
            Err(SurfaceError::BonesWithoutWeights)
        );

        let short = SurfaceData {
            vertex_data: vec![0; 35],
            ..base.clone()
        };
        assert!(matches!(
            validate_surface(&short),
            Err(SurfaceError::VertexLength { expected: 36, actual: 35 })
        ));

        let two_vertices = SurfaceData {
            vertex_data: vec![0; 24],
            vertex_count: 2,
            ..base.clone()
        };
        assert!(matches!(
            validate_surface(&two_vertices),
            Err(SurfaceError::PrimitiveCount { .. })
        ));

        let index_without_flag = SurfaceData {
            index_data: vec![0; 6],
            index_count: 3,
            ..base.clone()
        };
        assert!(matches!(
            validate_surface(&index_without_flag),
            Err(SurfaceError::IndexFlagMismatch { flag: false, has_data: true })
        ));
    }

    #[test]
    fn indices_are_bounds_checked() {
        let mut arrays = triangle();
        arrays.indices = vec![0, 1, 3];
        let data = arrays.pack(PrimitiveType::Triangles).unwrap();
        assert_eq!(data.index_data.len(), 6);
        assert_eq!(
            validate_surface(&data),
            Err(SurfaceError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            })
        );

        arrays.indices = vec![2, 1, 0];
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        store
            .add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &arrays, Rid::INVALID)
            .unwrap();
        assert_eq!(store.surface(mesh(0), 0).unwrap().indices(), vec![2, 1, 0]);
    }

    #[test]
    fn mismatched_array_lengths_are_rejected() {
        let mut arrays = triangle();
        arrays.normals = vec![Vec3::Z; 2];
        assert!(matches!(
            arrays.pack(PrimitiveType::Triangles),
            Err(SurfaceError::ArrayLength {
                attribute: "normals",
                ..
            })
        ));
    }

    #[test]
    fn custom_aabb_overrides_and_clears() {
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        store
            .add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &triangle(), Rid::INVALID)
            .unwrap();
        let custom = Aabb::from_min_max(Vec3::splat(-10.0), Vec3::splat(10.0));
        store.set_custom_aabb(mesh(0), custom).unwrap();
        assert_eq!(store.aabb(mesh(0)), custom);

        store.set_custom_aabb(mesh(0), Aabb::INVALID).unwrap();
        assert_eq!(store.aabb(mesh(0)).max, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn region_update_moves_bounds() {
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        store
            .add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &triangle(), Rid::INVALID)
            .unwrap();
        store.get_mut(mesh(0)).unwrap().surfaces[0].needs_upload = false;

        let moved = Vec3::new(5.0, 5.0, 5.0);
        store
            .surface_update_vertex_region(mesh(0), 0, 0, bytemuck::bytes_of(&moved))
            .unwrap();
        assert_eq!(store.aabb(mesh(0)).max, moved);
        assert_eq!(store.surface(mesh(0), 0).unwrap().dirty_regions, vec![0..12]);
        assert!(store
            .surface_update_vertex_region(mesh(0), 0, 58, &[0; 4])
            .is_err());
    }

    #[test]
    fn region_offset_overflow_is_rejected() {
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        store
            .add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &triangle(), Rid::INVALID)
            .unwrap();
        let before = store.surface(mesh(0), 0).unwrap().vertex_data.clone();

        let result = store.surface_update_vertex_region(mesh(0), 0, usize::MAX, &[0; 4]);

        assert!(matches!(result, Err(ServerError::MalformedData(_))));
        assert_eq!(store.surface(mesh(0), 0).unwrap().vertex_data, before);
    }

    #[test]
    fn clear_returns_backend_surfaces() {
        let mut store = MeshStore::default();
        store.create(mesh(0)).unwrap();
        store
            .add_surface_from_arrays(mesh(0), PrimitiveType::Triangles, &triangle(), Rid::INVALID)
            .unwrap();
        store.get_mut(mesh(0)).unwrap().surfaces[0].backend = Some(BackendSurfaceId(4));
        assert_eq!(store.clear(mesh(0)).unwrap(), vec![BackendSurfaceId(4)]);
        assert_eq!(store.surface_count(mesh(0)), 0);
        assert!(!store.aabb(mesh(0)).is_valid());
    }
}
