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

//! Opaque resource handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits of the generation stored in a packed handle.
pub const GENERATION_BITS: u32 = 24;
/// Mask applied to generations so they always fit in a packed handle.
pub const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// The kind of server object a [`Rid`] refers to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A 2D, layered or 3D texture.
    Texture = 0,
    /// Shader source and its reflected parameters.
    Shader = 1,
    /// A shader binding plus named parameter values.
    Material = 2,
    /// A list of surfaces with vertex and index data.
    Mesh = 3,
    /// Instanced drawing of one mesh.
    MultiMesh = 4,
    /// A directional, omni or spot light.
    Light = 5,
    /// A particle system.
    Particles = 6,
    /// A 3D camera.
    Camera = 7,
    /// Background, ambient and post-processing settings.
    Environment = 8,
    /// A 3D world container.
    Scenario = 9,
    /// A placement of a resource inside a scenario.
    Instance = 10,
    /// A render target with camera, scenario and canvas bindings.
    Viewport = 11,
    /// The root of a 2D drawing tree.
    Canvas = 12,
    /// A node of a 2D drawing tree.
    CanvasItem = 13,
}

impl ResourceKind {
    /// Every kind, in tag order.
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::Texture,
        ResourceKind::Shader,
        ResourceKind::Material,
        ResourceKind::Mesh,
        ResourceKind::MultiMesh,
        ResourceKind::Light,
        ResourceKind::Particles,
        ResourceKind::Camera,
        ResourceKind::Environment,
        ResourceKind::Scenario,
        ResourceKind::Instance,
        ResourceKind::Viewport,
        ResourceKind::Canvas,
        ResourceKind::CanvasItem,
    ];

    /// Returns the kind matching a packed tag, if any.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Returns the packed tag of this kind.
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Returns a short, human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Texture => "Texture",
            ResourceKind::Shader => "Shader",
            ResourceKind::Material => "Material",
            ResourceKind::Mesh => "Mesh",
            ResourceKind::MultiMesh => "MultiMesh",
            ResourceKind::Light => "Light",
            ResourceKind::Particles => "Particles",
            ResourceKind::Camera => "Camera",
            ResourceKind::Environment => "Environment",
            ResourceKind::Scenario => "Scenario",
            ResourceKind::Instance => "Instance",
            ResourceKind::Viewport => "Viewport",
            ResourceKind::Canvas => "Canvas",
            ResourceKind::CanvasItem => "CanvasItem",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An opaque, generation-tagged handle to a server-owned resource.
///
/// A `Rid` is a plain value: copying it grants the right to reference the resource,
/// never ownership. The server validates all three fields on every lookup, so a handle
/// that outlived its resource (or was forged) resolves to nothing instead of aliasing
/// whatever now occupies the same slot.
///
/// Indices come from a table shared by every kind, which makes a live handle unique
/// across kinds and not only within its own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    index: u32,
    generation: u32,
    kind: ResourceKind,
}

impl Rid {
    /// The null handle. Never returned by a successful create.
    pub const INVALID: Rid = Rid {
        index: u32::MAX,
        generation: 0,
        kind: ResourceKind::Texture,
    };

    /// Assembles a handle from its parts.
    ///
    /// Only the allocator should mint handles; this is public so that lower layers
    /// and tests can build handles for lookups.
    #[inline]
    pub const fn from_parts(index: u32, generation: u32, kind: ResourceKind) -> Self {
        Self {
            index,
            generation: generation & GENERATION_MASK,
            kind,
        }
    }

    /// The slot index of this handle.
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// The generation of the slot when this handle was minted.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// The kind of resource this handle refers to.
    #[inline]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns `true` unless this is [`Rid::INVALID`] or another zero-generation handle.
    ///
    /// This does not mean the resource is live; only the server can tell.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.generation != 0
    }

    /// Returns `true` if this handle is of the given kind.
    #[inline]
    pub fn is(&self, kind: ResourceKind) -> bool {
        self.kind == kind
    }

    /// Packs the handle into a single integer: index in the low 32 bits, generation in
    /// the next 24, kind tag in the top 8.
    pub fn to_u64(self) -> u64 {
        (self.index as u64)
            | ((self.generation & GENERATION_MASK) as u64) << 32
            | (self.kind.tag() as u64) << 56
    }

    /// Unpacks a handle produced by [`Rid::to_u64`].
    ///
    /// ## Returns
    /// `None` if the kind tag is unknown.
    pub fn from_u64(value: u64) -> Option<Self> {
        let kind = ResourceKind::from_tag((value >> 56) as u8)?;
        Some(Self {
            index: value as u32,
            generation: ((value >> 32) as u32) & GENERATION_MASK,
            kind,
        })
    }
}

impl Default for Rid {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}({}v{})", self.kind, self.index, self.generation)
        } else {
            write!(f, "Rid::INVALID")
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn invalid_is_default_and_not_valid() {
        assert_eq!(Rid::default(), Rid::INVALID);
        assert!(!Rid::INVALID.is_valid());
        assert_eq!(format!("{:?}", Rid::INVALID), "Rid::INVALID");
    }

    #[test]
    fn packing_preserves_all_fields() {
        let rid = Rid::from_parts(42, 7, ResourceKind::Viewport);
        let unpacked = Rid::from_u64(rid.to_u64()).unwrap();
        assert_eq!(unpacked, rid);
        assert_eq!(unpacked.index(), 42);
        assert_eq!(unpacked.generation(), 7);
        assert_eq!(unpacked.kind(), ResourceKind::Viewport);
    }

    #[test]
    fn unpacking_rejects_unknown_kind_tag() {
        let bogus = 200u64 << 56 | 1u64 << 32 | 3;
        assert!(Rid::from_u64(bogus).is_none());
    }

    #[test]
    fn generation_is_masked_to_packed_width() {
        let rid = Rid::from_parts(1, GENERATION_MASK + 2, ResourceKind::Mesh);
        assert_eq!(rid.generation(), 1);
    }

    #[test]
    fn equality_covers_kind_and_generation() {
        let a = Rid::from_parts(3, 1, ResourceKind::Mesh);
        let b = Rid::from_parts(3, 2, ResourceKind::Mesh);
        let c = Rid::from_parts(3, 1, ResourceKind::Material);
        let set: HashSet<Rid> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn every_kind_round_trips_through_its_tag() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ResourceKind::from_tag(14), None);
    }

    #[test]
    fn debug_format_names_the_kind() {
        let rid = Rid::from_parts(5, 2, ResourceKind::CanvasItem);
        assert_eq!(format!("{rid}"), "CanvasItem(5v2)");
    }
}
