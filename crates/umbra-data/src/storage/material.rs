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

//! Material store.

use crate::handle::HandleTable;
use std::collections::BTreeMap;
use umbra_core::math::Color;
use umbra_core::variant::Variant;
use umbra_core::{ResourceKind, Rid, ServerError};

/// Parameter read by the built-in pipeline as the albedo tint.
pub const PARAM_ALBEDO_COLOR: &str = "albedo_color";
/// Parameter read by the built-in pipeline as the albedo texture.
pub const PARAM_ALBEDO_TEXTURE: &str = "albedo_texture";

/// Lowest accepted render priority.
pub const RENDER_PRIORITY_MIN: i32 = -128;
/// Highest accepted render priority.
pub const RENDER_PRIORITY_MAX: i32 = 127;

/// A material: a shader binding plus parameter values.
#[derive(Debug, Clone, Default)]
pub struct Material {
    /// The shader, or [`Rid::INVALID`].
    pub shader: Rid,
    /// Parameter values by name.
    pub params: BTreeMap<String, Variant>,
    /// The material drawn on top of this one, or [`Rid::INVALID`].
    pub next_pass: Rid,
    /// Sort key among transparent draws.
    pub render_priority: i8,
}

impl Material {
    /// The albedo tint, white when unset.
    pub fn albedo_color(&self) -> Color {
        self.params
            .get(PARAM_ALBEDO_COLOR)
            .and_then(Variant::as_color)
            .unwrap_or(Color::WHITE)
    }

    /// The albedo texture handle, if set.
    pub fn albedo_texture(&self) -> Option<Rid> {
        self.params
            .get(PARAM_ALBEDO_TEXTURE)
            .and_then(Variant::as_rid)
            .filter(|rid| rid.is(ResourceKind::Texture))
    }
}

/// Storage for every material.
#[derive(Debug)]
pub struct MaterialStore {
    materials: HandleTable<Material>,
}

impl Default for MaterialStore {
    fn default() -> Self {
        Self {
            materials: HandleTable::new(ResourceKind::Material),
        }
    }
}

store_access!(MaterialStore, Material, materials);

impl MaterialStore {
    /// Creates a material without shader or parameters.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.materials.insert(rid, Material::default())
    }

    /// Binds a shader. [`Rid::INVALID`] unbinds.
    pub fn set_shader(&mut self, rid: Rid, shader: Rid) -> Result<(), ServerError> {
        if shader.is_valid() {
            ServerError::check_kind(shader, ResourceKind::Shader)?;
        }
        self.materials.lookup_mut(rid)?.shader = shader;
        Ok(())
    }

    /// Sets a parameter. [`Variant::Nil`] removes it.
    pub fn set_param(&mut self, rid: Rid, name: &str, value: Variant) -> Result<(), ServerError> {
        let material = self.materials.lookup_mut(rid)?;
        if value.is_nil() {
            material.params.remove(name);
        } else {
            material.params.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Reads a parameter; [`Variant::Nil`] when unset or for unknown handles.
    pub fn param(&self, rid: Rid, name: &str) -> Variant {
        self.materials
            .get(rid)
            .and_then(|m| m.params.get(name).copied())
            .unwrap_or_default()
    }

    /// Chains another material after this one.
    ///
    /// ## Errors
    /// * `ServerError::Cycle` - If following `next` passes would lead back to `rid`.
    pub fn set_next_pass(&mut self, rid: Rid, next: Rid) -> Result<(), ServerError> {
        self.materials.lookup(rid)?;
        if next.is_valid() {
            ServerError::check_kind(next, ResourceKind::Material)?;
            let mut cursor = next;
            let mut steps = 0usize;
            while cursor.is_valid() {
                if cursor == rid || steps > self.materials.len() {
                    return Err(ServerError::Cycle(rid));
                }
                cursor = self.materials.get(cursor).map_or(Rid::INVALID, |m| m.next_pass);
                steps += 1;
            }
        }
        self.materials.lookup_mut(rid)?.next_pass = next;
        Ok(())
    }

    /// Sets the render priority, clamped to the accepted range.
    pub fn set_render_priority(&mut self, rid: Rid, priority: i32) -> Result<(), ServerError> {
        let clamped = priority.clamp(RENDER_PRIORITY_MIN, RENDER_PRIORITY_MAX);
        if clamped != priority {
            log::warn!("Render priority {priority} clamped to {clamped}.");
        }
        self.materials.lookup_mut(rid)?.render_priority = clamped as i8;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(index: u32) -> Rid {
        Rid::from_parts(index, 1, ResourceKind::Material)
    }

    #[test]
    fn params_default_to_nil() {
        let mut store = MaterialStore::default();
        store.create(material(0)).unwrap();
        assert!(store.param(material(0), "missing").is_nil());

        store
            .set_param(material(0), PARAM_ALBEDO_COLOR, Color::BLACK.into())
            .unwrap();
        assert_eq!(store.get(material(0)).unwrap().albedo_color(), Color::BLACK);

        store
            .set_param(material(0), PARAM_ALBEDO_COLOR, Variant::Nil)
            .unwrap();
        assert_eq!(store.get(material(0)).unwrap().albedo_color(), Color::WHITE);
    }

    #[test]
    fn next_pass_cycles_are_rejected() {
        let mut store = MaterialStore::default();
        for i in 0..3 {
            store.create(material(i)).unwrap();
        }
        store.set_next_pass(material(0), material(1)).unwrap();
        store.set_next_pass(material(1), material(2)).unwrap();
        assert_eq!(
            store.set_next_pass(material(2), material(0)),
            Err(ServerError::Cycle(material(2)))
        );
        assert_eq!(
            store.set_next_pass(material(0), material(0)),
            Err(ServerError::Cycle(material(0)))
        );
        assert_eq!(store.get(material(2)).unwrap().next_pass, Rid::INVALID);
    }

    #[test]
    fn render_priority_is_clamped() {
        let mut store = MaterialStore::default();
        store.create(material(0)).unwrap();
        store.set_render_priority(material(0), 1000).unwrap();
        assert_eq!(store.get(material(0)).unwrap().render_priority, 127);
        store.set_render_priority(material(0), -1000).unwrap();
        assert_eq!(store.get(material(0)).unwrap().render_priority, -128);
    }

    #[test]
    fn set_shader_checks_kind() {
        let mut store = MaterialStore::default();
        store.create(material(0)).unwrap();
        assert!(matches!(
            store.set_shader(material(0), material(0)),
            Err(ServerError::WrongKind { .. })
        ));
    }
}
