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

//! Scenarios and the instances placed in them.
//!
//! A scenario keeps the set of attached instances; an instance keeps the scenario it
//! is attached to. The store updates both sides together, including when either
//! side is removed.

use crate::handle::HandleTable;
use std::collections::{BTreeMap, BTreeSet};
use umbra_core::math::{Aabb, Mat4};
use umbra_core::{ResourceKind, Rid, ServerError};

/// Kinds an instance can draw.
pub const INSTANCEABLE: [ResourceKind; 4] = [
    ResourceKind::Mesh,
    ResourceKind::MultiMesh,
    ResourceKind::Particles,
    ResourceKind::Light,
];

/// A 3D world.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    /// Attached instances.
    pub instances: BTreeSet<Rid>,
    /// Environment, or [`Rid::INVALID`].
    pub environment: Rid,
    /// Environment used when neither the camera nor the scenario sets one.
    pub fallback_environment: Rid,
}

/// A placement of a base resource in a scenario.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The drawn resource, or [`Rid::INVALID`].
    pub base: Rid,
    /// The scenario, or [`Rid::INVALID`].
    pub scenario: Rid,
    /// Instance-to-world transform.
    pub transform: Mat4,
    /// Visibility flag.
    pub visible: bool,
    /// Layers the instance belongs to.
    pub layer_mask: u32,
    /// Bounds overriding those of the base.
    pub custom_aabb: Option<Aabb>,
    /// Margin added to the bounds when culling.
    pub extra_margin: f32,
    /// Material replacing every surface material, or [`Rid::INVALID`].
    pub material_override: Rid,
    /// Per-surface material replacements.
    pub surface_overrides: BTreeMap<usize, Rid>,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            base: Rid::INVALID,
            scenario: Rid::INVALID,
            transform: Mat4::IDENTITY,
            visible: true,
            layer_mask: 1,
            custom_aabb: None,
            extra_margin: 0.0,
            material_override: Rid::INVALID,
            surface_overrides: BTreeMap::new(),
        }
    }
}

impl Instance {
    /// World-space bounds given the bounds of the base resource.
    pub fn world_aabb(&self, base_aabb: Aabb) -> Aabb {
        let local = self.custom_aabb.unwrap_or(base_aabb);
        if !local.is_valid() {
            return Aabb::INVALID;
        }
        local.transform(&self.transform).grow(self.extra_margin)
    }

    /// The material drawn on `surface`, given the surface's own material.
    pub fn material_for(&self, surface: usize, own: Rid) -> Rid {
        if self.material_override.is_valid() {
            return self.material_override;
        }
        self.surface_overrides.get(&surface).copied().unwrap_or(own)
    }
}

/// Storage for scenarios and instances.
#[derive(Debug)]
pub struct ScenarioStore {
    scenarios: HandleTable<Scenario>,
    instances: HandleTable<Instance>,
}

impl Default for ScenarioStore {
    fn default() -> Self {
        Self {
            scenarios: HandleTable::new(ResourceKind::Scenario),
            instances: HandleTable::new(ResourceKind::Instance),
        }
    }
}

store_access!(ScenarioStore, Scenario, scenarios);

fn check_material(material: Rid) -> Result<(), ServerError> {
    if material.is_valid() {
        ServerError::check_kind(material, ResourceKind::Material)?;
    }
    Ok(())
}

impl ScenarioStore {
    /// Creates an empty scenario.
    pub fn create_scenario(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.scenarios.insert(rid, Scenario::default())
    }

    /// Sets the scenario environment.
    pub fn set_environment(&mut self, rid: Rid, environment: Rid) -> Result<(), ServerError> {
        if environment.is_valid() {
            ServerError::check_kind(environment, ResourceKind::Environment)?;
        }
        self.scenarios.lookup_mut(rid)?.environment = environment;
        Ok(())
    }

    /// Sets the fallback environment.
    pub fn set_fallback_environment(&mut self, rid: Rid, environment: Rid) -> Result<(), ServerError> {
        if environment.is_valid() {
            ServerError::check_kind(environment, ResourceKind::Environment)?;
        }
        self.scenarios.lookup_mut(rid)?.fallback_environment = environment;
        Ok(())
    }

    /// Removes a scenario and detaches its instances.
    pub fn remove_scenario(&mut self, rid: Rid) -> Option<Scenario> {
        let scenario = self.scenarios.remove(rid)?;
        for instance in &scenario.instances {
            if let Some(inst) = self.instances.get_mut(*instance) {
                inst.scenario = Rid::INVALID;
            }
        }
        Some(scenario)
    }

    /// Creates a detached instance without base.
    pub fn create_instance(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.instances.insert(rid, Instance::default())
    }

    /// The instance named by `rid`, if live.
    pub fn instance(&self, rid: Rid) -> Option<&Instance> {
        self.instances.get(rid)
    }

    /// Returns `true` if `rid` names a live instance.
    pub fn contains_instance(&self, rid: Rid) -> bool {
        self.instances.contains(rid)
    }

    /// Number of live instances.
    pub fn instance_len(&self) -> usize {
        self.instances.len()
    }

    /// Iterates over live instances.
    pub fn instances(&self) -> impl Iterator<Item = (Rid, &Instance)> {
        self.instances.iter()
    }

    /// Removes an instance and detaches it from its scenario.
    pub fn remove_instance(&mut self, rid: Rid) -> Option<Instance> {
        let instance = self.instances.remove(rid)?;
        if let Some(scenario) = self.scenarios.get_mut(instance.scenario) {
            scenario.instances.remove(&rid);
        }
        Some(instance)
    }

    /// Sets the drawn resource.
    ///
    /// ## Errors
    /// * `ServerError::WrongKind` - If `base` is not a mesh, multimesh, particles or light.
    pub fn set_base(&mut self, rid: Rid, base: Rid) -> Result<(), ServerError> {
        if base.is_valid() && !INSTANCEABLE.contains(&base.kind()) {
            return Err(ServerError::WrongKind {
                rid: base,
                expected: ResourceKind::Mesh,
            });
        }
        self.instances.lookup_mut(rid)?.base = base;
        Ok(())
    }

    /// Moves an instance to another scenario. [`Rid::INVALID`] detaches it.
    pub fn set_scenario(&mut self, rid: Rid, scenario: Rid) -> Result<(), ServerError> {
        if scenario.is_valid() {
            self.scenarios.lookup(scenario)?;
        }
        let previous = self.instances.lookup(rid)?.scenario;
        if let Some(old) = self.scenarios.get_mut(previous) {
            old.instances.remove(&rid);
        }
        if let Some(new) = self.scenarios.get_mut(scenario) {
            new.instances.insert(rid);
        }
        self.instances.lookup_mut(rid)?.scenario = scenario;
        Ok(())
    }

    /// Sets the instance transform.
    pub fn set_transform(&mut self, rid: Rid, transform: Mat4) -> Result<(), ServerError> {
        self.instances.lookup_mut(rid)?.transform = transform;
        Ok(())
    }

    /// Shows or hides the instance.
    pub fn set_visible(&mut self, rid: Rid, visible: bool) -> Result<(), ServerError> {
        self.instances.lookup_mut(rid)?.visible = visible;
        Ok(())
    }

    /// Sets the layers the instance belongs to.
    pub fn set_layer_mask(&mut self, rid: Rid, mask: u32) -> Result<(), ServerError> {
        self.instances.lookup_mut(rid)?.layer_mask = mask;
        Ok(())
    }

    /// Overrides the base bounds. An invalid box restores them.
    pub fn set_custom_aabb(&mut self, rid: Rid, aabb: Aabb) -> Result<(), ServerError> {
        self.instances.lookup_mut(rid)?.custom_aabb = aabb.is_valid().then_some(aabb);
        Ok(())
    }

    /// Sets the culling margin.
    pub fn set_extra_visibility_margin(&mut self, rid: Rid, margin: f32) -> Result<(), ServerError> {
        self.instances.lookup_mut(rid)?.extra_margin = margin.max(0.0);
        Ok(())
    }

    /// Replaces every surface material.
    pub fn set_material_override(&mut self, rid: Rid, material: Rid) -> Result<(), ServerError> {
        check_material(material)?;
        self.instances.lookup_mut(rid)?.material_override = material;
        Ok(())
    }

    /// Replaces the material of one surface. [`Rid::INVALID`] clears the replacement.
    pub fn set_surface_override_material(
        &mut self,
        rid: Rid,
        surface: usize,
        material: Rid,
    ) -> Result<(), ServerError> {
        check_material(material)?;
        let instance = self.instances.lookup_mut(rid)?;
        if material.is_valid() {
            instance.surface_overrides.insert(surface, material);
        } else {
            instance.surface_overrides.remove(&surface);
        }
        Ok(())
    }

    /// The drawn resource.
    pub fn base(&self, rid: Rid) -> Rid {
        self.instances.get(rid).map_or(Rid::INVALID, |i| i.base)
    }

    /// The scenario the instance is attached to.
    pub fn scenario_of(&self, rid: Rid) -> Rid {
        self.instances.get(rid).map_or(Rid::INVALID, |i| i.scenario)
    }

    /// Instances of `scenario` whose world bounds intersect `aabb`.
    ///
    /// ## Arguments
    /// * `base_aabb` - Resolves the local bounds of a base resource.
    pub fn cull_aabb(
        &self,
        aabb: &Aabb,
        scenario: Rid,
        base_aabb: impl Fn(Rid) -> Aabb,
    ) -> Vec<Rid> {
        let Some(scenario) = self.scenarios.get(scenario) else {
            return Vec::new();
        };
        scenario
            .instances
            .iter()
            .filter_map(|rid| self.instances.get(*rid).map(|i| (*rid, i)))
            .filter(|(_, i)| i.base.is_valid())
            .filter(|(_, i)| i.world_aabb(base_aabb(i.base)).intersects(aabb))
            .map(|(rid, _)| rid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::Vec3;

    fn scenario(i: u32) -> Rid {
        Rid::from_parts(i, 1, ResourceKind::Scenario)
    }

    fn instance(i: u32) -> Rid {
        Rid::from_parts(i, 1, ResourceKind::Instance)
    }

    fn unit(_: Rid) -> Aabb {
        Aabb::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    #[test]
    fn back_links_follow_moves() {
        let mut store = ScenarioStore::default();
        store.create_scenario(scenario(0)).unwrap();
        store.create_scenario(scenario(1)).unwrap();
        store.create_instance(instance(2)).unwrap();

        store.set_scenario(instance(2), scenario(0)).unwrap();
        assert!(store.get(scenario(0)).unwrap().instances.contains(&instance(2)));

        store.set_scenario(instance(2), scenario(1)).unwrap();
        assert!(store.get(scenario(0)).unwrap().instances.is_empty());
        assert!(store.get(scenario(1)).unwrap().instances.contains(&instance(2)));

        store.remove_instance(instance(2));
        assert!(store.get(scenario(1)).unwrap().instances.is_empty());
    }

    #[test]
    fn removing_a_scenario_detaches_instances() {
        let mut store = ScenarioStore::default();
        store.create_scenario(scenario(0)).unwrap();
        store.create_instance(instance(1)).unwrap();
        store.set_scenario(instance(1), scenario(0)).unwrap();
        store.remove_scenario(scenario(0));
        assert_eq!(store.scenario_of(instance(1)), Rid::INVALID);
    }

    #[test]
    fn cull_aabb_uses_world_bounds() {
        let mut store = ScenarioStore::default();
        store.create_scenario(scenario(0)).unwrap();
        let mesh = Rid::from_parts(9, 1, ResourceKind::Mesh);
        for (i, x) in [(1, 0.0), (2, 10.0), (3, 0.0)] {
            store.create_instance(instance(i)).unwrap();
            store.set_scenario(instance(i), scenario(0)).unwrap();
            store
                .set_transform(instance(i), Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
                .unwrap();
        }
        store.set_base(instance(1), mesh).unwrap();
        store.set_base(instance(2), mesh).unwrap();

        let query = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(store.cull_aabb(&query, scenario(0), unit), vec![instance(1)]);

        store.set_extra_visibility_margin(instance(2), 9.0).unwrap();
        assert_eq!(
            store.cull_aabb(&query, scenario(0), unit),
            vec![instance(1), instance(2)]
        );
    }

    #[test]
    fn base_kind_is_checked() {
        let mut store = ScenarioStore::default();
        store.create_instance(instance(0)).unwrap();
        let texture = Rid::from_parts(5, 1, ResourceKind::Texture);
        assert!(matches!(
            store.set_base(instance(0), texture),
            Err(ServerError::WrongKind { .. })
        ));
    }

    #[test]
    fn material_override_precedence() {
        let mut store = ScenarioStore::default();
        store.create_instance(instance(0)).unwrap();
        let own = Rid::from_parts(1, 1, ResourceKind::Material);
        let surface = Rid::from_parts(2, 1, ResourceKind::Material);
        let global = Rid::from_parts(3, 1, ResourceKind::Material);
        store
            .set_surface_override_material(instance(0), 0, surface)
            .unwrap();
        let inst = store.instance(instance(0)).unwrap();
        assert_eq!(inst.material_for(0, own), surface);
        assert_eq!(inst.material_for(1, own), own);

        store.set_material_override(instance(0), global).unwrap();
        assert_eq!(store.instance(instance(0)).unwrap().material_for(0, own), global);
    }
}
