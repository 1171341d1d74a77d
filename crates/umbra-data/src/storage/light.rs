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

//! Light store.

use crate::handle::HandleTable;
use umbra_core::math::Color;
use umbra_core::{ResourceKind, Rid, ServerError};

/// The shape of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightType {
    /// Parallel rays, like the sun.
    #[default]
    Directional,
    /// Point light radiating in every direction.
    Omni,
    /// Cone-shaped light.
    Spot,
}

/// Scalar light parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightParam {
    /// Light intensity multiplier.
    Energy,
    /// Intensity multiplier for indirect lighting.
    IndirectEnergy,
    /// Specular reflection intensity.
    Specular,
    /// Reach of omni and spot lights.
    Range,
    /// Distance falloff exponent.
    Attenuation,
    /// Half angle of a spot light cone, in degrees.
    SpotAngle,
    /// Falloff exponent towards the cone edge.
    SpotAttenuation,
    /// Maximum shadow distance.
    ShadowMaxDistance,
    /// Depth bias applied to shadow lookups.
    ShadowBias,
}

impl LightParam {
    /// Every parameter, in declaration order.
    pub const ALL: [LightParam; 9] = [
        LightParam::Energy,
        LightParam::IndirectEnergy,
        LightParam::Specular,
        LightParam::Range,
        LightParam::Attenuation,
        LightParam::SpotAngle,
        LightParam::SpotAttenuation,
        LightParam::ShadowMaxDistance,
        LightParam::ShadowBias,
    ];

    /// The value a new light starts with.
    pub fn default_value(self) -> f32 {
        match self {
            LightParam::Energy => 1.0,
            LightParam::IndirectEnergy => 1.0,
            LightParam::Specular => 0.5,
            LightParam::Range => 5.0,
            LightParam::Attenuation => 1.0,
            LightParam::SpotAngle => 45.0,
            LightParam::SpotAttenuation => 1.0,
            LightParam::ShadowMaxDistance => 100.0,
            LightParam::ShadowBias => 0.02,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// A light resource.
#[derive(Debug, Clone)]
pub struct Light {
    /// Shape.
    pub light_type: LightType,
    /// Color.
    pub color: Color,
    /// Parameter values, indexed by [`LightParam`].
    pub params: [f32; 9],
    /// Whether the light casts shadows.
    pub shadow: bool,
    /// Layers lit by this light.
    pub cull_mask: u32,
}

impl Light {
    fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            color: Color::WHITE,
            params: LightParam::ALL.map(LightParam::default_value),
            shadow: false,
            cull_mask: u32::MAX,
        }
    }

    /// Reads one parameter.
    pub fn param(&self, param: LightParam) -> f32 {
        self.params[param.slot()]
    }
}

/// Storage for every light.
#[derive(Debug)]
pub struct LightStore {
    lights: HandleTable<Light>,
}

impl Default for LightStore {
    fn default() -> Self {
        Self {
            lights: HandleTable::new(ResourceKind::Light),
        }
    }
}

store_access!(LightStore, Light, lights);

impl LightStore {
    /// Creates a light of the given type with default parameters.
    pub fn create(&mut self, rid: Rid, light_type: LightType) -> Result<(), ServerError> {
        self.lights.insert(rid, Light::new(light_type))
    }

    /// Sets the color.
    pub fn set_color(&mut self, rid: Rid, color: Color) -> Result<(), ServerError> {
        self.lights.lookup_mut(rid)?.color = color;
        Ok(())
    }

    /// Sets one parameter. Negative ranges and energies are clamped to zero.
    pub fn set_param(&mut self, rid: Rid, param: LightParam, value: f32) -> Result<(), ServerError> {
        let value = match param {
            LightParam::Energy | LightParam::IndirectEnergy | LightParam::Range => value.max(0.0),
            LightParam::SpotAngle => value.clamp(0.0, 180.0),
            _ => value,
        };
        self.lights.lookup_mut(rid)?.params[param.slot()] = value;
        Ok(())
    }

    /// Reads one parameter; 0 for unknown handles.
    pub fn param(&self, rid: Rid, param: LightParam) -> f32 {
        self.lights.get(rid).map_or(0.0, |l| l.param(param))
    }

    /// Enables or disables shadows.
    pub fn set_shadow(&mut self, rid: Rid, enabled: bool) -> Result<(), ServerError> {
        self.lights.lookup_mut(rid)?.shadow = enabled;
        Ok(())
    }

    /// Sets the lit layers.
    pub fn set_cull_mask(&mut self, rid: Rid, mask: u32) -> Result<(), ServerError> {
        self.lights.lookup_mut(rid)?.cull_mask = mask;
        Ok(())
    }

    /// The light type; [`LightType::Directional`] for unknown handles.
    pub fn light_type(&self, rid: Rid) -> LightType {
        self.lights.get(rid).map(|l| l.light_type).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lights_start_with_defaults() {
        let mut store = LightStore::default();
        let rid = Rid::from_parts(3, 1, ResourceKind::Light);
        store.create(rid, LightType::Spot).unwrap();
        assert_eq!(store.light_type(rid), LightType::Spot);
        assert_eq!(store.param(rid, LightParam::SpotAngle), 45.0);
        assert_eq!(store.get(rid).unwrap().cull_mask, u32::MAX);
    }

    #[test]
    fn params_are_sanitized() {
        let mut store = LightStore::default();
        let rid = Rid::from_parts(0, 1, ResourceKind::Light);
        store.create(rid, LightType::Omni).unwrap();
        store.set_param(rid, LightParam::Range, -3.0).unwrap();
        store.set_param(rid, LightParam::SpotAngle, 500.0).unwrap();
        store.set_param(rid, LightParam::ShadowBias, 0.1).unwrap();
        assert_eq!(store.param(rid, LightParam::Range), 0.0);
        assert_eq!(store.param(rid, LightParam::SpotAngle), 180.0);
        assert_eq!(store.param(rid, LightParam::ShadowBias), 0.1);
    }
}
