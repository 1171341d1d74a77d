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

//! Environment store.

use crate::handle::HandleTable;
use umbra_core::math::Color;
use umbra_core::{ResourceKind, Rid, ServerError};

/// What fills the pixels no geometry covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    /// The viewport clear color.
    #[default]
    ClearColor,
    /// The environment background color.
    Color,
    /// A sky.
    Sky,
    /// Keep the previous contents.
    Keep,
}

/// Tone mapping operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tonemapper {
    /// No mapping.
    #[default]
    Linear,
    /// Reinhard.
    Reinhard,
    /// Filmic.
    Filmic,
    /// ACES.
    Aces,
}

/// Tone mapping settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tonemap {
    /// Operator.
    pub mode: Tonemapper,
    /// Exposure multiplier.
    pub exposure: f32,
    /// White point.
    pub white: f32,
}

/// Fog settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    /// Whether fog is drawn.
    pub enabled: bool,
    /// Fog color.
    pub color: Color,
    /// Exponential density.
    pub density: f32,
}

/// Glow settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    /// Whether glow is drawn.
    pub enabled: bool,
    /// Glow intensity.
    pub intensity: f32,
    /// Brightness above which pixels glow.
    pub hdr_threshold: f32,
}

/// An environment resource.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Background mode.
    pub background: Background,
    /// Color used by [`Background::Color`].
    pub bg_color: Color,
    /// Background energy multiplier.
    pub bg_energy: f32,
    /// Ambient light color.
    pub ambient_color: Color,
    /// Ambient light energy.
    pub ambient_energy: f32,
    /// Tone mapping.
    pub tonemap: Tonemap,
    /// Fog.
    pub fog: Fog,
    /// Glow.
    pub glow: Glow,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            background: Background::ClearColor,
            bg_color: Color::BLACK,
            bg_energy: 1.0,
            ambient_color: Color::BLACK,
            ambient_energy: 1.0,
            tonemap: Tonemap {
                mode: Tonemapper::Linear,
                exposure: 1.0,
                white: 1.0,
            },
            fog: Fog {
                enabled: false,
                color: Color::rgb(0.5, 0.6, 0.7),
                density: 0.01,
            },
            glow: Glow {
                enabled: false,
                intensity: 0.8,
                hdr_threshold: 1.0,
            },
        }
    }
}

impl Environment {
    /// The clear color this environment imposes, if any, given the viewport default.
    pub fn clear_color(&self, default: Color) -> Option<Color> {
        match self.background {
            Background::ClearColor => Some(default),
            Background::Color | Background::Sky => {
                let e = self.bg_energy;
                Some(Color::rgba(
                    self.bg_color.r * e,
                    self.bg_color.g * e,
                    self.bg_color.b * e,
                    self.bg_color.a,
                ))
            }
            Background::Keep => None,
        }
    }
}

/// Storage for every environment.
#[derive(Debug)]
pub struct EnvironmentStore {
    environments: HandleTable<Environment>,
}

impl Default for EnvironmentStore {
    fn default() -> Self {
        Self {
            environments: HandleTable::new(ResourceKind::Environment),
        }
    }
}

store_access!(EnvironmentStore, Environment, environments);

impl EnvironmentStore {
    /// Creates an environment that clears to the viewport color.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.environments.insert(rid, Environment::default())
    }

    /// Sets the background mode.
    pub fn set_background(&mut self, rid: Rid, background: Background) -> Result<(), ServerError> {
        self.environments.lookup_mut(rid)?.background = background;
        Ok(())
    }

    /// Sets the background color.
    pub fn set_bg_color(&mut self, rid: Rid, color: Color) -> Result<(), ServerError> {
        self.environments.lookup_mut(rid)?.bg_color = color;
        Ok(())
    }

    /// Sets the background energy.
    pub fn set_bg_energy(&mut self, rid: Rid, energy: f32) -> Result<(), ServerError> {
        self.environments.lookup_mut(rid)?.bg_energy = energy.max(0.0);
        Ok(())
    }

    /// Sets the ambient light.
    pub fn set_ambient_light(&mut self, rid: Rid, color: Color, energy: f32) -> Result<(), ServerError> {
        let env = self.environments.lookup_mut(rid)?;
        env.ambient_color = color;
        env.ambient_energy = energy.max(0.0);
        Ok(())
    }

    /// Sets tone mapping.
    pub fn set_tonemap(&mut self, rid: Rid, tonemap: Tonemap) -> Result<(), ServerError> {
        self.environments.lookup_mut(rid)?.tonemap = tonemap;
        Ok(())
    }

    /// Sets fog.
    pub fn set_fog(&mut self, rid: Rid, fog: Fog) -> Result<(), ServerError> {
        self.environments.lookup_mut(rid)?.fog = fog;
        Ok(())
    }

    /// Sets glow.
    pub fn set_glow(&mut self, rid: Rid, glow: Glow) -> Result<(), ServerError> {
        self.environments.lookup_mut(rid)?.glow = glow;
        Ok(())
    }

    /// Background mode; [`Background::ClearColor`] for unknown handles.
    pub fn background(&self, rid: Rid) -> Background {
        self.environments
            .get(rid)
            .map(|e| e.background)
            .unwrap_or_default()
    }

    /// Background color; black for unknown handles.
    pub fn bg_color(&self, rid: Rid) -> Color {
        self.environments.get(rid).map_or(Color::BLACK, |e| e.bg_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_drives_clear_color() {
        let mut store = EnvironmentStore::default();
        let rid = Rid::from_parts(0, 1, ResourceKind::Environment);
        store.create(rid).unwrap();
        let fallback = Color::rgb(0.3, 0.3, 0.3);
        assert_eq!(store.get(rid).unwrap().clear_color(fallback), Some(fallback));

        store.set_background(rid, Background::Color).unwrap();
        store.set_bg_color(rid, Color::rgb(0.5, 0.25, 1.0)).unwrap();
        store.set_bg_energy(rid, 2.0).unwrap();
        assert_eq!(
            store.get(rid).unwrap().clear_color(fallback),
            Some(Color::rgb(1.0, 0.5, 2.0))
        );

        store.set_background(rid, Background::Keep).unwrap();
        assert_eq!(store.get(rid).unwrap().clear_color(fallback), None);
        assert_eq!(store.background(rid), Background::Keep);
    }
}
