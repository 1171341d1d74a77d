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

//! Camera, environment, scenario and instance operations.

use super::RenderingServer;
use crate::scheduler::base_aabb;
use umbra_core::math::{Aabb, Color, Mat4, Vec2};
use umbra_core::{ResourceKind, Rid};
use umbra_data::storage::environment::{Fog, Glow, Tonemap};
use umbra_data::storage::Background;

impl RenderingServer {
    // --- Cameras ---

    /// Creates a camera with a default perspective projection.
    pub fn camera_create(&self) -> Rid {
        self.create(ResourceKind::Camera, "camera_create", |s, rid| {
            s.cameras.create(rid)
        })
    }

    /// Uses a perspective projection.
    pub fn camera_set_perspective(&self, camera: Rid, fov_degrees: f32, near: f32, far: f32) {
        self.apply("camera_set_perspective", move |s| {
            s.cameras.set_perspective(camera, fov_degrees, near, far)
        });
    }

    /// Uses an orthogonal projection of the given size.
    pub fn camera_set_orthogonal(&self, camera: Rid, size: f32, near: f32, far: f32) {
        self.apply("camera_set_orthogonal", move |s| {
            s.cameras.set_orthogonal(camera, size, near, far)
        });
    }

    /// Uses an off-center frustum.
    pub fn camera_set_frustum(&self, camera: Rid, size: f32, offset: Vec2, near: f32, far: f32) {
        self.apply("camera_set_frustum", move |s| {
            s.cameras.set_frustum(camera, size, offset, near, far)
        });
    }

    /// Sets the camera-to-world transform.
    pub fn camera_set_transform(&self, camera: Rid, transform: Mat4) {
        self.apply("camera_set_transform", move |s| {
            s.cameras.set_transform(camera, transform)
        });
    }

    /// Sets the instance layers the camera sees.
    pub fn camera_set_cull_mask(&self, camera: Rid, mask: u32) {
        self.apply("camera_set_cull_mask", move |s| s.cameras.set_cull_mask(camera, mask));
    }

    /// Overrides the scenario environment for this camera.
    pub fn camera_set_environment(&self, camera: Rid, environment: Rid) {
        self.apply("camera_set_environment", move |s| {
            s.cameras.set_environment(camera, environment)
        });
    }

    /// Keeps the vertical field of view fixed instead of the horizontal one.
    pub fn camera_set_use_vertical_aspect(&self, camera: Rid, enable: bool) {
        self.apply("camera_set_use_vertical_aspect", move |s| {
            s.cameras.set_use_vertical_aspect(camera, enable)
        });
    }

    // --- Environments ---

    /// Creates an environment that clears to the default color.
    pub fn environment_create(&self) -> Rid {
        self.create(ResourceKind::Environment, "environment_create", |s, rid| {
            s.environments.create(rid)
        })
    }

    /// Sets the background mode.
    pub fn environment_set_background(&self, environment: Rid, background: Background) {
        self.apply("environment_set_background", move |s| {
            s.environments.set_background(environment, background)
        });
    }

    /// Sets the background color.
    pub fn environment_set_bg_color(&self, environment: Rid, color: Color) {
        self.apply("environment_set_bg_color", move |s| {
            s.environments.set_bg_color(environment, color)
        });
    }

    /// Sets the background energy multiplier.
    pub fn environment_set_bg_energy(&self, environment: Rid, energy: f32) {
        self.apply("environment_set_bg_energy", move |s| {
            s.environments.set_bg_energy(environment, energy)
        });
    }

    /// Sets the ambient light.
    pub fn environment_set_ambient_light(&self, environment: Rid, color: Color, energy: f32) {
        self.apply("environment_set_ambient_light", move |s| {
            s.environments.set_ambient_light(environment, color, energy)
        });
    }

    /// Sets the tonemapping parameters.
    pub fn environment_set_tonemap(&self, environment: Rid, tonemap: Tonemap) {
        self.apply("environment_set_tonemap", move |s| {
            s.environments.set_tonemap(environment, tonemap)
        });
    }

    /// Sets the fog parameters.
    pub fn environment_set_fog(&self, environment: Rid, fog: Fog) {
        self.apply("environment_set_fog", move |s| s.environments.set_fog(environment, fog));
    }

    /// Sets the glow parameters.
    pub fn environment_set_glow(&self, environment: Rid, glow: Glow) {
        self.apply("environment_set_glow", move |s| s.environments.set_glow(environment, glow));
    }

    /// The background mode.
    pub fn environment_get_background(&self, environment: Rid) -> Background {
        self.query("environment_get_background", environment, ResourceKind::Environment, |s| {
            s.environments.background(environment)
        })
    }

    /// The background color.
    pub fn environment_get_bg_color(&self, environment: Rid) -> Color {
        self.query_or(
            "environment_get_bg_color",
            environment,
            ResourceKind::Environment,
            Color::BLACK,
            |s| s.environments.bg_color(environment),
        )
    }

    // --- Scenarios ---

    /// Creates an empty scenario.
    pub fn scenario_create(&self) -> Rid {
        self.create(ResourceKind::Scenario, "scenario_create", |s, rid| {
            s.scenarios.create_scenario(rid)
        })
    }

    /// Sets the environment of a scenario.
    pub fn scenario_set_environment(&self, scenario: Rid, environment: Rid) {
        self.apply("scenario_set_environment", move |s| {
            s.scenarios.set_environment(scenario, environment)
        });
    }

    /// Sets the environment used when neither camera nor scenario has one.
    pub fn scenario_set_fallback_environment(&self, scenario: Rid, environment: Rid) {
        self.apply("scenario_set_fallback_environment", move |s| {
            s.scenarios.set_fallback_environment(scenario, environment)
        });
    }

    // --- Instances ---

    /// Creates an instance without base or scenario.
    pub fn instance_create(&self) -> Rid {
        self.create(ResourceKind::Instance, "instance_create", |s, rid| {
            s.scenarios.create_instance(rid)
        })
    }

    /// Creates an instance of `base` placed in `scenario`.
    pub fn instance_create2(&self, base: Rid, scenario: Rid) -> Rid {
        self.create(ResourceKind::Instance, "instance_create2", move |s, rid| {
            s.scenarios.create_instance(rid)?;
            s.scenarios.set_base(rid, base)?;
            s.scenarios.set_scenario(rid, scenario)
        })
    }

    /// Sets the resource drawn by an instance.
    pub fn instance_set_base(&self, instance: Rid, base: Rid) {
        self.apply("instance_set_base", move |s| s.scenarios.set_base(instance, base));
    }

    /// Moves an instance to another scenario, or out of any with [`Rid::INVALID`].
    pub fn instance_set_scenario(&self, instance: Rid, scenario: Rid) {
        self.apply("instance_set_scenario", move |s| {
            s.scenarios.set_scenario(instance, scenario)
        });
    }

    /// Sets the instance-to-world transform.
    pub fn instance_set_transform(&self, instance: Rid, transform: Mat4) {
        self.apply("instance_set_transform", move |s| {
            s.scenarios.set_transform(instance, transform)
        });
    }

    /// Shows or hides an instance.
    pub fn instance_set_visible(&self, instance: Rid, visible: bool) {
        self.apply("instance_set_visible", move |s| s.scenarios.set_visible(instance, visible));
    }

    /// Sets the layers of an instance, matched against camera cull masks.
    pub fn instance_set_layer_mask(&self, instance: Rid, mask: u32) {
        self.apply("instance_set_layer_mask", move |s| s.scenarios.set_layer_mask(instance, mask));
    }

    /// Overrides the culling bounds of an instance.
    pub fn instance_set_custom_aabb(&self, instance: Rid, aabb: Aabb) {
        self.apply("instance_set_custom_aabb", move |s| {
            s.scenarios.set_custom_aabb(instance, aabb)
        });
    }

    /// Grows the culling bounds on every side.
    pub fn instance_set_extra_visibility_margin(&self, instance: Rid, margin: f32) {
        self.apply("instance_set_extra_visibility_margin", move |s| {
            s.scenarios.set_extra_visibility_margin(instance, margin)
        });
    }

    /// Replaces the material of every surface.
    pub fn instance_geometry_set_material_override(&self, instance: Rid, material: Rid) {
        self.apply("instance_geometry_set_material_override", move |s| {
            s.scenarios.set_material_override(instance, material)
        });
    }

    /// Replaces the material of one surface.
    pub fn instance_set_surface_override_material(&self, instance: Rid, surface: usize, material: Rid) {
        self.apply("instance_set_surface_override_material", move |s| {
            s.scenarios
                .set_surface_override_material(instance, surface, material)
        });
    }

    /// The resource drawn by an instance.
    pub fn instance_get_base(&self, instance: Rid) -> Rid {
        self.query_or("instance_get_base", instance, ResourceKind::Instance, Rid::INVALID, |s| {
            s.scenarios.base(instance)
        })
    }

    /// The scenario holding an instance.
    pub fn instance_get_scenario(&self, instance: Rid) -> Rid {
        self.query_or("instance_get_scenario", instance, ResourceKind::Instance, Rid::INVALID, |s| {
            s.scenarios.scenario_of(instance)
        })
    }

    /// Instances of `scenario` whose world bounds intersect `aabb`.
    pub fn instances_cull_aabb(&self, aabb: Aabb, scenario: Rid) -> Vec<Rid> {
        self.query("instances_cull_aabb", scenario, ResourceKind::Scenario, |s| {
            s.scenarios.cull_aabb(&aabb, scenario, |base| base_aabb(s, base))
        })
    }
}
