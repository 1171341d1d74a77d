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

//! The 3D pass: culling a scenario through a camera and building draw items.

use super::bind_texture;
use crate::state::ServerState;
use umbra_core::backend::{CameraData, DrawItem3D, InstanceRange, TextureBinding};
use umbra_core::math::{Aabb, Color, Frustum};
use umbra_core::{ResourceKind, Rid};
use umbra_data::storage::{Instance, Mesh};

/// The culled and sorted 3D draws of one viewport.
#[derive(Debug, Default)]
pub(crate) struct ScenePass {
    pub camera: Option<CameraData>,
    pub items: Vec<DrawItem3D>,
    pub objects: u64,
    pub primitives: u64,
    /// Particle systems drawn; they are processed on the next frame.
    pub particles: Vec<Rid>,
}

/// Local bounds of an instanceable resource; invalid for lights and dangling handles.
pub(crate) fn base_aabb(state: &ServerState, base: Rid) -> Aabb {
    match base.kind() {
        ResourceKind::Mesh => state.meshes.aabb(base),
        ResourceKind::MultiMesh => state
            .multimeshes
            .get(base)
            .map_or(Aabb::INVALID, |mm| mm.aabb(state.meshes.aabb(mm.mesh))),
        ResourceKind::Particles => state
            .particles
            .get(base)
            .map_or(Aabb::INVALID, |p| p.aabb()),
        _ => Aabb::INVALID,
    }
}

/// Builds the 3D pass of a viewport.
///
/// ## Arguments
/// * `viewport` - The viewport being drawn; its own proxy is never sampled.
/// * `sampled` - Collects the viewports whose proxy textures were bound.
pub(crate) fn build_scene(
    state: &ServerState,
    viewport: Rid,
    sampled: &mut Vec<Rid>,
) -> ScenePass {
    let mut pass = ScenePass::default();
    let Some(vp) = state.viewports.get(viewport) else {
        return pass;
    };
    // A dangling camera renders as if none was attached.
    let Some(camera) = state.cameras.get(vp.camera) else {
        return pass;
    };
    let aspect = vp.width as f32 / vp.height.max(1) as f32;
    let view = camera.view_matrix();
    let projection = camera.projection_matrix(aspect);
    pass.camera = Some(CameraData { view, projection });

    let Some(scenario) = state.scenarios.get(vp.scenario) else {
        return pass;
    };
    let frustum = Frustum::from_view_projection(&(projection * view));

    for rid in &scenario.instances {
        let Some(instance) = state.scenarios.instance(*rid) else {
            continue;
        };
        if !instance.visible || instance.layer_mask & camera.cull_mask == 0 {
            continue;
        }
        let bounds = instance.world_aabb(base_aabb(state, instance.base));
        if !frustum.intersects_aabb(&bounds) {
            continue;
        }

        let before = pass.items.len();
        match instance.base.kind() {
            ResourceKind::Mesh => {
                if let Some(mesh) = state.meshes.get(instance.base) {
                    push_mesh(state, &mut pass, viewport, instance, mesh, None, sampled);
                }
            }
            ResourceKind::MultiMesh => {
                let Some(mm) = state.multimeshes.get(instance.base) else {
                    continue;
                };
                let (Some(buffer), Some(mesh)) = (mm.backend, state.meshes.get(mm.mesh)) else {
                    continue;
                };
                let count = mm.visible_count() as u32;
                if count > 0 {
                    let range = InstanceRange { buffer, count };
                    push_mesh(state, &mut pass, viewport, instance, mesh, Some(range), sampled);
                }
            }
            ResourceKind::Particles => {
                let Some(particles) = state.particles.get(instance.base) else {
                    continue;
                };
                pass.particles.push(instance.base);
                let Some(buffer) = particles.backend else {
                    continue;
                };
                let range = InstanceRange {
                    buffer,
                    count: particles.active_count,
                };
                for mesh in particles.draw_passes.iter().filter_map(|m| state.meshes.get(*m)) {
                    push_mesh(state, &mut pass, viewport, instance, mesh, Some(range), sampled);
                }
            }
            _ => {}
        }
        if pass.items.len() > before {
            pass.objects += 1;
        }
    }

    // Stable: equal priorities keep scenario order.
    pass.items.sort_by_key(|item| item.priority);
    pass
}

fn push_mesh(
    state: &ServerState,
    pass: &mut ScenePass,
    viewport: Rid,
    instance: &Instance,
    mesh: &Mesh,
    instances: Option<InstanceRange>,
    sampled: &mut Vec<Rid>,
) {
    let multiplier = instances.map_or(1, |range| range.count as u64);
    for (index, surface) in mesh.surfaces.iter().enumerate() {
        let Some(id) = surface.backend else {
            continue;
        };
        let material = instance.material_for(index, surface.material);
        let (color, texture, priority) = match state.materials.get(material) {
            Some(material) => (
                material.albedo_color(),
                material
                    .albedo_texture()
                    .map_or(TextureBinding::White, |t| bind_texture(state, t, viewport, sampled)),
                material.render_priority,
            ),
            None => (Color::WHITE, TextureBinding::White, 0),
        };
        pass.items.push(DrawItem3D {
            surface: id,
            transform: instance.transform,
            color,
            texture,
            instances,
            priority,
        });
        pass.primitives += surface.primitive_count() * multiplier;
    }
}
