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

//! Everything the render thread owns.

use std::sync::Arc;
use umbra_core::backend::RenderBackend;
use umbra_core::math::Color;
use umbra_core::stats::FrameStats;
use umbra_core::{ResourceKind, Rid, ServerError};
use umbra_data::storage::{
    Camera, CameraStore, Canvas, CanvasItem, CanvasStore, Environment, EnvironmentStore,
    Instance, Light, LightStore, Material, MaterialStore, Mesh, MeshStore, MultiMesh,
    MultiMeshStore, Particles, ParticlesStore, Scenario, ScenarioStore, Shader, ShaderStore,
    Texture, TextureStore, Viewport, ViewportStore,
};
use umbra_data::RidAllocator;

/// A typed view of a live resource.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    /// A texture.
    Texture(&'a Texture),
    /// A shader.
    Shader(&'a Shader),
    /// A material.
    Material(&'a Material),
    /// A mesh.
    Mesh(&'a Mesh),
    /// A multimesh.
    MultiMesh(&'a MultiMesh),
    /// A light.
    Light(&'a Light),
    /// A particle system.
    Particles(&'a Particles),
    /// A camera.
    Camera(&'a Camera),
    /// An environment.
    Environment(&'a Environment),
    /// A scenario.
    Scenario(&'a Scenario),
    /// An instance.
    Instance(&'a Instance),
    /// A viewport.
    Viewport(&'a Viewport),
    /// A canvas.
    Canvas(&'a Canvas),
    /// A canvas item.
    CanvasItem(&'a CanvasItem),
}

impl ResourceRef<'_> {
    /// The kind of the referenced resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Texture(_) => ResourceKind::Texture,
            ResourceRef::Shader(_) => ResourceKind::Shader,
            ResourceRef::Material(_) => ResourceKind::Material,
            ResourceRef::Mesh(_) => ResourceKind::Mesh,
            ResourceRef::MultiMesh(_) => ResourceKind::MultiMesh,
            ResourceRef::Light(_) => ResourceKind::Light,
            ResourceRef::Particles(_) => ResourceKind::Particles,
            ResourceRef::Camera(_) => ResourceKind::Camera,
            ResourceRef::Environment(_) => ResourceKind::Environment,
            ResourceRef::Scenario(_) => ResourceKind::Scenario,
            ResourceRef::Instance(_) => ResourceKind::Instance,
            ResourceRef::Viewport(_) => ResourceKind::Viewport,
            ResourceRef::Canvas(_) => ResourceKind::Canvas,
            ResourceRef::CanvasItem(_) => ResourceKind::CanvasItem,
        }
    }
}

/// The render-thread state: every store, the backend and frame bookkeeping.
///
/// Commands receive `&mut ServerState`. Stores are public so a command can reach
/// exactly the store it mutates; tearing a resource down goes through
/// [`ServerState::free`], which also releases backend objects and back-links.
pub struct ServerState {
    /// Textures.
    pub textures: TextureStore,
    /// Shaders.
    pub shaders: ShaderStore,
    /// Materials.
    pub materials: MaterialStore,
    /// Meshes.
    pub meshes: MeshStore,
    /// Multimeshes.
    pub multimeshes: MultiMeshStore,
    /// Lights.
    pub lights: LightStore,
    /// Particle systems.
    pub particles: ParticlesStore,
    /// Cameras.
    pub cameras: CameraStore,
    /// Environments.
    pub environments: EnvironmentStore,
    /// Scenarios and their instances.
    pub scenarios: ScenarioStore,
    /// Viewports.
    pub viewports: ViewportStore,
    /// Canvases and their items.
    pub canvases: CanvasStore,
    /// Number of the last drawn frame.
    pub frame: u64,
    /// Counters of the last drawn frame.
    pub last_stats: FrameStats,
    /// Clear color of viewports whose environment does not impose one.
    pub default_clear_color: Color,
    /// Set whenever an operation ran since the last frame.
    pub changed: bool,
    pub(crate) backend: Box<dyn RenderBackend>,
    allocator: Arc<RidAllocator>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("backend", &self.backend.kind())
            .field("frame", &self.frame)
            .field("live_handles", &self.allocator.live_count())
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Creates empty stores around a backend.
    pub fn new(
        backend: Box<dyn RenderBackend>,
        allocator: Arc<RidAllocator>,
        default_clear_color: Color,
    ) -> Self {
        Self {
            textures: TextureStore::default(),
            shaders: ShaderStore::default(),
            materials: MaterialStore::default(),
            meshes: MeshStore::default(),
            multimeshes: MultiMeshStore::default(),
            lights: LightStore::default(),
            particles: ParticlesStore::default(),
            cameras: CameraStore::default(),
            environments: EnvironmentStore::default(),
            scenarios: ScenarioStore::default(),
            viewports: ViewportStore::default(),
            canvases: CanvasStore::default(),
            frame: 0,
            last_stats: FrameStats::default(),
            default_clear_color,
            changed: false,
            backend,
            allocator,
        }
    }

    /// The active backend.
    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    /// The active backend, mutably.
    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// The handle allocator shared with the facade.
    pub fn allocator(&self) -> &RidAllocator {
        &self.allocator
    }

    /// Typed view of the live object named by `rid`.
    ///
    /// ## Returns
    /// `None` for null, stale, freed or not yet initialised handles.
    pub fn resolve(&self, rid: Rid) -> Option<ResourceRef<'_>> {
        if !self.allocator.is_live(rid) {
            return None;
        }
        match rid.kind() {
            ResourceKind::Texture => self.textures.get(rid).map(ResourceRef::Texture),
            ResourceKind::Shader => self.shaders.get(rid).map(ResourceRef::Shader),
            ResourceKind::Material => self.materials.get(rid).map(ResourceRef::Material),
            ResourceKind::Mesh => self.meshes.get(rid).map(ResourceRef::Mesh),
            ResourceKind::MultiMesh => self.multimeshes.get(rid).map(ResourceRef::MultiMesh),
            ResourceKind::Light => self.lights.get(rid).map(ResourceRef::Light),
            ResourceKind::Particles => self.particles.get(rid).map(ResourceRef::Particles),
            ResourceKind::Camera => self.cameras.get(rid).map(ResourceRef::Camera),
            ResourceKind::Environment => self.environments.get(rid).map(ResourceRef::Environment),
            ResourceKind::Scenario => self.scenarios.get(rid).map(ResourceRef::Scenario),
            ResourceKind::Instance => self.scenarios.instance(rid).map(ResourceRef::Instance),
            ResourceKind::Viewport => self.viewports.get(rid).map(ResourceRef::Viewport),
            ResourceKind::Canvas => self.canvases.get(rid).map(ResourceRef::Canvas),
            ResourceKind::CanvasItem => self.canvases.item(rid).map(ResourceRef::CanvasItem),
        }
    }

    /// Gives up on a handle whose initialisation failed.
    pub(crate) fn abandon(&mut self, rid: Rid) {
        if let Err(err) = self.allocator.retire(rid) {
            log::debug!("Abandoned handle {rid} was already retired: {err}");
        }
        self.allocator.recycle(rid.index());
    }

    /// Tears down a retired resource: releases its backend objects, unlinks it from
    /// every back-link, and recycles its index.
    ///
    /// ## Errors
    /// * `ServerError::InvalidHandle` - If no store held the resource. The index is
    ///   recycled regardless.
    pub fn free(&mut self, rid: Rid) -> Result<(), ServerError> {
        let found = match rid.kind() {
            ResourceKind::Texture => self
                .textures
                .remove(rid)
                .map(|t| {
                    if let Some(id) = t.backend {
                        self.backend.texture_free(id);
                    }
                })
                .is_some(),
            ResourceKind::Shader => self.shaders.remove(rid).is_some(),
            ResourceKind::Material => self.materials.remove(rid).is_some(),
            ResourceKind::Mesh => self
                .meshes
                .remove(rid)
                .map(|mesh| {
                    for id in mesh.surfaces.iter().filter_map(|s| s.backend) {
                        self.backend.surface_free(id);
                    }
                })
                .is_some(),
            ResourceKind::MultiMesh => self
                .multimeshes
                .remove(rid)
                .map(|mm| {
                    if let Some(id) = mm.backend {
                        self.backend.buffer_free(id);
                    }
                })
                .is_some(),
            ResourceKind::Light => self.lights.remove(rid).is_some(),
            ResourceKind::Particles => self
                .particles
                .remove(rid)
                .map(|p| {
                    if let Some(id) = p.backend {
                        self.backend.buffer_free(id);
                    }
                })
                .is_some(),
            ResourceKind::Camera => self.cameras.remove(rid).is_some(),
            ResourceKind::Environment => self.environments.remove(rid).is_some(),
            ResourceKind::Scenario => self.scenarios.remove_scenario(rid).is_some(),
            ResourceKind::Instance => self.scenarios.remove_instance(rid).is_some(),
            ResourceKind::Viewport => match self.viewports.remove(rid) {
                Some(vp) => {
                    if let Some(target) = vp.render_target {
                        self.backend.render_target_free(target);
                    }
                    // The proxy texture lives and dies with its viewport.
                    if self.textures.remove(vp.texture).is_some() {
                        self.abandon(vp.texture);
                    }
                    true
                }
                None => false,
            },
            ResourceKind::Canvas => {
                self.viewports.forget_canvas(rid);
                self.canvases.remove_canvas(rid).is_some()
            }
            ResourceKind::CanvasItem => self.canvases.remove_item(rid).is_some(),
        };
        self.allocator.recycle(rid.index());
        self.changed = true;
        if found {
            log::trace!("Freed {rid}.");
            Ok(())
        } else {
            Err(ServerError::InvalidHandle(rid))
        }
    }

    /// Frees every resource still held, viewports first.
    pub(crate) fn free_all(&mut self) {
        let mut handles: Vec<Rid> = self.viewports.iter().map(|(rid, _)| rid).collect();
        handles.extend(self.allocator.live_handles());
        let mut freed = 0usize;
        for rid in handles {
            if self.allocator.retire(rid).is_ok() && self.free(rid).is_ok() {
                freed += 1;
            }
        }
        self.backend.sync();
        log::info!("Released {freed} resources.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::image::Image;
    use umbra_infra::HeadlessBackend;

    fn state() -> ServerState {
        ServerState::new(
            Box::new(HeadlessBackend::new()),
            Arc::new(RidAllocator::new()),
            Color::BLACK,
        )
    }

    #[test]
    fn resolve_reports_kind_and_rejects_stale_handles() {
        let mut state = state();
        let rid = state.allocator().allocate(ResourceKind::Texture);
        assert!(state.resolve(rid).is_none());
        state
            .textures
            .create_2d(rid, Image::filled_rgba8(2, 2, [255; 4]))
            .unwrap();
        assert_eq!(state.resolve(rid).map(|r| r.kind()), Some(ResourceKind::Texture));

        state.allocator().retire(rid).unwrap();
        assert!(state.resolve(rid).is_none());
        state.free(rid).unwrap();
        assert!(state.textures.is_empty());
        assert_eq!(state.allocator().live_count(), 0);
    }

    #[test]
    fn freeing_a_viewport_releases_its_proxy() {
        let mut state = state();
        let vp = state.allocator().allocate(ResourceKind::Viewport);
        let tex = state.allocator().allocate(ResourceKind::Texture);
        state.viewports.create(vp, tex).unwrap();
        state.textures.create_proxy(tex, vp, 0, 0).unwrap();

        state.allocator().retire(vp).unwrap();
        state.free(vp).unwrap();
        assert!(state.textures.get(tex).is_none());
        assert_eq!(state.allocator().live_count(), 0);
    }

    #[test]
    fn freeing_an_instance_updates_its_scenario() {
        let mut state = state();
        let scenario = state.allocator().allocate(ResourceKind::Scenario);
        let instance = state.allocator().allocate(ResourceKind::Instance);
        state.scenarios.create_scenario(scenario).unwrap();
        state.scenarios.create_instance(instance).unwrap();
        state.scenarios.set_scenario(instance, scenario).unwrap();

        state.allocator().retire(instance).unwrap();
        state.free(instance).unwrap();
        assert!(state.scenarios.get(scenario).unwrap().instances.is_empty());
    }

    #[test]
    fn free_all_empties_every_store() {
        let mut state = state();
        let mesh = state.allocator().allocate(ResourceKind::Mesh);
        let light = state.allocator().allocate(ResourceKind::Light);
        state.meshes.create(mesh).unwrap();
        state
            .lights
            .create(light, umbra_data::storage::LightType::Omni)
            .unwrap();
        state.free_all();
        assert!(state.meshes.is_empty());
        assert!(state.lights.is_empty());
        assert_eq!(state.allocator().live_count(), 0);
    }
}
