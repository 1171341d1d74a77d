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

//! Pushes dirty store state to the backend before anything is drawn.

use crate::state::ServerState;
use umbra_core::backend::BackendFeature;
use umbra_data::storage::TextureSource;

/// Realizes every dirty resource. Failures are logged per resource.
pub(crate) fn realize_resources(state: &mut ServerState) {
    realize_textures(state);
    realize_surfaces(state);
    realize_multimeshes(state);
    realize_particles(state);
    realize_render_targets(state);
}

fn realize_textures(state: &mut ServerState) {
    let backend = &mut state.backend;
    for rid in state.textures.dirty_handles() {
        let Some(texture) = state.textures.get_mut(rid) else {
            continue;
        };

        let missing = BackendFeature::required_for(texture.format)
            .or((texture.source == TextureSource::Volume).then_some(BackendFeature::Texture3D))
            .filter(|feature| !backend.supports_feature(*feature));
        if let Some(feature) = missing {
            log::warn!(
                "The {} backend lacks {feature:?}; texture {rid} stays CPU-only and samples as white.",
                backend.kind().driver_name()
            );
            texture.cpu_only = true;
            texture.dirty_layers.clear();
            continue;
        }

        if texture.needs_allocation || texture.backend.is_none() {
            if let Some(old) = texture.backend.take() {
                backend.texture_free(old);
            }
            texture.needs_allocation = false;
            match backend.texture_allocate(&texture.desc()) {
                Ok(id) => texture.backend = Some(id),
                Err(err) => {
                    log::error!("Failed to allocate texture {rid}: {err}");
                    texture.dirty_layers.clear();
                    continue;
                }
            }
        }

        let Some(id) = texture.backend else {
            continue;
        };
        for layer in std::mem::take(&mut texture.dirty_layers) {
            let Some(image) = texture.images.get(layer as usize) else {
                continue;
            };
            if let Err(err) = backend.texture_upload(id, layer, image) {
                log::error!("Failed to upload layer {layer} of texture {rid}: {err}");
            }
        }
    }
}

fn realize_surfaces(state: &mut ServerState) {
    let backend = &mut state.backend;
    for rid in state.meshes.dirty_handles() {
        let Some(mesh) = state.meshes.get_mut(rid) else {
            continue;
        };
        for (index, surface) in mesh.surfaces.iter_mut().enumerate() {
            if surface.needs_upload {
                if let Some(old) = surface.backend.take() {
                    backend.surface_free(old);
                }
                surface.needs_upload = false;
                surface.dirty_regions.clear();
                let uploaded = backend.surface_upload(&surface.upload());
                match uploaded {
                    Ok(id) => surface.backend = Some(id),
                    Err(err) => log::error!("Failed to upload surface {index} of {rid}: {err}"),
                }
                continue;
            }
            let Some(id) = surface.backend else {
                surface.dirty_regions.clear();
                continue;
            };
            for region in std::mem::take(&mut surface.dirty_regions) {
                let bytes = &surface.vertex_data[region.clone()];
                if let Err(err) = backend.surface_update_region(id, region.start, bytes) {
                    log::error!("Failed to update surface {index} of {rid}: {err}");
                }
            }
        }
    }
}

fn realize_multimeshes(state: &mut ServerState) {
    let backend = &mut state.backend;
    for rid in state.multimeshes.dirty_handles() {
        let Some(mm) = state.multimeshes.get_mut(rid) else {
            continue;
        };
        mm.dirty = false;
        let data = mm.canonical_instances();
        if data.is_empty() {
            if let Some(old) = mm.backend.take() {
                backend.buffer_free(old);
            }
            continue;
        }
        match backend.buffer_upload(mm.backend, &data) {
            Ok(id) => mm.backend = Some(id),
            Err(err) => log::error!("Failed to upload instances of {rid}: {err}"),
        }
    }
}

fn realize_particles(state: &mut ServerState) {
    let backend = &mut state.backend;
    for (rid, particles) in state.particles.iter_mut() {
        if particles.active_count == 0 {
            if let Some(old) = particles.backend.take() {
                backend.buffer_free(old);
            }
            continue;
        }
        match backend.buffer_upload(particles.backend, &particles.instance_data()) {
            Ok(id) => particles.backend = Some(id),
            Err(err) => log::error!("Failed to upload particles of {rid}: {err}"),
        }
    }
}

fn realize_render_targets(state: &mut ServerState) {
    let backend = &mut state.backend;
    for (rid, vp) in state.viewports.iter_mut() {
        let sized = vp.width > 0 && vp.height > 0;
        if !vp.target_dirty && (vp.render_target.is_some() || !sized) {
            continue;
        }
        vp.target_dirty = false;

        if let Some(texture) = state.textures.get_mut(vp.texture) {
            texture.width = vp.width;
            texture.height = vp.height;
        }

        if !sized {
            if let Some(old) = vp.render_target.take() {
                backend.render_target_free(old);
            }
            continue;
        }

        let current = vp.render_target;
        match current {
            Some(target) if vp.target_transparent == vp.transparent_bg => {
                if let Err(err) = backend.render_target_resize(target, vp.width, vp.height) {
                    log::error!("Failed to resize the render target of {rid}: {err}");
                }
            }
            previous => {
                if let Some(old) = previous {
                    backend.render_target_free(old);
                }
                vp.render_target = None;
                match backend.render_target_create(vp.width, vp.height, vp.transparent_bg) {
                    Ok(target) => {
                        vp.render_target = Some(target);
                        vp.target_transparent = vp.transparent_bg;
                    }
                    Err(err) => log::error!("Failed to create the render target of {rid}: {err}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use umbra_core::format::TextureFormat;
    use umbra_core::image::Image;
    use umbra_core::math::Color;
    use umbra_core::ResourceKind;
    use umbra_data::RidAllocator;
    use umbra_infra::HeadlessBackend;

    fn state() -> ServerState {
        ServerState::new(
            Box::new(HeadlessBackend::new()),
            Arc::new(RidAllocator::new()),
            Color::BLACK,
        )
    }

    #[test]
    fn textures_are_allocated_once_and_uploaded() {
        let mut state = state();
        let rid = state.allocator().allocate(ResourceKind::Texture);
        state
            .textures
            .create_2d(rid, Image::filled_rgba8(4, 4, [0, 0, 0, 255]))
            .unwrap();
        realize_resources(&mut state);
        let backend = state.textures.get(rid).unwrap().backend;
        assert!(backend.is_some());
        assert!(state.textures.dirty_handles().is_empty());

        state
            .textures
            .update(rid, Image::filled_rgba8(4, 4, [255; 4]), 0)
            .unwrap();
        realize_resources(&mut state);
        assert_eq!(state.textures.get(rid).unwrap().backend, backend);
    }

    #[test]
    fn compressed_texture_without_capability_stays_on_cpu() {
        let mut state = state();
        let rid = state.allocator().allocate(ResourceKind::Texture);
        let image = Image::new(4, 4, false, TextureFormat::Bc1, vec![0u8; 8]);
        state.textures.create_2d(rid, image).unwrap();
        realize_resources(&mut state);
        let texture = state.textures.get(rid).unwrap();
        assert!(texture.cpu_only);
        assert!(texture.backend.is_none());
    }

    #[test]
    fn render_targets_follow_viewport_size() {
        let mut state = state();
        let vp = state.allocator().allocate(ResourceKind::Viewport);
        let tex = state.allocator().allocate(ResourceKind::Texture);
        state.viewports.create(vp, tex).unwrap();
        state.textures.create_proxy(tex, vp, 0, 0).unwrap();
        realize_resources(&mut state);
        assert!(state.viewports.render_target(vp).is_none());

        state.viewports.set_size(vp, 64, 32).unwrap();
        realize_resources(&mut state);
        let target = state.viewports.render_target(vp);
        assert!(target.is_some());
        assert_eq!(state.textures.size(tex), Some((64, 32)));

        state.viewports.set_size(vp, 128, 32).unwrap();
        realize_resources(&mut state);
        assert_eq!(state.viewports.render_target(vp), target);

        state.viewports.set_transparent_background(vp, true).unwrap();
        realize_resources(&mut state);
        assert_ne!(state.viewports.render_target(vp), target);

        state.viewports.set_size(vp, 0, 0).unwrap();
        realize_resources(&mut state);
        assert!(state.viewports.render_target(vp).is_none());
    }
}
