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

//! The frame scheduler.
//!
//! A frame realizes dirty resources on the backend, then walks the viewports
//! parents first. Each eligible viewport gets a culled 3D pass and a batched
//! canvas pass, submitted to the backend as one [`ViewportFrame`]. A viewport
//! whose submission fails is skipped without affecting the others.

mod canvas;
mod realize;
mod scene;

use crate::state::ServerState;
use std::collections::HashSet;
use std::time::Instant;
use umbra_core::backend::{TextureBinding, ViewportFrame};
use umbra_core::math::Color;
use umbra_core::stats::{FrameStats, ViewportRenderInfo, ViewportRenderInfoType, ViewportRenderStats};
use umbra_core::Rid;
use umbra_data::storage::{ClearMode, TextureSource};

pub(crate) use realize::realize_resources;
pub(crate) use scene::base_aabb;

/// Binding for a texture sampled while drawing `viewport`.
///
/// A viewport proxy binds the render target of its viewport and records it as
/// sampled. A viewport sampling its own proxy, CPU-only textures and dangling
/// handles all bind white.
pub(crate) fn bind_texture(
    state: &ServerState,
    texture: Rid,
    viewport: Rid,
    sampled: &mut Vec<Rid>,
) -> TextureBinding {
    let Some(tex) = state.textures.get(texture) else {
        return TextureBinding::White;
    };
    if let TextureSource::ViewportProxy(source) = tex.source {
        if source == viewport {
            return TextureBinding::White;
        }
        sampled.push(source);
        return state
            .viewports
            .render_target(source)
            .map_or(TextureBinding::White, TextureBinding::RenderTarget);
    }
    tex.backend.map_or(TextureBinding::White, TextureBinding::Texture)
}

/// Clear color of a viewport, or `None` to keep the previous contents.
fn clear_color(state: &ServerState, viewport: Rid) -> Option<Color> {
    let vp = state.viewports.get(viewport)?;
    if vp.clear_mode == ClearMode::Never {
        return None;
    }
    if vp.transparent_bg {
        return Some(Color::TRANSPARENT);
    }
    let scenario = state.scenarios.get(vp.scenario);
    let environment = [
        state.cameras.get(vp.camera).map(|c| c.environment),
        scenario.map(|s| s.environment),
        scenario.map(|s| s.fallback_environment),
    ]
    .into_iter()
    .flatten()
    .find_map(|rid| state.environments.get(rid));
    match environment {
        Some(env) => env.clear_color(state.default_clear_color),
        None => Some(state.default_clear_color),
    }
}

/// Draws one frame.
///
/// ## Arguments
/// * `swap_buffers` - Whether the backend presents at the end of the frame.
/// * `frame_step` - Seconds advanced by particle systems processed this frame.
///
/// ## Returns
/// The frame's statistics, also stored in `state.last_stats`.
pub fn draw_frame(state: &mut ServerState, swap_buffers: bool, frame_step: f32) -> FrameStats {
    let started = Instant::now();
    state.frame += 1;
    let mut stats = FrameStats {
        frame: state.frame,
        ..FrameStats::default()
    };

    state.particles.process_pending(frame_step);
    realize_resources(state);

    if let Err(err) = state.backend.begin_frame() {
        log::error!("Frame {} could not begin: {err}", state.frame);
        stats.cpu_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        state.last_stats = stats;
        return stats;
    }

    let mut drawn: HashSet<Rid> = HashSet::new();
    let mut particles: Vec<Rid> = Vec::new();

    for rid in state.viewports.draw_order() {
        let Some(vp) = state.viewports.get(rid) else {
            continue;
        };
        let parent_drawn = vp.parent.is_valid() && drawn.contains(&vp.parent);
        if !vp.is_update_eligible(parent_drawn) {
            continue;
        }
        let Some(target) = vp.render_target else {
            continue;
        };
        let (width, height, disable_3d, disable_2d) =
            (vp.width, vp.height, vp.disable_3d, vp.disable_2d);

        let mut sampled = Vec::new();
        let clear = clear_color(state, rid);
        let scene = if disable_3d {
            scene::ScenePass::default()
        } else {
            scene::build_scene(state, rid, &mut sampled)
        };
        let canvas = if disable_2d {
            canvas::CanvasPass::default()
        } else {
            canvas::build_canvas(state, rid, &mut sampled)
        };

        let frame = ViewportFrame {
            target,
            width,
            height,
            clear,
            camera: scene.camera,
            items_3d: &scene.items,
            canvas: &canvas.batches,
        };
        let draw_calls = frame.draw_call_count() as u64;
        let result = state.backend.draw_viewport(&frame);

        let Some(vp) = state.viewports.get_mut(rid) else {
            continue;
        };
        match result {
            Ok(()) => {
                let scene_calls = if scene.camera.is_some() {
                    scene.items.len() as u64
                } else {
                    0
                };
                let canvas_primitives = canvas.primitives();
                let mut info = ViewportRenderStats::default();
                info.add(ViewportRenderInfoType::Visible, ViewportRenderInfo::Objects, scene.objects);
                info.add(ViewportRenderInfoType::Visible, ViewportRenderInfo::Primitives, scene.primitives);
                info.add(ViewportRenderInfoType::Visible, ViewportRenderInfo::DrawCalls, scene_calls);
                info.add(ViewportRenderInfoType::Canvas, ViewportRenderInfo::Objects, canvas.objects);
                info.add(ViewportRenderInfoType::Canvas, ViewportRenderInfo::Primitives, canvas_primitives);
                info.add(
                    ViewportRenderInfoType::Canvas,
                    ViewportRenderInfo::DrawCalls,
                    canvas.batches.len() as u64,
                );
                vp.render_info = info;
                vp.finish_update();

                stats.objects += scene.objects + canvas.objects;
                stats.primitives += scene.primitives + canvas_primitives;
                stats.draw_calls += draw_calls;
                stats.viewports_drawn += 1;
                drawn.insert(rid);
                particles.extend(scene.particles);
                for source in sampled {
                    if let Some(source) = state.viewports.get_mut(source) {
                        source.sampled_this_frame = true;
                    }
                }
            }
            Err(err) => {
                log::error!("Viewport {rid} was skipped in frame {}: {err}", state.frame);
                vp.render_info = ViewportRenderStats::default();
                stats.viewports_skipped += 1;
            }
        }
    }

    for rid in particles {
        // Freed mid-frame systems are simply not processed.
        let _ = state.particles.request_process(rid);
    }

    state.backend.end_frame(swap_buffers);
    state.viewports.roll_sampling();
    state.changed = false;

    stats.cpu_time_ms = started.elapsed().as_secs_f32() * 1000.0;
    state.last_stats = stats;
    log::debug!(
        "Frame {} drew {} viewport(s), {} draw call(s), {} skipped.",
        stats.frame,
        stats.viewports_drawn,
        stats.draw_calls,
        stats.viewports_skipped
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use umbra_core::ResourceKind;
    use umbra_data::storage::UpdateMode;
    use umbra_data::RidAllocator;
    use umbra_infra::HeadlessBackend;

    fn state() -> ServerState {
        ServerState::new(
            Box::new(HeadlessBackend::new()),
            Arc::new(RidAllocator::new()),
            Color::BLACK,
        )
    }

    fn viewport(state: &mut ServerState, mode: UpdateMode) -> Rid {
        let vp = state.allocator().allocate(ResourceKind::Viewport);
        let tex = state.allocator().allocate(ResourceKind::Texture);
        state.viewports.create(vp, tex).unwrap();
        state.textures.create_proxy(tex, vp, 0, 0).unwrap();
        state.viewports.set_size(vp, 32, 32).unwrap();
        state.viewports.set_active(vp, true).unwrap();
        state.viewports.set_update_mode(vp, mode).unwrap();
        vp
    }

    #[test]
    fn frame_numbers_increase() {
        let mut state = state();
        assert_eq!(draw_frame(&mut state, false, 0.0).frame, 1);
        assert_eq!(draw_frame(&mut state, false, 0.0).frame, 2);
        assert_eq!(state.last_stats.frame, 2);
    }

    #[test]
    fn once_viewport_draws_a_single_time() {
        let mut state = state();
        let vp = viewport(&mut state, UpdateMode::Once);
        assert_eq!(draw_frame(&mut state, false, 0.0).viewports_drawn, 1);
        assert_eq!(state.viewports.update_mode(vp), UpdateMode::Disabled);
        assert_eq!(draw_frame(&mut state, false, 0.0).viewports_drawn, 0);
    }

    #[test]
    fn own_proxy_binds_white() {
        let mut state = state();
        let vp = viewport(&mut state, UpdateMode::Always);
        let other = viewport(&mut state, UpdateMode::Always);
        realize_resources(&mut state);
        let own = state.viewports.get(vp).unwrap().texture;
        let foreign = state.viewports.get(other).unwrap().texture;

        let mut sampled = Vec::new();
        assert_eq!(bind_texture(&state, own, vp, &mut sampled), TextureBinding::White);
        assert!(sampled.is_empty());
        let bound = bind_texture(&state, foreign, vp, &mut sampled);
        assert!(matches!(bound, TextureBinding::RenderTarget(_)));
        assert_eq!(sampled, vec![other]);
    }

    #[test]
    fn clear_color_falls_back_to_default() {
        let mut state = state();
        let vp = viewport(&mut state, UpdateMode::Always);
        assert_eq!(clear_color(&state, vp), Some(Color::BLACK));
        state.viewports.set_transparent_background(vp, true).unwrap();
        assert_eq!(clear_color(&state, vp), Some(Color::TRANSPARENT));
        state.viewports.set_clear_mode(vp, ClearMode::Never).unwrap();
        assert_eq!(clear_color(&state, vp), None);
    }
}
