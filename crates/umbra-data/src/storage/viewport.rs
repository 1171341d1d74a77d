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

//! Viewport store.
//!
//! A viewport renders a camera's view of a scenario plus a stack of canvases into
//! its own render target. Which viewports render in a frame is decided by their
//! [`UpdateMode`]; parents always render before their children.

use crate::handle::HandleTable;
use std::collections::BTreeMap;
use umbra_core::backend::RenderTargetId;
use umbra_core::math::{Rect2, Transform2D};
use umbra_core::stats::{ViewportRenderInfo, ViewportRenderInfoType, ViewportRenderStats};
use umbra_core::{ResourceKind, Rid, ServerError};

/// When a viewport renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Never. Stays until another mode is set.
    Disabled,
    /// On the next frame only, then [`UpdateMode::Disabled`].
    Once,
    /// When attached to the screen or sampled by a draw in the previous frame.
    #[default]
    WhenVisible,
    /// When the parent viewport rendered this frame.
    WhenParentVisible,
    /// Every frame.
    Always,
}

/// When the render target is cleared before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearMode {
    /// Every frame.
    #[default]
    Always,
    /// Never.
    Never,
    /// On the next frame only, then [`ClearMode::Never`].
    OnlyNextFrame,
}

/// Placement of a canvas inside a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportCanvas {
    /// Canvas-to-viewport transform.
    pub transform: Transform2D,
    /// Stacking layer; lower layers draw first.
    pub layer: i32,
    /// Order inside a layer.
    pub sublayer: i32,
}

/// A viewport resource.
#[derive(Debug, Clone)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Inactive viewports never render.
    pub active: bool,
    /// Update policy.
    pub update_mode: UpdateMode,
    /// Clear policy.
    pub clear_mode: ClearMode,
    /// Camera, or [`Rid::INVALID`].
    pub camera: Rid,
    /// Scenario, or [`Rid::INVALID`].
    pub scenario: Rid,
    /// Attached canvases.
    pub canvases: BTreeMap<Rid, ViewportCanvas>,
    /// Parent viewport, or [`Rid::INVALID`].
    pub parent: Rid,
    /// Screen area the platform layer blits this viewport to.
    pub screen_rect: Option<Rect2>,
    /// Skip the 3D pass.
    pub disable_3d: bool,
    /// Skip the canvas pass.
    pub disable_2d: bool,
    /// Clear to transparent instead of the clear color.
    pub transparent_bg: bool,
    /// The texture sampling this viewport's render target.
    pub texture: Rid,
    /// The backend render target.
    pub render_target: Option<RenderTargetId>,
    /// Whether the render target was created with an alpha channel.
    pub target_transparent: bool,
    /// The render target must be created or resized.
    pub target_dirty: bool,
    /// The proxy texture was sampled by a draw in the previous frame.
    pub sampled_last_frame: bool,
    /// The proxy texture has been sampled by a draw in the current frame.
    pub sampled_this_frame: bool,
    /// Counters of the last frame this viewport rendered in.
    pub render_info: ViewportRenderStats,
}

impl Viewport {
    fn new(texture: Rid) -> Self {
        Self {
            width: 0,
            height: 0,
            active: false,
            update_mode: UpdateMode::default(),
            clear_mode: ClearMode::default(),
            camera: Rid::INVALID,
            scenario: Rid::INVALID,
            canvases: BTreeMap::new(),
            parent: Rid::INVALID,
            screen_rect: None,
            disable_3d: false,
            disable_2d: false,
            transparent_bg: false,
            texture,
            render_target: None,
            target_transparent: false,
            target_dirty: false,
            sampled_last_frame: false,
            sampled_this_frame: false,
            render_info: ViewportRenderStats::default(),
        }
    }

    /// Whether the viewport renders this frame.
    ///
    /// ## Arguments
    /// * `parent_drawn` - Whether the parent viewport rendered earlier in this frame.
    pub fn is_update_eligible(&self, parent_drawn: bool) -> bool {
        if !self.active || self.width == 0 || self.height == 0 {
            return false;
        }
        match self.update_mode {
            UpdateMode::Disabled => false,
            UpdateMode::Once | UpdateMode::Always => true,
            UpdateMode::WhenVisible => self.screen_rect.is_some() || self.sampled_last_frame,
            UpdateMode::WhenParentVisible => parent_drawn,
        }
    }

    /// Applies the one-shot transitions after a successful render.
    pub fn finish_update(&mut self) {
        if self.update_mode == UpdateMode::Once {
            self.update_mode = UpdateMode::Disabled;
        }
        if self.clear_mode == ClearMode::OnlyNextFrame {
            self.clear_mode = ClearMode::Never;
        }
    }

    /// Attached canvases in drawing order: by layer, then sublayer, then handle.
    pub fn sorted_canvases(&self) -> Vec<(Rid, ViewportCanvas)> {
        let mut canvases: Vec<_> = self.canvases.iter().map(|(r, c)| (*r, *c)).collect();
        canvases.sort_by_key(|(_, c)| (c.layer, c.sublayer));
        canvases
    }
}

/// Storage for every viewport.
#[derive(Debug)]
pub struct ViewportStore {
    viewports: HandleTable<Viewport>,
}

impl Default for ViewportStore {
    fn default() -> Self {
        Self {
            viewports: HandleTable::new(ResourceKind::Viewport),
        }
    }
}

store_access!(ViewportStore, Viewport, viewports);

impl ViewportStore {
    /// Creates an inactive, zero-sized viewport sampled through `texture`.
    pub fn create(&mut self, rid: Rid, texture: Rid) -> Result<(), ServerError> {
        self.viewports.insert(rid, Viewport::new(texture))
    }

    /// Resizes the viewport; the render target follows on the next frame.
    pub fn set_size(&mut self, rid: Rid, width: u32, height: u32) -> Result<(), ServerError> {
        let vp = self.viewports.lookup_mut(rid)?;
        if (vp.width, vp.height) != (width, height) {
            vp.width = width;
            vp.height = height;
            vp.target_dirty = true;
        }
        Ok(())
    }

    /// Activates or deactivates the viewport.
    pub fn set_active(&mut self, rid: Rid, active: bool) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.active = active;
        Ok(())
    }

    /// Sets the update policy.
    pub fn set_update_mode(&mut self, rid: Rid, mode: UpdateMode) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.update_mode = mode;
        Ok(())
    }

    /// The update policy; [`UpdateMode::Disabled`] for unknown handles.
    pub fn update_mode(&self, rid: Rid) -> UpdateMode {
        self.viewports
            .get(rid)
            .map_or(UpdateMode::Disabled, |v| v.update_mode)
    }

    /// Sets the clear policy.
    pub fn set_clear_mode(&mut self, rid: Rid, mode: ClearMode) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.clear_mode = mode;
        Ok(())
    }

    /// Renders the 3D pass through `camera`.
    pub fn attach_camera(&mut self, rid: Rid, camera: Rid) -> Result<(), ServerError> {
        if camera.is_valid() {
            ServerError::check_kind(camera, ResourceKind::Camera)?;
        }
        self.viewports.lookup_mut(rid)?.camera = camera;
        Ok(())
    }

    /// Renders `scenario` in the 3D pass.
    pub fn set_scenario(&mut self, rid: Rid, scenario: Rid) -> Result<(), ServerError> {
        if scenario.is_valid() {
            ServerError::check_kind(scenario, ResourceKind::Scenario)?;
        }
        self.viewports.lookup_mut(rid)?.scenario = scenario;
        Ok(())
    }

    /// Attaches a canvas at layer 0 with the identity transform.
    pub fn attach_canvas(&mut self, rid: Rid, canvas: Rid) -> Result<(), ServerError> {
        ServerError::check_kind(canvas, ResourceKind::Canvas)?;
        self.viewports
            .lookup_mut(rid)?
            .canvases
            .entry(canvas)
            .or_default();
        Ok(())
    }

    /// Detaches a canvas.
    pub fn remove_canvas(&mut self, rid: Rid, canvas: Rid) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.canvases.remove(&canvas);
        Ok(())
    }

    fn attached_canvas(&mut self, rid: Rid, canvas: Rid) -> Result<&mut ViewportCanvas, ServerError> {
        self.viewports
            .lookup_mut(rid)?
            .canvases
            .get_mut(&canvas)
            .ok_or(ServerError::InvalidHandle(canvas))
    }

    /// Sets the transform of an attached canvas.
    pub fn set_canvas_transform(
        &mut self,
        rid: Rid,
        canvas: Rid,
        transform: Transform2D,
    ) -> Result<(), ServerError> {
        self.attached_canvas(rid, canvas)?.transform = transform;
        Ok(())
    }

    /// Sets the stacking order of an attached canvas.
    pub fn set_canvas_stacking(
        &mut self,
        rid: Rid,
        canvas: Rid,
        layer: i32,
        sublayer: i32,
    ) -> Result<(), ServerError> {
        let placement = self.attached_canvas(rid, canvas)?;
        placement.layer = layer;
        placement.sublayer = sublayer;
        Ok(())
    }

    /// Sets the parent viewport. [`Rid::INVALID`] clears it.
    ///
    /// ## Errors
    /// * `ServerError::Cycle` - If `rid` is an ancestor of `parent`.
    pub fn set_parent_viewport(&mut self, rid: Rid, parent: Rid) -> Result<(), ServerError> {
        self.viewports.lookup(rid)?;
        if parent.is_valid() {
            ServerError::check_kind(parent, ResourceKind::Viewport)?;
            let mut cursor = parent;
            let mut steps = 0;
            while cursor.is_valid() {
                if cursor == rid || steps > self.viewports.len() {
                    return Err(ServerError::Cycle(rid));
                }
                cursor = self.viewports.get(cursor).map_or(Rid::INVALID, |v| v.parent);
                steps += 1;
            }
        }
        self.viewports.lookup_mut(rid)?.parent = parent;
        Ok(())
    }

    /// Attaches the viewport to an area of the screen.
    pub fn attach_to_screen(&mut self, rid: Rid, rect: Rect2) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.screen_rect = Some(rect);
        Ok(())
    }

    /// Detaches the viewport from the screen.
    pub fn detach(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.screen_rect = None;
        Ok(())
    }

    /// Skips the 3D pass.
    pub fn set_disable_3d(&mut self, rid: Rid, disable: bool) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.disable_3d = disable;
        Ok(())
    }

    /// Skips the canvas pass.
    pub fn set_disable_2d(&mut self, rid: Rid, disable: bool) -> Result<(), ServerError> {
        self.viewports.lookup_mut(rid)?.disable_2d = disable;
        Ok(())
    }

    /// Clears to transparent black instead of the clear color.
    pub fn set_transparent_background(&mut self, rid: Rid, enable: bool) -> Result<(), ServerError> {
        let vp = self.viewports.lookup_mut(rid)?;
        if vp.transparent_bg != enable {
            vp.transparent_bg = enable;
            vp.target_dirty = true;
        }
        Ok(())
    }

    /// The proxy texture; [`Rid::INVALID`] for unknown handles.
    pub fn texture(&self, rid: Rid) -> Rid {
        self.viewports.get(rid).map_or(Rid::INVALID, |v| v.texture)
    }

    /// One render counter of the last frame the viewport rendered in.
    pub fn render_info(
        &self,
        rid: Rid,
        kind: ViewportRenderInfoType,
        info: ViewportRenderInfo,
    ) -> u64 {
        self.viewports
            .get(rid)
            .map_or(0, |v| v.render_info.get(kind, info))
    }

    /// The backend render target, once created.
    pub fn render_target(&self, rid: Rid) -> Option<RenderTargetId> {
        self.viewports.get(rid).and_then(|v| v.render_target)
    }

    /// Detaches `canvas` from every viewport.
    pub fn forget_canvas(&mut self, canvas: Rid) {
        for (_, vp) in self.viewports.iter_mut() {
            vp.canvases.remove(&canvas);
        }
    }

    /// Live viewports ordered so that every parent precedes its children.
    pub fn draw_order(&self) -> Vec<Rid> {
        let limit = self.viewports.len();
        let depth = |mut rid: Rid| {
            let mut depth = 0usize;
            while let Some(vp) = self.viewports.get(rid) {
                if !vp.parent.is_valid() || depth > limit {
                    break;
                }
                rid = vp.parent;
                depth += 1;
            }
            depth
        };
        let mut order: Vec<(usize, Rid)> = self
            .viewports
            .handles()
            .into_iter()
            .map(|r| (depth(r), r))
            .collect();
        order.sort();
        order.into_iter().map(|(_, r)| r).collect()
    }

    /// Rolls the per-frame sampling flags over to the next frame.
    pub fn roll_sampling(&mut self) {
        for (_, vp) in self.viewports.iter_mut() {
            vp.sampled_last_frame = vp.sampled_this_frame;
            vp.sampled_this_frame = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(i: u32) -> Rid {
        Rid::from_parts(i, 1, ResourceKind::Viewport)
    }

    fn ready(store: &mut ViewportStore, rid: Rid) {
        store.create(rid, Rid::INVALID).unwrap();
        store.set_size(rid, 64, 64).unwrap();
        store.set_active(rid, true).unwrap();
    }

    #[test]
    fn once_becomes_disabled() {
        let mut store = ViewportStore::default();
        ready(&mut store, viewport(0));
        store.set_update_mode(viewport(0), UpdateMode::Once).unwrap();
        assert!(store.get(viewport(0)).unwrap().is_update_eligible(false));
        store.get_mut(viewport(0)).unwrap().finish_update();
        assert_eq!(store.update_mode(viewport(0)), UpdateMode::Disabled);
        assert!(!store.get(viewport(0)).unwrap().is_update_eligible(true));
    }

    #[test]
    fn eligibility_rules() {
        let mut store = ViewportStore::default();
        ready(&mut store, viewport(0));
        let vp = store.get_mut(viewport(0)).unwrap();

        assert!(!vp.is_update_eligible(true));
        vp.sampled_last_frame = true;
        assert!(vp.is_update_eligible(false));
        vp.sampled_last_frame = false;
        vp.screen_rect = Some(Rect2::new(0.0, 0.0, 64.0, 64.0));
        assert!(vp.is_update_eligible(false));

        vp.update_mode = UpdateMode::WhenParentVisible;
        assert!(!vp.is_update_eligible(false));
        assert!(vp.is_update_eligible(true));

        vp.update_mode = UpdateMode::Always;
        vp.active = false;
        assert!(!vp.is_update_eligible(true));
        vp.active = true;
        vp.width = 0;
        assert!(!vp.is_update_eligible(true));
    }

    #[test]
    fn parents_precede_children() {
        let mut store = ViewportStore::default();
        for i in 0..3 {
            ready(&mut store, viewport(i));
        }
        store.set_parent_viewport(viewport(0), viewport(1)).unwrap();
        store.set_parent_viewport(viewport(1), viewport(2)).unwrap();
        assert_eq!(
            store.draw_order(),
            vec![viewport(2), viewport(1), viewport(0)]
        );
        assert_eq!(
            store.set_parent_viewport(viewport(2), viewport(0)),
            Err(ServerError::Cycle(viewport(2)))
        );
    }

    #[test]
    fn canvases_sort_by_stacking() {
        let mut store = ViewportStore::default();
        ready(&mut store, viewport(0));
        let a = Rid::from_parts(5, 1, ResourceKind::Canvas);
        let b = Rid::from_parts(6, 1, ResourceKind::Canvas);
        store.attach_canvas(viewport(0), a).unwrap();
        store.attach_canvas(viewport(0), b).unwrap();
        store.set_canvas_stacking(viewport(0), a, 1, 0).unwrap();
        let order: Vec<_> = store
            .get(viewport(0))
            .unwrap()
            .sorted_canvases()
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        assert_eq!(order, vec![b, a]);

        let stranger = Rid::from_parts(7, 1, ResourceKind::Canvas);
        assert!(store
            .set_canvas_stacking(viewport(0), stranger, 0, 0)
            .is_err());
    }

    #[test]
    fn resize_marks_target_dirty() {
        let mut store = ViewportStore::default();
        ready(&mut store, viewport(0));
        store.get_mut(viewport(0)).unwrap().target_dirty = false;
        store.set_size(viewport(0), 64, 64).unwrap();
        assert!(!store.get(viewport(0)).unwrap().target_dirty);
        store.set_size(viewport(0), 128, 64).unwrap();
        assert!(store.get(viewport(0)).unwrap().target_dirty);
    }
}
