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

//! Viewport and canvas operations.

use super::RenderingServer;
use umbra_core::backend::RenderTargetId;
use umbra_core::math::{Color, Rect2, Transform2D, Vec2};
use umbra_core::{ResourceKind, Rid};
use umbra_data::storage::{ClearMode, UpdateMode};

impl RenderingServer {
    // --- Viewports ---

    /// Creates an inactive, zero-sized viewport together with its proxy texture.
    pub fn viewport_create(&self) -> Rid {
        let texture = self.shared().allocator.allocate(ResourceKind::Texture);
        self.create_owning(
            ResourceKind::Viewport,
            "viewport_create",
            Some(texture),
            move |s, rid| {
                let result = s
                    .viewports
                    .create(rid, texture)
                    .and_then(|()| s.textures.create_proxy(texture, rid, 0, 0));
                if result.is_err() {
                    s.viewports.remove(rid);
                }
                result
            },
        )
    }

    /// Resizes the render target. A zero size releases it.
    pub fn viewport_set_size(&self, viewport: Rid, width: u32, height: u32) {
        self.apply("viewport_set_size", move |s| {
            s.viewports.set_size(viewport, width, height)
        });
    }

    /// Inactive viewports are never drawn.
    pub fn viewport_set_active(&self, viewport: Rid, active: bool) {
        self.apply("viewport_set_active", move |s| s.viewports.set_active(viewport, active));
    }

    /// Sets when the viewport is drawn.
    pub fn viewport_set_update_mode(&self, viewport: Rid, mode: UpdateMode) {
        self.apply("viewport_set_update_mode", move |s| {
            s.viewports.set_update_mode(viewport, mode)
        });
    }

    /// When the viewport is drawn.
    pub fn viewport_get_update_mode(&self, viewport: Rid) -> UpdateMode {
        self.query_or(
            "viewport_get_update_mode",
            viewport,
            ResourceKind::Viewport,
            UpdateMode::Disabled,
            |s| s.viewports.update_mode(viewport),
        )
    }

    /// Sets when the render target is cleared.
    pub fn viewport_set_clear_mode(&self, viewport: Rid, mode: ClearMode) {
        self.apply("viewport_set_clear_mode", move |s| {
            s.viewports.set_clear_mode(viewport, mode)
        });
    }

    /// Sets the camera of the 3D pass.
    pub fn viewport_attach_camera(&self, viewport: Rid, camera: Rid) {
        self.apply("viewport_attach_camera", move |s| {
            s.viewports.attach_camera(viewport, camera)
        });
    }

    /// Sets the scenario of the 3D pass.
    pub fn viewport_set_scenario(&self, viewport: Rid, scenario: Rid) {
        self.apply("viewport_set_scenario", move |s| {
            s.viewports.set_scenario(viewport, scenario)
        });
    }

    /// Draws `canvas` in the 2D pass.
    pub fn viewport_attach_canvas(&self, viewport: Rid, canvas: Rid) {
        self.apply("viewport_attach_canvas", move |s| {
            s.viewports.attach_canvas(viewport, canvas)
        });
    }

    /// Stops drawing `canvas`.
    pub fn viewport_remove_canvas(&self, viewport: Rid, canvas: Rid) {
        self.apply("viewport_remove_canvas", move |s| {
            s.viewports.remove_canvas(viewport, canvas)
        });
    }

    /// Sets the canvas-to-viewport transform of an attached canvas.
    pub fn viewport_set_canvas_transform(&self, viewport: Rid, canvas: Rid, transform: Transform2D) {
        self.apply("viewport_set_canvas_transform", move |s| {
            s.viewports.set_canvas_transform(viewport, canvas, transform)
        });
    }

    /// Sets the stacking order of an attached canvas.
    pub fn viewport_set_canvas_stacking(&self, viewport: Rid, canvas: Rid, layer: i32, sublayer: i32) {
        self.apply("viewport_set_canvas_stacking", move |s| {
            s.viewports
                .set_canvas_stacking(viewport, canvas, layer, sublayer)
        });
    }

    /// Nests a viewport under another one; parents draw first.
    pub fn viewport_set_parent_viewport(&self, viewport: Rid, parent: Rid) {
        self.apply("viewport_set_parent_viewport", move |s| {
            s.viewports.set_parent_viewport(viewport, parent)
        });
    }

    /// Marks the viewport as blitted to the screen by the platform layer.
    pub fn viewport_attach_to_screen(&self, viewport: Rid, rect: Rect2) {
        self.apply("viewport_attach_to_screen", move |s| {
            s.viewports.attach_to_screen(viewport, rect)
        });
    }

    /// Detaches the viewport from the screen.
    pub fn viewport_detach(&self, viewport: Rid) {
        self.apply("viewport_detach", move |s| s.viewports.detach(viewport));
    }

    /// Skips the 3D pass.
    pub fn viewport_set_disable_3d(&self, viewport: Rid, disable: bool) {
        self.apply("viewport_set_disable_3d", move |s| {
            s.viewports.set_disable_3d(viewport, disable)
        });
    }

    /// Skips the canvas pass.
    pub fn viewport_set_disable_2d(&self, viewport: Rid, disable: bool) {
        self.apply("viewport_set_disable_2d", move |s| {
            s.viewports.set_disable_2d(viewport, disable)
        });
    }

    /// Clears to transparent and gives the render target an alpha channel.
    pub fn viewport_set_transparent_background(&self, viewport: Rid, enable: bool) {
        self.apply("viewport_set_transparent_background", move |s| {
            s.viewports.set_transparent_background(viewport, enable)
        });
    }

    /// The texture sampling this viewport's output.
    pub fn viewport_get_texture(&self, viewport: Rid) -> Rid {
        self.query_or("viewport_get_texture", viewport, ResourceKind::Viewport, Rid::INVALID, |s| {
            s.viewports.texture(viewport)
        })
    }

    /// The backend render target, once realized.
    pub fn viewport_get_render_target(&self, viewport: Rid) -> Option<RenderTargetId> {
        self.query("viewport_get_render_target", viewport, ResourceKind::Viewport, |s| {
            s.viewports.render_target(viewport)
        })
    }

    // --- Canvases ---

    /// Creates an empty canvas.
    pub fn canvas_create(&self) -> Rid {
        self.create(ResourceKind::Canvas, "canvas_create", |s, rid| {
            s.canvases.create_canvas(rid)
        })
    }

    /// Tints every item of a canvas.
    pub fn canvas_set_modulate(&self, canvas: Rid, color: Color) {
        self.apply("canvas_set_modulate", move |s| {
            s.canvases.set_canvas_modulate(canvas, color)
        });
    }

    /// Creates a detached canvas item.
    pub fn canvas_item_create(&self) -> Rid {
        self.create(ResourceKind::CanvasItem, "canvas_item_create", |s, rid| {
            s.canvases.create_item(rid)
        })
    }

    /// Parents an item to a canvas or another item. Cycles are rejected.
    pub fn canvas_item_set_parent(&self, item: Rid, parent: Rid) {
        self.apply("canvas_item_set_parent", move |s| {
            s.canvases.item_set_parent(item, parent)
        });
    }

    /// Shows or hides an item and its subtree.
    pub fn canvas_item_set_visible(&self, item: Rid, visible: bool) {
        self.apply("canvas_item_set_visible", move |s| {
            s.canvases.item_set_visible(item, visible)
        });
    }

    /// Sets the item-to-parent transform.
    pub fn canvas_item_set_transform(&self, item: Rid, transform: Transform2D) {
        self.apply("canvas_item_set_transform", move |s| {
            s.canvases.item_set_transform(item, transform)
        });
    }

    /// Tints the item and its subtree.
    pub fn canvas_item_set_modulate(&self, item: Rid, color: Color) {
        self.apply("canvas_item_set_modulate", move |s| {
            s.canvases.item_set_modulate(item, color)
        });
    }

    /// Tints the item's own commands only.
    pub fn canvas_item_set_self_modulate(&self, item: Rid, color: Color) {
        self.apply("canvas_item_set_self_modulate", move |s| {
            s.canvases.item_set_self_modulate(item, color)
        });
    }

    /// Sets the z-index relative to the parent, clamped to ±4096.
    pub fn canvas_item_set_z_index(&self, item: Rid, z: i32) {
        self.apply("canvas_item_set_z_index", move |s| s.canvases.item_set_z_index(item, z));
    }

    /// Sets the order among siblings.
    pub fn canvas_item_set_draw_index(&self, item: Rid, index: i32) {
        self.apply("canvas_item_set_draw_index", move |s| {
            s.canvases.item_set_draw_index(item, index)
        });
    }

    /// Clips the children to the item's first rect.
    pub fn canvas_item_set_clip(&self, item: Rid, clip: bool) {
        self.apply("canvas_item_set_clip", move |s| s.canvases.item_set_clip(item, clip));
    }

    /// Sets the light layers affecting the item.
    pub fn canvas_item_set_light_mask(&self, item: Rid, mask: u32) {
        self.apply("canvas_item_set_light_mask", move |s| {
            s.canvases.item_set_light_mask(item, mask)
        });
    }

    /// Appends a filled rectangle.
    pub fn canvas_item_add_rect(&self, item: Rid, rect: Rect2, color: Color) {
        self.apply("canvas_item_add_rect", move |s| s.canvases.item_add_rect(item, rect, color));
    }

    /// Appends a textured rectangle.
    pub fn canvas_item_add_texture_rect(&self, item: Rid, rect: Rect2, texture: Rid, modulate: Color) {
        self.apply("canvas_item_add_texture_rect", move |s| {
            s.canvases.item_add_texture_rect(item, rect, texture, modulate)
        });
    }

    /// Appends a line segment.
    pub fn canvas_item_add_line(&self, item: Rid, from: Vec2, to: Vec2, color: Color, width: f32) {
        self.apply("canvas_item_add_line", move |s| {
            s.canvases.item_add_line(item, from, to, color, width)
        });
    }

    /// Appends a convex polygon of at least 3 points.
    pub fn canvas_item_add_polygon(
        &self,
        item: Rid,
        points: Vec<Vec2>,
        colors: Vec<Color>,
        uvs: Vec<Vec2>,
        texture: Rid,
    ) {
        self.apply("canvas_item_add_polygon", move |s| {
            s.canvases.item_add_polygon(item, points, colors, uvs, texture)
        });
    }

    /// Appends a filled circle.
    pub fn canvas_item_add_circle(&self, item: Rid, center: Vec2, radius: f32, color: Color) {
        self.apply("canvas_item_add_circle", move |s| {
            s.canvases.item_add_circle(item, center, radius, color)
        });
    }

    /// Appends a mesh drawn on the XY plane.
    pub fn canvas_item_add_mesh(
        &self,
        item: Rid,
        mesh: Rid,
        transform: Transform2D,
        modulate: Color,
        texture: Rid,
    ) {
        self.apply("canvas_item_add_mesh", move |s| {
            s.canvases
                .item_add_mesh(item, mesh, transform, modulate, texture)
        });
    }

    /// Appends a multimesh drawn on the XY plane.
    pub fn canvas_item_add_multimesh(&self, item: Rid, multimesh: Rid, texture: Rid) {
        self.apply("canvas_item_add_multimesh", move |s| {
            s.canvases.item_add_multimesh(item, multimesh, texture)
        });
    }

    /// Removes every command of an item.
    pub fn canvas_item_clear(&self, item: Rid) {
        self.apply("canvas_item_clear", move |s| s.canvases.item_clear(item));
    }

    /// Number of commands of an item.
    pub fn canvas_item_get_command_count(&self, item: Rid) -> usize {
        self.query("canvas_item_get_command_count", item, ResourceKind::CanvasItem, |s| {
            s.canvases.item_command_count(item)
        })
    }
}
