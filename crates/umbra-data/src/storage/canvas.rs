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

//! Canvases and canvas items.
//!
//! Items form a tree rooted at a canvas. Transform, modulate and visibility are
//! inherited from parent to child; `self_modulate` only tints the item's own
//! commands. Each item records a list of drawing commands that the scheduler turns
//! into 2D geometry.

use crate::handle::HandleTable;
use umbra_core::math::{Color, Rect2, Transform2D, Vec2};
use umbra_core::{ResourceKind, Rid, ServerError};

/// Bound on the absolute z-index of an item.
pub const Z_INDEX_LIMIT: i32 = 4096;

/// Deepest item tree the draw walk descends into.
pub const MAX_TREE_DEPTH: usize = 256;

/// A drawing command recorded on a canvas item.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCommand {
    /// A filled rectangle.
    Rect {
        /// Area in item space.
        rect: Rect2,
        /// Fill color.
        color: Color,
    },
    /// A textured rectangle.
    TextureRect {
        /// Area in item space.
        rect: Rect2,
        /// The texture.
        texture: Rid,
        /// Tint.
        modulate: Color,
    },
    /// A line segment.
    Line {
        /// Start point.
        from: Vec2,
        /// End point.
        to: Vec2,
        /// Color.
        color: Color,
        /// Width in pixels; below 1 draws a hairline.
        width: f32,
    },
    /// A convex polygon.
    Polygon {
        /// Outline, at least 3 points.
        points: Vec<Vec2>,
        /// Empty, one color for all points, or one per point.
        colors: Vec<Color>,
        /// Empty, one UV for all points, or one per point.
        uvs: Vec<Vec2>,
        /// Texture, or [`Rid::INVALID`].
        texture: Rid,
    },
    /// A filled circle.
    Circle {
        /// Center.
        center: Vec2,
        /// Radius.
        radius: f32,
        /// Fill color.
        color: Color,
    },
    /// A mesh drawn in 2D.
    Mesh {
        /// The mesh.
        mesh: Rid,
        /// Mesh-to-item transform.
        transform: Transform2D,
        /// Tint.
        modulate: Color,
        /// Texture, or [`Rid::INVALID`].
        texture: Rid,
    },
    /// A multimesh drawn in 2D.
    MultiMesh {
        /// The multimesh.
        multimesh: Rid,
        /// Texture, or [`Rid::INVALID`].
        texture: Rid,
    },
}

impl CanvasCommand {
    /// Texture sampled by this command, if any.
    pub fn texture(&self) -> Option<Rid> {
        match self {
            CanvasCommand::TextureRect { texture, .. }
            | CanvasCommand::Polygon { texture, .. }
            | CanvasCommand::Mesh { texture, .. }
            | CanvasCommand::MultiMesh { texture, .. } => texture.is_valid().then_some(*texture),
            _ => None,
        }
    }
}

/// A canvas: the root of an item tree.
#[derive(Debug, Clone)]
pub struct Canvas {
    /// Tint applied to every item.
    pub modulate: Color,
    /// Root items in insertion order.
    pub items: Vec<Rid>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            modulate: Color::WHITE,
            items: Vec::new(),
        }
    }
}

/// A node of a canvas tree.
#[derive(Debug, Clone)]
pub struct CanvasItem {
    /// A canvas, another item, or [`Rid::INVALID`].
    pub parent: Rid,
    /// Children in insertion order.
    pub children: Vec<Rid>,
    /// Item-to-parent transform.
    pub transform: Transform2D,
    /// Tint inherited by children.
    pub modulate: Color,
    /// Tint of this item's own commands only.
    pub self_modulate: Color,
    /// Hidden items hide their whole subtree.
    pub visible: bool,
    /// Z-index relative to the parent.
    pub z_index: i32,
    /// Order among siblings.
    pub draw_index: i32,
    /// Clip children to this item's first rect command.
    pub clip: bool,
    /// Light layers affecting the item.
    pub light_mask: u32,
    /// Drawing commands.
    pub commands: Vec<CanvasCommand>,
}

impl Default for CanvasItem {
    fn default() -> Self {
        Self {
            parent: Rid::INVALID,
            children: Vec::new(),
            transform: Transform2D::IDENTITY,
            modulate: Color::WHITE,
            self_modulate: Color::WHITE,
            visible: true,
            z_index: 0,
            draw_index: 0,
            clip: false,
            light_mask: 1,
            commands: Vec::new(),
        }
    }
}

/// An item resolved by the draw walk, ready to be tessellated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    /// The item.
    pub item: Rid,
    /// Item-to-viewport transform.
    pub transform: Transform2D,
    /// Tint of the item's commands: inherited modulate times self-modulate.
    pub modulate: Color,
    /// Absolute z-index.
    pub z: i32,
    /// Clip rectangle in viewport space, from the nearest clipping ancestor.
    pub clip: Option<Rect2>,
}

/// Storage for canvases and canvas items.
#[derive(Debug)]
pub struct CanvasStore {
    canvases: HandleTable<Canvas>,
    items: HandleTable<CanvasItem>,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self {
            canvases: HandleTable::new(ResourceKind::Canvas),
            items: HandleTable::new(ResourceKind::CanvasItem),
        }
    }
}

store_access!(CanvasStore, Canvas, canvases);

impl CanvasStore {
    /// Creates an empty canvas.
    pub fn create_canvas(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.canvases.insert(rid, Canvas::default())
    }

    /// Sets the canvas tint.
    pub fn set_canvas_modulate(&mut self, rid: Rid, color: Color) -> Result<(), ServerError> {
        self.canvases.lookup_mut(rid)?.modulate = color;
        Ok(())
    }

    /// Removes a canvas; its root items become detached.
    pub fn remove_canvas(&mut self, rid: Rid) -> Option<Canvas> {
        let canvas = self.canvases.remove(rid)?;
        for item in &canvas.items {
            if let Some(item) = self.items.get_mut(*item) {
                item.parent = Rid::INVALID;
            }
        }
        Some(canvas)
    }

    /// Creates a detached, empty item.
    pub fn create_item(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.items.insert(rid, CanvasItem::default())
    }

    /// The item named by `rid`, if live.
    pub fn item(&self, rid: Rid) -> Option<&CanvasItem> {
        self.items.get(rid)
    }

    /// Returns `true` if `rid` names a live item.
    pub fn contains_item(&self, rid: Rid) -> bool {
        self.items.contains(rid)
    }

    /// Number of live items.
    pub fn item_len(&self) -> usize {
        self.items.len()
    }

    /// Iterates over live items.
    pub fn items(&self) -> impl Iterator<Item = (Rid, &CanvasItem)> {
        self.items.iter()
    }

    /// Removes an item, unlinking it from its parent. Its children become detached.
    pub fn remove_item(&mut self, rid: Rid) -> Option<CanvasItem> {
        let item = self.items.remove(rid)?;
        self.unlink(rid, item.parent);
        for child in &item.children {
            if let Some(child) = self.items.get_mut(*child) {
                child.parent = Rid::INVALID;
            }
        }
        Some(item)
    }

    fn unlink(&mut self, rid: Rid, parent: Rid) {
        if let Some(canvas) = self.canvases.get_mut(parent) {
            canvas.items.retain(|r| *r != rid);
        } else if let Some(item) = self.items.get_mut(parent) {
            item.children.retain(|r| *r != rid);
        }
    }

    /// Re-parents an item under a canvas or another item. [`Rid::INVALID`] detaches.
    ///
    /// ## Errors
    /// * `ServerError::WrongKind` - If `parent` is neither a canvas nor an item.
    /// * `ServerError::Cycle` - If `rid` is `parent` or one of its ancestors.
    pub fn item_set_parent(&mut self, rid: Rid, parent: Rid) -> Result<(), ServerError> {
        self.items.lookup(rid)?;
        match parent.kind() {
            _ if !parent.is_valid() => {}
            ResourceKind::Canvas => {
                self.canvases.lookup(parent)?;
            }
            ResourceKind::CanvasItem => {
                self.items.lookup(parent)?;
                let mut cursor = parent;
                let mut steps = 0;
                while cursor.is_valid() {
                    if cursor == rid || steps > self.items.len() {
                        return Err(ServerError::Cycle(rid));
                    }
                    cursor = self.items.get(cursor).map_or(Rid::INVALID, |i| i.parent);
                    steps += 1;
                }
            }
            _ => {
                return Err(ServerError::WrongKind {
                    rid: parent,
                    expected: ResourceKind::CanvasItem,
                })
            }
        }

        let previous = self.items.lookup(rid)?.parent;
        self.unlink(rid, previous);
        if let Some(canvas) = self.canvases.get_mut(parent) {
            canvas.items.push(rid);
        } else if let Some(item) = self.items.get_mut(parent) {
            item.children.push(rid);
        }
        self.items.lookup_mut(rid)?.parent = parent;
        Ok(())
    }

    /// Shows or hides an item and its subtree.
    pub fn item_set_visible(&mut self, rid: Rid, visible: bool) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.visible = visible;
        Ok(())
    }

    /// Sets the item-to-parent transform.
    pub fn item_set_transform(&mut self, rid: Rid, transform: Transform2D) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.transform = transform;
        Ok(())
    }

    /// Sets the inherited tint.
    pub fn item_set_modulate(&mut self, rid: Rid, color: Color) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.modulate = color;
        Ok(())
    }

    /// Sets the tint of the item's own commands.
    pub fn item_set_self_modulate(&mut self, rid: Rid, color: Color) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.self_modulate = color;
        Ok(())
    }

    /// Sets the relative z-index, clamped to `±Z_INDEX_LIMIT`.
    pub fn item_set_z_index(&mut self, rid: Rid, z: i32) -> Result<(), ServerError> {
        let clamped = z.clamp(-Z_INDEX_LIMIT, Z_INDEX_LIMIT);
        if clamped != z {
            log::warn!("Canvas item z-index {z} clamped to {clamped}.");
        }
        self.items.lookup_mut(rid)?.z_index = clamped;
        Ok(())
    }

    /// Sets the order among siblings.
    pub fn item_set_draw_index(&mut self, rid: Rid, index: i32) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.draw_index = index;
        Ok(())
    }

    /// Enables clipping of the children.
    pub fn item_set_clip(&mut self, rid: Rid, clip: bool) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.clip = clip;
        Ok(())
    }

    /// Sets the light layers.
    pub fn item_set_light_mask(&mut self, rid: Rid, mask: u32) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.light_mask = mask;
        Ok(())
    }

    fn push(&mut self, rid: Rid, command: CanvasCommand) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.commands.push(command);
        Ok(())
    }

    /// Records a filled rectangle.
    pub fn item_add_rect(&mut self, rid: Rid, rect: Rect2, color: Color) -> Result<(), ServerError> {
        self.push(rid, CanvasCommand::Rect { rect, color })
    }

    /// Records a textured rectangle.
    pub fn item_add_texture_rect(
        &mut self,
        rid: Rid,
        rect: Rect2,
        texture: Rid,
        modulate: Color,
    ) -> Result<(), ServerError> {
        ServerError::check_kind(texture, ResourceKind::Texture)?;
        self.push(
            rid,
            CanvasCommand::TextureRect {
                rect,
                texture,
                modulate,
            },
        )
    }

    /// Records a line segment.
    pub fn item_add_line(
        &mut self,
        rid: Rid,
        from: Vec2,
        to: Vec2,
        color: Color,
        width: f32,
    ) -> Result<(), ServerError> {
        self.push(
            rid,
            CanvasCommand::Line {
                from,
                to,
                color,
                width,
            },
        )
    }

    /// Records a convex polygon.
    ///
    /// ## Errors
    /// * `ServerError::MalformedData` - With fewer than 3 points, or with colors or
    ///   UVs that are neither empty, single, nor one per point.
    pub fn item_add_polygon(
        &mut self,
        rid: Rid,
        points: Vec<Vec2>,
        colors: Vec<Color>,
        uvs: Vec<Vec2>,
        texture: Rid,
    ) -> Result<(), ServerError> {
        let n = points.len();
        if n < 3 {
            return Err(ServerError::MalformedData(format!(
                "polygon needs at least 3 points, got {n}"
            )));
        }
        for (what, len) in [("colors", colors.len()), ("uvs", uvs.len())] {
            if len > 1 && len != n {
                return Err(ServerError::MalformedData(format!(
                    "polygon has {n} points but {len} {what}"
                )));
            }
        }
        if texture.is_valid() {
            ServerError::check_kind(texture, ResourceKind::Texture)?;
        }
        self.push(
            rid,
            CanvasCommand::Polygon {
                points,
                colors,
                uvs,
                texture,
            },
        )
    }

    /// Records a filled circle.
    pub fn item_add_circle(
        &mut self,
        rid: Rid,
        center: Vec2,
        radius: f32,
        color: Color,
    ) -> Result<(), ServerError> {
        self.push(
            rid,
            CanvasCommand::Circle {
                center,
                radius,
                color,
            },
        )
    }

    /// Records a mesh.
    pub fn item_add_mesh(
        &mut self,
        rid: Rid,
        mesh: Rid,
        transform: Transform2D,
        modulate: Color,
        texture: Rid,
    ) -> Result<(), ServerError> {
        ServerError::check_kind(mesh, ResourceKind::Mesh)?;
        if texture.is_valid() {
            ServerError::check_kind(texture, ResourceKind::Texture)?;
        }
        self.push(
            rid,
            CanvasCommand::Mesh {
                mesh,
                transform,
                modulate,
                texture,
            },
        )
    }

    /// Records a multimesh.
    pub fn item_add_multimesh(&mut self, rid: Rid, multimesh: Rid, texture: Rid) -> Result<(), ServerError> {
        ServerError::check_kind(multimesh, ResourceKind::MultiMesh)?;
        if texture.is_valid() {
            ServerError::check_kind(texture, ResourceKind::Texture)?;
        }
        self.push(rid, CanvasCommand::MultiMesh { multimesh, texture })
    }

    /// Drops every recorded command.
    pub fn item_clear(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.items.lookup_mut(rid)?.commands.clear();
        Ok(())
    }

    /// Number of recorded commands; 0 for unknown handles.
    pub fn item_command_count(&self, rid: Rid) -> usize {
        self.items.get(rid).map_or(0, |i| i.commands.len())
    }

    /// Walks the visible items of a canvas in drawing order.
    ///
    /// Siblings are ordered by draw index, then insertion. The final list is sorted
    /// by absolute z-index with tree order breaking ties. Hidden subtrees are skipped;
    /// cycles and trees deeper than [`MAX_TREE_DEPTH`] are cut with a warning.
    pub fn resolve(&self, canvas: Rid, base: Transform2D) -> Vec<ResolvedItem> {
        let Some(root) = self.canvases.get(canvas) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = Vec::new();
        let walk = Walk {
            transform: base,
            modulate: root.modulate,
            z: 0,
            clip: None,
        };
        self.walk_children(&root.items, walk, 0, &mut stack, &mut out);
        out.sort_by_key(|item| item.z);
        out
    }

    fn walk_children(
        &self,
        children: &[Rid],
        parent: Walk,
        depth: usize,
        stack: &mut Vec<Rid>,
        out: &mut Vec<ResolvedItem>,
    ) {
        let mut ordered: Vec<(Rid, &CanvasItem)> = children
            .iter()
            .filter_map(|rid| self.items.get(*rid).map(|i| (*rid, i)))
            .collect();
        ordered.sort_by_key(|(_, item)| item.draw_index);

        for (rid, item) in ordered {
            if !item.visible {
                continue;
            }
            if depth >= MAX_TREE_DEPTH || stack.contains(&rid) {
                log::warn!("Canvas walk cut at {rid}: cycle or depth over {MAX_TREE_DEPTH}.");
                continue;
            }
            let transform = parent.transform * item.transform;
            let modulate = parent.modulate * item.modulate;
            let z = (parent.z + item.z_index).clamp(-Z_INDEX_LIMIT, Z_INDEX_LIMIT);
            out.push(ResolvedItem {
                item: rid,
                transform,
                modulate: modulate * item.self_modulate,
                z,
                clip: parent.clip,
            });

            let clip = if item.clip {
                clip_rect(item, &transform).or(parent.clip)
            } else {
                parent.clip
            };
            stack.push(rid);
            let walk = Walk {
                transform,
                modulate,
                z,
                clip,
            };
            self.walk_children(&item.children, walk, depth + 1, stack, out);
            stack.pop();
        }
    }
}

#[derive(Clone, Copy)]
struct Walk {
    transform: Transform2D,
    modulate: Color,
    z: i32,
    clip: Option<Rect2>,
}

/// Viewport-space bounds of an item's first rectangle command.
fn clip_rect(item: &CanvasItem, transform: &Transform2D) -> Option<Rect2> {
    let rect = item.commands.iter().find_map(|c| match c {
        CanvasCommand::Rect { rect, .. } | CanvasCommand::TextureRect { rect, .. } => Some(*rect),
        _ => None,
    })?;
    let end = rect.end();
    let corners = [
        rect.position,
        Vec2::new(end.x, rect.position.y),
        end,
        Vec2::new(rect.position.x, end.y),
    ]
    .map(|p| transform.xform(p));
    let min = corners.iter().fold(corners[0], |a, b| a.min(*b));
    let max = corners.iter().fold(corners[0], |a, b| a.max(*b));
    Some(Rect2::new(min.x, min.y, max.x - min.x, max.y - min.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(i: u32) -> Rid {
        Rid::from_parts(i, 1, ResourceKind::Canvas)
    }

    fn item(i: u32) -> Rid {
        Rid::from_parts(i, 1, ResourceKind::CanvasItem)
    }

    fn tree() -> CanvasStore {
        let mut store = CanvasStore::default();
        store.create_canvas(canvas(0)).unwrap();
        for i in 1..=3 {
            store.create_item(item(i)).unwrap();
        }
        store.item_set_parent(item(1), canvas(0)).unwrap();
        store.item_set_parent(item(2), item(1)).unwrap();
        store.item_set_parent(item(3), item(2)).unwrap();
        store
    }

    #[test]
    fn cycles_are_rejected() {
        let mut store = tree();
        assert_eq!(
            store.item_set_parent(item(1), item(3)),
            Err(ServerError::Cycle(item(1)))
        );
        assert_eq!(
            store.item_set_parent(item(2), item(2)),
            Err(ServerError::Cycle(item(2)))
        );
        assert_eq!(store.item(item(1)).unwrap().parent, canvas(0));
    }

    #[test]
    fn reparenting_updates_children_lists() {
        let mut store = tree();
        store.item_set_parent(item(3), canvas(0)).unwrap();
        assert!(store.item(item(2)).unwrap().children.is_empty());
        assert_eq!(store.get(canvas(0)).unwrap().items, vec![item(1), item(3)]);

        store.remove_item(item(1));
        assert_eq!(store.get(canvas(0)).unwrap().items, vec![item(3)]);
        assert_eq!(store.item(item(2)).unwrap().parent, Rid::INVALID);
    }

    #[test]
    fn visibility_and_modulate_inherit() {
        let mut store = tree();
        store
            .item_set_modulate(item(1), Color::rgba(0.5, 0.5, 0.5, 1.0))
            .unwrap();
        store
            .item_set_self_modulate(item(2), Color::rgba(1.0, 0.0, 1.0, 1.0))
            .unwrap();
        store
            .item_set_transform(item(1), Transform2D::from_translation(Vec2::new(10.0, 0.0)))
            .unwrap();
        store
            .item_set_transform(item(3), Transform2D::from_translation(Vec2::new(0.0, 5.0)))
            .unwrap();

        let resolved = store.resolve(canvas(0), Transform2D::IDENTITY);
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[1].modulate, Color::rgba(0.5, 0.0, 0.5, 1.0));
        // Self-modulate of item 2 does not reach item 3.
        assert_eq!(resolved[2].modulate, Color::rgba(0.5, 0.5, 0.5, 1.0));
        assert_eq!(resolved[2].transform.origin, Vec2::new(10.0, 5.0));

        store.item_set_visible(item(2), false).unwrap();
        let resolved = store.resolve(canvas(0), Transform2D::IDENTITY);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn z_index_orders_and_clamps() {
        let mut store = tree();
        store.item_set_z_index(item(1), 10_000).unwrap();
        assert_eq!(store.item(item(1)).unwrap().z_index, Z_INDEX_LIMIT);

        store.item_set_z_index(item(1), 0).unwrap();
        store.item_set_z_index(item(2), 3).unwrap();
        store.item_set_z_index(item(3), -5).unwrap();
        let order: Vec<_> = store
            .resolve(canvas(0), Transform2D::IDENTITY)
            .into_iter()
            .map(|r| (r.item, r.z))
            .collect();
        assert_eq!(order, vec![(item(3), -2), (item(1), 0), (item(2), 3)]);
    }

    #[test]
    fn polygon_validation() {
        let mut store = tree();
        let square = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        assert!(store
            .item_add_polygon(item(1), square[..2].to_vec(), vec![], vec![], Rid::INVALID)
            .is_err());
        assert!(store
            .item_add_polygon(item(1), square.clone(), vec![Color::WHITE; 2], vec![], Rid::INVALID)
            .is_err());
        store
            .item_add_polygon(item(1), square.clone(), vec![Color::WHITE], vec![], Rid::INVALID)
            .unwrap();
        store
            .item_add_polygon(item(1), square, vec![], vec![Vec2::ZERO; 4], Rid::INVALID)
            .unwrap();
        assert_eq!(store.item_command_count(item(1)), 2);
        store.item_clear(item(1)).unwrap();
        assert_eq!(store.item_command_count(item(1)), 0);
    }

    #[test]
    fn clipping_propagates_to_descendants() {
        let mut store = tree();
        store
            .item_add_rect(item(1), Rect2::new(0.0, 0.0, 20.0, 10.0), Color::WHITE)
            .unwrap();
        store.item_set_clip(item(1), true).unwrap();
        let resolved = store.resolve(canvas(0), Transform2D::IDENTITY);
        assert_eq!(resolved[0].clip, None);
        assert_eq!(resolved[1].clip, Some(Rect2::new(0.0, 0.0, 20.0, 10.0)));
        assert_eq!(resolved[2].clip, Some(Rect2::new(0.0, 0.0, 20.0, 10.0)));
    }
}
