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

//! The canvas pass: tessellating item commands into batched 2D geometry.

use super::bind_texture;
use crate::state::ServerState;
use umbra_core::backend::{CanvasBatch, CanvasPrimitive, CanvasVertex, TextureBinding, INSTANCE_FLOATS};
use umbra_core::format::PrimitiveType;
use umbra_core::math::{Color, Rect2, Transform2D, Vec2};
use umbra_core::Rid;
use umbra_data::storage::canvas::ResolvedItem;
use umbra_data::storage::{CanvasCommand, Mesh};

/// Segments used to approximate a circle.
pub const CIRCLE_SEGMENTS: usize = 32;

/// The batched 2D geometry of one viewport.
#[derive(Debug, Default)]
pub(crate) struct CanvasPass {
    pub batches: Vec<CanvasBatch>,
    pub objects: u64,
}

impl CanvasPass {
    pub fn primitives(&self) -> u64 {
        self.batches.iter().map(CanvasBatch::primitive_count).sum()
    }

    /// The batch new geometry of this texture and topology goes to.
    fn batch(&mut self, texture: TextureBinding, primitive: CanvasPrimitive) -> &mut CanvasBatch {
        let reusable = self
            .batches
            .last()
            .is_some_and(|b| b.texture == texture && b.primitive == primitive);
        if !reusable {
            self.batches.push(CanvasBatch {
                texture,
                primitive,
                vertices: Vec::new(),
                indices: Vec::new(),
            });
        }
        let last = self.batches.len() - 1;
        &mut self.batches[last]
    }
}

/// Appends vertices and indices relative to the first appended vertex.
fn emit(batch: &mut CanvasBatch, vertices: &[CanvasVertex], indices: impl IntoIterator<Item = u32>) {
    let base = batch.vertices.len() as u32;
    batch.vertices.extend_from_slice(vertices);
    batch.indices.extend(indices.into_iter().map(|i| base + i));
}

fn vertex(position: Vec2, uv: Vec2, color: Color) -> CanvasVertex {
    CanvasVertex {
        position: [position.x, position.y],
        uv: [uv.x, uv.y],
        color: color.to_array(),
    }
}

fn outside(clip: Option<Rect2>, points: &[Vec2]) -> bool {
    let Some(clip) = clip else {
        return false;
    };
    let Some(first) = points.first() else {
        return true;
    };
    let (min, max) = points
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    let end = clip.end();
    max.x < clip.position.x || max.y < clip.position.y || min.x > end.x || min.y > end.y
}

/// Walks the canvases attached to a viewport, by layer then sublayer.
pub(crate) fn build_canvas(state: &ServerState, viewport: Rid, sampled: &mut Vec<Rid>) -> CanvasPass {
    let mut pass = CanvasPass::default();
    let Some(vp) = state.viewports.get(viewport) else {
        return pass;
    };
    for (canvas, attachment) in vp.sorted_canvases() {
        for item in state.canvases.resolve(canvas, attachment.transform) {
            let Some(commands) = state.canvases.item(item.item).map(|i| &i.commands) else {
                continue;
            };
            let mut drew = false;
            for command in commands {
                drew |= tessellate(state, &mut pass, &item, command, viewport, sampled);
            }
            if drew {
                pass.objects += 1;
            }
        }
    }
    pass
}

/// Tessellates one command. Returns `true` if any geometry was emitted.
fn tessellate(
    state: &ServerState,
    pass: &mut CanvasPass,
    item: &ResolvedItem,
    command: &CanvasCommand,
    viewport: Rid,
    sampled: &mut Vec<Rid>,
) -> bool {
    let xf = item.transform;
    let modulate = item.modulate;
    let texture_of = |rid: Rid, sampled: &mut Vec<Rid>| {
        if rid.is_valid() {
            bind_texture(state, rid, viewport, sampled)
        } else {
            TextureBinding::White
        }
    };

    match command {
        CanvasCommand::Rect { rect, color } => {
            quad(pass, xf, *rect, *color * modulate, TextureBinding::White, item.clip)
        }
        CanvasCommand::TextureRect {
            rect,
            texture,
            modulate: tint,
        } => {
            let binding = texture_of(*texture, sampled);
            quad(pass, xf, *rect, *tint * modulate, binding, item.clip)
        }
        CanvasCommand::Line {
            from,
            to,
            color,
            width,
        } => {
            let (a, b) = (xf.xform(*from), xf.xform(*to));
            if outside(item.clip, &[a, b]) {
                return false;
            }
            let color = *color * modulate;
            if *width <= 1.0 {
                let batch = pass.batch(TextureBinding::White, CanvasPrimitive::Lines);
                emit(batch, &[vertex(a, Vec2::ZERO, color), vertex(b, Vec2::ZERO, color)], [0, 1]);
            } else {
                let normal = (b - a).normalize().perp() * (*width * 0.5);
                let corners = [a + normal, b + normal, b - normal, a - normal];
                let vertices = corners.map(|p| vertex(p, Vec2::ZERO, color));
                let batch = pass.batch(TextureBinding::White, CanvasPrimitive::Triangles);
                emit(batch, &vertices, [0, 1, 2, 0, 2, 3]);
            }
            true
        }
        CanvasCommand::Polygon {
            points,
            colors,
            uvs,
            texture,
        } => {
            let transformed: Vec<Vec2> = points.iter().map(|p| xf.xform(*p)).collect();
            if outside(item.clip, &transformed) {
                return false;
            }
            let vertices: Vec<CanvasVertex> = transformed
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let color = colors.get(i).or(colors.first()).copied().unwrap_or(Color::WHITE);
                    let uv = uvs.get(i).or(uvs.first()).copied().unwrap_or(Vec2::ZERO);
                    vertex(*p, uv, color * modulate)
                })
                .collect();
            let binding = texture_of(*texture, sampled);
            let batch = pass.batch(binding, CanvasPrimitive::Triangles);
            emit(batch, &vertices, fan(vertices.len()));
            true
        }
        CanvasCommand::Circle {
            center,
            radius,
            color,
        } => {
            let color = *color * modulate;
            let mut points = Vec::with_capacity(CIRCLE_SEGMENTS);
            for i in 0..CIRCLE_SEGMENTS {
                let angle = i as f32 / CIRCLE_SEGMENTS as f32 * std::f32::consts::TAU;
                let offset = Vec2::new(angle.cos(), angle.sin()) * *radius;
                points.push(xf.xform(*center + offset));
            }
            if outside(item.clip, &points) {
                return false;
            }
            let vertices: Vec<CanvasVertex> = points
                .iter()
                .map(|p| vertex(*p, Vec2::ZERO, color))
                .collect();
            let batch = pass.batch(TextureBinding::White, CanvasPrimitive::Triangles);
            emit(batch, &vertices, fan(vertices.len()));
            true
        }
        CanvasCommand::Mesh {
            mesh,
            transform,
            modulate: tint,
            texture,
        } => {
            let Some(mesh) = state.meshes.get(*mesh) else {
                return false;
            };
            let binding = texture_of(*texture, sampled);
            mesh_2d(pass, mesh, xf * *transform, *tint * modulate, binding)
        }
        CanvasCommand::MultiMesh { multimesh, texture } => {
            let Some(mm) = state.multimeshes.get(*multimesh) else {
                return false;
            };
            let Some(mesh) = state.meshes.get(mm.mesh) else {
                return false;
            };
            let binding = texture_of(*texture, sampled);
            let instances = mm.canonical_instances();
            let mut drew = false;
            for floats in instances.chunks_exact(INSTANCE_FLOATS) {
                let mut rows = [0.0f32; 8];
                rows.copy_from_slice(&floats[..8]);
                let local = Transform2D::from_rows_2x4(&rows);
                let color = Color::rgba(floats[12], floats[13], floats[14], floats[15]);
                drew |= mesh_2d(pass, mesh, xf * local, color * modulate, binding);
            }
            drew
        }
    }
}

/// Triangle fan indices over a convex outline.
fn fan(count: usize) -> impl Iterator<Item = u32> {
    (1..count.saturating_sub(1) as u32).flat_map(|i| [0, i, i + 1])
}

fn quad(
    pass: &mut CanvasPass,
    xf: Transform2D,
    rect: Rect2,
    color: Color,
    texture: TextureBinding,
    clip: Option<Rect2>,
) -> bool {
    let end = rect.end();
    let corners = [
        rect.position,
        Vec2::new(end.x, rect.position.y),
        end,
        Vec2::new(rect.position.x, end.y),
    ]
    .map(|p| xf.xform(p));
    if outside(clip, &corners) {
        return false;
    }
    let uvs = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];
    let vertices = [0, 1, 2, 3].map(|i| vertex(corners[i], uvs[i], color));
    let batch = pass.batch(texture, CanvasPrimitive::Triangles);
    emit(batch, &vertices, [0, 1, 2, 0, 2, 3]);
    true
}

/// Draws the triangle and line surfaces of a mesh projected on the XY plane.
fn mesh_2d(
    pass: &mut CanvasPass,
    mesh: &Mesh,
    xf: Transform2D,
    modulate: Color,
    texture: TextureBinding,
) -> bool {
    let mut drew = false;
    for surface in &mesh.surfaces {
        let primitive = match surface.primitive {
            PrimitiveType::Triangles => CanvasPrimitive::Triangles,
            PrimitiveType::Lines => CanvasPrimitive::Lines,
            _ => continue,
        };
        let vertices: Vec<CanvasVertex> = (0..surface.vertex_count)
            .map(|v| {
                let p = surface.position(v);
                vertex(xf.xform(Vec2::new(p.x, p.y)), surface.uv(v), surface.color(v) * modulate)
            })
            .collect();
        let batch = pass.batch(texture, primitive);
        emit(batch, &vertices, surface.indices());
        drew = true;
    }
    drew
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_covers_convex_outline() {
        let indices: Vec<u32> = fan(5).collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
        assert_eq!(fan(2).count(), 0);
    }

    #[test]
    fn consecutive_geometry_shares_a_batch() {
        let mut pass = CanvasPass::default();
        let rect = Rect2::new(0.0, 0.0, 4.0, 4.0);
        quad(&mut pass, Transform2D::IDENTITY, rect, Color::WHITE, TextureBinding::White, None);
        quad(&mut pass, Transform2D::IDENTITY, rect, Color::WHITE, TextureBinding::White, None);
        assert_eq!(pass.batches.len(), 1);
        assert_eq!(pass.batches[0].vertices.len(), 8);
        assert_eq!(pass.batches[0].indices[6..], [4, 5, 6, 4, 6, 7]);
        assert_eq!(pass.primitives(), 4);

        let binding = TextureBinding::Texture(umbra_core::backend::BackendTextureId(3));
        quad(&mut pass, Transform2D::IDENTITY, rect, Color::WHITE, binding, None);
        assert_eq!(pass.batches.len(), 2);
    }

    #[test]
    fn clipped_geometry_is_dropped() {
        let mut pass = CanvasPass::default();
        let clip = Some(Rect2::new(0.0, 0.0, 10.0, 10.0));
        let far = Rect2::new(50.0, 50.0, 4.0, 4.0);
        assert!(!quad(&mut pass, Transform2D::IDENTITY, far, Color::WHITE, TextureBinding::White, clip));
        let near = Rect2::new(8.0, 8.0, 4.0, 4.0);
        assert!(quad(&mut pass, Transform2D::IDENTITY, near, Color::WHITE, TextureBinding::White, clip));
        assert_eq!(pass.batches.len(), 1);
    }
}
