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

//! Texture, shader, material, mesh, multimesh, light and particles operations.

use super::{or_default, RenderingServer};
use umbra_core::format::{
    ArrayFormat, MultimeshTransformFormat, PrimitiveType, TextureFormat, TextureLayeredType,
};
use umbra_core::image::Image;
use umbra_core::math::{Aabb, Color, Mat4, Transform2D};
use umbra_core::variant::Variant;
use umbra_core::{ResourceKind, Rid};
use umbra_data::storage::texture::validate_image;
use umbra_data::storage::{LightParam, LightType, ShaderMode, ShaderParam, SurfaceArrays, SurfaceData};

/// Rejects an image up front so a failed create can return [`Rid::INVALID`]
/// from any thread.
fn prevalidate(label: &'static str, images: &[Image]) -> bool {
    if images.is_empty() {
        log::warn!("'{label}' rejected: no image supplied.");
        return false;
    }
    for image in images {
        if let Err(err) = validate_image(image) {
            log::warn!("'{label}' rejected: {err}");
            return false;
        }
    }
    true
}

impl RenderingServer {
    // --- Textures ---

    /// Creates a 2D texture from an image.
    ///
    /// ## Returns
    /// The texture handle, or [`Rid::INVALID`] if the image is malformed.
    pub fn texture_2d_create(&self, image: Image) -> Rid {
        if !prevalidate("texture_2d_create", std::slice::from_ref(&image)) {
            return Rid::INVALID;
        }
        self.create(ResourceKind::Texture, "texture_2d_create", move |s, rid| {
            s.textures.create_2d(rid, image)
        })
    }

    /// Creates an array, cubemap or cubemap-array texture from same-shaped layers.
    pub fn texture_2d_layered_create(&self, images: Vec<Image>, layered: TextureLayeredType) -> Rid {
        if !prevalidate("texture_2d_layered_create", &images) {
            return Rid::INVALID;
        }
        self.create(ResourceKind::Texture, "texture_2d_layered_create", move |s, rid| {
            s.textures.create_layered(rid, images, layered)
        })
    }

    /// Creates a volume texture from `depth` slices.
    ///
    /// ## Arguments
    /// * `mipmaps` - Whether every slice carries a mip chain.
    pub fn texture_3d_create(
        &self,
        format: TextureFormat,
        width: u32,
        height: u32,
        depth: u32,
        mipmaps: bool,
        images: Vec<Image>,
    ) -> Rid {
        if !prevalidate("texture_3d_create", &images) {
            return Rid::INVALID;
        }
        if images.iter().any(|image| image.mipmaps != mipmaps) {
            log::warn!("'texture_3d_create' rejected: slice mipmaps do not match the request.");
            return Rid::INVALID;
        }
        self.create(ResourceKind::Texture, "texture_3d_create", move |s, rid| {
            s.textures.create_3d(rid, format, width, height, depth, images)
        })
    }

    /// Creates a content-less texture that samples as white.
    pub fn texture_2d_placeholder_create(&self) -> Rid {
        self.create(ResourceKind::Texture, "texture_2d_placeholder_create", |s, rid| {
            s.textures.create_placeholder(rid)
        })
    }

    /// Replaces one layer. Size and format must match the original.
    pub fn texture_2d_update(&self, texture: Rid, image: Image, layer: usize) {
        self.apply("texture_2d_update", move |s| s.textures.update(texture, image, layer));
    }

    /// The retained image of a 2D texture.
    pub fn texture_2d_get(&self, texture: Rid) -> Option<Image> {
        self.query("texture_2d_get", texture, ResourceKind::Texture, |s| {
            s.textures.get_2d(texture)
        })
    }

    /// The retained image of one layer.
    pub fn texture_2d_layer_get(&self, texture: Rid, layer: usize) -> Option<Image> {
        self.query("texture_2d_layer_get", texture, ResourceKind::Texture, |s| {
            s.textures.get_layer(texture, layer)
        })
    }

    /// Width and height of the base level; `(0, 0)` for dead handles.
    pub fn texture_get_size(&self, texture: Rid) -> (u32, u32) {
        self.query("texture_get_size", texture, ResourceKind::Texture, |s| {
            s.textures.size(texture).unwrap_or_default()
        })
    }

    /// The texel format.
    pub fn texture_get_format(&self, texture: Rid) -> TextureFormat {
        self.query("texture_get_format", texture, ResourceKind::Texture, |s| {
            s.textures.format(texture).unwrap_or_default()
        })
    }

    /// Records the resource path of a texture.
    pub fn texture_set_path(&self, texture: Rid, path: impl Into<String>) {
        let path = path.into();
        self.apply("texture_set_path", move |s| s.textures.set_path(texture, path));
    }

    /// The resource path of a texture.
    pub fn texture_get_path(&self, texture: Rid) -> String {
        self.query("texture_get_path", texture, ResourceKind::Texture, |s| {
            s.textures
                .get(texture)
                .map(|t| t.path.clone())
                .unwrap_or_default()
        })
    }

    // --- Shaders ---

    /// Creates an empty shader.
    pub fn shader_create(&self) -> Rid {
        self.create(ResourceKind::Shader, "shader_create", |s, rid| {
            s.shaders.create(rid)
        })
    }

    /// Replaces the source and reparses its mode and uniforms.
    pub fn shader_set_code(&self, shader: Rid, code: impl Into<String>) {
        let code = code.into();
        self.apply("shader_set_code", move |s| s.shaders.set_code(shader, code));
    }

    /// The shader source.
    pub fn shader_get_code(&self, shader: Rid) -> String {
        self.query("shader_get_code", shader, ResourceKind::Shader, |s| {
            s.shaders.code(shader)
        })
    }

    /// The mode declared by `shader_type`.
    pub fn shader_get_mode(&self, shader: Rid) -> ShaderMode {
        self.query("shader_get_mode", shader, ResourceKind::Shader, |s| {
            s.shaders.get(shader).map(|sh| sh.mode).unwrap_or_default()
        })
    }

    /// The declared uniforms, in source order.
    pub fn shader_get_parameter_list(&self, shader: Rid) -> Vec<ShaderParam> {
        self.query("shader_get_parameter_list", shader, ResourceKind::Shader, |s| {
            s.shaders.params(shader)
        })
    }

    // --- Materials ---

    /// Creates a material without a shader.
    pub fn material_create(&self) -> Rid {
        self.create(ResourceKind::Material, "material_create", |s, rid| {
            s.materials.create(rid)
        })
    }

    /// Sets the shader of a material.
    pub fn material_set_shader(&self, material: Rid, shader: Rid) {
        self.apply("material_set_shader", move |s| {
            s.materials.set_shader(material, shader)
        });
    }

    /// Sets a named parameter. `albedo_color` and `albedo_texture` feed the
    /// built-in pipeline.
    pub fn material_set_param(&self, material: Rid, name: impl Into<String>, value: impl Into<Variant>) {
        let (name, value) = (name.into(), value.into());
        self.apply("material_set_param", move |s| {
            s.materials.set_param(material, &name, value)
        });
    }

    /// A named parameter, or [`Variant::Nil`].
    pub fn material_get_param(&self, material: Rid, name: &str) -> Variant {
        self.query("material_get_param", material, ResourceKind::Material, |s| {
            s.materials.param(material, name)
        })
    }

    /// Chains another material drawn after this one. Cycles are rejected.
    pub fn material_set_next_pass(&self, material: Rid, next: Rid) {
        self.apply("material_set_next_pass", move |s| {
            s.materials.set_next_pass(material, next)
        });
    }

    /// Sets the draw priority, clamped to `-128..=127`.
    pub fn material_set_render_priority(&self, material: Rid, priority: i32) {
        self.apply("material_set_render_priority", move |s| {
            s.materials.set_render_priority(material, priority)
        });
    }

    // --- Meshes ---

    /// Creates a mesh without surfaces.
    pub fn mesh_create(&self) -> Rid {
        self.create(ResourceKind::Mesh, "mesh_create", |s, rid| s.meshes.create(rid))
    }

    /// Adds a surface from packed data. Inconsistent data is rejected.
    pub fn mesh_add_surface(&self, mesh: Rid, surface: SurfaceData) {
        self.apply("mesh_add_surface", move |s| {
            s.meshes.add_surface(mesh, surface).map(|_| ())
        });
    }

    /// Adds a surface from per-attribute arrays.
    pub fn mesh_add_surface_from_arrays(
        &self,
        mesh: Rid,
        primitive: PrimitiveType,
        arrays: SurfaceArrays,
        material: Rid,
    ) {
        self.apply("mesh_add_surface_from_arrays", move |s| {
            s.meshes
                .add_surface_from_arrays(mesh, primitive, &arrays, material)
                .map(|_| ())
        });
    }

    /// Number of surfaces.
    pub fn mesh_get_surface_count(&self, mesh: Rid) -> usize {
        self.query("mesh_get_surface_count", mesh, ResourceKind::Mesh, |s| {
            s.meshes.surface_count(mesh)
        })
    }

    /// Attribute mask of a surface.
    pub fn mesh_surface_get_format(&self, mesh: Rid, surface: usize) -> ArrayFormat {
        self.query("mesh_surface_get_format", mesh, ResourceKind::Mesh, |s| {
            s.meshes
                .surface(mesh, surface)
                .map(|sf| sf.format)
                .unwrap_or_default()
        })
    }

    /// Vertex count of a surface.
    pub fn mesh_surface_get_vertex_count(&self, mesh: Rid, surface: usize) -> usize {
        self.query("mesh_surface_get_vertex_count", mesh, ResourceKind::Mesh, |s| {
            s.meshes.surface(mesh, surface).map_or(0, |sf| sf.vertex_count)
        })
    }

    /// Index count of a surface.
    pub fn mesh_surface_get_index_count(&self, mesh: Rid, surface: usize) -> usize {
        self.query("mesh_surface_get_index_count", mesh, ResourceKind::Mesh, |s| {
            s.meshes.surface(mesh, surface).map_or(0, |sf| sf.index_count)
        })
    }

    /// Sets the material of a surface.
    pub fn mesh_surface_set_material(&self, mesh: Rid, surface: usize, material: Rid) {
        self.apply("mesh_surface_set_material", move |s| {
            s.meshes.surface_set_material(mesh, surface, material)
        });
    }

    /// The material of a surface, or [`Rid::INVALID`].
    pub fn mesh_surface_get_material(&self, mesh: Rid, surface: usize) -> Rid {
        self.query("mesh_surface_get_material", mesh, ResourceKind::Mesh, |s| {
            s.meshes.surface(mesh, surface).map_or(Rid::INVALID, |sf| sf.material)
        })
    }

    /// Overwrites vertex bytes of a surface, starting at `offset`.
    pub fn mesh_surface_update_vertex_region(&self, mesh: Rid, surface: usize, offset: usize, bytes: Vec<u8>) {
        self.apply("mesh_surface_update_vertex_region", move |s| {
            s.meshes
                .surface_update_vertex_region(mesh, surface, offset, &bytes)
        });
    }

    /// Removes one surface; later surfaces shift down.
    pub fn mesh_surface_remove(&self, mesh: Rid, surface: usize) {
        self.apply("mesh_surface_remove", move |s| {
            if let Some(id) = s.meshes.surface_remove(mesh, surface)? {
                s.backend.surface_free(id);
            }
            Ok(())
        });
    }

    /// Removes every surface.
    pub fn mesh_clear(&self, mesh: Rid) {
        self.apply("mesh_clear", move |s| {
            for id in s.meshes.clear(mesh)? {
                s.backend.surface_free(id);
            }
            Ok(())
        });
    }

    /// Overrides the computed bounds. An invalid box restores them.
    pub fn mesh_set_custom_aabb(&self, mesh: Rid, aabb: Aabb) {
        self.apply("mesh_set_custom_aabb", move |s| s.meshes.set_custom_aabb(mesh, aabb));
    }

    /// The custom bounds, or [`Aabb::INVALID`].
    pub fn mesh_get_custom_aabb(&self, mesh: Rid) -> Aabb {
        self.query_or("mesh_get_custom_aabb", mesh, ResourceKind::Mesh, Aabb::INVALID, |s| {
            s.meshes.custom_aabb(mesh)
        })
    }

    /// The effective bounds: custom when set, the union of surfaces otherwise.
    pub fn mesh_get_aabb(&self, mesh: Rid) -> Aabb {
        self.query_or("mesh_get_aabb", mesh, ResourceKind::Mesh, Aabb::INVALID, |s| {
            s.meshes.aabb(mesh)
        })
    }

    // --- Multimeshes ---

    /// Creates an empty multimesh.
    pub fn multimesh_create(&self) -> Rid {
        self.create(ResourceKind::MultiMesh, "multimesh_create", |s, rid| {
            s.multimeshes.create(rid)
        })
    }

    /// Resizes the instance buffer and fixes its layout. Contents are reset.
    pub fn multimesh_allocate_data(
        &self,
        multimesh: Rid,
        instances: usize,
        transform_format: MultimeshTransformFormat,
        use_colors: bool,
        use_custom_data: bool,
    ) {
        self.apply("multimesh_allocate_data", move |s| {
            s.multimeshes.allocate_data(
                multimesh,
                instances,
                transform_format,
                use_colors,
                use_custom_data,
            )
        });
    }

    /// Number of allocated instances.
    pub fn multimesh_get_instance_count(&self, multimesh: Rid) -> usize {
        self.query("multimesh_get_instance_count", multimesh, ResourceKind::MultiMesh, |s| {
            s.multimeshes.instance_count(multimesh)
        })
    }

    /// Sets the mesh drawn by every instance.
    pub fn multimesh_set_mesh(&self, multimesh: Rid, mesh: Rid) {
        self.apply("multimesh_set_mesh", move |s| s.multimeshes.set_mesh(multimesh, mesh));
    }

    /// The mesh drawn by every instance.
    pub fn multimesh_get_mesh(&self, multimesh: Rid) -> Rid {
        self.query_or("multimesh_get_mesh", multimesh, ResourceKind::MultiMesh, Rid::INVALID, |s| {
            s.multimeshes.mesh(multimesh)
        })
    }

    /// Sets a 3D instance transform.
    pub fn multimesh_instance_set_transform(&self, multimesh: Rid, index: usize, transform: Mat4) {
        self.apply("multimesh_instance_set_transform", move |s| {
            s.multimeshes.instance_set_transform(multimesh, index, &transform)
        });
    }

    /// Sets a 2D instance transform.
    pub fn multimesh_instance_set_transform_2d(&self, multimesh: Rid, index: usize, transform: Transform2D) {
        self.apply("multimesh_instance_set_transform_2d", move |s| {
            s.multimeshes
                .instance_set_transform_2d(multimesh, index, &transform)
        });
    }

    /// Sets an instance color.
    pub fn multimesh_instance_set_color(&self, multimesh: Rid, index: usize, color: Color) {
        self.apply("multimesh_instance_set_color", move |s| {
            s.multimeshes.instance_set_color(multimesh, index, color)
        });
    }

    /// Sets the custom data of an instance.
    pub fn multimesh_instance_set_custom_data(&self, multimesh: Rid, index: usize, data: [f32; 4]) {
        self.apply("multimesh_instance_set_custom_data", move |s| {
            s.multimeshes.instance_set_custom_data(multimesh, index, data)
        });
    }

    /// A 3D instance transform.
    pub fn multimesh_instance_get_transform(&self, multimesh: Rid, index: usize) -> Mat4 {
        const LABEL: &str = "multimesh_instance_get_transform";
        self.read(|s| {
            or_default(LABEL, s.multimeshes.instance_get_transform(multimesh, index), Mat4::IDENTITY)
        })
    }

    /// A 2D instance transform.
    pub fn multimesh_instance_get_transform_2d(&self, multimesh: Rid, index: usize) -> Transform2D {
        const LABEL: &str = "multimesh_instance_get_transform_2d";
        self.read(|s| {
            or_default(
                LABEL,
                s.multimeshes.instance_get_transform_2d(multimesh, index),
                Transform2D::IDENTITY,
            )
        })
    }

    /// An instance color.
    pub fn multimesh_instance_get_color(&self, multimesh: Rid, index: usize) -> Color {
        const LABEL: &str = "multimesh_instance_get_color";
        self.read(|s| {
            or_default(LABEL, s.multimeshes.instance_get_color(multimesh, index), Color::WHITE)
        })
    }

    /// The custom data of an instance.
    pub fn multimesh_instance_get_custom_data(&self, multimesh: Rid, index: usize) -> [f32; 4] {
        const LABEL: &str = "multimesh_instance_get_custom_data";
        self.read(|s| {
            or_default(LABEL, s.multimeshes.instance_get_custom_data(multimesh, index), [0.0; 4])
        })
    }

    /// Replaces the whole instance buffer. Its length must be `instances * stride`.
    pub fn multimesh_set_buffer(&self, multimesh: Rid, buffer: Vec<f32>) {
        self.apply("multimesh_set_buffer", move |s| {
            s.multimeshes.set_buffer(multimesh, buffer)
        });
    }

    /// A copy of the instance buffer.
    pub fn multimesh_get_buffer(&self, multimesh: Rid) -> Vec<f32> {
        self.query("multimesh_get_buffer", multimesh, ResourceKind::MultiMesh, |s| {
            s.multimeshes.buffer(multimesh)
        })
    }

    /// Limits the instances drawn; -1 draws all.
    pub fn multimesh_set_visible_instances(&self, multimesh: Rid, visible: i32) {
        self.apply("multimesh_set_visible_instances", move |s| {
            s.multimeshes.set_visible_instances(multimesh, visible)
        });
    }

    /// The visible instance limit; -1 draws all.
    pub fn multimesh_get_visible_instances(&self, multimesh: Rid) -> i32 {
        self.query_or("multimesh_get_visible_instances", multimesh, ResourceKind::MultiMesh, -1, |s| {
            s.multimeshes.visible_instances(multimesh)
        })
    }

    /// Bounds of the visible instances.
    pub fn multimesh_get_aabb(&self, multimesh: Rid) -> Aabb {
        self.query_or("multimesh_get_aabb", multimesh, ResourceKind::MultiMesh, Aabb::INVALID, |s| {
            s.multimeshes
                .get(multimesh)
                .map_or(Aabb::INVALID, |mm| mm.aabb(s.meshes.aabb(mm.mesh)))
        })
    }

    // --- Lights ---

    fn light_create(&self, light_type: LightType, label: &'static str) -> Rid {
        self.create(ResourceKind::Light, label, move |s, rid| {
            s.lights.create(rid, light_type)
        })
    }

    /// Creates a directional light.
    pub fn directional_light_create(&self) -> Rid {
        self.light_create(LightType::Directional, "directional_light_create")
    }

    /// Creates an omni light.
    pub fn omni_light_create(&self) -> Rid {
        self.light_create(LightType::Omni, "omni_light_create")
    }

    /// Creates a spot light.
    pub fn spot_light_create(&self) -> Rid {
        self.light_create(LightType::Spot, "spot_light_create")
    }

    /// Sets the light color.
    pub fn light_set_color(&self, light: Rid, color: Color) {
        self.apply("light_set_color", move |s| s.lights.set_color(light, color));
    }

    /// Sets a light parameter.
    pub fn light_set_param(&self, light: Rid, param: LightParam, value: f32) {
        self.apply("light_set_param", move |s| s.lights.set_param(light, param, value));
    }

    /// A light parameter.
    pub fn light_get_param(&self, light: Rid, param: LightParam) -> f32 {
        self.query("light_get_param", light, ResourceKind::Light, |s| {
            s.lights.param(light, param)
        })
    }

    /// Enables shadow casting.
    pub fn light_set_shadow(&self, light: Rid, enabled: bool) {
        self.apply("light_set_shadow", move |s| s.lights.set_shadow(light, enabled));
    }

    /// Sets the layers the light affects.
    pub fn light_set_cull_mask(&self, light: Rid, mask: u32) {
        self.apply("light_set_cull_mask", move |s| s.lights.set_cull_mask(light, mask));
    }

    /// The light type.
    pub fn light_get_type(&self, light: Rid) -> LightType {
        self.query("light_get_type", light, ResourceKind::Light, |s| {
            s.lights.light_type(light)
        })
    }

    // --- Particles ---

    /// Creates a particle system.
    pub fn particles_create(&self) -> Rid {
        self.create(ResourceKind::Particles, "particles_create", |s, rid| {
            s.particles.create(rid)
        })
    }

    /// Starts or stops emission.
    pub fn particles_set_emitting(&self, particles: Rid, emitting: bool) {
        self.apply("particles_set_emitting", move |s| {
            s.particles.set_emitting(particles, emitting)
        });
    }

    /// Whether the system emits.
    pub fn particles_is_emitting(&self, particles: Rid) -> bool {
        self.query("particles_is_emitting", particles, ResourceKind::Particles, |s| {
            s.particles.is_emitting(particles)
        })
    }

    /// Sets the particle count.
    pub fn particles_set_amount(&self, particles: Rid, amount: u32) {
        self.apply("particles_set_amount", move |s| s.particles.set_amount(particles, amount));
    }

    /// Sets the particle lifetime in seconds.
    pub fn particles_set_lifetime(&self, particles: Rid, lifetime: f32) {
        self.apply("particles_set_lifetime", move |s| {
            s.particles.set_lifetime(particles, lifetime)
        });
    }

    /// Stops emission after one lifetime when set.
    pub fn particles_set_one_shot(&self, particles: Rid, one_shot: bool) {
        self.apply("particles_set_one_shot", move |s| {
            s.particles.set_one_shot(particles, one_shot)
        });
    }

    /// Time simulated ahead on (re)start.
    pub fn particles_set_pre_process_time(&self, particles: Rid, time: f32) {
        self.apply("particles_set_pre_process_time", move |s| {
            s.particles.set_pre_process_time(particles, time)
        });
    }

    /// Sets how bursty emission is, clamped to `0..=1`.
    pub fn particles_set_explosiveness_ratio(&self, particles: Rid, ratio: f32) {
        self.apply("particles_set_explosiveness_ratio", move |s| {
            s.particles.set_explosiveness_ratio(particles, ratio)
        });
    }

    /// Sets emission randomness, clamped to `0..=1`.
    pub fn particles_set_randomness_ratio(&self, particles: Rid, ratio: f32) {
        self.apply("particles_set_randomness_ratio", move |s| {
            s.particles.set_randomness_ratio(particles, ratio)
        });
    }

    /// Sets the simulation speed multiplier.
    pub fn particles_set_speed_scale(&self, particles: Rid, scale: f32) {
        self.apply("particles_set_speed_scale", move |s| {
            s.particles.set_speed_scale(particles, scale)
        });
    }

    /// Sets the culling bounds.
    pub fn particles_set_custom_aabb(&self, particles: Rid, aabb: Aabb) {
        self.apply("particles_set_custom_aabb", move |s| {
            s.particles.set_custom_aabb(particles, aabb)
        });
    }

    /// Sets the process material.
    pub fn particles_set_process_material(&self, particles: Rid, material: Rid) {
        self.apply("particles_set_process_material", move |s| {
            s.particles.set_process_material(particles, material)
        });
    }

    /// Sets the number of draw passes.
    pub fn particles_set_draw_passes(&self, particles: Rid, count: usize) {
        self.apply("particles_set_draw_passes", move |s| {
            s.particles.set_draw_passes(particles, count)
        });
    }

    /// Sets the mesh of one draw pass.
    pub fn particles_set_draw_pass_mesh(&self, particles: Rid, pass: usize, mesh: Rid) {
        self.apply("particles_set_draw_pass_mesh", move |s| {
            s.particles.set_draw_pass_mesh(particles, pass, mesh)
        });
    }

    /// Marks the system for the next simulation tick.
    pub fn particles_request_process(&self, particles: Rid) {
        self.apply("particles_request_process", move |s| {
            s.particles.request_process(particles)
        });
    }

    /// Restarts the simulation clock.
    pub fn particles_restart(&self, particles: Rid) {
        self.apply("particles_restart", move |s| s.particles.restart(particles));
    }

    /// Whether the system finished emitting and every particle died.
    pub fn particles_is_inactive(&self, particles: Rid) -> bool {
        self.query_or("particles_is_inactive", particles, ResourceKind::Particles, true, |s| {
            s.particles.is_inactive(particles)
        })
    }

    /// Particles alive after the last tick.
    pub fn particles_get_active_count(&self, particles: Rid) -> u32 {
        self.query("particles_get_active_count", particles, ResourceKind::Particles, |s| {
            s.particles.active_count(particles)
        })
    }
}
