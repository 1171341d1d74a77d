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

//! The demo scene: a spinning triangle, a ring of instanced copies, a particle
//! burst, and a canvas overlay showing a second viewport as a minimap.

use umbra_core::format::{MultimeshTransformFormat, PrimitiveType};
use umbra_core::math::{Color, Mat4, Rect2, Vec2, Vec3};
use umbra_core::Rid;
use umbra_data::storage::material::{PARAM_ALBEDO_COLOR, PARAM_ALBEDO_TEXTURE};
use umbra_data::storage::{Background, SurfaceArrays, UpdateMode};
use umbra_server::RenderingServer;

const MAIN_SIZE: (u32, u32) = (640, 360);
const MINIMAP_SIZE: (u32, u32) = (160, 90);
const RING_COUNT: usize = 6;
const RING_RADIUS: f32 = 2.5;

/// Handles of the demo resources that change from frame to frame.
pub struct DemoScene {
    main: Rid,
    minimap: Rid,
    spinner: Rid,
}

fn triangle() -> SurfaceArrays {
    SurfaceArrays {
        positions: vec![
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
        ],
        colors: vec![
            Color::rgb(1.0, 0.0, 0.0),
            Color::rgb(0.0, 1.0, 0.0),
            Color::rgb(0.0, 0.0, 1.0),
        ],
        uvs: vec![Vec2::new(0.5, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)],
        ..SurfaceArrays::default()
    }
}

impl DemoScene {
    /// Creates every resource of the scene.
    pub fn build(server: &RenderingServer) -> Self {
        log::info!("Sandbox: building the demo scene...");

        // --- Resources ---
        let material = server.material_create();
        server.material_set_param(material, PARAM_ALBEDO_TEXTURE, server.get_test_texture());
        let mesh = server.mesh_create();
        server.mesh_add_surface_from_arrays(mesh, PrimitiveType::Triangles, triangle(), material);

        let ring = server.multimesh_create();
        server.multimesh_allocate_data(ring, RING_COUNT, MultimeshTransformFormat::Transform3D, true, false);
        server.multimesh_set_mesh(ring, mesh);
        for i in 0..RING_COUNT {
            let angle = i as f32 / RING_COUNT as f32 * std::f32::consts::TAU;
            let offset = Vec3::new(angle.cos() * RING_RADIUS, 0.0, angle.sin() * RING_RADIUS);
            server.multimesh_instance_set_transform(ring, i, Mat4::from_translation(offset));
            let hue = i as f32 / RING_COUNT as f32;
            server.multimesh_instance_set_color(ring, i, Color::rgb(hue, 1.0 - hue, 0.5));
        }

        let particles = server.particles_create();
        server.particles_set_amount(particles, 32);
        server.particles_set_lifetime(particles, 1.5);
        server.particles_set_explosiveness_ratio(particles, 0.5);
        server.particles_set_draw_passes(particles, 1);
        server.particles_set_draw_pass_mesh(particles, 0, mesh);
        server.particles_set_emitting(particles, true);

        // --- World ---
        let environment = server.environment_create();
        server.environment_set_background(environment, Background::Color);
        server.environment_set_bg_color(environment, Color::rgb(0.05, 0.05, 0.1));
        let scenario = server.scenario_create();
        server.scenario_set_environment(scenario, environment);

        let spinner = server.instance_create2(mesh, scenario);
        server.instance_create2(ring, scenario);
        let burst = server.instance_create2(particles, scenario);
        server.instance_set_transform(burst, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)));

        // --- Viewports ---
        let camera = server.camera_create();
        server.camera_set_perspective(camera, 60.0, 0.1, 100.0);
        server.camera_set_transform(camera, Mat4::from_translation(Vec3::new(0.0, 1.0, 6.0)));
        let main = server.viewport_create();
        server.viewport_set_size(main, MAIN_SIZE.0, MAIN_SIZE.1);
        server.viewport_attach_camera(main, camera);
        server.viewport_set_scenario(main, scenario);
        server.viewport_attach_to_screen(main, Rect2::new(0.0, 0.0, MAIN_SIZE.0 as f32, MAIN_SIZE.1 as f32));
        server.viewport_set_active(main, true);

        let top_down = server.camera_create();
        server.camera_set_orthogonal(top_down, 8.0, 0.1, 50.0);
        server.camera_set_transform(
            top_down,
            Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0)) * Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        );
        let minimap = server.viewport_create();
        server.viewport_set_size(minimap, MINIMAP_SIZE.0, MINIMAP_SIZE.1);
        server.viewport_attach_camera(minimap, top_down);
        server.viewport_set_scenario(minimap, scenario);
        server.viewport_set_update_mode(minimap, UpdateMode::WhenVisible);
        server.viewport_set_active(minimap, true);

        // --- Overlay ---
        let canvas = server.canvas_create();
        let hud = server.canvas_item_create();
        server.canvas_item_set_parent(hud, canvas);
        let frame = Rect2::new(8.0, 8.0, MINIMAP_SIZE.0 as f32 + 4.0, MINIMAP_SIZE.1 as f32 + 4.0);
        server.canvas_item_add_rect(hud, frame, Color::rgba(0.0, 0.0, 0.0, 0.6));
        server.canvas_item_add_texture_rect(
            hud,
            Rect2::new(10.0, 10.0, MINIMAP_SIZE.0 as f32, MINIMAP_SIZE.1 as f32),
            server.viewport_get_texture(minimap),
            Color::WHITE,
        );

        let marker = server.canvas_item_create();
        server.canvas_item_set_parent(marker, hud);
        server.canvas_item_set_modulate(marker, Color::rgb(1.0, 0.8, 0.2));
        server.canvas_item_add_circle(marker, Vec2::new(90.0, 55.0), 3.0, Color::WHITE);
        server.canvas_item_add_line(
            marker,
            Vec2::new(600.0, 20.0),
            Vec2::new(620.0, 40.0),
            Color::WHITE,
            2.0,
        );
        server.viewport_attach_canvas(main, canvas);

        let tint = server.material_create();
        server.material_set_param(tint, PARAM_ALBEDO_COLOR, Color::rgb(0.9, 0.9, 1.0));
        server.instance_geometry_set_material_override(spinner, tint);

        Self {
            main,
            minimap,
            spinner,
        }
    }

    /// Advances the animation to `frame`.
    pub fn animate(&self, server: &RenderingServer, frame: u32) {
        let angle = frame as f32 * 0.05;
        server.instance_set_transform(self.spinner, Mat4::from_rotation_y(angle));
    }

    /// The viewports worth reporting on, by name.
    pub fn viewports(&self) -> [(&'static str, Rid); 2] {
        [("main", self.main), ("minimap", self.minimap)]
    }
}
