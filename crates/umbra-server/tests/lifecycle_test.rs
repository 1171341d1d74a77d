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

use umbra_core::format::{ArrayFormat, PrimitiveType};
use umbra_core::image::Image;
use umbra_core::math::{Mat4, Vec3};
use umbra_core::{ResourceKind, Rid, ServerConfig};
use umbra_data::storage::{SurfaceArrays, SurfaceData};
use umbra_infra::HeadlessBackend;
use umbra_server::RenderingServer;

fn server() -> RenderingServer {
    let _ = env_logger::builder().is_test(true).try_init();
    RenderingServer::new(ServerConfig::headless(), Box::new(HeadlessBackend::new()))
        .expect("a single-threaded server never spawns")
}

fn triangle() -> SurfaceArrays {
    SurfaceArrays {
        positions: vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        ..SurfaceArrays::default()
    }
}

#[test]
fn test_created_handles_resolve_to_their_kind() {
    // --- 1. ARRANGE ---
    let server = server();

    // --- 2. ACT ---
    let texture = server.texture_2d_create(Image::filled_rgba8(4, 4, [255, 0, 0, 255]));
    let material = server.material_create();
    let mesh = server.mesh_create();
    let scenario = server.scenario_create();
    let viewport = server.viewport_create();

    // --- 3. ASSERT ---
    let expected = [
        (texture, ResourceKind::Texture),
        (material, ResourceKind::Material),
        (mesh, ResourceKind::Mesh),
        (scenario, ResourceKind::Scenario),
        (viewport, ResourceKind::Viewport),
    ];
    for (rid, kind) in expected {
        assert!(rid.is_valid(), "{kind:?} creation should return a valid handle");
        assert_eq!(rid.kind(), kind);
        let resolved = server.with_state(|s| s.resolve(rid).map(|r| r.kind()));
        assert_eq!(resolved, Some(kind), "{rid} should resolve to a {kind:?}");
    }

    // The viewport owns a proxy texture, distinct from every other handle.
    let proxy = server.viewport_get_texture(viewport);
    assert!(server.is_live(proxy));
    assert_ne!(proxy, texture);
}

#[test]
fn test_free_kills_the_handle_and_double_free_is_ignored() {
    // --- 1. ARRANGE ---
    let server = server();
    let mesh = server.mesh_create();
    let other = server.mesh_create();
    let live_before = server.get_live_handle_count();

    // --- 2. ACT ---
    server.free(mesh);
    server.free(mesh);

    // --- 3. ASSERT ---
    assert!(!server.is_live(mesh), "A freed handle should not resolve");
    assert!(server.is_live(other), "Freeing one mesh should not touch another");
    assert_eq!(server.get_live_handle_count(), live_before - 1);

    // Queries on dead handles answer with defaults.
    assert_eq!(server.mesh_get_surface_count(mesh), 0);

    // The slot is reused under a new generation; the old handle stays dead.
    let reused = server.mesh_create();
    assert_ne!(reused, mesh);
    assert!(!server.is_live(mesh));
    assert!(server.is_live(reused));
}

#[test]
fn test_freeing_invalid_handle_is_a_no_op() {
    let server = server();
    let live_before = server.get_live_handle_count();
    server.free(Rid::INVALID);
    assert_eq!(server.get_live_handle_count(), live_before);
}

#[test]
fn test_malformed_surface_is_rejected_without_side_effects() {
    // --- 1. ARRANGE ---
    let server = server();
    let mesh = server.mesh_create();
    server.mesh_add_surface_from_arrays(mesh, PrimitiveType::Triangles, triangle(), Rid::INVALID);
    assert_eq!(server.mesh_get_surface_count(mesh), 1);

    // --- 2. ACT ---
    // Three positions need 36 bytes.
    let bad = SurfaceData {
        format: ArrayFormat::VERTEX,
        primitive: PrimitiveType::Triangles,
        vertex_data: vec![0; 10],
        vertex_count: 3,
        ..SurfaceData::default()
    };
    server.mesh_add_surface(mesh, bad);

    // --- 3. ASSERT ---
    assert_eq!(
        server.mesh_get_surface_count(mesh),
        1,
        "A rejected surface should leave the mesh unchanged"
    );
    assert_eq!(server.mesh_surface_get_vertex_count(mesh, 0), 3);
}

#[test]
fn test_fresh_resources_report_defaults() {
    let server = server();

    let mesh = server.mesh_create();
    assert_eq!(server.mesh_get_surface_count(mesh), 0);
    assert!(!server.mesh_get_aabb(mesh).is_valid());

    let instance = server.instance_create();
    assert_eq!(server.instance_get_base(instance), Rid::INVALID);
    assert_eq!(server.instance_get_scenario(instance), Rid::INVALID);

    let multimesh = server.multimesh_create();
    assert_eq!(server.multimesh_get_instance_count(multimesh), 0);
    assert_eq!(server.multimesh_get_visible_instances(multimesh), -1);

    let particles = server.particles_create();
    assert!(!server.particles_is_emitting(particles));
    assert_eq!(server.particles_get_active_count(particles), 0);

    let viewport = server.viewport_create();
    assert_eq!(server.viewport_get_render_target(viewport), None);
}

#[test]
fn test_instance_links_follow_the_scenario() {
    // --- 1. ARRANGE ---
    let server = server();
    let mesh = server.mesh_create();
    server.mesh_add_surface_from_arrays(mesh, PrimitiveType::Triangles, triangle(), Rid::INVALID);
    let scenario = server.scenario_create();

    // --- 2. ACT ---
    let instance = server.instance_create2(mesh, scenario);
    server.instance_set_transform(instance, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));

    // --- 3. ASSERT ---
    assert_eq!(server.instance_get_base(instance), mesh);
    assert_eq!(server.instance_get_scenario(instance), scenario);

    let aabb = server.mesh_get_aabb(mesh);
    let culled = server.instances_cull_aabb(aabb, scenario);
    assert!(culled.is_empty(), "The moved instance should be outside the mesh bounds");
    let moved = aabb.transform(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
    assert_eq!(server.instances_cull_aabb(moved, scenario), vec![instance]);

    // Freeing the scenario detaches its instances.
    server.free(scenario);
    assert_eq!(server.instance_get_scenario(instance), Rid::INVALID);
}

#[test]
fn test_queued_create_of_a_freed_handle_leaves_the_reused_slot_alone() {
    // --- 1. ARRANGE ---
    let server = server();
    let worker = server.clone();
    let stale = std::thread::spawn(move || worker.mesh_create())
        .join()
        .expect("worker thread should not panic");
    assert_eq!(server.get_pending_command_count(), 1);

    // --- 2. ACT ---
    // Freed before its queued initialisation ran, then its index is handed out again.
    server.free(stale);
    let fresh = server.mesh_create();
    assert_eq!(fresh.index(), stale.index());
    assert!(server.is_live(fresh));
    server.force_sync();

    // --- 3. ASSERT ---
    assert!(server.is_live(fresh), "The newer handle should survive the drain");
    assert!(!server.is_live(stale));
    server.mesh_add_surface_from_arrays(fresh, PrimitiveType::Triangles, triangle(), Rid::INVALID);
    assert_eq!(server.mesh_get_surface_count(fresh), 1);
    assert_eq!(server.with_state(|s| s.meshes.len()), 1);
}

#[test]
fn test_freed_viewport_releases_its_proxy_before_initialisation() {
    // --- 1. ARRANGE ---
    let server = server();
    let live_before = server.get_live_handle_count();
    let worker = server.clone();
    let viewport = std::thread::spawn(move || worker.viewport_create())
        .join()
        .expect("worker thread should not panic");

    // --- 2. ACT ---
    server.free(viewport);
    server.force_sync();

    // --- 3. ASSERT ---
    assert_eq!(
        server.get_live_handle_count(),
        live_before,
        "The proxy texture should be released with its viewport"
    );
}

#[test]
fn test_in_place_setter_with_overflowing_region_is_rejected() {
    // --- 1. ARRANGE ---
    let server = server();
    let mesh = server.mesh_create();
    server.mesh_add_surface_from_arrays(mesh, PrimitiveType::Triangles, triangle(), Rid::INVALID);
    let bounds = server.mesh_get_aabb(mesh);

    // --- 2. ACT ---
    server.mesh_surface_update_vertex_region(mesh, 0, usize::MAX, vec![0; 4]);

    // --- 3. ASSERT ---
    assert_eq!(server.mesh_get_aabb(mesh), bounds);
    assert_eq!(server.mesh_surface_get_vertex_count(mesh, 0), 3);
}

#[test]
fn test_in_place_panic_is_isolated() {
    // --- 1. ARRANGE ---
    let server = server();
    let mesh = server.mesh_create();

    // --- 2. ACT ---
    server.call_on_render_thread(
        |_| panic!("callback failure"),
        umbra_server::CallMode::Blocking,
    );

    // --- 3. ASSERT ---
    assert!(server.is_live(mesh), "The server should stay usable after a panic");
    assert!(server.mesh_create().is_valid());
}
