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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use umbra_core::config::ThreadModel;
use umbra_core::event::FrameEvent;
use umbra_core::image::Image;
use umbra_core::{ServerConfig, ServerError};
use umbra_infra::HeadlessBackend;
use umbra_server::{CallMode, RenderingServer};

const WRITERS: usize = 4;
const WRITES_PER_THREAD: usize = 50;

fn server_with(thread_model: ThreadModel) -> RenderingServer {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = ServerConfig {
        thread_model,
        ..ServerConfig::headless()
    };
    RenderingServer::new(config, Box::new(HeadlessBackend::new())).expect("render thread should spawn")
}

#[test]
fn test_setters_from_many_threads_keep_per_thread_order() {
    // --- 1. ARRANGE ---
    let server = server_with(ThreadModel::SingleThreaded);
    let material = server.material_create();

    // --- 2. ACT ---
    // Each writer overwrites its own parameter with increasing values.
    let writers: Vec<_> = (0..WRITERS)
        .map(|t| {
            let server = server.clone();
            thread::spawn(move || {
                for i in 0..WRITES_PER_THREAD {
                    server.material_set_param(material, format!("writer_{t}"), i as f32);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread should not panic");
    }

    // Nothing ran yet: the calls were queued for the render thread.
    assert_eq!(server.get_pending_command_count(), WRITERS * WRITES_PER_THREAD);
    server.force_sync();

    // --- 3. ASSERT ---
    assert_eq!(server.get_pending_command_count(), 0);
    for t in 0..WRITERS {
        let value = server.material_get_param(material, &format!("writer_{t}"));
        assert_eq!(
            value.as_float(),
            Some((WRITES_PER_THREAD - 1) as f32),
            "writer {t} should end with its last submitted value"
        );
    }
}

#[test]
fn test_contending_setters_replay_in_global_submission_order() {
    // --- 1. ARRANGE ---
    let server = server_with(ThreadModel::SingleThreaded);
    let material = server.material_create();
    // Submission order as seen by the writers, and the values seen by the render thread.
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::new(Mutex::new(Vec::new()));

    // --- 2. ACT ---
    // Every writer targets the same field. Each write is followed by a callback
    // that records the value it finds; both go in under one lock so the
    // submission order is known.
    let writers: Vec<_> = (0..WRITERS)
        .map(|t| {
            let server = server.clone();
            let submitted = Arc::clone(&submitted);
            let observed = Arc::clone(&observed);
            thread::spawn(move || {
                for i in 0..WRITES_PER_THREAD {
                    let value = (t * 1000 + i) as f32;
                    let mut order = submitted.lock().unwrap();
                    server.material_set_param(material, "shared", value);
                    let observed = Arc::clone(&observed);
                    server.call_on_render_thread(
                        move |s| {
                            let seen = s.materials.param(material, "shared").as_float();
                            observed.lock().unwrap().push(seen);
                        },
                        CallMode::Deferred,
                    );
                    order.push(value);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread should not panic");
    }
    server.force_sync();

    // --- 3. ASSERT ---
    let submitted = submitted.lock().unwrap().clone();
    let observed = observed.lock().unwrap().clone();
    assert_eq!(submitted.len(), WRITERS * WRITES_PER_THREAD);
    let replay: Vec<Option<f32>> = submitted.iter().copied().map(Some).collect();
    assert_eq!(
        observed, replay,
        "the render thread should see every write in global submission order"
    );
    assert_eq!(
        server.material_get_param(material, "shared").as_float(),
        submitted.last().copied(),
        "the field should hold the last submitted write"
    );
}

#[test]
fn test_queued_commands_are_counted_by_the_draining_frame() {
    let server = server_with(ThreadModel::SingleThreaded);
    let material = server.material_create();

    let remote = server.clone();
    thread::spawn(move || {
        for i in 0..10 {
            remote.material_set_render_priority(material, i);
        }
    })
    .join()
    .expect("submitter should not panic");

    assert!(server.has_changed());
    let stats = server.force_draw(false, 0.0).expect("render thread draws in place");
    assert_eq!(stats.commands_executed, 10);
    assert_eq!(stats.frame, 1);
}

#[test]
fn test_draw_off_the_render_thread_is_rejected_when_single_threaded() {
    let server = server_with(ThreadModel::SingleThreaded);
    assert!(server.is_render_thread());

    let remote = server.clone();
    let result = thread::spawn(move || remote.draw(true, 0.016))
        .join()
        .expect("drawing thread should not panic");

    assert!(matches!(result, Err(ServerError::WrongThread(_))));
}

#[test]
fn test_panicking_command_does_not_stop_later_commands() {
    // --- 1. ARRANGE ---
    let server = server_with(ThreadModel::SingleThreaded);
    let material = server.material_create();

    // --- 2. ACT ---
    let remote = server.clone();
    thread::spawn(move || {
        remote.call_on_render_thread(|_| panic!("callback failure"), CallMode::Deferred);
        remote.material_set_param(material, "after_panic", 1.0f32);
    })
    .join()
    .expect("submitter should not panic itself");
    server.force_sync();

    // --- 3. ASSERT ---
    assert_eq!(
        server.material_get_param(material, "after_panic").as_float(),
        Some(1.0),
        "Commands queued after a panicking one should still run"
    );
    // The server keeps drawing.
    assert!(server.force_draw(false, 0.0).is_ok());
}

#[test]
fn test_frame_drawn_callbacks_run_exactly_once() {
    let server = server_with(ThreadModel::SingleThreaded);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    server.request_frame_drawn_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    server.force_draw(false, 0.0).expect("frame 1");
    server.force_draw(false, 0.0).expect("frame 2");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_frame_events_bracket_each_frame() {
    let server = server_with(ThreadModel::SingleThreaded);
    let events = server.subscribe_frame_events();

    server.force_draw(false, 0.0).expect("frame 1");

    let received: Vec<FrameEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 2);
    assert!(matches!(received[0], FrameEvent::PreDraw { frame: 1 }));
    match received[1] {
        FrameEvent::PostDraw { frame, stats } => {
            assert_eq!(frame, 1);
            assert_eq!(stats.frame, 1);
        }
        ref other => panic!("expected PostDraw, got {other:?}"),
    }
}

#[test]
fn test_blocking_call_runs_before_returning() {
    let server = server_with(ThreadModel::SingleThreaded);
    let seen = Arc::new(AtomicUsize::new(0));

    let flag = seen.clone();
    server.call_on_render_thread(
        move |state| {
            flag.store(state.frame as usize + 1, Ordering::SeqCst);
        },
        CallMode::Blocking,
    );

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_separate_render_thread_drains_and_draws() {
    // --- 1. ARRANGE ---
    let server = server_with(ThreadModel::Separate);
    assert!(
        !server.is_render_thread(),
        "The caller should not be the render thread"
    );

    // --- 2. ACT ---
    let texture = server.texture_2d_create(Image::filled_rgba8(2, 2, [0, 255, 0, 255]));
    server.force_sync();

    // --- 3. ASSERT ---
    assert!(server.is_live(texture), "force_sync should have run the creation");
    assert_eq!(server.texture_get_size(texture), (2, 2));

    let stats = server.force_draw(false, 0.0).expect("render thread should draw");
    assert_eq!(stats.frame, 1);
    assert!(server.draw(false, 0.0).is_ok());

    server.finish();
    assert!(matches!(server.draw(false, 0.0), Err(ServerError::Disconnected)));
    assert!(!server.is_live(texture), "Shutdown should release every resource");
}

#[test]
fn test_separate_thread_blocking_call_observes_queued_work() {
    let server = server_with(ThreadModel::Separate);
    let material = server.material_create();
    server.material_set_render_priority(material, 5);

    let observed = Arc::new(AtomicUsize::new(0));
    let slot = observed.clone();
    server.call_on_render_thread(
        move |state| {
            if state.materials.get(material).is_some() {
                slot.store(1, Ordering::SeqCst);
            }
        },
        CallMode::Blocking,
    );

    assert_eq!(observed.load(Ordering::SeqCst), 1);
}
