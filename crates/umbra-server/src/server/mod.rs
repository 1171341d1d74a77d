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

//! The thread-aware front of the rendering server.
//!
//! [`RenderingServer`] is a cheap-to-clone context object. Handles are allocated
//! on the calling thread; everything that touches a store runs on the render
//! thread, either in place (when the caller is the render thread) or as a queued
//! command drained at the next frame boundary.
//!
//! Operations are grouped by concern in the submodules; they all go through the
//! helpers defined here.

mod diagnostics;
mod render_thread;
mod resources;
mod scene;
mod viewport;

use crate::marshal::{CallMode, Dispatch, Marshal};
use crate::queue::{lock, run_isolated};
use crate::scheduler;
use crate::state::ServerState;
use render_thread::{RenderThread, Wake};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use umbra_core::backend::RenderBackend;
use umbra_core::config::ThreadModel;
use umbra_core::event::{EventBus, FrameEvent};
use umbra_core::stats::FrameStats;
use umbra_core::{ResourceKind, Rid, ServerConfig, ServerError};
use umbra_data::RidAllocator;

type FrameCallback = Box<dyn FnOnce() + Send>;

/// Unwraps a store result read by a getter, logging the failure.
fn or_default<T>(label: &'static str, result: Result<T, ServerError>, default: T) -> T {
    result.unwrap_or_else(|err| {
        log::warn!("'{label}' returned a default value: {err}");
        default
    })
}

/// State shared between the facade and the render thread.
pub(crate) struct Shared {
    config: ServerConfig,
    allocator: Arc<RidAllocator>,
    state: Mutex<ServerState>,
    pub(crate) marshal: Marshal,
    events: EventBus<FrameEvent>,
    frame_callbacks: Mutex<Vec<FrameCallback>>,
    pub(crate) render_loop_enabled: AtomicBool,
    test_texture: Mutex<Rid>,
    finished: AtomicBool,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        // A command that panicked was isolated by the queue; the stores stay usable.
        lock(&self.state)
    }

    /// Drains the queue and draws one frame. Render thread only.
    pub(crate) fn run_frame(&self, swap_buffers: bool, frame_step: f32) -> FrameStats {
        let stats = {
            let mut state = self.lock_state();
            let report = self.marshal.queue().drain(&mut state);
            self.events.publish(FrameEvent::PreDraw {
                frame: state.frame + 1,
            });
            let mut stats = scheduler::draw_frame(&mut state, swap_buffers, frame_step);
            stats.commands_executed = report.executed;
            state.last_stats = stats;
            stats
        };

        self.events.publish(FrameEvent::PostDraw {
            frame: stats.frame,
            stats,
        });
        let callbacks = std::mem::take(&mut *lock(&self.frame_callbacks));
        for callback in callbacks {
            callback();
        }
        stats
    }

    /// Drains the queue outside of a frame. Render thread only.
    pub(crate) fn sync(&self) {
        let mut state = self.lock_state();
        let report = self.marshal.queue().drain(&mut state);
        if report.executed > 0 {
            state.changed = true;
        }
    }

    /// Drains the queue and releases every resource. Runs once.
    pub(crate) fn shutdown(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.lock_state();
        self.marshal.queue().drain(&mut state);
        state.free_all();
        log::info!("Rendering server shut down after {} frame(s).", state.frame);
    }
}

struct Inner {
    shared: Arc<Shared>,
    render_thread: Mutex<Option<RenderThread>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let thread = lock(&self.render_thread).take();
        match thread {
            Some(mut thread) => thread.stop(),
            None => self.shared.shutdown(),
        }
    }
}

/// The rendering server.
///
/// Cloning is cheap; every clone talks to the same server. The server shuts down
/// when [`RenderingServer::finish`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct RenderingServer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RenderingServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingServer")
            .field("thread_model", &self.inner.shared.config.thread_model)
            .field("live_handles", &self.inner.shared.allocator.live_count())
            .field("pending", &self.inner.shared.marshal.queue().pending())
            .finish()
    }
}

impl RenderingServer {
    /// Creates a server around an already selected backend.
    ///
    /// With [`ThreadModel::SingleThreaded`] the calling thread becomes the render
    /// thread. With [`ThreadModel::Separate`] a render thread is spawned.
    ///
    /// ## Errors
    /// Returns an error if the render thread cannot be spawned.
    pub fn new(config: ServerConfig, backend: Box<dyn RenderBackend>) -> std::io::Result<Self> {
        let allocator = Arc::new(RidAllocator::new());
        log::info!(
            "Rendering server starting: {:?} thread model, {} backend.",
            config.thread_model,
            backend.kind().driver_name()
        );
        let state = ServerState::new(backend, Arc::clone(&allocator), config.default_clear_color);
        let shared = Arc::new(Shared {
            allocator,
            state: Mutex::new(state),
            marshal: Marshal::new(config.queue_warn_threshold),
            events: EventBus::new(),
            frame_callbacks: Mutex::new(Vec::new()),
            render_loop_enabled: AtomicBool::new(config.render_loop_enabled),
            test_texture: Mutex::new(Rid::INVALID),
            finished: AtomicBool::new(false),
            config,
        });

        let render_thread = match shared.config.thread_model {
            ThreadModel::SingleThreaded => {
                shared.marshal.bind_render_thread();
                None
            }
            ThreadModel::Separate => {
                let interval = shared.config.frame_interval();
                Some(RenderThread::start(Arc::clone(&shared), interval)?)
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                render_thread: Mutex::new(render_thread),
            }),
        })
    }

    fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    /// The configuration the server was created with.
    pub fn config(&self) -> &ServerConfig {
        &self.shared().config
    }

    /// Returns `true` when called from the render thread.
    pub fn is_render_thread(&self) -> bool {
        self.shared().marshal.is_render_thread()
    }

    /// Runs `op` on the render thread: in place when the caller is the render
    /// thread, queued otherwise.
    fn dispatch<F>(&self, label: &'static str, op: F) -> Dispatch
    where
        F: FnOnce(&mut ServerState) -> Result<(), ServerError> + Send + 'static,
    {
        let shared = self.shared();
        if shared.marshal.is_render_thread() {
            let mut state = shared.lock_state();
            let result = run_isolated(label, || op(&mut state));
            state.changed = true;
            if let Err(err) = &result {
                log::warn!("'{label}' failed: {err}");
            }
            Dispatch::Executed(result)
        } else {
            Dispatch::Queued(shared.marshal.submit(label, op))
        }
    }

    /// Dispatches a setter. Failures are logged where they happen.
    fn apply<F>(&self, label: &'static str, op: F)
    where
        F: FnOnce(&mut ServerState) -> Result<(), ServerError> + Send + 'static,
    {
        self.dispatch(label, op);
    }

    /// Allocates a handle now and initialises its store entry on the render thread.
    ///
    /// A handle whose initialisation fails is abandoned. When that happens in
    /// place, [`Rid::INVALID`] is returned instead. A handle freed before its
    /// queued initialisation runs is never initialised.
    fn create<F>(&self, kind: ResourceKind, label: &'static str, init: F) -> Rid
    where
        F: FnOnce(&mut ServerState, Rid) -> Result<(), ServerError> + Send + 'static,
    {
        self.create_owning(kind, label, None, init)
    }

    /// Like [`RenderingServer::create`], for a resource that owns a second handle
    /// allocated by the caller. The owned handle is abandoned with its owner.
    fn create_owning<F>(
        &self,
        kind: ResourceKind,
        label: &'static str,
        owned: Option<Rid>,
        init: F,
    ) -> Rid
    where
        F: FnOnce(&mut ServerState, Rid) -> Result<(), ServerError> + Send + 'static,
    {
        let rid = self.shared().allocator.allocate(kind);
        let dispatch = self.dispatch(label, move |state| {
            // Freed before its queued initialisation ran; the index may already
            // belong to a newer handle.
            if !state.allocator().is_live(rid) {
                log::debug!("'{label}' skipped: {rid} was freed before it was initialised.");
                if let Some(owned) = owned {
                    state.abandon(owned);
                }
                return Ok(());
            }
            let result = run_isolated(label, || init(state, rid));
            if result.is_err() {
                state.abandon(rid);
                if let Some(owned) = owned {
                    state.abandon(owned);
                }
            }
            result
        });
        if dispatch.is_ok() {
            rid
        } else {
            Rid::INVALID
        }
    }

    /// Reads render-thread state as of the last drain.
    fn read<R>(&self, op: impl FnOnce(&ServerState) -> R) -> R {
        let state = self.shared().lock_state();
        op(&state)
    }

    /// Reads a value from a live handle of `kind`; the default otherwise.
    fn query<R: Default>(
        &self,
        label: &'static str,
        rid: Rid,
        kind: ResourceKind,
        op: impl FnOnce(&ServerState) -> R,
    ) -> R {
        self.query_or(label, rid, kind, R::default(), op)
    }

    /// Like [`RenderingServer::query`], for values without a `Default`.
    fn query_or<R>(
        &self,
        label: &'static str,
        rid: Rid,
        kind: ResourceKind,
        default: R,
        op: impl FnOnce(&ServerState) -> R,
    ) -> R {
        if let Err(err) = self.check_live(rid, kind) {
            log::warn!("'{label}' returned a default value: {err}");
            return default;
        }
        self.read(op)
    }

    fn check_live(&self, rid: Rid, kind: ResourceKind) -> Result<(), ServerError> {
        ServerError::check_kind(rid, kind)?;
        if self.shared().allocator.is_live(rid) {
            Ok(())
        } else {
            Err(ServerError::InvalidHandle(rid))
        }
    }

    // --- Lifecycle ---

    /// Frees any resource. The handle is dead as soon as this returns; the
    /// resource itself is torn down on the render thread.
    ///
    /// Freeing a dead handle logs an error and does nothing.
    pub fn free(&self, rid: Rid) {
        if let Err(err) = self.shared().allocator.retire(rid) {
            log::error!("free({rid}) ignored: {err}");
            return;
        }
        self.apply("free", move |state| state.free(rid));
    }

    /// Typed view of any live resource, for render-thread code and tests.
    pub fn with_state<R>(&self, op: impl FnOnce(&ServerState) -> R) -> R {
        self.read(op)
    }

    /// Returns `true` if `rid` names a live, initialised resource.
    pub fn is_live(&self, rid: Rid) -> bool {
        self.read(|state| state.resolve(rid).is_some())
    }

    /// Runs `callback` on the render thread with the server state.
    ///
    /// ## Arguments
    /// * `mode` - [`CallMode::Blocking`] returns once the callback ran;
    ///   [`CallMode::Deferred`] once it is scheduled.
    pub fn call_on_render_thread<F>(&self, callback: F, mode: CallMode)
    where
        F: FnOnce(&mut ServerState) + Send + 'static,
    {
        let dispatch = self.dispatch("call_on_render_thread", move |state| {
            callback(state);
            Ok(())
        });
        if let (Dispatch::Queued(id), CallMode::Blocking) = (dispatch, mode) {
            self.wait_for(id);
        }
    }

    /// Blocks until every command submitted before the call has executed.
    pub fn force_sync(&self) {
        let shared = self.shared();
        if shared.marshal.is_render_thread() {
            shared.sync();
            return;
        }
        let id = shared.marshal.queue().last_submitted();
        self.wait_for(id);
    }

    fn wait_for(&self, id: crate::queue::SubmissionId) {
        let shared = self.shared();
        let running = {
            let thread = lock(&self.inner.render_thread);
            match thread.as_ref() {
                Some(thread) => {
                    thread.send(Wake::Sync);
                    Some(thread.running_flag())
                }
                None => None,
            }
        };
        let alive = || {
            !shared.finished.load(Ordering::SeqCst)
                && running.as_ref().map_or(true, |flag| flag.load(Ordering::SeqCst))
        };
        if !shared.marshal.queue().wait_executed(id, alive) {
            log::warn!("Stopped waiting for command {id}: the render thread is gone.");
        }
    }

    /// Draws a frame.
    ///
    /// With a separate render thread the frame is requested and this returns
    /// immediately. Otherwise the frame is drawn in place.
    ///
    /// ## Errors
    /// * `ServerError::WrongThread` - Single-threaded server called from another thread.
    /// * `ServerError::Disconnected` - The render thread has stopped.
    pub fn draw(&self, swap_buffers: bool, frame_step: f32) -> Result<(), ServerError> {
        self.request_frame(swap_buffers, frame_step, false).map(|_| ())
    }

    /// Draws a frame and waits for it.
    ///
    /// ## Errors
    /// Same as [`RenderingServer::draw`].
    pub fn force_draw(&self, swap_buffers: bool, frame_step: f32) -> Result<FrameStats, ServerError> {
        self.request_frame(swap_buffers, frame_step, true)
            .map(|stats| stats.unwrap_or_default())
    }

    fn request_frame(
        &self,
        swap_buffers: bool,
        frame_step: f32,
        wait: bool,
    ) -> Result<Option<FrameStats>, ServerError> {
        let shared = self.shared();
        if shared.finished.load(Ordering::SeqCst) {
            return Err(ServerError::Disconnected);
        }
        if shared.marshal.is_render_thread() {
            return Ok(Some(shared.run_frame(swap_buffers, frame_step)));
        }

        let (ack, done) = if wait {
            let (tx, rx) = flume::bounded(1);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        {
            let thread = lock(&self.inner.render_thread);
            let Some(thread) = thread.as_ref() else {
                log::warn!("draw() called off the render thread of a single-threaded server.");
                return Err(ServerError::WrongThread("draw"));
            };
            let request = Wake::Draw {
                swap_buffers,
                frame_step,
                ack,
            };
            if !thread.is_running() || !thread.send(request) {
                return Err(ServerError::Disconnected);
            }
        }
        match done {
            Some(done) => done.recv().map(Some).map_err(|_| ServerError::Disconnected),
            None => Ok(None),
        }
    }

    /// Enables or disables the paced render loop of a separate render thread.
    pub fn set_render_loop_enabled(&self, enabled: bool) {
        self.shared()
            .render_loop_enabled
            .store(enabled, Ordering::Relaxed);
    }

    /// Whether the paced render loop may draw.
    pub fn is_render_loop_enabled(&self) -> bool {
        self.shared().render_loop_enabled.load(Ordering::Relaxed)
    }

    /// Returns `true` if any operation ran or is pending since the last frame.
    pub fn has_changed(&self) -> bool {
        self.shared().marshal.queue().pending() > 0 || self.read(|state| state.changed)
    }

    /// Registers a callback run once, after the next frame is drawn.
    pub fn request_frame_drawn_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.shared().frame_callbacks).push(Box::new(callback));
    }

    /// A new receiver of frame events.
    pub fn subscribe_frame_events(&self) -> flume::Receiver<FrameEvent> {
        self.shared().events.subscribe()
    }

    /// Shuts the server down: drains pending commands, releases every resource,
    /// and joins the render thread. Later frames fail with `Disconnected`.
    pub fn finish(&self) {
        let thread = lock(&self.inner.render_thread).take();
        match thread {
            Some(mut thread) => thread.stop(),
            None => self.shared().shutdown(),
        }
    }
}
