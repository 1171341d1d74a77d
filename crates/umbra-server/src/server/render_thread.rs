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

//! The dedicated render thread of [`ThreadModel::Separate`](umbra_core::config::ThreadModel).

use super::Shared;
use flume::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use umbra_core::stats::FrameStats;

/// A request to the render thread.
#[derive(Debug)]
pub(crate) enum Wake {
    /// Draw one frame; `ack` receives its statistics.
    Draw {
        swap_buffers: bool,
        frame_step: f32,
        ack: Option<Sender<FrameStats>>,
    },
    /// Drain the command queue now.
    Sync,
    /// Drain, release every resource, and exit.
    Shutdown,
}

/// Handle on the running render thread.
pub(crate) struct RenderThread {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    wake: Sender<Wake>,
}

impl RenderThread {
    /// Spawns the render thread. It binds itself as the render thread before
    /// handling any request.
    pub fn start(shared: Arc<Shared>, frame_interval: Option<Duration>) -> std::io::Result<Self> {
        let (wake, requests) = flume::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let (bound_tx, bound_rx) = flume::bounded(1);

        let handle = thread::Builder::new()
            .name("umbra-render".to_owned())
            .spawn(move || {
                shared.marshal.bind_render_thread();
                let _ = bound_tx.send(());
                log::info!("Render thread started.");
                run(&shared, &requests, &flag, frame_interval);
                flag.store(false, Ordering::SeqCst);
                log::info!("Render thread stopped.");
            })?;

        // Calls made right after construction must already see the binding.
        let _ = bound_rx.recv();

        Ok(Self {
            running,
            handle: Some(handle),
            wake,
        })
    }

    /// Returns `true` while the thread handles requests.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A flag mirroring [`RenderThread::is_running`], for waiters.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Sends a request. Returns `false` if the thread is gone.
    pub fn send(&self, wake: Wake) -> bool {
        self.wake.send(wake).is_ok()
    }

    /// Asks the thread to shut down and joins it.
    pub fn stop(&mut self) {
        let _ = self.wake.send(Wake::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Dropped from a callback on the render thread itself.
                return;
            }
            if handle.join().is_err() {
                log::error!("Render thread panicked during shutdown.");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    shared: &Shared,
    requests: &Receiver<Wake>,
    running: &AtomicBool,
    frame_interval: Option<Duration>,
) {
    let mut next_frame = frame_interval.map(|interval| Instant::now() + interval);

    while running.load(Ordering::Relaxed) {
        let request = match next_frame {
            Some(deadline) => requests.recv_deadline(deadline),
            None => requests.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match request {
            Ok(Wake::Draw {
                swap_buffers,
                frame_step,
                ack,
            }) => {
                let stats = shared.run_frame(swap_buffers, frame_step);
                if let Some(ack) = ack {
                    let _ = ack.send(stats);
                }
            }
            Ok(Wake::Sync) => shared.sync(),
            Ok(Wake::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let Some(interval) = frame_interval else {
                    continue;
                };
                if shared.render_loop_enabled.load(Ordering::Relaxed) {
                    shared.run_frame(true, interval.as_secs_f32());
                }
                let now = Instant::now();
                next_frame = next_frame.map(|deadline| (deadline + interval).max(now));
            }
        }
    }

    shared.shutdown();
}
