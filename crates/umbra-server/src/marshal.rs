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

//! Routing of server operations to the render thread.

use crate::queue::{CommandQueue, SubmissionId};
use crate::state::ServerState;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};
use umbra_core::ServerError;

/// How `call_on_render_thread` waits for its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Return once the callback is scheduled.
    #[default]
    Deferred,
    /// Return once the callback ran.
    Blocking,
}

/// What happened to a dispatched operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The caller is the render thread; the operation ran in place.
    Executed(Result<(), ServerError>),
    /// The operation was queued for the render thread.
    Queued(SubmissionId),
}

impl Dispatch {
    /// Returns `true` unless the operation ran in place and failed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Dispatch::Executed(Err(_)))
    }
}

/// Knows which thread is the render thread and owns the command queue.
#[derive(Debug)]
pub struct Marshal {
    queue: CommandQueue,
    render_thread: OnceLock<ThreadId>,
}

impl Marshal {
    /// Creates a marshal with no render thread bound yet.
    pub fn new(queue_warn_threshold: usize) -> Self {
        Self {
            queue: CommandQueue::new(queue_warn_threshold),
            render_thread: OnceLock::new(),
        }
    }

    /// Binds the calling thread as the render thread. Later calls are ignored.
    pub fn bind_render_thread(&self) {
        let current = thread::current().id();
        if self.render_thread.set(current).is_err() {
            log::debug!("Render thread already bound; ignoring {current:?}.");
        }
    }

    /// Returns `true` when called from the render thread.
    pub fn is_render_thread(&self) -> bool {
        self.render_thread.get() == Some(&thread::current().id())
    }

    /// The command queue.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Queues `command` for the render thread.
    pub fn submit<F>(&self, label: &'static str, command: F) -> SubmissionId
    where
        F: FnOnce(&mut ServerState) -> Result<(), ServerError> + Send + 'static,
    {
        self.queue.submit(label, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_thread_is_bound_once() {
        let marshal = Marshal::new(8);
        assert!(!marshal.is_render_thread());
        marshal.bind_render_thread();
        assert!(marshal.is_render_thread());

        let marshal = std::sync::Arc::new(marshal);
        let other = marshal.clone();
        let seen = thread::spawn(move || {
            other.bind_render_thread();
            other.is_render_thread()
        })
        .join()
        .unwrap();
        assert!(!seen);
    }

    #[test]
    fn failed_in_place_dispatch_is_not_ok() {
        assert!(Dispatch::Queued(SubmissionId(1)).is_ok());
        assert!(Dispatch::Executed(Ok(())).is_ok());
        assert!(!Dispatch::Executed(Err(ServerError::Disconnected)).is_ok());
    }
}
