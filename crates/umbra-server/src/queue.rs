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

//! The global FIFO of deferred server mutations.

use crate::state::ServerState;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use umbra_core::ServerError;

/// A type-erased mutation of the server state.
pub type CommandFn = Box<dyn FnOnce(&mut ServerState) -> Result<(), ServerError> + Send>;

/// Monotonic stamp of a queued command. Channel order equals stamp order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A queued command with its label and stamp.
pub struct Command {
    /// Position in the global submission order.
    pub id: SubmissionId,
    /// Name of the operation, for diagnostics.
    pub label: &'static str,
    run: CommandFn,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Outcome of one drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Commands taken off the queue.
    pub executed: u64,
    /// Commands that returned an error or panicked.
    pub failed: u64,
}

/// A multi-producer FIFO of commands, drained by the render thread.
///
/// `submit` stamps and sends under one lock, so the order in which commands come out
/// of the channel is the order of their [`SubmissionId`]s. Draining records the last
/// executed stamp and wakes every thread waiting for it.
pub struct CommandQueue {
    sender: flume::Sender<Command>,
    receiver: flume::Receiver<Command>,
    last_submitted: Mutex<u64>,
    executed: Mutex<u64>,
    executed_changed: Condvar,
    warn_threshold: usize,
    warned: AtomicBool,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.receiver.len())
            .field("last_submitted", &self.last_submitted())
            .field("last_executed", &self.last_executed())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Counters are plain integers; a poisoned guard still holds a valid value.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs one server operation inside a panic boundary.
///
/// A panic is reported as [`ServerError::Panicked`]; the state stays usable.
pub(crate) fn run_isolated(
    label: &'static str,
    op: impl FnOnce() -> Result<(), ServerError>,
) -> Result<(), ServerError> {
    panic::catch_unwind(AssertUnwindSafe(op)).unwrap_or(Err(ServerError::Panicked(label)))
}

impl CommandQueue {
    /// Creates an empty queue.
    ///
    /// ## Arguments
    /// * `warn_threshold` - Pending count above which a warning is logged once.
    pub fn new(warn_threshold: usize) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            last_submitted: Mutex::new(0),
            executed: Mutex::new(0),
            executed_changed: Condvar::new(),
            warn_threshold,
            warned: AtomicBool::new(false),
        }
    }

    /// Appends a command to the queue.
    ///
    /// ## Returns
    /// The stamp of the command.
    pub fn submit<F>(&self, label: &'static str, command: F) -> SubmissionId
    where
        F: FnOnce(&mut ServerState) -> Result<(), ServerError> + Send + 'static,
    {
        let id = {
            let mut last = lock(&self.last_submitted);
            *last += 1;
            let id = SubmissionId(*last);
            let command = Command {
                id,
                label,
                run: Box::new(command),
            };
            // The receiver lives as long as the queue.
            if self.sender.send(command).is_err() {
                log::error!("Command queue closed; dropping '{label}' {id}.");
            }
            id
        };

        let pending = self.receiver.len();
        if pending > self.warn_threshold && !self.warned.swap(true, Ordering::Relaxed) {
            log::warn!(
                "{pending} commands are waiting for the render thread (threshold {}).",
                self.warn_threshold
            );
        }
        id
    }

    /// Number of commands waiting.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Stamp of the newest submitted command.
    pub fn last_submitted(&self) -> SubmissionId {
        SubmissionId(*lock(&self.last_submitted))
    }

    /// Stamp of the newest executed command.
    pub fn last_executed(&self) -> SubmissionId {
        SubmissionId(*lock(&self.executed))
    }

    /// Executes every command queued when the drain starts, in order.
    ///
    /// Each command runs inside its own panic boundary. Failures are logged with the
    /// command label and stamp; draining continues with the next command.
    pub fn drain(&self, state: &mut ServerState) -> DrainReport {
        let mut report = DrainReport::default();
        let pending = self.receiver.len();
        let mut last = None;
        for _ in 0..pending {
            let Ok(command) = self.receiver.try_recv() else {
                break;
            };
            let Command { id, label, run } = command;
            match run_isolated(label, || run(state)) {
                Ok(()) => {}
                Err(ServerError::Panicked(_)) => {
                    log::error!("Command '{label}' {id} panicked; continuing with the next one.");
                    report.failed += 1;
                }
                Err(err) => {
                    log::error!("Command '{label}' {id} failed: {err}");
                    report.failed += 1;
                }
            }
            report.executed += 1;
            last = Some(id);
        }

        if let Some(id) = last {
            *lock(&self.executed) = id.0;
            self.executed_changed.notify_all();
        }
        if self.receiver.len() <= self.warn_threshold {
            self.warned.store(false, Ordering::Relaxed);
        }
        report
    }

    /// Blocks until the command stamped `id` has executed.
    ///
    /// ## Arguments
    /// * `alive` - Polled while waiting; the wait is abandoned once it returns false.
    ///
    /// ## Returns
    /// `true` if the command executed, `false` if the wait was abandoned.
    pub fn wait_executed(&self, id: SubmissionId, alive: impl Fn() -> bool) -> bool {
        let mut executed = lock(&self.executed);
        loop {
            if *executed >= id.0 {
                return true;
            }
            if !alive() {
                return false;
            }
            executed = self
                .executed_changed
                .wait_timeout(executed, Duration::from_millis(50))
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use umbra_data::RidAllocator;

    fn state() -> ServerState {
        ServerState::new(
            Box::new(umbra_infra::HeadlessBackend::new()),
            Arc::new(RidAllocator::new()),
            umbra_core::math::Color::BLACK,
        )
    }

    #[test]
    fn stamps_are_monotonic() {
        let queue = CommandQueue::new(16);
        let a = queue.submit("a", |_| Ok(()));
        let b = queue.submit("b", |_| Ok(()));
        assert!(a < b);
        assert_eq!(queue.last_submitted(), b);
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn drain_runs_in_order_and_advances_watermark() {
        let queue = CommandQueue::new(16);
        let mut state = state();
        for i in 0..4u64 {
            queue.submit("push", move |s| {
                s.frame = s.frame * 10 + i;
                Ok(())
            });
        }
        let report = queue.drain(&mut state);
        assert_eq!(report.executed, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(state.frame, 123);
        assert_eq!(queue.last_executed(), queue.last_submitted());
    }

    #[test]
    fn failures_and_panics_do_not_stop_the_drain() {
        let queue = CommandQueue::new(16);
        let mut state = state();
        queue.submit("fails", |_| Err(ServerError::MalformedData("bad".into())));
        queue.submit("panics", |_| panic!("boom"));
        queue.submit("runs", |s| {
            s.frame = 7;
            Ok(())
        });
        let report = queue.drain(&mut state);
        assert_eq!(report.executed, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(state.frame, 7);
    }

    #[test]
    fn concurrent_submitters_execute_in_stamp_order() {
        let queue = Arc::new(CommandQueue::new(1 << 20));
        let order = Arc::new(Mutex::new(Vec::new()));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let order = order.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        let order = order.clone();
                        let id = Arc::new(Mutex::new(SubmissionId::default()));
                        let slot = id.clone();
                        let stamped = queue.submit("record", move |_| {
                            order.lock().unwrap().push(*slot.lock().unwrap());
                            Ok(())
                        });
                        *id.lock().unwrap() = stamped;
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let mut state = state();
        assert_eq!(queue.drain(&mut state).executed, 1000);
        let order = order.lock().unwrap();
        assert_eq!(order.len(), 1000);
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn wait_returns_once_executed_or_abandoned() {
        let queue = Arc::new(CommandQueue::new(16));
        let id = queue.submit("noop", |_| Ok(()));
        assert!(!queue.wait_executed(id, || false));

        let drainer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut state = state();
                thread::sleep(Duration::from_millis(20));
                queue.drain(&mut state);
            })
        };
        assert!(queue.wait_executed(id, || true));
        drainer.join().unwrap();
    }
}
