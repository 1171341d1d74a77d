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

use std::sync::Mutex;

/// A thread-safe broadcast channel.
///
/// Every subscriber gets its own unbounded `flume` channel and sees every event
/// published after it subscribed. Subscribers whose receiver was dropped are pruned on
/// the next publish, so an unobserved bus never accumulates events.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates an EventBus without subscribers.
    pub fn new() -> Self {
        log::debug!("EventBus initialized.");
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber.
    ///
    /// ## Returns
    /// The receiving end of the subscriber's channel.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        self.lock().push(sender);
        receiver
    }

    /// Sends `event` to every live subscriber.
    ///
    /// ## Arguments
    /// * `event` - The event to be broadcast.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");
        let mut subscribers = self.lock();
        subscribers.retain(|sender| {
            if sender.send(event.clone()).is_err() {
                log::debug!("Dropping disconnected event subscriber.");
                false
            } else {
                true
            }
        });
    }

    /// The number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<flume::Sender<T>>> {
        // A panic while holding this lock cannot leave the list half-updated.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::{thread, time::Duration};

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Resized { width: u32, height: u32 },
        Shutdown,
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Shutdown);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn every_subscriber_sees_every_event_in_order() {
        let bus = EventBus::<TestEvent>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(TestEvent::Resized {
            width: 1,
            height: 2,
        });
        bus.publish(TestEvent::Shutdown);

        for receiver in [&a, &b] {
            assert_eq!(
                receiver.try_recv(),
                Ok(TestEvent::Resized {
                    width: 1,
                    height: 2
                })
            );
            assert_eq!(receiver.try_recv(), Ok(TestEvent::Shutdown));
            assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
        }
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Shutdown);
        let late = bus.subscribe();
        assert_eq!(late.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::<TestEvent>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(TestEvent::Shutdown);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(TestEvent::Shutdown));
    }

    #[test]
    fn publish_from_thread() {
        let bus = std::sync::Arc::new(EventBus::<TestEvent>::new());
        let receiver = bus.subscribe();
        let publisher = bus.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.publish(TestEvent::Shutdown);
        });

        match receiver.recv_timeout(Duration::from_secs(1)) {
            Ok(event) => assert_eq!(event, TestEvent::Shutdown),
            Err(e) => panic!("Failed to receive event from thread: {e:?}"),
        }
        handle.join().expect("Thread join failed");
    }
}
