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

//! Frame-boundary notifications.
//!
//! The scheduler publishes a [`FrameEvent`] before any GPU work of a frame begins and
//! another once the frame is submitted. Collaborators such as animation or physics
//! interpolation subscribe through the [`EventBus`] and receive their own channel.

mod bus;

pub use self::bus::EventBus;

use crate::stats::FrameStats;

/// A notification emitted by the frame scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Emitted after the command queue is drained, before any resource is realized.
    PreDraw {
        /// The number of the frame about to be drawn.
        frame: u64,
    },
    /// Emitted after every eligible viewport was submitted.
    PostDraw {
        /// The number of the frame just drawn.
        frame: u64,
        /// Counters of the frame.
        stats: FrameStats,
    },
}
