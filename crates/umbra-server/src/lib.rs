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

//! The Umbra rendering server.
//!
//! Callers talk to a [`RenderingServer`]: they create resources, receive opaque
//! handles, and mutate or query resources through those handles from any thread.
//! Mutations made off the render thread are queued as commands and replayed in
//! submission order at the next frame boundary. Once per frame the
//! [`scheduler`] realizes dirty resources on the backend and draws every
//! eligible viewport.

pub mod marshal;
pub mod queue;
pub mod scheduler;
pub mod server;
pub mod state;

pub use marshal::{CallMode, Dispatch};
pub use queue::SubmissionId;
pub use server::RenderingServer;
pub use state::{ResourceRef, ServerState};
