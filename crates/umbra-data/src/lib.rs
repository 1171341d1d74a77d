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

//! Resource bookkeeping for the Umbra rendering server.
//!
//! - [`handle`] hands out generation-tagged [`umbra_core::Rid`]s from a single index
//!   space and stores per-kind objects in slot tables keyed by those handles.
//! - [`storage`] holds one store per resource kind. Stores own CPU-side state,
//!   validate every mutation, and remember which objects need to be realized by the
//!   backend on the next frame.
//!
//! Nothing here is thread-aware. The allocator is the only type meant to be shared;
//! everything else is owned by the render thread.

pub mod handle;
pub mod storage;

pub use handle::{HandleTable, RidAllocator};
