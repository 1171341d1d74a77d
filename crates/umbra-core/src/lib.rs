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

//! Foundational crate of the Umbra rendering server.
//!
//! `umbra-core` carries no behaviour of its own. It defines the vocabulary every
//! other layer speaks: opaque resource handles, math primitives, resource data
//! formats, the error hierarchy, the server configuration, frame events, and the
//! [`backend::RenderBackend`] contract that concrete graphics backends implement.

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod image;
pub mod math;
pub mod rid;
pub mod stats;
pub mod variant;

pub use config::ServerConfig;
pub use error::{BackendError, ServerError};
pub use rid::{ResourceKind, Rid};
