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

//! The contract between the server and a concrete graphics backend.
//!
//! The server never talks to a graphics API directly. It realizes dirty resources
//! and submits fully culled, batched viewport frames through [`RenderBackend`]. Every
//! backend variant (explicit API, compatibility API, headless) implements every
//! operation; an unsupported capability is reported through
//! [`RenderBackend::supports_feature`] and surfaces as a logged no-op, never as a
//! missing method.

mod frame;
mod info;
mod traits;

pub use self::frame::*;
pub use self::info::*;
pub use self::traits::RenderBackend;
