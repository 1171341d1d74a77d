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

//! Concrete render backends for the Umbra rendering server.
//!
//! [`graphics::headless`] never touches a GPU; [`graphics::wgpu`] drives Vulkan,
//! Metal, DX12 or OpenGL through wgpu. [`create_backend`] picks one according to
//! the server configuration.

pub mod graphics;

pub use graphics::create_backend;
pub use graphics::headless::HeadlessBackend;
pub use graphics::wgpu::WgpuBackend;
