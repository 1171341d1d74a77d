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

//! One store per resource kind.
//!
//! Stores validate input before touching state: an operation that returns an error
//! leaves the store exactly as it was. Backend ids live in the stored objects, but
//! stores never call a backend; the frame scheduler realizes whatever a store marked
//! dirty.

/// Generates the handle-table accessors every store exposes.
macro_rules! store_access {
    ($store:ident, $object:ty, $field:ident) => {
        impl $store {
            /// Returns the object named by `rid`, if live.
            pub fn get(&self, rid: umbra_core::Rid) -> Option<&$object> {
                self.$field.get(rid)
            }

            /// Returns the object named by `rid` mutably, if live.
            pub fn get_mut(&mut self, rid: umbra_core::Rid) -> Option<&mut $object> {
                self.$field.get_mut(rid)
            }

            /// Returns `true` if `rid` names a live object of this store.
            pub fn contains(&self, rid: umbra_core::Rid) -> bool {
                self.$field.contains(rid)
            }

            /// Removes the object named by `rid` and hands it back for teardown.
            pub fn remove(&mut self, rid: umbra_core::Rid) -> Option<$object> {
                self.$field.remove(rid)
            }

            /// Iterates over live objects in index order.
            pub fn iter(&self) -> impl Iterator<Item = (umbra_core::Rid, &$object)> {
                self.$field.iter()
            }

            /// Iterates mutably over live objects in index order.
            pub fn iter_mut(&mut self) -> impl Iterator<Item = (umbra_core::Rid, &mut $object)> {
                self.$field.iter_mut()
            }

            /// Number of live objects.
            pub fn len(&self) -> usize {
                self.$field.len()
            }

            /// Returns `true` if the store holds no object.
            pub fn is_empty(&self) -> bool {
                self.$field.is_empty()
            }
        }
    };
}

pub mod camera;
pub mod canvas;
pub mod environment;
pub mod light;
pub mod material;
pub mod mesh;
pub mod multimesh;
pub mod particles;
pub mod scenario;
pub mod shader;
pub mod texture;
pub mod viewport;

pub use camera::{Camera, CameraStore, Projection};
pub use canvas::{Canvas, CanvasCommand, CanvasItem, CanvasStore};
pub use environment::{Background, Environment, EnvironmentStore};
pub use light::{Light, LightParam, LightStore, LightType};
pub use material::{Material, MaterialStore};
pub use mesh::{Mesh, MeshStore, Surface, SurfaceArrays, SurfaceData, SurfaceError};
pub use multimesh::{MultiMesh, MultiMeshError, MultiMeshStore};
pub use particles::{Particles, ParticlesStore};
pub use scenario::{Instance, Scenario, ScenarioStore};
pub use shader::{Shader, ShaderMode, ShaderParam, ShaderStore};
pub use texture::{ImageError, Texture, TextureSource, TextureStore};
pub use viewport::{
    ClearMode, UpdateMode, Viewport, ViewportCanvas, ViewportStore,
};
