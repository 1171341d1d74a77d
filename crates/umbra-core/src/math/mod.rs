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

//! Math primitives used by the server: vectors, matrices, 2D transforms, bounding
//! volumes, frustums and colors.

pub mod color;
pub mod geometry;
pub mod matrix;
pub mod transform2d;
pub mod vector;

pub use self::color::Color;
pub use self::geometry::{Aabb, Frustum, Plane, Rect2};
pub use self::matrix::Mat4;
pub use self::transform2d::Transform2D;
pub use self::vector::{Vec2, Vec3, Vec4};

/// Tolerance used for approximate float comparisons.
pub const EPSILON: f32 = 1e-5;

/// Converts degrees to radians.
#[inline]
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * (std::f32::consts::PI / 180.0)
}
