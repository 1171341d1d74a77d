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

//! Dynamically typed material parameter values.

use crate::math::{Color, Mat4, Vec2, Vec3, Vec4};
use crate::rid::Rid;

/// A material parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Variant {
    /// No value. Getters return this for unknown parameters.
    #[default]
    Nil,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A float.
    Float(f32),
    /// A 2D vector.
    Vec2(Vec2),
    /// A 3D vector.
    Vec3(Vec3),
    /// A 4D vector.
    Vec4(Vec4),
    /// A color.
    Color(Color),
    /// A 4x4 matrix.
    Mat4(Mat4),
    /// A resource handle, typically a texture.
    Rid(Rid),
}

impl Variant {
    /// Returns `true` for [`Variant::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// Interprets the value as a color. Vectors are widened with an alpha of one.
    pub fn as_color(&self) -> Option<Color> {
        match *self {
            Variant::Color(c) => Some(c),
            Variant::Vec4(v) => Some(Color::rgba(v.x, v.y, v.z, v.w)),
            Variant::Vec3(v) => Some(Color::rgb(v.x, v.y, v.z)),
            _ => None,
        }
    }

    /// Interprets the value as a float. Integers are converted.
    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Variant::Float(f) => Some(f),
            Variant::Int(i) => Some(i as f32),
            _ => None,
        }
    }

    /// Returns the handle held by a [`Variant::Rid`].
    pub fn as_rid(&self) -> Option<Rid> {
        match *self {
            Variant::Rid(rid) => Some(rid),
            _ => None,
        }
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Float(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<Color> for Variant {
    fn from(value: Color) -> Self {
        Variant::Color(value)
    }
}

impl From<Rid> for Variant {
    fn from(value: Rid) -> Self {
        Variant::Rid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_coercions() {
        assert_eq!(
            Variant::Vec3(Vec3::new(0.5, 0.25, 1.0)).as_color(),
            Some(Color::rgb(0.5, 0.25, 1.0))
        );
        assert_eq!(Variant::Float(1.0).as_color(), None);
        assert_eq!(Variant::Int(3).as_float(), Some(3.0));
        assert!(Variant::default().is_nil());
    }
}
