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

//! A 2x3 affine transform for canvas drawing.

use serde::{Deserialize, Serialize};

use super::vector::Vec2;
use std::ops::Mul;

/// A 2D affine transform stored as two basis columns and an origin.
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Transform2D {
    /// The transformed X axis.
    pub x: Vec2,
    /// The transformed Y axis.
    pub y: Vec2,
    /// The translation.
    pub origin: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2D {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        x: Vec2::new(1.0, 0.0),
        y: Vec2::new(0.0, 1.0),
        origin: Vec2::ZERO,
    };

    /// Creates a pure translation.
    pub fn from_translation(offset: Vec2) -> Self {
        Self {
            origin: offset,
            ..Self::IDENTITY
        }
    }

    /// Creates a rotation of `angle` radians followed by a translation.
    pub fn from_rotation_translation(angle: f32, offset: Vec2) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            x: Vec2::new(c, s),
            y: Vec2::new(-s, c),
            origin: offset,
        }
    }

    /// Creates a non-uniform scale.
    pub fn from_scale(scale: Vec2) -> Self {
        Self {
            x: Vec2::new(scale.x, 0.0),
            y: Vec2::new(0.0, scale.y),
            origin: Vec2::ZERO,
        }
    }

    /// Transforms a point.
    #[inline]
    pub fn xform(&self, p: Vec2) -> Vec2 {
        self.x * p.x + self.y * p.y + self.origin
    }

    /// Builds a transform from the 8-float row-major layout used by 2D instance
    /// buffers: `[x.x, y.x, pad, origin.x, x.y, y.y, pad, origin.y]`.
    pub fn from_rows_2x4(rows: &[f32; 8]) -> Self {
        Self {
            x: Vec2::new(rows[0], rows[4]),
            y: Vec2::new(rows[1], rows[5]),
            origin: Vec2::new(rows[3], rows[7]),
        }
    }

    /// Inverse of [`Transform2D::from_rows_2x4`].
    pub fn to_rows_2x4(&self) -> [f32; 8] {
        [
            self.x.x,
            self.y.x,
            0.0,
            self.origin.x,
            self.x.y,
            self.y.y,
            0.0,
            self.origin.y,
        ]
    }
}

impl Mul for Transform2D {
    type Output = Transform2D;

    /// Composes two transforms; `a * b` applies `b` first.
    fn mul(self, rhs: Transform2D) -> Transform2D {
        Transform2D {
            x: self.x * rhs.x.x + self.y * rhs.x.y,
            y: self.x * rhs.y.x + self.y * rhs.y.y,
            origin: self.xform(rhs.origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn composition_applies_right_operand_first() {
        let t = Transform2D::from_translation(Vec2::new(10.0, 0.0));
        let s = Transform2D::from_scale(Vec2::new(2.0, 2.0));
        let p = (t * s).xform(Vec2::new(1.0, 1.0));
        assert_eq!(p, Vec2::new(12.0, 2.0));
    }

    #[test]
    fn rotation_quarter_turn() {
        let r = Transform2D::from_rotation_translation(std::f32::consts::FRAC_PI_2, Vec2::ZERO);
        let p = r.xform(Vec2::new(1.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
    }
}
