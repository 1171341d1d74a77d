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

//! A column-major 4x4 matrix for 3D transforms and projections.

use serde::{Deserialize, Serialize};

use super::vector::{Vec3, Vec4};
use super::EPSILON;
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// Projections target a right-handed view space looking down `-Z` and a clip-space
/// depth range of `0..1`, which is what the wgpu backend expects.
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Mat4 {
    /// The four columns of the matrix.
    pub cols: [Vec4; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };

    /// Creates a matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a translation matrix.
    pub fn from_translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = t.extend(1.0);
        m
    }

    /// Creates a non-uniform scale matrix.
    pub fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates a rotation of `angle` radians around the Y axis.
    pub fn from_rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(c, 0.0, -s, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(s, 0.0, c, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates a rotation of `angle` radians around the X axis.
    pub fn from_rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, c, s, 0.0),
            Vec4::new(0.0, -s, c, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates a right-handed perspective projection with a `0..1` depth range.
    ///
    /// ## Arguments
    /// * `fov_y` - Vertical field of view in radians.
    /// * `aspect` - Width divided by height.
    /// * `near`, `far` - Positive distances to the clip planes.
    pub fn perspective_rh_zo(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y * 0.5).tan();
        let range = near - far;
        Self::from_cols(
            Vec4::new(f / aspect, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / range, -1.0),
            Vec4::new(0.0, 0.0, near * far / range, 0.0),
        )
    }

    /// Creates a right-handed orthographic projection with a `0..1` depth range.
    pub fn orthographic_rh_zo(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let rl = right - left;
        let tb = top - bottom;
        let range = near - far;
        Self::from_cols(
            Vec4::new(2.0 / rl, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / tb, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / range, 0.0),
            Vec4::new(-(right + left) / rl, -(top + bottom) / tb, near / range, 1.0),
        )
    }

    /// Creates an off-center right-handed perspective projection with a `0..1` depth
    /// range. The bounds are measured on the near plane.
    pub fn frustum_rh_zo(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let rl = right - left;
        let tb = top - bottom;
        let range = near - far;
        Self::from_cols(
            Vec4::new(2.0 * near / rl, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * near / tb, 0.0, 0.0),
            Vec4::new((right + left) / rl, (top + bottom) / tb, far / range, -1.0),
            Vec4::new(0.0, 0.0, near * far / range, 0.0),
        )
    }

    /// Builds an affine transform from the 12-float row-major layout used by
    /// instance buffers: three rows of `[basis.x, basis.y, basis.z, origin]`.
    pub fn from_rows_3x4(rows: &[f32; 12]) -> Self {
        Self::from_cols(
            Vec4::new(rows[0], rows[4], rows[8], 0.0),
            Vec4::new(rows[1], rows[5], rows[9], 0.0),
            Vec4::new(rows[2], rows[6], rows[10], 0.0),
            Vec4::new(rows[3], rows[7], rows[11], 1.0),
        )
    }

    /// Inverse of [`Mat4::from_rows_3x4`]. The projective row is dropped.
    pub fn to_rows_3x4(&self) -> [f32; 12] {
        let r0 = self.row(0);
        let r1 = self.row(1);
        let r2 = self.row(2);
        [
            r0.x, r0.y, r0.z, r0.w, r1.x, r1.y, r1.z, r1.w, r2.x, r2.y, r2.z, r2.w,
        ]
    }

    /// Returns row `i` (0..4) as a vector.
    #[inline]
    pub fn row(&self, i: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(i),
            self.cols[1].get(i),
            self.cols[2].get(i),
            self.cols[3].get(i),
        )
    }

    /// Returns the translation part of an affine transform.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }

    /// Transforms a point (`w = 1`), ignoring any projective component.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        (*self * p.extend(1.0)).truncate()
    }

    /// Transforms a direction (`w = 0`).
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        (*self * v.extend(0.0)).truncate()
    }

    /// Computes the inverse of an affine transform (upper 3x3 plus translation).
    ///
    /// ## Returns
    /// `None` if the linear part is singular.
    pub fn affine_inverse(&self) -> Option<Self> {
        let a = self.cols[0].truncate();
        let b = self.cols[1].truncate();
        let c = self.cols[2].truncate();
        let r0 = b.cross(c);
        let r1 = c.cross(a);
        let r2 = a.cross(b);
        let det = a.dot(r0);
        if det.abs() < EPSILON * EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        // Rows of the inverse linear part are the cofactor vectors scaled by 1/det.
        let r0 = r0 * inv_det;
        let r1 = r1 * inv_det;
        let r2 = r2 * inv_det;
        let t = self.translation();
        Some(Self::from_cols(
            Vec4::new(r0.x, r1.x, r2.x, 0.0),
            Vec4::new(r0.y, r1.y, r2.y, 0.0),
            Vec4::new(r0.z, r1.z, r2.z, 0.0),
            Vec4::new(-r0.dot(t), -r1.dot(t), -r2.dot(t), 1.0),
        ))
    }

    /// Returns the matrix as a flat column-major array, ready for GPU upload.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        bytemuck::cast(self.cols)
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, v: Vec4) -> Vec4 {
        self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z + self.cols[3] * v.w
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    #[inline]
    fn mul(self, rhs: Mat4) -> Mat4 {
        Mat4::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-4);
        }
    }

    #[test]
    fn translation_moves_points_not_vectors() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_vector(Vec3::X), Vec3::X);
    }

    #[test]
    fn affine_inverse_undoes_transform() {
        let m = Mat4::from_translation(Vec3::new(4.0, -2.0, 1.0))
            * Mat4::from_rotation_y(0.7)
            * Mat4::from_scale(Vec3::new(2.0, 3.0, 0.5));
        let inv = m.affine_inverse().unwrap();
        assert_mat_eq(m * inv, Mat4::IDENTITY);
    }

    #[test]
    fn affine_inverse_of_singular_is_none() {
        assert!(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0))
            .affine_inverse()
            .is_none());
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let p = Mat4::perspective_rh_zo(1.0, 1.0, 0.5, 100.0);
        let near = p * Vec4::new(0.0, 0.0, -0.5, 1.0);
        let far = p * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn rows_3x4_round_trip() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_x(0.3);
        assert_mat_eq(Mat4::from_rows_3x4(&m.to_rows_3x4()), m);
        assert_eq!(m.to_rows_3x4()[3], 1.0);
    }
}
