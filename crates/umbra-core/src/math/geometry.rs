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

//! Bounding volumes and culling primitives.

use serde::{Deserialize, Serialize};

use super::matrix::Mat4;
use super::vector::{Vec2, Vec3, Vec4};

// --- Aabb ---

/// An axis-aligned bounding box.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// The corner with the smallest coordinates.
    pub min: Vec3,
    /// The corner with the largest coordinates.
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Aabb {
    /// An inverted box that acts as the identity for [`Aabb::merge`].
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a box from its corners. The corners are sorted per component.
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates the smallest box enclosing every point.
    ///
    /// ## Returns
    /// `None` if the iterator is empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        Some(aabb)
    }

    /// Returns `true` if `min <= max` on every axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Returns the smallest box enclosing both boxes.
    #[inline]
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns a copy grown by `margin` on every side.
    #[inline]
    pub fn grow(&self, margin: f32) -> Aabb {
        let m = Vec3::splat(margin);
        Aabb {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// The center point.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns `true` if the boxes overlap (touching counts).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns `true` if `p` lies inside or on the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Returns the box enclosing this box after transformation by `m`.
    pub fn transform(&self, m: &Mat4) -> Aabb {
        if !self.is_valid() {
            return *self;
        }
        Aabb::from_points(self.corners().iter().map(|c| m.transform_point(*c)))
            .unwrap_or(Aabb::INVALID)
    }
}

// --- Rect2 ---

/// A 2D axis-aligned rectangle.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect2 {
    /// The top-left corner.
    pub position: Vec2,
    /// Width and height.
    pub size: Vec2,
}

impl Rect2 {
    /// Creates a rectangle from its position and size.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    /// The corner opposite to `position`.
    #[inline]
    pub fn end(&self) -> Vec2 {
        self.position + self.size
    }

    /// Returns `true` if the rectangle has a positive area.
    #[inline]
    pub fn has_area(&self) -> bool {
        self.size.x > 0.0 && self.size.y > 0.0
    }
}

// --- Plane ---

/// A plane `normal · p + d = 0`. Points with a positive distance are in front.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// The unit normal.
    pub normal: Vec3,
    /// Signed offset from the origin.
    pub d: f32,
}

impl Plane {
    /// Creates a normalized plane from raw `(a, b, c, d)` coefficients.
    pub fn from_coefficients(v: Vec4) -> Self {
        let n = v.truncate();
        let len = n.length();
        if len > super::EPSILON {
            Self {
                normal: n * (1.0 / len),
                d: v.w / len,
            }
        } else {
            Self {
                normal: n,
                d: v.w,
            }
        }
    }

    /// Signed distance from the plane to `p`.
    #[inline]
    pub fn distance_to(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

// --- Frustum ---

/// Six inward-facing planes extracted from a view-projection matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a `0..1` depth view-projection matrix.
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        let sub = |a: Vec4, b: Vec4| Vec4::new(a.x - b.x, a.y - b.y, a.z - b.z, a.w - b.w);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(sub(r3, r0)),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(sub(r3, r1)),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(sub(r3, r2)),
            ],
        }
    }

    /// Returns `true` if any part of the box may be inside the frustum.
    ///
    /// Conservative: boxes straddling a corner outside two planes may pass.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if !aabb.is_valid() {
            return false;
        }
        self.planes.iter().all(|plane| {
            let n = plane.normal;
            let positive = Vec3::new(
                if n.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if n.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if n.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to(positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_with_invalid_is_identity() {
        let a = Aabb::from_min_max(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(Aabb::INVALID.merge(&a), a);
        assert!(!Aabb::INVALID.is_valid());
        assert_eq!(a.min.z, 0.0);
    }

    #[test]
    fn transform_translates_box() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let moved = a.transform(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(moved.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn from_points_empty_is_none() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn frustum_culls_boxes_behind_camera() {
        let proj = Mat4::perspective_rh_zo(1.2, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_view_projection(&proj);
        let in_front = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let behind = Aabb::from_min_max(Vec3::new(-1.0, -1.0, 4.0), Vec3::new(1.0, 1.0, 6.0));
        let too_far = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -300.0), Vec3::new(1.0, 1.0, -200.0));
        assert!(frustum.intersects_aabb(&in_front));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(!frustum.intersects_aabb(&too_far));
    }

    #[test]
    fn frustum_culls_boxes_off_to_the_side() {
        let proj = Mat4::perspective_rh_zo(1.0, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_view_projection(&proj);
        let left = Aabb::from_min_max(Vec3::new(-60.0, -1.0, -6.0), Vec3::new(-50.0, 1.0, -4.0));
        assert!(!frustum.intersects_aabb(&left));
    }

    #[test]
    fn rect_end_and_area() {
        let r = Rect2::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(r.end(), Vec2::new(4.0, 6.0));
        assert!(r.has_area());
        assert!(!Rect2::default().has_area());
    }
}
