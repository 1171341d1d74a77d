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

//! Camera store.

use crate::handle::HandleTable;
use umbra_core::math::{deg_to_rad, Mat4, Vec2};
use umbra_core::{ResourceKind, Rid, ServerError};

/// How a camera projects the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective with a field of view in degrees.
    Perspective {
        /// Field of view, in degrees.
        fov_degrees: f32,
        /// Near clip distance.
        near: f32,
        /// Far clip distance.
        far: f32,
    },
    /// Orthographic with the visible extent along the kept axis.
    Orthogonal {
        /// Extent along the kept axis.
        size: f32,
        /// Near clip distance.
        near: f32,
        /// Far clip distance.
        far: f32,
    },
    /// Off-center perspective; `size` is measured on the near plane.
    Frustum {
        /// Extent on the near plane along the kept axis.
        size: f32,
        /// Shift of the frustum center on the near plane.
        offset: Vec2,
        /// Near clip distance.
        near: f32,
        /// Far clip distance.
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_degrees: 75.0,
            near: 0.05,
            far: 4000.0,
        }
    }
}

/// A camera resource.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Projection.
    pub projection: Projection,
    /// Camera-to-world transform.
    pub transform: Mat4,
    /// Layers this camera sees.
    pub cull_mask: u32,
    /// Environment overriding the scenario's, or [`Rid::INVALID`].
    pub environment: Rid,
    /// Keep the horizontal extent instead of the vertical one.
    pub vertical_aspect: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            transform: Mat4::IDENTITY,
            cull_mask: u32::MAX,
            environment: Rid::INVALID,
            vertical_aspect: false,
        }
    }
}

impl Camera {
    /// World-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        self.transform.affine_inverse().unwrap_or(Mat4::IDENTITY)
    }

    /// Projection matrix for a viewport of the given aspect (width / height).
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        // Half extents on the kept axis, then derived for the other one.
        let half_extents = |size: f32| {
            if self.vertical_aspect {
                (size * 0.5, size * 0.5 / aspect)
            } else {
                (size * 0.5 * aspect, size * 0.5)
            }
        };
        match self.projection {
            Projection::Perspective {
                fov_degrees,
                near,
                far,
            } => {
                let half = (deg_to_rad(fov_degrees) * 0.5).tan();
                let fov_y = if self.vertical_aspect {
                    2.0 * (half / aspect).atan()
                } else {
                    deg_to_rad(fov_degrees)
                };
                Mat4::perspective_rh_zo(fov_y, aspect, near, far)
            }
            Projection::Orthogonal { size, near, far } => {
                let (hw, hh) = half_extents(size);
                Mat4::orthographic_rh_zo(-hw, hw, -hh, hh, near, far)
            }
            Projection::Frustum {
                size,
                offset,
                near,
                far,
            } => {
                let (hw, hh) = half_extents(size);
                Mat4::frustum_rh_zo(
                    offset.x - hw,
                    offset.x + hw,
                    offset.y - hh,
                    offset.y + hh,
                    near,
                    far,
                )
            }
        }
    }
}

/// Storage for every camera.
#[derive(Debug)]
pub struct CameraStore {
    cameras: HandleTable<Camera>,
}

impl Default for CameraStore {
    fn default() -> Self {
        Self {
            cameras: HandleTable::new(ResourceKind::Camera),
        }
    }
}

store_access!(CameraStore, Camera, cameras);

fn check_planes(near: f32, far: f32) -> Result<(), ServerError> {
    if near <= 0.0 || far <= near {
        return Err(ServerError::MalformedData(format!(
            "clip planes must satisfy 0 < near < far, got near={near} far={far}"
        )));
    }
    Ok(())
}

impl CameraStore {
    /// Creates a perspective camera at the origin.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.cameras.insert(rid, Camera::default())
    }

    /// Switches to a perspective projection.
    pub fn set_perspective(
        &mut self,
        rid: Rid,
        fov_degrees: f32,
        near: f32,
        far: f32,
    ) -> Result<(), ServerError> {
        check_planes(near, far)?;
        self.cameras.lookup_mut(rid)?.projection = Projection::Perspective {
            fov_degrees: fov_degrees.clamp(1.0, 179.0),
            near,
            far,
        };
        Ok(())
    }

    /// Switches to an orthographic projection.
    pub fn set_orthogonal(&mut self, rid: Rid, size: f32, near: f32, far: f32) -> Result<(), ServerError> {
        check_planes(near, far)?;
        self.cameras.lookup_mut(rid)?.projection = Projection::Orthogonal { size, near, far };
        Ok(())
    }

    /// Switches to an off-center perspective projection.
    pub fn set_frustum(
        &mut self,
        rid: Rid,
        size: f32,
        offset: Vec2,
        near: f32,
        far: f32,
    ) -> Result<(), ServerError> {
        check_planes(near, far)?;
        self.cameras.lookup_mut(rid)?.projection = Projection::Frustum {
            size,
            offset,
            near,
            far,
        };
        Ok(())
    }

    /// Sets the camera-to-world transform.
    pub fn set_transform(&mut self, rid: Rid, transform: Mat4) -> Result<(), ServerError> {
        self.cameras.lookup_mut(rid)?.transform = transform;
        Ok(())
    }

    /// Sets the visible layers.
    pub fn set_cull_mask(&mut self, rid: Rid, mask: u32) -> Result<(), ServerError> {
        self.cameras.lookup_mut(rid)?.cull_mask = mask;
        Ok(())
    }

    /// Overrides the scenario environment.
    pub fn set_environment(&mut self, rid: Rid, environment: Rid) -> Result<(), ServerError> {
        if environment.is_valid() {
            ServerError::check_kind(environment, ResourceKind::Environment)?;
        }
        self.cameras.lookup_mut(rid)?.environment = environment;
        Ok(())
    }

    /// Keeps the horizontal extent instead of the vertical one.
    pub fn set_use_vertical_aspect(&mut self, rid: Rid, enable: bool) -> Result<(), ServerError> {
        self.cameras.lookup_mut(rid)?.vertical_aspect = enable;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use umbra_core::math::{Vec3, Vec4};

    #[test]
    fn perspective_maps_near_plane_to_zero_depth() {
        let camera = Camera {
            projection: Projection::Perspective {
                fov_degrees: 90.0,
                near: 1.0,
                far: 10.0,
            },
            ..Camera::default()
        };
        let p = camera.projection_matrix(1.0) * Vec4::new(0.0, 1.0, -1.0, 1.0);
        assert_relative_eq!(p.z / p.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.y / p.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn vertical_aspect_keeps_width() {
        let camera = Camera {
            projection: Projection::Orthogonal {
                size: 4.0,
                near: 0.1,
                far: 10.0,
            },
            vertical_aspect: true,
            ..Camera::default()
        };
        let p = camera.projection_matrix(2.0) * Vec4::new(2.0, 1.0, -1.0, 1.0);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn view_matrix_inverts_transform() {
        let camera = Camera {
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            ..Camera::default()
        };
        let origin = camera.view_matrix().transform_point(Vec3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(origin.length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn invalid_planes_are_rejected() {
        let mut store = CameraStore::default();
        let rid = Rid::from_parts(0, 1, ResourceKind::Camera);
        store.create(rid).unwrap();
        assert!(store.set_perspective(rid, 60.0, 0.0, 10.0).is_err());
        assert!(store.set_orthogonal(rid, 5.0, 5.0, 1.0).is_err());
        assert_eq!(store.get(rid).unwrap().projection, Projection::default());
    }
}
