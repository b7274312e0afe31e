//! Shadow camera construction
//!
//! Pure functions that place a virtual camera for each light face.

use super::backend::PassOutput;
use crate::core::ClearState;
use crate::renderer::culling::Frustum;
use glam::{Mat3, Mat4, Quat, Vec3};

/// Projection of a shadow camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowProjection {
    /// Perspective with vertical fov in radians.
    Perspective { fov: f32, aspect: f32 },
    /// Orthographic with half the view height.
    Orthographic { half_height: f32, aspect: f32 },
}

/// A virtual camera rendering one shadow face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    pub position: Vec3,
    /// Camera-to-world rotation; the camera looks down its local -Z.
    pub rotation: Quat,
    pub near: f32,
    pub far: f32,
    pub projection: ShadowProjection,
}

impl ShadowCamera {
    /// Direction the camera looks along.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// World-to-camera transform.
    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    /// Projection matrix with depth in [0, 1].
    pub fn projection(&self) -> Mat4 {
        match self.projection {
            ShadowProjection::Perspective { fov, aspect } => {
                Mat4::perspective_rh(fov, aspect, self.near, self.far)
            }
            ShadowProjection::Orthographic {
                half_height,
                aspect,
            } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    /// Combined view-projection.
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Frustum of this camera.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }
}

/// Orthonormal frame aligned with a light direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightBasis {
    pub right: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
}

impl LightBasis {
    /// Build a frame whose forward axis is `direction`.
    ///
    /// World Y is the up hint unless the direction is nearly vertical, in
    /// which case world Z is used. The result depends only on the direction.
    pub fn from_direction(direction: Vec3) -> Self {
        let forward = direction.normalize();
        let hint = if forward.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Self::from_forward_up(forward, hint)
    }

    /// Build a frame from a forward axis and an up hint.
    pub fn from_forward_up(forward: Vec3, up_hint: Vec3) -> Self {
        let forward = forward.normalize();
        let right = forward.cross(up_hint).normalize();
        let up = right.cross(forward);
        Self { right, up, forward }
    }

    /// Camera rotation looking along `forward` with `up` as local +Y.
    pub fn rotation(&self) -> Quat {
        Quat::from_mat3(&Mat3::from_cols(self.right, self.up, -self.forward))
    }
}

/// A face of a cube shadow map, in layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in layer order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Face for a layer index, wrapping past 5.
    pub fn from_index(index: u32) -> Self {
        Self::ALL[(index % 6) as usize]
    }

    /// Direction the face camera looks along.
    pub fn direction(&self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// Up vector of the face camera.
    pub fn up(&self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }
}

/// Camera for a spot light: looks down the cone axis with fov = 2 * outer angle.
pub fn spot_camera(
    position: Vec3,
    direction: Vec3,
    outer_angle: f32,
    range: f32,
    near_ratio: f32,
) -> ShadowCamera {
    let basis = LightBasis::from_direction(direction);
    ShadowCamera {
        position,
        rotation: basis.rotation(),
        near: range * near_ratio,
        far: range,
        projection: ShadowProjection::Perspective {
            fov: outer_angle * 2.0,
            aspect: 1.0,
        },
    }
}

/// Camera for one face of an omni light.
///
/// `atlas_inflation` is `filter_texels * texel_size` when the face lives in a
/// shared atlas; the fov then grows to `2 * atan(1 + inflation)` so edge
/// filter taps stay inside the face's own region.
pub fn omni_face_camera(
    position: Vec3,
    range: f32,
    face: CubeFace,
    atlas_inflation: Option<f32>,
    near_ratio: f32,
) -> ShadowCamera {
    let basis = LightBasis::from_forward_up(face.direction(), face.up());
    let fov = match atlas_inflation {
        Some(inflation) => (1.0 + inflation).atan() * 2.0,
        None => std::f32::consts::FRAC_PI_2,
    };

    ShadowCamera {
        position,
        rotation: basis.rotation(),
        near: range * near_ratio,
        far: range,
        projection: ShadowProjection::Perspective { fov, aspect: 1.0 },
    }
}

/// Coarse orthographic camera for one directional cascade.
///
/// Placed `offset` units behind `center` against the light direction, with
/// a depth range wide enough that every caster lies in front of it.
pub fn directional_camera(basis: &LightBasis, center: Vec3, radius: f32, offset: f32) -> ShadowCamera {
    ShadowCamera {
        position: center - basis.forward * offset,
        rotation: basis.rotation(),
        near: 0.01,
        far: offset * 2.0,
        projection: ShadowProjection::Orthographic {
            half_height: radius,
            aspect: 1.0,
        },
    }
}

/// What a face clears to before casters are drawn.
pub fn clear_state(output: PassOutput) -> ClearState {
    match output {
        PassOutput::DepthOnly => ClearState::depth(1.0),
        PassOutput::Depth | PassOutput::Distance | PassOutput::Moments => {
            ClearState::color_and_depth([1.0, 1.0, 1.0, 1.0], 1.0)
        }
    }
}
