//! Scene rig: perspective camera, fixed lights, model transform

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Perspective camera placed at the world origin, looking down -Z
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 70.0,
            near: 0.01,
            far: 100.0,
        }
    }
}

impl CameraRig {
    pub fn position(&self) -> Vec3 {
        Vec3::ZERO
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position(), Vec3::NEG_Z, Vec3::Y)
    }

    /// Projection for a surface aspect ratio (width / height); depth in [0, 1]
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}

/// Directional light; `position` points from the origin towards the light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    /// Unit vector from a lit surface towards the light
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }
}

/// Ambient + key + fill, independent of the real-world lighting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.6,
            key: DirectionalLight {
                position: Vec3::new(2.0, 2.0, 2.0),
                color: Vec3::ONE,
                intensity: 0.8,
            },
            fill: DirectionalLight {
                position: Vec3::new(-2.0, 0.0, -2.0),
                color: Vec3::ONE,
                intensity: 0.4,
            },
        }
    }
}

/// Per-frame pose of the active model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub translation: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub scale: f32,
}

impl ModelTransform {
    pub fn at(translation: Vec3) -> Self {
        Self {
            translation,
            pitch: 0.0,
            yaw: 0.0,
            scale: 1.0,
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.pitch, self.yaw, 0.0)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation(), self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_sees_anchor() {
        let rig = CameraRig::default();
        let clip = rig.view_projection(9.0 / 16.0) * Vec3::new(0.0, -0.1, -1.2).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_projection_tolerates_degenerate_aspect() {
        let rig = CameraRig::default();
        assert_eq!(rig.projection(0.0), rig.projection(1.0));
        assert_eq!(rig.projection(f32::NAN), rig.projection(1.0));
    }

    #[test]
    fn test_light_rig_defaults() {
        let lights = LightRig::default();
        assert_eq!(lights.ambient_intensity, 0.6);
        assert_eq!(lights.key.intensity, 0.8);
        assert_eq!(lights.fill.intensity, 0.4);
        assert!((lights.key.direction().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_model_matrix_composition() {
        let t = ModelTransform {
            translation: Vec3::new(0.0, -0.1, -1.2),
            pitch: 0.0,
            yaw: std::f32::consts::FRAC_PI_2,
            scale: 2.0,
        };
        // +X rotated a quarter turn about Y lands on -Z, then scaled and moved
        let p = t.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, -0.1, -3.2)).length() < 1e-5);
    }
}
