//! Viewer configuration
//!
//! Every field has a default matching the shipped experience, so the host
//! page only passes the values it wants to override:
//!
//! ```ignore
//! let config = ViewerConfig::from_json(r#"{ "quiet_period_ms": 150 }"#)?;
//! ```

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::FacingMode;
use crate::controller::IdleMotion;
use crate::error::ConfigError;
use crate::gesture::GestureConfig;
use crate::scene::CameraRig;

/// Pixel ratio handling for the render surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelRatioMode {
    /// Use native device pixel ratio (sharpest, most expensive)
    Native,
    /// Use 1.0 pixel ratio (fastest, may look blurry on high-DPI)
    One,
    /// Custom fixed ratio
    Fixed(f64),
    /// Clamp to maximum ratio
    Clamped(f64),
    /// 1.0 on Safari, native elsewhere
    Auto,
}

impl PixelRatioMode {
    /// Get effective pixel ratio for a device ratio and user agent
    pub fn effective_ratio(&self, device_ratio: f64, user_agent: &str) -> f64 {
        match self {
            PixelRatioMode::Native => device_ratio,
            PixelRatioMode::One => 1.0,
            PixelRatioMode::Fixed(r) => *r,
            PixelRatioMode::Clamped(max) => device_ratio.min(*max),
            PixelRatioMode::Auto => {
                if is_safari(user_agent) {
                    1.0
                } else {
                    device_ratio
                }
            }
        }
    }
}

/// Safari reports "Safari" in its UA; Chrome and Android browsers do too, so
/// those are excluded.
pub fn is_safari(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    ua.contains("safari") && !ua.contains("chrome") && !ua.contains("android")
}

/// Power preference for GPU adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    /// Prefer low power (integrated GPU)
    LowPower,
    /// Prefer high performance (discrete GPU)
    HighPerformance,
}

/// Complete viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Prefix prepended to every catalog asset path
    pub model_root: String,
    /// Location of the mesh decompression bundle
    pub decoder_path: String,
    /// Scroll quiet period before the selection settles
    pub quiet_period_ms: u64,
    /// Camera facing-mode hint
    pub facing_mode: FacingMode,
    /// Render surface pixel ratio policy
    pub pixel_ratio: PixelRatioMode,
    /// GPU adapter preference
    pub power_preference: PowerPreference,
    /// Console log level ("error", "warn", "info", "debug", "trace")
    pub log_level: String,
    /// Perspective camera parameters
    pub camera: CameraRig,
    /// Camera-relative position of the active model
    pub anchor: [f32; 3],
    /// Idle animation
    pub motion: IdleMotion,
    /// Touch gesture mapping
    pub gesture: GestureConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_root: String::new(),
            decoder_path: "/draco/".into(),
            quiet_period_ms: 200,
            facing_mode: FacingMode::Environment,
            pixel_ratio: PixelRatioMode::Auto,
            power_preference: PowerPreference::HighPerformance,
            log_level: "info".into(),
            camera: CameraRig::default(),
            anchor: [0.0, -0.1, -1.2],
            motion: IdleMotion::default(),
            gesture: GestureConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Parse and validate a JSON override document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_period_ms == 0 {
            return Err(invalid("quiet_period_ms", "must be greater than zero"));
        }

        let g = &self.gesture;
        if !(g.min_scale > 0.0 && g.min_scale < g.max_scale) {
            return Err(invalid(
                "gesture.min_scale",
                format!("need 0 < min_scale < max_scale, got {} / {}", g.min_scale, g.max_scale),
            ));
        }
        if !(g.min_scale..=g.max_scale).contains(&g.initial_scale) {
            return Err(invalid(
                "gesture.initial_scale",
                format!("{} outside [{}, {}]", g.initial_scale, g.min_scale, g.max_scale),
            ));
        }
        if !(g.pitch_limit > 0.0) {
            return Err(invalid("gesture.pitch_limit", "must be positive"));
        }

        let c = &self.camera;
        if !(c.fov_y_degrees > 0.0 && c.fov_y_degrees < 180.0) {
            return Err(invalid("camera.fov_y_degrees", "must be in (0, 180)"));
        }
        if !(c.near > 0.0 && c.near < c.far) {
            return Err(invalid("camera.near", "need 0 < near < far"));
        }

        if let PixelRatioMode::Fixed(r) | PixelRatioMode::Clamped(r) = self.pixel_ratio {
            if !(r > 0.0) {
                return Err(invalid("pixel_ratio", "ratio must be positive"));
            }
        }

        if self.log_level.parse::<log::Level>().is_err() {
            return Err(invalid("log_level", format!("unknown level {:?}", self.log_level)));
        }

        Ok(())
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn anchor(&self) -> Vec3 {
        Vec3::from(self.anchor)
    }

    /// Log level, falling back to `Info` for unparseable values
    pub fn log_level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }

    /// Resolve a catalog asset path against `model_root`
    pub fn asset_url(&self, path: &str) -> String {
        if self.model_root.is_empty() {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.model_root.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
