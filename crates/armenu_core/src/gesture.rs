//! Touch gesture mapping
//!
//! Turns raw touch start/move/end events into rotation and scale state:
//! - one finger drags yaw/pitch
//! - two fingers pinch the uniform scale
//! - lifting fingers ends both

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A single contact point in client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Touch event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// Gesture tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Radians per pixel of drag
    pub rotate_sensitivity: f32,
    /// Scale units per pixel of pinch distance change
    pub pinch_sensitivity: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub initial_scale: f32,
    /// Pitch is clamped to [-limit, limit]
    pub pitch_limit: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.01,
            pinch_sensitivity: 0.005,
            min_scale: 0.5,
            max_scale: 3.0,
            initial_scale: 1.2,
            pitch_limit: FRAC_PI_2,
        }
    }
}

/// Rotation and scale driven by touch input, read every frame
#[derive(Debug, Clone, PartialEq)]
pub struct GestureState {
    /// x = pitch, y = yaw (radians)
    pub rotation: Vec2,
    pub scale: f32,
    pub is_dragging: bool,
    pub last_touch: Vec2,
    /// Zero when no pinch is tracked
    pub last_pinch_distance: f32,
}

impl GestureState {
    pub fn new(initial_scale: f32) -> Self {
        Self {
            rotation: Vec2::ZERO,
            scale: initial_scale,
            is_dragging: false,
            last_touch: Vec2::ZERO,
            last_pinch_distance: 0.0,
        }
    }

    pub fn pitch(&self) -> f32 {
        self.rotation.x
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }
}

/// Maps touch events onto a [`GestureState`]
#[derive(Debug, Clone)]
pub struct GestureMapper {
    config: GestureConfig,
    state: GestureState,
}

impl GestureMapper {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            state: GestureState::new(config.initial_scale),
            config,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GestureState {
        &mut self.state
    }

    /// Dispatch one touch event with the list of contacts still on the surface
    pub fn handle(&mut self, phase: TouchPhase, touches: &[TouchPoint]) {
        if touches.iter().any(|t| !t.is_finite()) {
            log::debug!("Ignoring touch event with non-finite coordinates");
            return;
        }
        match phase {
            TouchPhase::Start => self.touch_start(touches),
            TouchPhase::Move => self.touch_move(touches),
            TouchPhase::End | TouchPhase::Cancel => self.touch_end(),
        }
    }

    fn touch_start(&mut self, touches: &[TouchPoint]) {
        match touches {
            [one] => {
                self.state.is_dragging = true;
                self.state.last_touch = one.position();
            }
            [a, b] => {
                self.state.last_pinch_distance = a.position().distance(b.position());
            }
            _ => {}
        }
    }

    fn touch_move(&mut self, touches: &[TouchPoint]) {
        match touches {
            [one] if self.state.is_dragging => {
                let position = one.position();
                let delta = position - self.state.last_touch;
                self.state.rotation.y += delta.x * self.config.rotate_sensitivity;
                self.state.rotation.x = (self.state.rotation.x
                    + delta.y * self.config.rotate_sensitivity)
                    .clamp(-self.config.pitch_limit, self.config.pitch_limit);
                self.state.last_touch = position;
            }
            [a, b] => {
                let distance = a.position().distance(b.position());
                if self.state.last_pinch_distance > 0.0 {
                    let delta = distance - self.state.last_pinch_distance;
                    self.state.scale = (self.state.scale + delta * self.config.pinch_sensitivity)
                        .clamp(self.config.min_scale, self.config.max_scale);
                }
                self.state.last_pinch_distance = distance;
            }
            _ => {}
        }
    }

    fn touch_end(&mut self) {
        self.state.is_dragging = false;
        self.state.last_pinch_distance = 0.0;
    }
}

impl Default for GestureMapper {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
