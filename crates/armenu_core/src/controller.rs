//! Active model controller
//!
//! Owns the "which model is on stage" decision. A selection change detaches
//! the current model right away; the replacement is attached when its load
//! completes, unless a newer selection has superseded it in the meantime.

use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::gesture::GestureState;
use crate::scene::ModelTransform;

/// Idle animation applied every frame to the attached model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleMotion {
    /// Yaw advance per frame while the user is not dragging (radians)
    pub yaw_step: f32,
    /// Hover phase advance per frame (radians)
    pub hover_step: f32,
    /// Vertical hover amplitude (world units)
    pub hover_amplitude: f32,
}

impl Default for IdleMotion {
    fn default() -> Self {
        Self {
            yaw_step: 0.01,
            hover_step: 0.02,
            hover_amplitude: 0.05,
        }
    }
}

/// Something that can display one model at a time
pub trait Stage<M> {
    /// Make the model visible, acquiring whatever it needs to draw
    fn attach(&mut self, model: &Rc<M>);

    /// Remove the model and release the resources `attach` acquired
    fn detach(&mut self, model: &Rc<M>);
}

/// Identifies the selection an asynchronous load was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    index: usize,
}

impl Ticket {
    /// Menu index the load belongs to
    pub fn index(&self) -> usize {
        self.index
    }
}

struct ActiveModel<M> {
    index: usize,
    model: Rc<M>,
    position: Vec3,
    hover_phase: f32,
}

pub struct ActiveModelController<M> {
    anchor: Vec3,
    motion: IdleMotion,
    generation: u64,
    selected: Option<usize>,
    active: Option<ActiveModel<M>>,
}

impl<M> ActiveModelController<M> {
    pub fn new(anchor: Vec3, motion: IdleMotion) -> Self {
        Self {
            anchor,
            motion,
            generation: 0,
            selected: None,
            active: None,
        }
    }

    pub fn anchor(&self) -> Vec3 {
        self.anchor
    }

    /// Index of the most recent selection
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Index of the attached model, if one is attached
    pub fn active_index(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.index)
    }

    pub fn active_model(&self) -> Option<&Rc<M>> {
        self.active.as_ref().map(|a| &a.model)
    }

    pub fn hover_phase(&self) -> Option<f32> {
        self.active.as_ref().map(|a| a.hover_phase)
    }

    pub fn position(&self) -> Option<Vec3> {
        self.active.as_ref().map(|a| a.position)
    }

    /// Whether a load started with `ticket` would still be attached
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }

    /// Begin a transition to `index`.
    ///
    /// The attached model (if any) leaves the stage before this returns.
    pub fn select(&mut self, index: usize, stage: &mut impl Stage<M>) -> Ticket {
        self.clear(stage);
        self.generation += 1;
        self.selected = Some(index);
        Ticket {
            generation: self.generation,
            index,
        }
    }

    /// Attach a loaded model; returns false when the ticket is stale
    pub fn attach(&mut self, ticket: Ticket, model: Rc<M>, stage: &mut impl Stage<M>) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "Dropping late model for item {} (superseded selection)",
                ticket.index
            );
            return false;
        }

        self.clear(stage);
        stage.attach(&model);
        self.active = Some(ActiveModel {
            index: ticket.index,
            model,
            position: self.anchor,
            hover_phase: 0.0,
        });
        log::info!("Model for item {} attached", ticket.index);
        true
    }

    /// Record a failed load; the stage stays empty
    pub fn load_failed(&mut self, ticket: Ticket, error: &LoadError) {
        if self.is_current(ticket) {
            log::error!("Model for item {} unavailable: {}", ticket.index, error);
        } else {
            log::debug!("Superseded load for item {} failed: {}", ticket.index, error);
        }
    }

    /// Detach whatever is on stage
    pub fn clear(&mut self, stage: &mut impl Stage<M>) {
        if let Some(active) = self.active.take() {
            stage.detach(&active.model);
            log::debug!("Model for item {} detached", active.index);
        }
    }

    /// Advance one frame and produce the model pose.
    ///
    /// Yaw auto-advances on the gesture state itself so that a later drag
    /// continues from the displayed orientation.
    pub fn tick(&mut self, gesture: &mut GestureState) -> Option<ModelTransform> {
        let active = self.active.as_mut()?;

        let transform_yaw = gesture.yaw();
        if !gesture.is_dragging {
            gesture.rotation.y += self.motion.yaw_step;
        }

        active.hover_phase += self.motion.hover_step;
        active.position.y = self.anchor.y + active.hover_phase.sin() * self.motion.hover_amplitude;

        Some(ModelTransform {
            translation: active.position,
            pitch: gesture.pitch(),
            yaw: transform_yaw,
            scale: gesture.scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl Stage<&'static str> for Log {
        fn attach(&mut self, model: &Rc<&'static str>) {
            self.0.push(format!("+{}", model));
        }

        fn detach(&mut self, model: &Rc<&'static str>) {
            self.0.push(format!("-{}", model));
        }
    }

    fn controller() -> ActiveModelController<&'static str> {
        ActiveModelController::new(Vec3::new(0.0, -0.1, -1.2), IdleMotion::default())
    }

    #[test]
    fn test_select_detaches_before_next_attach() {
        let mut stage = Log::default();
        let mut c = controller();

        let t = c.select(0, &mut stage);
        assert!(c.attach(t, Rc::new("pizza"), &mut stage));
        let t = c.select(3, &mut stage);
        assert_eq!(c.active_index(), None);
        assert!(c.attach(t, Rc::new("fish"), &mut stage));

        assert_eq!(stage.0, vec!["+pizza", "-pizza", "+fish"]);
    }

    #[test]
    fn test_stale_ticket_ignored() {
        let mut stage = Log::default();
        let mut c = controller();

        let old = c.select(1, &mut stage);
        let new = c.select(2, &mut stage);
        assert!(!c.attach(old, Rc::new("platter"), &mut stage));
        assert!(stage.0.is_empty());
        assert!(c.attach(new, Rc::new("murg"), &mut stage));
        assert_eq!(c.active_index(), Some(2));
    }

    #[test]
    fn test_attach_resets_pose() {
        let mut stage = Log::default();
        let mut c = controller();
        let mut gesture = GestureState::new(1.2);

        let t = c.select(0, &mut stage);
        c.attach(t, Rc::new("pizza"), &mut stage);
        for _ in 0..30 {
            c.tick(&mut gesture);
        }
        assert!(c.hover_phase().unwrap() > 0.5);

        let t = c.select(1, &mut stage);
        c.attach(t, Rc::new("platter"), &mut stage);
        assert_eq!(c.hover_phase(), Some(0.0));
        assert_eq!(c.position(), Some(c.anchor()));
    }

    #[test]
    fn test_tick_without_model_is_noop() {
        let mut c = controller();
        let mut gesture = GestureState::new(1.2);
        assert!(c.tick(&mut gesture).is_none());
        assert_eq!(gesture.yaw(), 0.0);
    }

    #[test]
    fn test_tick_idle_motion() {
        let mut stage = Log::default();
        let mut c = controller();
        let mut gesture = GestureState::new(1.5);
        let t = c.select(0, &mut stage);
        c.attach(t, Rc::new("pizza"), &mut stage);

        let first = c.tick(&mut gesture).unwrap();
        assert_eq!(first.yaw, 0.0);
        assert_eq!(first.scale, 1.5);
        assert!((first.translation.y - (-0.1 + 0.02f32.sin() * 0.05)).abs() < 1e-6);

        let second = c.tick(&mut gesture).unwrap();
        assert!((second.yaw - 0.01).abs() < 1e-6);

        // No auto-spin while the user holds the model
        gesture.is_dragging = true;
        let before = gesture.yaw();
        c.tick(&mut gesture);
        assert_eq!(gesture.yaw(), before);
    }
}
