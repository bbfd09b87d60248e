//! # AR Menu Core
//!
//! Platform-free state for the AR food menu viewer:
//! - Built-in menu catalog
//! - Touch gesture mapping (drag to rotate, pinch to scale)
//! - Debounced scroll-to-selection tracking
//! - De-duplicating model cache
//! - Active model controller (one model on stage at a time)
//!
//! ## Architecture
//!
//! ```text
//! scroll ──► ScrollTracker ──► ActiveModelController ──► Stage (renderer)
//!                                   │        ▲
//!                                   ▼        │ per frame
//!                              ModelCache   GestureMapper ◄── touch
//! ```
//!
//! Nothing here touches the browser or the GPU; the presenter crate feeds
//! events in and implements [`Stage`].

pub mod cache;
pub mod camera;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod frame_loop;
pub mod gesture;
pub mod scene;
pub mod selection;
pub mod session;

pub use cache::{Lookup, ModelCache, ModelLoader, SharedLoad};
pub use camera::{CameraFeed, CameraRequest, CameraStatus, FacingMode};
pub use catalog::{Catalog, Category, MenuItem, CATEGORIES};
pub use config::{PixelRatioMode, PowerPreference, ViewerConfig};
pub use controller::{ActiveModelController, IdleMotion, Stage, Ticket};
pub use debounce::Debouncer;
pub use error::{CameraError, ConfigError, LoadError, LoadResult};
pub use frame_loop::{LoopLifecycle, LoopState};
pub use gesture::{GestureConfig, GestureMapper, GestureState, TouchPhase, TouchPoint};
pub use scene::{CameraRig, DirectionalLight, LightRig, ModelTransform};
pub use selection::{ScrollSample, ScrollTracker, SelectionChange};
pub use session::{MenuSession, PendingModel};
