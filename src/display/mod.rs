pub mod common;
pub mod driver;
pub mod error;
pub mod reconcile;
pub mod render;
pub mod state;
pub mod store;

pub use common::Rotation;
pub use driver::{DisplayDriver, DriverEvent, FbiConfig, FbiDriver, HeadlessDriver};
pub use error::{FrameError, Result};
pub use reconcile::{DISPLAY_FILE, PanelView, Reconciler, UPLOAD_DIR};
pub use render::Renderer;
pub use state::{DisplayState, FileStateStore, StateStore};
pub use store::{ImageStore, has_image_extension};
