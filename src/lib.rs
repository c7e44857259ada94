pub mod display;

pub use display::{
    DISPLAY_FILE, DisplayDriver, DisplayState, DriverEvent, FbiConfig, FbiDriver, FileStateStore,
    FrameError, HeadlessDriver, ImageStore, PanelView, Reconciler, Renderer, Result, Rotation,
    StateStore, UPLOAD_DIR, has_image_extension,
};
