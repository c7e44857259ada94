use std::path::Path;

use tracing::{info, warn};

use super::common::Rotation;
use super::driver::DisplayDriver;
use super::error::{FrameError, Result};
use super::render::Renderer;
use super::state::{DisplayState, FileStateStore, StateStore};
use super::store::ImageStore;

pub const UPLOAD_DIR: &str = "uploads";
pub const DISPLAY_FILE: &str = "display.png";

/// Snapshot used to draw the control panel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PanelView {
    pub images: Vec<String>,
    pub current: Option<String>,
    pub rotation: Rotation,
}

/// Keeps the screen in line with the persisted selection.
///
/// `show` is the only operation that changes what is on screen. Uploads only
/// move the selection, and purge tears the presentation down.
pub struct Reconciler {
    store: ImageStore,
    state: Box<dyn StateStore>,
    renderer: Renderer,
    driver: Box<dyn DisplayDriver>,
}

impl Reconciler {
    pub fn new(
        store: ImageStore,
        state: Box<dyn StateStore>,
        renderer: Renderer,
        driver: Box<dyn DisplayDriver>,
    ) -> Self {
        Self {
            store,
            state,
            renderer,
            driver,
        }
    }

    /// Standard layout under `data_dir`: `uploads/`, `display.png`, `last.txt`
    /// and `rotation.txt`.
    pub fn open<P: AsRef<Path>>(data_dir: P, driver: Box<dyn DisplayDriver>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let store = ImageStore::open(data_dir.join(UPLOAD_DIR))?;
        let state = FileStateStore::new(data_dir);
        let renderer = Renderer::new(data_dir.join(DISPLAY_FILE));
        Ok(Self::new(store, Box::new(state), renderer, driver))
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn state(&self) -> DisplayState {
        self.state.load()
    }

    pub fn view(&self) -> PanelView {
        let images = self.store.list().unwrap_or_else(|e| {
            warn!(error = %e, "Failed listing images");
            Vec::new()
        });
        let DisplayState { selected, rotation } = self.state.load();
        let current = selected.or_else(|| images.first().cloned());
        PanelView {
            images,
            current,
            rotation,
        }
    }

    pub fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.store.save(name, bytes)?;
        self.state.set_selected_filename(name)?;
        info!(name, "Selection updated by upload");
        Ok(())
    }

    pub fn show(&mut self, name: &str, rotation: Rotation) -> Result<()> {
        if !self.store.contains(name) {
            return Err(FrameError::ImageNotFound(name.to_string()));
        }
        self.state.save_selection(name, rotation)?;
        self.present(name, rotation)
    }

    /// Stops the viewer, deletes all images and forgets the selection.
    pub fn purge(&mut self) -> Result<usize> {
        if let Err(e) = self.driver.stop() {
            warn!(error = %e, "Failed stopping viewer before purge");
        }
        let removed = self.store.purge()?;
        self.state.clear()?;
        info!(removed, "Purged images");
        Ok(removed)
    }

    /// The image startup would show: the persisted selection if it still
    /// exists, otherwise the first stored image.
    pub fn startup_candidate(&self) -> Option<(String, Rotation)> {
        let DisplayState { selected, rotation } = self.state.load();
        if let Some(name) = selected.filter(|n| self.store.contains(n)) {
            return Some((name, rotation));
        }
        match self.store.first() {
            Ok(first) => first.map(|name| (name, rotation)),
            Err(e) => {
                warn!(error = %e, "Failed listing images");
                None
            }
        }
    }

    /// Restores the last view. Nothing is persisted and failures are only
    /// logged.
    pub fn startup(&mut self) -> Option<String> {
        let Some((name, rotation)) = self.startup_candidate() else {
            info!("Nothing to show at startup");
            return None;
        };
        match self.present(&name, rotation) {
            Ok(()) => Some(name),
            Err(e) => {
                warn!(name = %name, error = %e, "Startup display failed");
                None
            }
        }
    }

    fn present(&mut self, name: &str, rotation: Rotation) -> Result<()> {
        let output = self.renderer.render(&self.store.path_of(name), rotation)?;
        self.driver.stop()?;
        self.driver.switch_console()?;
        self.driver.present(&output)?;
        info!(name, rotation = rotation.degrees(), "Displaying image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;

    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::display::driver::{DriverEvent, HeadlessDriver};

    struct Fixture {
        dir: TempDir,
        driver: HeadlessDriver,
        panel: Reconciler,
    }

    fn fixture() -> Fixture {
        fixture_with(HeadlessDriver::new())
    }

    fn fixture_with(driver: HeadlessDriver) -> Fixture {
        let dir = TempDir::new().expect("tempdir");
        let panel = Reconciler::open(dir.path(), Box::new(driver.clone())).expect("open");
        Fixture { dir, driver, panel }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 42]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    fn output(f: &Fixture) -> std::path::PathBuf {
        f.dir.path().join(DISPLAY_FILE)
    }

    #[test]
    fn uploads_move_selection_without_presenting() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(4, 4)).unwrap();
        f.panel.upload("b.png", &png(4, 4)).unwrap();

        assert_eq!(f.panel.store().list().unwrap(), vec!["a.png", "b.png"]);
        assert_eq!(f.panel.state(), DisplayState::new("b.png", Rotation::Deg0));
        assert!(f.driver.events().is_empty());
        assert!(!output(&f).exists());
    }

    #[test]
    fn upload_keeps_previous_rotation() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(4, 4)).unwrap();
        f.panel.show("a.png", Rotation::Deg180).unwrap();
        f.panel.upload("b.png", &png(4, 4)).unwrap();

        assert_eq!(f.panel.state(), DisplayState::new("b.png", Rotation::Deg180));
    }

    #[test]
    fn show_renders_rotated_and_presents_once() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(100, 50)).unwrap();

        f.panel.show("a.png", Rotation::Deg90).unwrap();

        assert_eq!(f.panel.state(), DisplayState::new("a.png", Rotation::Deg90));
        let dims = image::open(output(&f)).unwrap().dimensions();
        assert_eq!(dims, (50, 100));
        assert_eq!(
            f.driver.events(),
            vec![
                DriverEvent::Stop,
                DriverEvent::SwitchConsole,
                DriverEvent::Present(output(&f)),
            ]
        );
    }

    #[test]
    fn repeated_show_is_idempotent() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(30, 20)).unwrap();

        f.panel.show("a.png", Rotation::Deg270).unwrap();
        let first_state = f.panel.state();
        let first_bytes = fs::read(output(&f)).unwrap();

        f.panel.show("a.png", Rotation::Deg270).unwrap();
        assert_eq!(f.panel.state(), first_state);
        assert_eq!(fs::read(output(&f)).unwrap(), first_bytes);
    }

    #[test]
    fn show_unknown_image_leaves_state_alone() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(4, 4)).unwrap();
        f.panel.show("a.png", Rotation::Deg90).unwrap();
        let before = f.panel.state();
        let events_before = f.driver.events().len();

        let err = f.panel.show("missing.png", Rotation::Deg180).unwrap_err();
        assert!(matches!(err, FrameError::ImageNotFound(ref n) if n == "missing.png"));
        assert_eq!(f.panel.state(), before);
        assert_eq!(f.driver.events().len(), events_before);
    }

    #[test]
    fn undecodable_image_is_not_presented() {
        let mut f = fixture();
        f.panel.upload("broken.png", b"not really a png").unwrap();

        let err = f.panel.show("broken.png", Rotation::Deg0).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedFormat(_)));
        assert!(f.driver.events().is_empty());
    }

    #[test]
    fn denied_presentation_is_surfaced() {
        let mut f = fixture_with(HeadlessDriver::denying());
        f.panel.upload("a.png", &png(4, 4)).unwrap();

        let err = f.panel.show("a.png", Rotation::Deg0).unwrap_err();
        assert!(matches!(err, FrameError::PresentationDenied(_)));
        // The panel keeps working after the failure.
        assert_eq!(f.panel.view().images, vec!["a.png"]);
    }

    #[test]
    fn purge_clears_everything() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(4, 4)).unwrap();
        f.panel.upload("b.png", &png(4, 4)).unwrap();
        f.panel.show("a.png", Rotation::Deg90).unwrap();

        assert_eq!(f.panel.purge().unwrap(), 2);
        assert!(f.panel.store().list().unwrap().is_empty());
        assert_eq!(f.panel.state(), DisplayState::default());
        assert_eq!(f.driver.events().last(), Some(&DriverEvent::Stop));

        assert_eq!(f.panel.startup_candidate(), None);
        assert_eq!(f.panel.startup(), None);
        assert_eq!(f.panel.view(), PanelView::default());
    }

    #[test]
    fn startup_restores_persisted_selection() {
        let mut f = fixture();
        f.panel.upload("a.png", &png(10, 20)).unwrap();
        f.panel.upload("b.png", &png(10, 20)).unwrap();
        f.panel.show("b.png", Rotation::Deg180).unwrap();

        let driver = HeadlessDriver::new();
        let mut restarted = Reconciler::open(f.dir.path(), Box::new(driver.clone())).unwrap();
        assert_eq!(restarted.startup().as_deref(), Some("b.png"));
        assert_eq!(driver.events().len(), 3);
        let dims = image::open(output(&f)).unwrap().dimensions();
        assert_eq!(dims, (10, 20));
    }

    #[test]
    fn startup_falls_back_without_persisting() {
        let mut f = fixture();
        f.panel.upload("gone.png", &png(4, 4)).unwrap();
        f.panel.show("gone.png", Rotation::Deg90).unwrap();
        fs::remove_file(f.panel.store().path_of("gone.png")).unwrap();
        fs::write(f.panel.store().path_of("c.png"), png(6, 2)).unwrap();

        let driver = HeadlessDriver::new();
        let mut restarted = Reconciler::open(f.dir.path(), Box::new(driver.clone())).unwrap();
        assert_eq!(restarted.startup().as_deref(), Some("c.png"));
        assert_eq!(
            driver.events().last(),
            Some(&DriverEvent::Present(output(&f)))
        );
        // Persisted rotation is reused for the fallback image.
        let dims = image::open(output(&f)).unwrap().dimensions();
        assert_eq!(dims, (2, 6));
        assert_eq!(restarted.state(), DisplayState::new("gone.png", Rotation::Deg90));
    }

    #[test]
    fn startup_with_empty_store_does_nothing() {
        let mut f = fixture();
        assert_eq!(f.panel.startup(), None);
        assert!(f.driver.events().is_empty());
    }

    #[test]
    fn startup_swallows_presentation_failure() {
        let mut f = fixture_with(HeadlessDriver::denying());
        f.panel.upload("a.png", &png(4, 4)).unwrap();
        assert_eq!(f.panel.startup(), None);
    }

    #[test]
    fn view_falls_back_to_first_image() {
        let mut f = fixture();
        fs::write(f.panel.store().path_of("z.png"), png(2, 2)).unwrap();
        fs::write(f.panel.store().path_of("m.png"), png(2, 2)).unwrap();
        assert_eq!(
            f.panel.view(),
            PanelView {
                images: vec!["m.png".into(), "z.png".into()],
                current: Some("m.png".into()),
                rotation: Rotation::Deg0,
            }
        );

        f.panel.upload("z.png", &png(2, 2)).unwrap();
        assert_eq!(f.panel.view().current.as_deref(), Some("z.png"));
    }

    /// File-backed state whose rotation writes always fail.
    struct RotationWriteFails(FileStateStore);

    impl StateStore for RotationWriteFails {
        fn load(&self) -> DisplayState {
            self.0.load()
        }
        fn set_selected_filename(&self, name: &str) -> Result<()> {
            self.0.set_selected_filename(name)
        }
        fn clear_selected_filename(&self) -> Result<()> {
            self.0.clear_selected_filename()
        }
        fn set_rotation(&self, _rotation: Rotation) -> Result<()> {
            Err(FrameError::Persistence {
                path: "rotation.txt".into(),
                source: std::io::Error::other("disk full"),
            })
        }
        fn clear(&self) -> Result<()> {
            self.0.clear()
        }
    }

    fn panel_with_failing_rotation(dir: &TempDir, driver: &HeadlessDriver) -> Reconciler {
        Reconciler::new(
            ImageStore::open(dir.path().join(UPLOAD_DIR)).unwrap(),
            Box::new(RotationWriteFails(FileStateStore::new(dir.path()))),
            Renderer::new(dir.path().join(DISPLAY_FILE)),
            Box::new(driver.clone()),
        )
    }

    #[test]
    fn failed_rotation_write_keeps_previous_pair() {
        let dir = TempDir::new().unwrap();
        let previous = FileStateStore::new(dir.path());
        previous.set_selected_filename("a.png").unwrap();
        previous.set_rotation(Rotation::Deg90).unwrap();

        let driver = HeadlessDriver::new();
        let mut panel = panel_with_failing_rotation(&dir, &driver);
        fs::write(panel.store().path_of("b.png"), png(4, 4)).unwrap();

        let err = panel.show("b.png", Rotation::Deg180).unwrap_err();
        assert!(matches!(err, FrameError::Persistence { .. }));
        assert_eq!(panel.state(), DisplayState::new("a.png", Rotation::Deg90));
        assert!(driver.events().is_empty());
    }

    #[test]
    fn failed_rotation_write_without_prior_selection_leaves_none() {
        let dir = TempDir::new().unwrap();
        let driver = HeadlessDriver::new();
        let mut panel = panel_with_failing_rotation(&dir, &driver);
        fs::write(panel.store().path_of("b.png"), png(4, 4)).unwrap();

        assert!(panel.show("b.png", Rotation::Deg270).is_err());
        assert_eq!(panel.state(), DisplayState::default());
        assert!(!dir.path().join("last.txt").exists());
    }
}
