use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::error::{FrameError, Result};

const LAUNCH_POLL: Duration = Duration::from_millis(50);

/// Seam between the reconciler and whatever owns the physical screen.
pub trait DisplayDriver: Send {
    /// Ends any running presentation. Nothing running is not an error.
    fn stop(&mut self) -> Result<()>;
    fn switch_console(&mut self) -> Result<()>;
    /// Starts presenting `output` without waiting for the viewer to exit.
    fn present(&mut self, output: &Path) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct FbiConfig {
    pub viewer: String,
    pub tty: u8,
    pub device: PathBuf,
    pub use_sudo: bool,
    /// How long a freshly launched viewer is watched for an early failure.
    pub launch_grace: Duration,
}

impl Default for FbiConfig {
    fn default() -> Self {
        Self {
            viewer: "fbi".into(),
            tty: 1,
            device: PathBuf::from("/dev/fb0"),
            use_sudo: true,
            launch_grace: Duration::from_secs(2),
        }
    }
}

/// Drives the Linux framebuffer through `pkill`, `chvt` and `fbi`.
pub struct FbiDriver {
    config: FbiConfig,
}

impl FbiDriver {
    pub fn new(config: FbiConfig) -> Self {
        Self { config }
    }

    fn privileged(&self, program: &str) -> Command {
        let mut cmd = if self.config.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(program);
            c
        } else {
            Command::new(program)
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// `None` when `pgrep` cannot answer.
    fn viewer_running(&self) -> Option<bool> {
        let status = Command::new("pgrep")
            .arg("-x")
            .arg(&self.config.viewer)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .ok()?;
        match status.code() {
            Some(0) => Some(true),
            Some(1) => Some(false),
            _ => None,
        }
    }
}

/// Maps a `pkill` exit code to the stop outcome. Under `sudo -n` an exit of 1
/// can also mean sudo refused, so it only counts as "nothing running" when
/// pkill ran unwrapped.
fn pkill_outcome(viewer: &str, code: Option<i32>, use_sudo: bool) -> Result<()> {
    match code {
        Some(0) => {
            info!(viewer, "Stopped running viewer");
            Ok(())
        }
        Some(1) if !use_sudo => {
            debug!(viewer, "No viewer running");
            Ok(())
        }
        other => Err(FrameError::PresentationDenied(format!(
            "could not stop running {viewer} (exit code {})",
            other.map_or_else(|| "none".to_string(), |c| c.to_string())
        ))),
    }
}

/// Watches `child` for up to `grace`. A viewer that exits non-zero inside the
/// window is a denied presentation; one still running is left alone.
fn await_launch(viewer: &str, child: &mut Child, grace: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait()? {
            Some(status) if status.success() => return Ok(Some(status)),
            Some(status) => {
                return Err(FrameError::PresentationDenied(format!(
                    "{viewer} exited with {status}"
                )));
            }
            None if Instant::now() >= deadline => return Ok(None),
            None => thread::sleep(LAUNCH_POLL),
        }
    }
}

impl DisplayDriver for FbiDriver {
    fn stop(&mut self) -> Result<()> {
        let viewer = &self.config.viewer;
        if self.viewer_running() == Some(false) {
            debug!(viewer = %viewer, "No viewer running");
            return Ok(());
        }
        let status = self
            .privileged("pkill")
            .arg(viewer)
            .status()
            .map_err(|e| FrameError::PresentationDenied(format!("failed to run pkill: {e}")))?;
        pkill_outcome(viewer, status.code(), self.config.use_sudo)
    }

    fn switch_console(&mut self) -> Result<()> {
        let tty = self.config.tty.to_string();
        match self.privileged("chvt").arg(&tty).status() {
            Ok(s) if s.success() => debug!(tty = %tty, "Switched console"),
            Ok(s) => warn!(tty = %tty, status = %s, "chvt reported failure"),
            Err(e) => warn!(tty = %tty, error = %e, "Could not run chvt"),
        }
        Ok(())
    }

    fn present(&mut self, output: &Path) -> Result<()> {
        if !self.config.device.exists() {
            return Err(FrameError::PresentationDenied(format!(
                "framebuffer {} not available",
                self.config.device.display()
            )));
        }
        let viewer = self.config.viewer.clone();
        let mut child = self
            .privileged(&viewer)
            .arg("-T")
            .arg(self.config.tty.to_string())
            .arg("-d")
            .arg(&self.config.device)
            .arg("-noverbose")
            .arg("-a")
            .arg(output)
            .spawn()
            .map_err(|e| FrameError::PresentationDenied(format!("failed to launch {viewer}: {e}")))?;
        info!(viewer = %viewer, output = %output.display(), pid = child.id(), "Launched viewer");

        // fbi backgrounds itself once it owns the console, so a clean exit is
        // the normal case.
        if let Some(status) = await_launch(&viewer, &mut child, self.config.launch_grace)? {
            debug!(viewer = %viewer, status = %status, "Viewer detached");
            return Ok(());
        }

        // Still in the foreground: reap it later so it does not linger as a zombie.
        thread::spawn(move || match child.wait() {
            Ok(status) if status.success() => debug!(viewer = %viewer, "Viewer exited"),
            Ok(status) => warn!(viewer = %viewer, status = %status, "Viewer exited with failure"),
            Err(e) => warn!(viewer = %viewer, error = %e, "Failed waiting on viewer"),
        });
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverEvent {
    Stop,
    SwitchConsole,
    Present(PathBuf),
}

/// Driver for hosts without a framebuffer. Records what it was asked to do;
/// clones share the same event log.
#[derive(Clone, Debug, Default)]
pub struct HeadlessDriver {
    events: Arc<Mutex<Vec<DriverEvent>>>,
    deny: bool,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every `present` as if the display could not be opened.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, event: DriverEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

impl DisplayDriver for HeadlessDriver {
    fn stop(&mut self) -> Result<()> {
        self.record(DriverEvent::Stop);
        Ok(())
    }

    fn switch_console(&mut self) -> Result<()> {
        self.record(DriverEvent::SwitchConsole);
        Ok(())
    }

    fn present(&mut self, output: &Path) -> Result<()> {
        if self.deny {
            return Err(FrameError::PresentationDenied("headless display refused".into()));
        }
        info!(output = %output.display(), "Presenting (headless)");
        self.record(DriverEvent::Present(output.to_path_buf()));
        Ok(())
    }
}
