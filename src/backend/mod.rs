mod wayland;
mod x11;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::ramp::GammaRamp;

pub use wayland::WaylandBackend;
pub use x11::X11Backend;

/// Access to the per-controller gamma tables of a display server.
///
/// Screens and controllers are addressed by index. Dropping the backend releases the
/// display connection.
pub trait GammaBackend {
    fn screen_count(&self) -> usize;

    fn controller_count(&self, screen: usize) -> Result<usize>;

    fn get_ramp(&self, screen: usize, controller: usize) -> Result<GammaRamp>;

    fn ramp_size(&self, screen: usize, controller: usize) -> Result<usize> {
        Ok(self.get_ramp(screen, controller)?.len())
    }

    /// Fails if `ramp` does not have exactly the controller's ramp size.
    fn set_ramp(&mut self, screen: usize, controller: usize, ramp: &GammaRamp) -> Result<()>;

    /// Picks up display changes (hotplug, lost controls) before a cycle.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether applied ramps are reverted once the backend is dropped.
    fn restores_on_exit(&self) -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum BackendKind {
    Auto,
    X11,
    Wayland,
}

pub fn connect(kind: BackendKind) -> Result<Box<dyn GammaBackend>> {
    match kind {
        BackendKind::X11 => Ok(Box::new(X11Backend::connect()?)),
        BackendKind::Wayland => Ok(Box::new(WaylandBackend::connect()?)),
        BackendKind::Auto => {
            if std::env::var_os("WAYLAND_DISPLAY").is_some() {
                match WaylandBackend::connect() {
                    Ok(backend) => {
                        info!("using wayland gamma control");
                        return Ok(Box::new(backend));
                    }
                    Err(err) => warn!("wayland backend unavailable, trying X11: {err:#}"),
                }
            }
            let backend = X11Backend::connect()
                .context("ERROR! Ensure DISPLAY or WAYLAND_DISPLAY is set correctly!")?;
            info!("using X11 RandR");
            Ok(Box::new(backend))
        }
    }
}
