use anyhow::{Context, Result};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::{ConnectionExt as RandrExt, Crtc};
use x11rb::rust_connection::RustConnection;

use super::GammaBackend;
use crate::error::{RampError, SelectionError};
use crate::ramp::GammaRamp;

/// RandR CRTC gamma tables. Screens are X roots, controllers are the CRTCs of each root.
pub struct X11Backend {
    conn: RustConnection,
    crtcs: Vec<Vec<Crtc>>,
}

impl X11Backend {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("connect X11 display")?;
        let version = conn
            .randr_query_version(1, 3)
            .context("X server lacks RandR")?
            .reply()
            .context("query RandR version")?;
        debug!(
            "connected to x11: default screen={screen_num}, randr={}.{}",
            version.major_version, version.minor_version
        );
        let mut backend = Self {
            conn,
            crtcs: Vec::new(),
        };
        backend.refresh()?;
        Ok(backend)
    }

    fn crtc(&self, screen: usize, controller: usize) -> Result<Crtc> {
        let crtcs = self.crtcs.get(screen).ok_or(SelectionError::Screen {
            index: screen,
            count: self.crtcs.len(),
        })?;
        let crtc = crtcs.get(controller).ok_or(SelectionError::Controller {
            screen,
            index: controller,
            count: crtcs.len(),
        })?;
        Ok(*crtc)
    }
}

impl GammaBackend for X11Backend {
    fn screen_count(&self) -> usize {
        self.crtcs.len()
    }

    fn controller_count(&self, screen: usize) -> Result<usize> {
        self.crtcs
            .get(screen)
            .map(Vec::len)
            .ok_or_else(|| {
                SelectionError::Screen {
                    index: screen,
                    count: self.crtcs.len(),
                }
                .into()
            })
    }

    fn get_ramp(&self, screen: usize, controller: usize) -> Result<GammaRamp> {
        let crtc = self.crtc(screen, controller)?;
        let reply = self
            .conn
            .randr_get_crtc_gamma(crtc)
            .context("request crtc gamma")?
            .reply()
            .with_context(|| format!("read gamma of crtc {controller} on screen {screen}"))?;
        Ok(GammaRamp::from_channels(reply.red, reply.green, reply.blue)?)
    }

    fn ramp_size(&self, screen: usize, controller: usize) -> Result<usize> {
        let crtc = self.crtc(screen, controller)?;
        let reply = self
            .conn
            .randr_get_crtc_gamma_size(crtc)
            .context("request crtc gamma size")?
            .reply()
            .with_context(|| format!("read gamma size of crtc {controller} on screen {screen}"))?;
        Ok(usize::from(reply.size))
    }

    fn set_ramp(&mut self, screen: usize, controller: usize, ramp: &GammaRamp) -> Result<()> {
        let crtc = self.crtc(screen, controller)?;
        let expected = self.ramp_size(screen, controller)?;
        if ramp.len() != expected {
            return Err(RampError::SizeMismatch {
                expected,
                actual: ramp.len(),
            }
            .into());
        }
        self.conn
            .randr_set_crtc_gamma(crtc, &ramp.red, &ramp.green, &ramp.blue)
            .context("request crtc gamma update")?
            .check()
            .with_context(|| format!("set gamma of crtc {controller} on screen {screen}"))?;
        debug!("applied gamma to crtc {controller} on screen {screen} (ramp_size: {expected})");
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        let crtcs = self
            .conn
            .setup()
            .roots
            .iter()
            .map(|root| -> Result<Vec<Crtc>> {
                Ok(self
                    .conn
                    .randr_get_screen_resources_current(root.root)
                    .context("request screen resources")?
                    .reply()
                    .context("read screen resources")?
                    .crtcs)
            })
            .collect::<Result<Vec<_>>>()?;
        self.crtcs = crtcs;
        Ok(())
    }
}
