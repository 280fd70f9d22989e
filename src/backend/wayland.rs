use anyhow::{Context, Result, anyhow};
use memmap2::MmapMut;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use tracing::{debug, error, warn};
use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, delegate_noop,
    protocol::{wl_output, wl_registry},
};
use wayland_protocols_wlr::gamma_control::v1::client::{
    zwlr_gamma_control_manager_v1, zwlr_gamma_control_v1,
};

use super::GammaBackend;
use crate::error::{RampError, SelectionError};
use crate::ramp::GammaRamp;

#[derive(Clone, Copy)]
pub struct OutputData {
    pub id: u32,
}

#[derive(Clone, Copy)]
pub struct GammaData {
    pub id: u32,
}

pub struct OutputState {
    pub name: Option<String>,
    pub wl_output: wl_output::WlOutput,
    pub gamma: Option<zwlr_gamma_control_v1::ZwlrGammaControlV1>,
    pub ramp_size: u32,
    pub table: Option<(File, MmapMut)>,
    /// Last ramp we sent. The protocol has no way to read the compositor's table.
    pub applied: Option<GammaRamp>,
}

impl OutputState {
    fn is_usable(&self) -> bool {
        self.gamma.is_some() && self.ramp_size > 0 && self.table.is_some()
    }
}

pub struct AppState {
    pub outputs: HashMap<u32, OutputState>,
    pub gamma_mgr: Option<zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1>,
    pub gamma_mgr_name: Option<u32>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            gamma_mgr: None,
            gamma_mgr_name: None,
        }
    }

    /// Returns true when a new gamma control was requested.
    pub fn ensure_gamma_for(&mut self, qh: &QueueHandle<Self>, id: u32) -> bool {
        let Some(mgr) = self.gamma_mgr.clone() else {
            return false;
        };
        let Some(output) = self.outputs.get_mut(&id) else {
            return false;
        };
        if output.gamma.is_some() {
            return false;
        }
        output.gamma = Some(mgr.get_gamma_control(&output.wl_output, qh, GammaData { id }));
        true
    }

    pub fn ensure_gamma_all(&mut self, qh: &QueueHandle<Self>) -> bool {
        let ids: Vec<u32> = self.outputs.keys().copied().collect();
        let mut requested = false;
        for id in ids {
            requested |= self.ensure_gamma_for(qh, id);
        }
        requested
    }

    pub fn remove_output(&mut self, id: u32) {
        if let Some(output) = self.outputs.remove(&id) {
            if let Some(gamma) = output.gamma {
                gamma.destroy();
            }
        }
    }

    /// Usable outputs in ascending registry order; this order defines controller indices.
    fn controllers(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .outputs
            .iter()
            .filter(|(_, o)| o.is_usable())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for AppState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                if interface == wl_output::WlOutput::interface().name {
                    let wl_output = registry.bind::<wl_output::WlOutput, _, _>(
                        name,
                        version.min(4),
                        qh,
                        OutputData { id: name },
                    );
                    state.outputs.insert(
                        name,
                        OutputState {
                            name: None,
                            wl_output,
                            gamma: None,
                            ramp_size: 0,
                            table: None,
                            applied: None,
                        },
                    );
                    state.ensure_gamma_for(qh, name);
                } else if interface
                    == zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1::interface().name
                {
                    let mgr = registry
                        .bind::<zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1, _, _>(
                            name,
                            1,
                            qh,
                            (),
                        );
                    state.gamma_mgr = Some(mgr);
                    state.gamma_mgr_name = Some(name);
                    state.ensure_gamma_all(qh);
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                if state.gamma_mgr_name == Some(name) {
                    state.gamma_mgr = None;
                    state.gamma_mgr_name = None;
                }
                state.remove_output(name);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_output::WlOutput, OutputData> for AppState {
    fn event(
        state: &mut Self,
        _: &wl_output::WlOutput,
        event: wl_output::Event,
        data: &OutputData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_output::Event::Name { name } => {
                if let Some(output) = state.outputs.get_mut(&data.id) {
                    output.name = Some(name);
                }
            }
            wl_output::Event::Description { description } => {
                if let Some(output) = state.outputs.get_mut(&data.id) {
                    output.name.get_or_insert(description);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<zwlr_gamma_control_v1::ZwlrGammaControlV1, GammaData> for AppState {
    fn event(
        state: &mut Self,
        _: &zwlr_gamma_control_v1::ZwlrGammaControlV1,
        event: zwlr_gamma_control_v1::Event,
        data: &GammaData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_gamma_control_v1::Event::GammaSize { size } => {
                if let Some(output) = state.outputs.get_mut(&data.id) {
                    output.ramp_size = size;
                    output.applied = None;
                    let table_bytes = size as usize * 3 * std::mem::size_of::<u16>();
                    output.table = match create_anonymous_file(table_bytes) {
                        Ok(file) => match unsafe { MmapMut::map_mut(&file) } {
                            Ok(mmap) => Some((file, mmap)),
                            Err(err) => {
                                error!("mmap failed for output {:?}: {err}", output.name);
                                None
                            }
                        },
                        Err(err) => {
                            error!(
                                "Failed to allocate gamma table for output {:?}: {err}",
                                output.name
                            );
                            None
                        }
                    };
                }
            }
            zwlr_gamma_control_v1::Event::Failed => {
                if let Some(output) = state.outputs.get_mut(&data.id) {
                    warn!("gamma control failed for output {:?}", output.name);
                    if let Some(gamma) = output.gamma.take() {
                        gamma.destroy();
                    }
                    output.table = None;
                    output.ramp_size = 0;
                    output.applied = None;
                }
            }
            _ => {}
        }
    }
}

delegate_noop!(AppState: ignore zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1);

pub fn create_anonymous_file(size: usize) -> Result<File> {
    let mut path = std::env::temp_dir();
    path.push(format!("cotemp-{}", std::process::id()));
    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)?;
    f.set_len(size as u64)?;
    let _ = std::fs::remove_file(&path);
    Ok(f)
}

/// wlr-gamma-control outputs exposed as the controllers of a single screen.
///
/// The compositor restores the original ramps once the controls are released, so
/// applied ramps only last as long as this backend is alive.
pub struct WaylandBackend {
    conn: Connection,
    event_queue: EventQueue<AppState>,
    state: AppState,
}

impl WaylandBackend {
    pub fn connect() -> Result<Self> {
        let conn = Connection::connect_to_env().context("connect wayland display")?;
        let mut event_queue = conn.new_event_queue();
        let qh = event_queue.handle();
        conn.display().get_registry(&qh, ());

        let mut state = AppState::new();
        event_queue
            .roundtrip(&mut state)
            .context("initial wayland roundtrip")?;
        if state.gamma_mgr.is_none() {
            return Err(anyhow!("Compositor lacks wlr-gamma-control-unstable-v1"));
        }
        state.ensure_gamma_all(&qh);
        event_queue
            .roundtrip(&mut state)
            .context("gamma setup roundtrip")?;

        Ok(Self {
            conn,
            event_queue,
            state,
        })
    }

    fn output(&self, screen: usize, controller: usize) -> Result<u32> {
        if screen != 0 {
            return Err(SelectionError::Screen {
                index: screen,
                count: 1,
            }
            .into());
        }
        let controllers = self.state.controllers();
        controllers.get(controller).copied().ok_or_else(|| {
            SelectionError::Controller {
                screen,
                index: controller,
                count: controllers.len(),
            }
            .into()
        })
    }

    /// Reads whatever the compositor has sent without blocking.
    fn drain_events(&mut self) -> Result<()> {
        self.event_queue
            .dispatch_pending(&mut self.state)
            .context("dispatch pending")?;
        if let Some(guard) = self.event_queue.prepare_read() {
            let conn_fd = guard.connection_fd();
            let mut fds = [PollFd::new(
                conn_fd,
                PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP,
            )];
            match poll(&mut fds, PollTimeout::ZERO) {
                Ok(0) => drop(guard),
                Ok(_) => {
                    let conn_ready = fds[0].revents().is_some_and(|flags| {
                        flags
                            .intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP)
                    });
                    if conn_ready {
                        guard.read().context("read wayland events")?;
                    } else {
                        drop(guard);
                    }
                }
                Err(nix::errno::Errno::EINTR) => drop(guard),
                Err(err) => return Err(err.into()),
            }
        }
        self.event_queue
            .dispatch_pending(&mut self.state)
            .context("dispatch pending")?;
        Ok(())
    }
}

impl GammaBackend for WaylandBackend {
    fn screen_count(&self) -> usize {
        1
    }

    fn controller_count(&self, screen: usize) -> Result<usize> {
        if screen != 0 {
            return Err(SelectionError::Screen {
                index: screen,
                count: 1,
            }
            .into());
        }
        Ok(self.state.controllers().len())
    }

    fn get_ramp(&self, screen: usize, controller: usize) -> Result<GammaRamp> {
        let id = self.output(screen, controller)?;
        let output = &self.state.outputs[&id];
        Ok(output
            .applied
            .clone()
            .unwrap_or_else(|| GammaRamp::identity(output.ramp_size as usize)))
    }

    fn ramp_size(&self, screen: usize, controller: usize) -> Result<usize> {
        let id = self.output(screen, controller)?;
        Ok(self.state.outputs[&id].ramp_size as usize)
    }

    fn set_ramp(&mut self, screen: usize, controller: usize, ramp: &GammaRamp) -> Result<()> {
        let id = self.output(screen, controller)?;
        let Some(output) = self.state.outputs.get_mut(&id) else {
            return Err(anyhow!("output {id} vanished"));
        };
        let expected = output.ramp_size as usize;
        if ramp.len() != expected {
            return Err(RampError::SizeMismatch {
                expected,
                actual: ramp.len(),
            }
            .into());
        }
        let (Some(gamma_obj), Some((file, mmap))) = (output.gamma.as_ref(), output.table.as_mut())
        else {
            return Err(anyhow!("output {:?} has no gamma control", output.name));
        };
        let u16_slice = bytemuck::cast_slice_mut::<u8, u16>(mmap);
        ramp.fill_planar(u16_slice)?;
        file.seek(SeekFrom::Start(0))
            .context("rewind gamma table")?;
        debug!(
            "Applying gamma to output {:?} (ramp_size: {expected})",
            output.name
        );
        gamma_obj.set_gamma(file.as_fd());
        output.applied = Some(ramp.clone());
        self.conn.flush().context("flush wayland connection")?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.drain_events()?;
        let qh = self.event_queue.handle();
        if self.state.ensure_gamma_all(&qh) {
            self.event_queue
                .roundtrip(&mut self.state)
                .context("gamma setup roundtrip")?;
        }
        Ok(())
    }

    fn restores_on_exit(&self) -> bool {
        true
    }
}

impl Drop for WaylandBackend {
    fn drop(&mut self) {
        for output in self.state.outputs.values_mut() {
            if let Some(gamma) = output.gamma.take() {
                gamma.destroy();
            }
        }
        if let Err(err) = self.conn.flush() {
            error!("Failed to release gamma controls: {err}");
        }
    }
}
