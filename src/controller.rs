use anyhow::Result;
use std::ops::Range;
use tracing::{debug, info};

use crate::backend::GammaBackend;
use crate::color::{ColorState, estimate, gain_curve};
use crate::error::SelectionError;
use crate::ramp::encode;
use crate::report::{ControllerReport, ScreenReport};
use crate::scheduling::ProfileTable;

/// How each cycle picks its target state. Chosen once at startup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    /// Fixed state; profiles are never consulted.
    Explicit(ColorState),
    /// Follow the profile table; keep the previous state between windows.
    Profile,
    /// Shift each controller's estimated state by these offsets.
    Delta { temperature: i32, brightness: f64 },
}

/// Screens and controllers a cycle touches. `None` means all of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub screen: Option<usize>,
    pub controller: Option<usize>,
}

impl Selection {
    pub fn screens<B: GammaBackend + ?Sized>(&self, backend: &B) -> Result<Range<usize>> {
        let count = backend.screen_count();
        match self.screen {
            Some(index) if index >= count => Err(SelectionError::Screen { index, count }.into()),
            Some(index) => Ok(index..index + 1),
            None => Ok(0..count),
        }
    }

    pub fn controllers<B: GammaBackend + ?Sized>(
        &self,
        backend: &B,
        screen: usize,
    ) -> Result<Range<usize>> {
        let count = backend.controller_count(screen)?;
        match self.controller {
            Some(index) if index >= count => Err(SelectionError::Controller {
                screen,
                index,
                count,
            }
            .into()),
            Some(index) => Ok(index..index + 1),
            None => Ok(0..count),
        }
    }
}

/// Runs evaluation cycles against a display backend.
pub struct StateController<B: GammaBackend + ?Sized> {
    backend: Box<B>,
    profiles: ProfileTable,
    mode: Mode,
    selection: Selection,
    state: ColorState,
    active_profile: Option<String>,
}

impl<B: GammaBackend + ?Sized> StateController<B> {
    /// Fails if the selection names a screen or controller the backend does not have.
    pub fn new(
        backend: Box<B>,
        profiles: ProfileTable,
        mode: Mode,
        selection: Selection,
    ) -> Result<Self> {
        for screen in selection.screens(&*backend)? {
            selection.controllers(&*backend, screen)?;
        }
        let state = match mode {
            Mode::Explicit(state) => state,
            Mode::Profile | Mode::Delta { .. } => ColorState::default(),
        };
        Ok(Self {
            backend,
            profiles,
            mode,
            selection,
            state,
            active_profile: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The state applied by the latest cycle.
    pub fn state(&self) -> ColorState {
        self.state
    }

    /// Picks the target for `minute` and writes it to every selected controller.
    pub fn run_cycle(&mut self, minute: u16) -> Result<ColorState> {
        self.backend.refresh()?;

        if self.mode == Mode::Profile {
            self.select_profile(minute);
        }

        for screen in self.selection.screens(&*self.backend)? {
            for controller in self.selection.controllers(&*self.backend, screen)? {
                let target = match self.mode {
                    Mode::Delta {
                        temperature,
                        brightness,
                    } => {
                        let current = self.estimate(screen, controller..controller + 1)?;
                        let shifted = ColorState::new(
                            current.temperature.saturating_add(temperature),
                            current.brightness + brightness,
                        );
                        debug!(
                            "crtc {controller} on screen {screen}: {current:?} shifted to {shifted:?}"
                        );
                        shifted
                    }
                    Mode::Explicit(_) | Mode::Profile => self.state,
                };
                self.state = self.apply(screen, controller, target)?;
            }
        }
        Ok(self.state)
    }

    fn select_profile(&mut self, minute: u16) {
        let Some(profile) = self.profiles.active_at(minute) else {
            if let Some(name) = self.active_profile.take() {
                info!("profile '{name}' window ended, keeping {:?}", self.state);
            }
            return;
        };
        if self.active_profile.as_deref() != Some(profile.name.as_str()) {
            info!(
                "switching to profile '{}': {}K, brightness {:.2}",
                profile.name, profile.state.temperature, profile.state.brightness
            );
            self.active_profile = Some(profile.name.clone());
        }
        self.state = profile.state;
    }

    fn apply(&mut self, screen: usize, controller: usize, target: ColorState) -> Result<ColorState> {
        let target = target.clamped();
        let curve = gain_curve(target.temperature);
        debug!(
            "Gamma: Red: {:.6} | Green {:.6} | Blue {:.6} | Brightness: {:.6}",
            curve.red, curve.green, curve.blue, target.brightness
        );
        let size = self.backend.ramp_size(screen, controller)?;
        let ramp = encode(curve, target.brightness, size);
        self.backend.set_ramp(screen, controller, &ramp)?;
        Ok(target)
    }

    /// Estimates the combined state of `controllers` on `screen` from their top samples.
    pub fn estimate(&self, screen: usize, controllers: Range<usize>) -> Result<ColorState> {
        let (mut red, mut green, mut blue) = (0.0, 0.0, 0.0);
        let mut sampled = 0;
        for controller in controllers {
            let ramp = self.backend.get_ramp(screen, controller)?;
            if let Some((r, g, b)) = ramp.top() {
                red += f64::from(r);
                green += f64::from(g);
                blue += f64::from(b);
                sampled += 1;
            }
        }
        Ok(estimate(red, green, blue, sampled))
    }

    /// Current estimate per selected screen, aggregated and per controller.
    pub fn report(&self) -> Result<Vec<ScreenReport>> {
        let mut reports = Vec::new();
        for screen in self.selection.screens(&*self.backend)? {
            let controllers = self.selection.controllers(&*self.backend, screen)?;
            let overall = self.estimate(screen, controllers.clone())?;
            let controllers = controllers
                .map(|index| {
                    let state = self.estimate(screen, index..index + 1)?;
                    Ok(ControllerReport::new(index, state))
                })
                .collect::<Result<Vec<_>>>()?;
            reports.push(ScreenReport::new(screen, overall, controllers));
        }
        Ok(reports)
    }
}
