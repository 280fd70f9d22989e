use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;

use crate::color::ColorState;
use crate::scheduling::{MINUTES_PER_DAY, ProfileTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerReport {
    pub crtc: usize,
    pub temperature: i32,
    pub brightness: f64,
}

impl ControllerReport {
    pub fn new(crtc: usize, state: ColorState) -> Self {
        Self {
            crtc,
            temperature: state.temperature,
            brightness: state.brightness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenReport {
    pub screen: usize,
    pub temperature: i32,
    pub brightness: f64,
    pub controllers: Vec<ControllerReport>,
}

impl ScreenReport {
    pub fn new(screen: usize, state: ColorState, controllers: Vec<ControllerReport>) -> Self {
        Self {
            screen,
            temperature: state.temperature,
            brightness: state.brightness,
            controllers,
        }
    }
}

pub fn format_text(reports: &[ScreenReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(
            out,
            "Screen: {}\n\tTemperature: {}\n\tBrightness: {:.1}",
            report.screen, report.temperature, report.brightness
        );
        for crtc in &report.controllers {
            let _ = writeln!(
                out,
                "\tCRTC {}: {}K, brightness {:.1}",
                crtc.crtc, crtc.temperature, crtc.brightness
            );
        }
    }
    out
}

pub fn format_json(reports: &[ScreenReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}

fn format_minute(minute: u16) -> String {
    if minute == MINUTES_PER_DAY {
        return "24:00".to_string();
    }
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

pub fn format_profiles(profiles: &ProfileTable) -> String {
    let mut out = String::new();
    for profile in profiles.iter() {
        let window = match profile.window {
            Some(w) => format!("{}-{}", format_minute(w.start), format_minute(w.end)),
            None => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<12} {:<11} {:>6}K {:.2}",
            profile.name, window, profile.state.temperature, profile.state.brightness
        );
    }
    out
}
