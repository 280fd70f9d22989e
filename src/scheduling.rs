use chrono::{DateTime, TimeZone, Timelike};

use crate::color::ColorState;
use crate::error::TimeParseError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Inclusive range of minutes since midnight. `end` may be 1440 (`24:00`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u16,
    pub end: u16,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Ok(Self {
            start: parse_hhmm(start)?,
            end: parse_hhmm(end)?,
        })
    }

    pub fn contains(&self, minute: u16) -> bool {
        self.start <= minute && minute <= self.end
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub name: String,
    pub window: Option<TimeWindow>,
    pub state: ColorState,
}

/// Ordered profiles; earlier entries win when windows overlap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileTable {
    profiles: Vec<Profile>,
}

impl ProfileTable {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self { profiles }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// First time-windowed profile covering `minute`. Presets without a window never match.
    pub fn active_at(&self, minute: u16) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.window.is_some_and(|w| w.contains(minute)))
    }
}

/// Parses `HH:MM` into minutes since midnight. `24:00` is accepted as end of day.
pub fn parse_hhmm(s: &str) -> Result<u16, TimeParseError> {
    let (hours, rest) = split_digits(s);
    let Some(minutes) = rest.strip_prefix(':') else {
        return Err(TimeParseError::MissingSeparator(s.to_string()));
    };
    let (minutes, rest) = split_digits(minutes);
    if !rest.is_empty() {
        return Err(TimeParseError::TrailingInput(s.to_string()));
    }
    let h: u16 = hours
        .parse()
        .map_err(|_| TimeParseError::NotANumber(s.to_string()))?;
    let m: u16 = minutes
        .parse()
        .map_err(|_| TimeParseError::NotANumber(s.to_string()))?;
    if m > 59 || h > 24 || (h == 24 && m != 0) {
        return Err(TimeParseError::OutOfRange(s.to_string()));
    }
    Ok(h * 60 + m)
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

pub fn minute_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> u16 {
    // hour() < 24 and minute() < 60, so this always fits
    (now.hour() * 60 + now.minute()) as u16
}
