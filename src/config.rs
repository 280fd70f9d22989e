//! Compiled-in profiles and timing.

use crate::color::ColorState;
use crate::error::TimeParseError;
use crate::scheduling::{Profile, ProfileTable, TimeWindow};

/// Seconds to sleep between two evaluation cycles.
pub const INTERVAL_SECS: u64 = 60;

pub struct ProfileEntry {
    pub name: &'static str,
    /// `(from, to)` in 24h `HH:MM`. `None` makes a preset selectable only by name.
    pub window: Option<(&'static str, &'static str)>,
    pub temperature: i32,
    pub brightness: f64,
}

#[rustfmt::skip]
pub const PROFILES: &[ProfileEntry] = &[
    ProfileEntry { name: "day", window: Some(("05:00", "11:45")), temperature: 6500, brightness: 1.0 },
    ProfileEntry { name: "even", window: Some(("17:00", "18:45")), temperature: 6000, brightness: 0.9 },
    ProfileEntry { name: "night", window: Some(("18:45", "20:00")), temperature: 4000, brightness: 0.8 },
    ProfileEntry { name: "latenight", window: Some(("20:00", "24:00")), temperature: 3000, brightness: 0.7 },
    ProfileEntry { name: "coffee", window: None, temperature: 8000, brightness: 1.0 },
    ProfileEntry { name: "storm", window: None, temperature: 2000, brightness: 1.0 },
    ProfileEntry { name: "campfire", window: None, temperature: 4500, brightness: 1.0 },
];

pub fn load_profiles(entries: &[ProfileEntry]) -> Result<ProfileTable, TimeParseError> {
    let profiles = entries
        .iter()
        .map(|entry| -> Result<Profile, TimeParseError> {
            let window = entry
                .window
                .map(|(from, to)| TimeWindow::parse(from, to))
                .transpose()?;
            Ok(Profile {
                name: entry.name.to_string(),
                window,
                state: ColorState::new(entry.temperature, entry.brightness),
            })
        })
        .collect::<Result<Vec<_>, TimeParseError>>()?;
    Ok(ProfileTable::new(profiles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_parse() {
        let table = load_profiles(PROFILES).unwrap();
        assert_eq!(table.iter().count(), PROFILES.len());
        assert_eq!(table.active_at(6 * 60).unwrap().name, "day");
        assert_eq!(table.active_at(23 * 60 + 59).unwrap().name, "latenight");
        assert_eq!(table.by_name("storm").unwrap().state, ColorState::new(2000, 1.0));
    }

    #[test]
    fn test_builtin_names_unique() {
        let mut names: Vec<_> = PROFILES.iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PROFILES.len());
    }

    #[test]
    fn test_bad_window_is_an_error() {
        let entries = [ProfileEntry {
            name: "broken",
            window: Some(("5-00", "06:00")),
            temperature: 5000,
            brightness: 1.0,
        }];
        assert_eq!(
            load_profiles(&entries),
            Err(TimeParseError::MissingSeparator("5-00".to_string()))
        );
    }
}
