use clap::Parser;

use crate::backend::BackendKind;
use crate::color::{ColorState, DEFAULT_TEMP};
use crate::config::INTERVAL_SECS;
use crate::controller::{Mode, Selection};
use crate::error::SelectionError;
use crate::scheduling::ProfileTable;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cotemp",
    version,
    about = "Screen color temperature and brightness with time-of-day profiles"
)]
pub struct Opts {
    /// Only adjust this screen
    #[arg(short = 's', long = "screen")]
    pub screen: Option<usize>,

    /// Only adjust this CRTC on each selected screen
    #[arg(short = 'c', long = "crtc")]
    pub crtc: Option<usize>,

    /// Color temperature (K); 0 means 6500. With --delta, an offset to add
    #[arg(short = 't', long = "temperature", allow_negative_numbers = true)]
    pub temperature: Option<i32>,

    /// Brightness [0.0 ... 1.0]; negative means 1.0. With --delta, an offset to add
    #[arg(short = 'b', long = "brightness", allow_negative_numbers = true)]
    pub brightness: Option<f64>,

    /// Apply a named profile from the built-in table
    #[arg(
        short = 'p',
        long = "profile",
        conflicts_with_all = ["temperature", "brightness", "delta"]
    )]
    pub profile: Option<String>,

    /// Shift the current temperature/brightness of each CRTC instead of setting them
    #[arg(short = 'd', long = "delta")]
    pub delta: bool,

    /// Print the current temperature and brightness of each screen and exit
    #[arg(
        short = 'l',
        long = "list",
        conflicts_with_all = ["temperature", "brightness", "profile", "delta", "oneshot"]
    )]
    pub list: bool,

    /// Print --list output as JSON
    #[arg(long = "json", requires = "list")]
    pub json: bool,

    /// Apply once and exit instead of re-applying every interval
    #[arg(short = 'o', long = "oneshot")]
    pub oneshot: bool,

    /// Seconds to sleep between adjustments
    #[arg(
        short = 'i',
        long = "interval",
        default_value_t = INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Display server to talk to
    #[arg(long = "backend", value_enum, default_value_t = BackendKind::Auto)]
    pub backend: BackendKind,

    /// Print the built-in profile table and exit
    #[arg(long = "profiles")]
    pub profiles: bool,
}

impl Opts {
    pub fn selection(&self) -> Selection {
        Selection {
            screen: self.screen,
            controller: self.crtc,
        }
    }

    /// Resolves the flags into the mode used for every cycle.
    pub fn mode(&self, profiles: &ProfileTable) -> Result<Mode, SelectionError> {
        if self.delta {
            return Ok(Mode::Delta {
                temperature: self.temperature.unwrap_or(0),
                brightness: self.brightness.unwrap_or(0.0),
            });
        }
        if let Some(name) = &self.profile {
            let profile = profiles
                .by_name(name)
                .ok_or_else(|| SelectionError::UnknownProfile(name.clone()))?;
            return Ok(Mode::Explicit(profile.state.clamped()));
        }
        if self.temperature.is_none() && self.brightness.is_none() {
            return Ok(Mode::Profile);
        }
        let temperature = match self.temperature {
            None | Some(0) => DEFAULT_TEMP,
            Some(t) => t,
        };
        let brightness = match self.brightness {
            Some(b) if b >= 0.0 => b,
            _ => 1.0,
        };
        Ok(Mode::Explicit(ColorState::new(temperature, brightness).clamped()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::LOWEST_TEMP;
    use crate::config::{PROFILES, load_profiles};
    use clap::CommandFactory;

    fn try_parse(args: &[&str]) -> Result<Opts, clap::Error> {
        let mut argv = vec!["cotemp"];
        argv.extend_from_slice(args);
        Opts::try_parse_from(argv)
    }

    fn parse(args: &[&str]) -> Opts {
        try_parse(args).unwrap()
    }

    fn mode(args: &[&str]) -> Result<Mode, SelectionError> {
        parse(args).mode(&load_profiles(PROFILES).unwrap())
    }

    #[test]
    fn test_command_is_consistent() {
        Opts::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&[]);
        assert_eq!(opts.interval, INTERVAL_SECS);
        assert_eq!(opts.backend, BackendKind::Auto);
        assert_eq!(opts.selection(), Selection::default());
        assert_eq!(mode(&[]), Ok(Mode::Profile));
    }

    #[test]
    fn test_explicit_temperature_and_brightness() {
        assert_eq!(
            mode(&["-t", "3000", "-b", "0.7"]),
            Ok(Mode::Explicit(ColorState::new(3000, 0.7)))
        );
        assert_eq!(
            mode(&["--brightness", "0.5"]),
            Ok(Mode::Explicit(ColorState::new(DEFAULT_TEMP, 0.5)))
        );
    }

    #[test]
    fn test_zero_temperature_means_default() {
        assert_eq!(
            mode(&["-t", "0"]),
            Ok(Mode::Explicit(ColorState::new(DEFAULT_TEMP, 1.0)))
        );
    }

    #[test]
    fn test_low_temperature_is_clamped() {
        assert_eq!(
            mode(&["-t", "500"]),
            Ok(Mode::Explicit(ColorState::new(LOWEST_TEMP, 1.0)))
        );
    }

    #[test]
    fn test_negative_brightness_is_unset() {
        assert_eq!(
            mode(&["-t", "4000", "-b", "-0.3"]),
            Ok(Mode::Explicit(ColorState::new(4000, 1.0)))
        );
    }

    #[test]
    fn test_named_profile() {
        assert_eq!(
            mode(&["-p", "campfire"]),
            Ok(Mode::Explicit(ColorState::new(4500, 1.0)))
        );
        assert_eq!(
            mode(&["-p", "sunbeam"]),
            Err(SelectionError::UnknownProfile("sunbeam".to_string()))
        );
    }

    #[test]
    fn test_delta_offsets() {
        assert_eq!(
            mode(&["-d", "-t", "-500", "-b", "0.1"]),
            Ok(Mode::Delta {
                temperature: -500,
                brightness: 0.1
            })
        );
        assert_eq!(
            mode(&["--delta"]),
            Ok(Mode::Delta {
                temperature: 0,
                brightness: 0.0
            })
        );
    }

    #[test]
    fn test_selection_flags() {
        let opts = parse(&["-s", "1", "-c", "2"]);
        assert_eq!(
            opts.selection(),
            Selection {
                screen: Some(1),
                controller: Some(2)
            }
        );
    }

    #[test]
    fn test_conflicts_rejected() {
        assert!(try_parse(&["-p", "day", "-t", "3000"]).is_err());
        assert!(try_parse(&["-l", "-d"]).is_err());
        assert!(try_parse(&["--json"]).is_err());
        assert!(try_parse(&["-i", "0"]).is_err());
        assert!(try_parse(&["--backend", "x11", "-l", "--json"]).is_ok());
    }
}
