/// Reference temperature. The gain curve is neutral (1, 1, 1) here.
pub const DEFAULT_TEMP: i32 = 6500;
/// Floor below which the model cannot produce a meaningful curve.
pub const LOWEST_TEMP: i32 = 700;
/// Maps a summed top-of-ramp sample back into the [0, 1] brightness domain.
pub const BRIGHTNESS_DIV: f64 = 65470.988;

/// Coefficients of `gain = k0 + k1 * ln(T - T0)`, fitted against redshift's blackbody table.
///
/// Below [`DEFAULT_TEMP`] red is saturated and `T0 = LOWEST_TEMP`; above it blue is
/// saturated and `T0 = DEFAULT_TEMP - LOWEST_TEMP`. Both the forward curve and the
/// estimate read from the same table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GammaCoefficients {
    pub k0_green_low: f64,
    pub k1_green_low: f64,
    pub k0_blue_low: f64,
    pub k1_blue_low: f64,
    pub k0_red_high: f64,
    pub k1_red_high: f64,
    pub k0_green_high: f64,
    pub k1_green_high: f64,
}

pub const COEFFICIENTS: GammaCoefficients = GammaCoefficients {
    k0_green_low: -1.47751309139817,
    k1_green_low: 0.28590164772055,
    k0_blue_low: -4.38321650114872,
    k1_blue_low: 0.6212158769447,
    k0_red_high: 1.75390204039018,
    k1_red_high: -0.1150805671482,
    k0_green_high: 1.49221604915144,
    k1_green_high: -0.07513509588921,
};

/// Target temperature (Kelvin) and brightness for one evaluation cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorState {
    pub temperature: i32,
    pub brightness: f64,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMP,
            brightness: 1.0,
        }
    }
}

impl ColorState {
    pub fn new(temperature: i32, brightness: f64) -> Self {
        Self {
            temperature,
            brightness,
        }
    }

    /// Raises the temperature to [`LOWEST_TEMP`] (with a warning) and clamps brightness.
    pub fn clamped(self) -> Self {
        let temperature = if self.temperature < LOWEST_TEMP {
            tracing::warn!(
                "Temperatures below {LOWEST_TEMP} cannot be displayed, using {LOWEST_TEMP} instead of {}",
                self.temperature
            );
            LOWEST_TEMP
        } else {
            self.temperature
        };
        Self {
            temperature,
            brightness: clamp(self.brightness, 0.0, 1.0),
        }
    }
}

/// Relative per-channel multipliers derived from a temperature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainCurve {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl GainCurve {
    pub const NEUTRAL: Self = Self {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
    };
}

/// Returns `a` below the range, `b` above it and `x` otherwise.
pub fn clamp(x: f64, a: f64, b: f64) -> f64 {
    let bounds = [a, x, b];
    bounds[usize::from(x > a) + usize::from(x > b)]
}

pub fn gain_curve(temperature: i32) -> GainCurve {
    gain_curve_with(&COEFFICIENTS, temperature)
}

pub fn gain_curve_with(k: &GammaCoefficients, temperature: i32) -> GainCurve {
    if temperature == DEFAULT_TEMP {
        return GainCurve::NEUTRAL;
    }
    if temperature < DEFAULT_TEMP {
        if temperature < LOWEST_TEMP {
            return GainCurve {
                red: 1.0,
                green: 0.0,
                blue: 0.0,
            };
        }
        // ln(0) is -inf at the floor, which clamps green and blue to 0.
        let g = f64::from(temperature - LOWEST_TEMP).ln();
        GainCurve {
            red: 1.0,
            green: clamp(k.k0_green_low + k.k1_green_low * g, 0.0, 1.0),
            blue: clamp(k.k0_blue_low + k.k1_blue_low * g, 0.0, 1.0),
        }
    } else {
        let g = f64::from(temperature - (DEFAULT_TEMP - LOWEST_TEMP)).ln();
        GainCurve {
            red: clamp(k.k0_red_high + k.k1_red_high * g, 0.0, 1.0),
            green: clamp(k.k0_green_high + k.k1_green_high * g, 0.0, 1.0),
            blue: 1.0,
        }
    }
}

/// Estimates the state that produced the given top-of-ramp samples.
///
/// `red`, `green` and `blue` are the highest-index samples summed over `controllers`
/// controllers. The result is approximate: a ramp dominated by one channel does not
/// determine the temperature, and an all-black ramp yields temperature 0.
pub fn estimate(red: f64, green: f64, blue: f64, controllers: usize) -> ColorState {
    estimate_with(&COEFFICIENTS, red, green, blue, controllers)
}

pub fn estimate_with(
    k: &GammaCoefficients,
    red: f64,
    green: f64,
    blue: f64,
    controllers: usize,
) -> ColorState {
    let raw = red.max(green).max(blue);
    if raw <= 0.0 || controllers == 0 {
        return ColorState::new(0, clamp(raw, 0.0, 1.0));
    }

    let (red, green, blue) = (red / raw, green / raw, blue / raw);
    let brightness = clamp(raw / controllers as f64 / BRIGHTNESS_DIV, 0.0, 1.0);
    let gdelta = blue - red;

    let t = if gdelta < 0.0 {
        if blue > 0.0 {
            ((green + 1.0 + gdelta - (k.k0_green_low + k.k0_blue_low))
                / (k.k1_green_low + k.k1_blue_low))
                .exp()
                + f64::from(LOWEST_TEMP)
        } else if green > 0.0 {
            ((green - k.k0_green_low) / k.k1_green_low).exp() + f64::from(LOWEST_TEMP)
        } else {
            f64::from(LOWEST_TEMP)
        }
    } else {
        ((green + 1.0 - gdelta - (k.k0_green_high + k.k0_red_high))
            / (k.k1_green_high + k.k1_red_high))
            .exp()
            + f64::from(DEFAULT_TEMP - LOWEST_TEMP)
    };

    tracing::debug!(red, green, blue, brightness, "estimated gain curve");
    ColorState::new(t.round() as i32, brightness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn clamped_with_logs(state: ColorState) -> (ColorState, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let clamped = tracing::subscriber::with_default(subscriber, || state.clamped());
        (clamped, logs.contents())
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
        assert_eq!(clamp(0.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(1.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_neutral_at_default_temp() {
        assert_eq!(gain_curve(DEFAULT_TEMP), GainCurve::NEUTRAL);
    }

    #[test]
    fn test_seam_is_continuous() {
        let below = gain_curve(DEFAULT_TEMP - 1);
        let above = gain_curve(DEFAULT_TEMP + 1);
        for v in [below.green, below.blue, above.red, above.green] {
            assert!((v - 1.0).abs() < 1e-3, "{v}");
        }
        assert_eq!(below.red, 1.0);
        assert_eq!(above.blue, 1.0);
    }

    #[test]
    fn test_low_range_bounded_and_non_decreasing() {
        let mut prev = gain_curve(LOWEST_TEMP);
        assert_eq!(prev, GainCurve { red: 1.0, green: 0.0, blue: 0.0 });
        for t in (LOWEST_TEMP + 1)..=DEFAULT_TEMP {
            let c = gain_curve(t);
            assert_eq!(c.red, 1.0);
            assert!((0.0..=1.0).contains(&c.green));
            assert!((0.0..=1.0).contains(&c.blue));
            assert!(c.green >= prev.green, "green decreased at {t}");
            assert!(c.blue >= prev.blue, "blue decreased at {t}");
            prev = c;
        }
    }

    #[test]
    fn test_high_range_bounded() {
        for t in (DEFAULT_TEMP..=25000).step_by(250) {
            let c = gain_curve(t);
            assert_eq!(c.blue, 1.0);
            assert!((0.0..=1.0).contains(&c.red));
            assert!((0.0..=1.0).contains(&c.green));
        }
    }

    #[test]
    fn test_below_floor_is_degenerate() {
        let c = gain_curve(500);
        assert_eq!((c.red, c.green, c.blue), (1.0, 0.0, 0.0));
    }

    #[test]
    fn test_known_curve_points() {
        let warm = gain_curve(3000);
        assert!((warm.green - 0.735_555_6).abs() < 1e-6);
        assert!((warm.blue - 0.425_407_1).abs() < 1e-6);

        let cool = gain_curve(8000);
        assert!((cool.red - 0.868_217_5).abs() < 1e-6);
        assert!((cool.green - 0.913_960_4).abs() < 1e-6);
    }

    #[test]
    fn test_clamped_raises_floor() {
        let state = ColorState::new(500, 1.4).clamped();
        assert_eq!(state, ColorState::new(LOWEST_TEMP, 1.0));

        let state = ColorState::new(4000, -0.2).clamped();
        assert_eq!(state, ColorState::new(4000, 0.0));
    }

    #[test]
    fn test_floor_clamp_warns() {
        let (state, logs) = clamped_with_logs(ColorState::new(500, 1.0));
        assert_eq!(state.temperature, LOWEST_TEMP);
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("instead of 500"), "{logs}");

        let (state, logs) = clamped_with_logs(ColorState::new(LOWEST_TEMP, 1.0));
        assert_eq!(state.temperature, LOWEST_TEMP);
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn test_estimate_all_black() {
        assert_eq!(estimate(0.0, 0.0, 0.0, 1), ColorState::new(0, 0.0));
        assert_eq!(estimate(100.0, 50.0, 10.0, 0).temperature, 0);
    }

    #[test]
    fn test_estimate_red_only_hits_floor() {
        let state = estimate(65279.0, 0.0, 0.0, 1);
        assert_eq!(state.temperature, LOWEST_TEMP);
    }

    #[test]
    fn test_estimate_green_only() {
        // Blue is clamped to zero below ~1860K; green alone still pins the temperature.
        let state = estimate(65279.0, 10001.0, 0.0, 1);
        assert_eq!(state.temperature, 1000);
    }

    #[test]
    fn test_estimate_averages_brightness_over_controllers() {
        let one = estimate(32735.0, 32735.0, 32735.0, 1);
        let two = estimate(65470.0, 65470.0, 65470.0, 2);
        assert_eq!(one.temperature, DEFAULT_TEMP);
        assert_eq!(two.temperature, DEFAULT_TEMP);
        assert!((one.brightness - two.brightness).abs() < 1e-9);
        assert!((one.brightness - 0.5).abs() < 0.01);
    }
}
