use crate::color::{GainCurve, clamp};
use crate::error::RampError;

/// Full scale of one ramp sample.
pub const MAX_INTENSITY: f64 = 65535.0;

/// A controller's gamma table, one `u16` per sample and channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GammaRamp {
    pub red: Vec<u16>,
    pub green: Vec<u16>,
    pub blue: Vec<u16>,
}

impl GammaRamp {
    pub fn from_channels(
        red: Vec<u16>,
        green: Vec<u16>,
        blue: Vec<u16>,
    ) -> Result<Self, RampError> {
        if red.len() != green.len() || red.len() != blue.len() {
            return Err(RampError::UnevenChannels {
                red: red.len(),
                green: green.len(),
                blue: blue.len(),
            });
        }
        Ok(Self { red, green, blue })
    }

    /// The linear ramp a controller has with no adjustment applied.
    pub fn identity(size: usize) -> Self {
        encode(GainCurve::NEUTRAL, 1.0, size)
    }

    pub fn len(&self) -> usize {
        self.red.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty()
    }

    pub fn sample(&self, i: usize) -> Option<(u16, u16, u16)> {
        Some((*self.red.get(i)?, *self.green.get(i)?, *self.blue.get(i)?))
    }

    /// The highest-index sample, which approximates `MAX_INTENSITY * brightness * gain`.
    pub fn top(&self) -> Option<(u16, u16, u16)> {
        if self.is_empty() {
            return None;
        }
        self.sample(self.len() - 1)
    }

    /// Writes the ramp as three consecutive channel blocks (red, green, blue).
    pub fn fill_planar(&self, buf: &mut [u16]) -> Result<(), RampError> {
        let size = self.len();
        if buf.len() < size * 3 {
            return Err(RampError::SizeMismatch {
                expected: buf.len() / 3,
                actual: size,
            });
        }
        buf[..size].copy_from_slice(&self.red);
        buf[size..2 * size].copy_from_slice(&self.green);
        buf[2 * size..3 * size].copy_from_slice(&self.blue);
        Ok(())
    }
}

/// Builds an `size`-sample ramp scaling each channel of `curve` by `brightness`.
pub fn encode(curve: GainCurve, brightness: f64, size: usize) -> GammaRamp {
    let brightness = clamp(brightness, 0.0, 1.0);
    let mut ramp = GammaRamp {
        red: Vec::with_capacity(size),
        green: Vec::with_capacity(size),
        blue: Vec::with_capacity(size),
    };
    for i in 0..size {
        let base = MAX_INTENSITY * brightness * i as f64 / size as f64;
        ramp.red.push((base * curve.red).round() as u16);
        ramp.green.push((base * curve.green).round() as u16);
        ramp.blue.push((base * curve.blue).round() as u16);
    }
    ramp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{LOWEST_TEMP, estimate, gain_curve};

    #[test]
    fn test_encode_known_values() {
        let ramp = encode(gain_curve(3000), 0.7, 4);
        assert_eq!(ramp.red, vec![0, 11469, 22937, 34406]);
        assert_eq!(ramp.green, vec![0, 8436, 16872, 25307]);
        assert_eq!(ramp.blue, vec![0, 4879, 9758, 14637]);
    }

    #[test]
    fn test_encode_length() {
        for size in [0, 1, 256, 1024, 4096] {
            assert_eq!(encode(gain_curve(4500), 0.8, size).len(), size);
        }
    }

    #[test]
    fn test_encode_monotonic() {
        for t in [LOWEST_TEMP, 1200, 2700, 4500, 6500, 9000, 20000] {
            for b in [0.1, 0.5, 1.0] {
                let ramp = encode(gain_curve(t), b, 1024);
                for channel in [&ramp.red, &ramp.green, &ramp.blue] {
                    assert!(channel.windows(2).all(|w| w[0] <= w[1]), "t={t} b={b}");
                }
            }
        }
    }

    #[test]
    fn test_encode_clamps_brightness() {
        let curve = gain_curve(5000);
        assert_eq!(encode(curve, 1.7, 256), encode(curve, 1.0, 256));
        assert_eq!(encode(curve, -3.0, 256), encode(curve, 0.0, 256));
        assert!(encode(curve, -3.0, 256).red.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_top() {
        let ramp = encode(GainCurve::NEUTRAL, 1.0, 256);
        assert_eq!(ramp.top(), Some((65279, 65279, 65279)));
        assert_eq!(GammaRamp::default().top(), None);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        // Green is clamped to 0 up to 875K, so the estimate only recovers temperatures above it.
        for size in [256, 1024, 2048] {
            for b in [0.2, 0.5, 0.8, 1.0] {
                for t in (900..=13000).step_by(100) {
                    let ramp = encode(gain_curve(t), b, size);
                    let (r, g, bl) = ramp.top().unwrap();
                    let state = estimate(f64::from(r), f64::from(g), f64::from(bl), 1);
                    assert!(
                        (state.temperature - t).abs() <= 5,
                        "size={size} b={b} t={t} got {}",
                        state.temperature
                    );
                    assert!((state.brightness - b).abs() <= 0.02, "size={size} b={b} t={t}");
                }
            }
        }
    }

    #[test]
    fn test_round_trip_floor_band() {
        // Green and blue are both clamped to 0 here, leaving only red: the estimate is the floor.
        for size in [256, 1024] {
            for t in (LOWEST_TEMP + 1)..=875 {
                let ramp = encode(gain_curve(t), 1.0, size);
                let (r, g, bl) = ramp.top().unwrap();
                assert_eq!((g, bl), (0, 0), "t={t}");
                let state = estimate(f64::from(r), f64::from(g), f64::from(bl), 1);
                assert_eq!(state.temperature, LOWEST_TEMP, "t={t}");
            }
        }
        let (r, g, bl) = encode(gain_curve(900), 1.0, 1024).top().unwrap();
        assert!(g > 0);
        let state = estimate(f64::from(r), f64::from(g), f64::from(bl), 1);
        assert!((state.temperature - 900).abs() <= 5, "{state:?}");
    }

    #[test]
    fn test_fill_planar() {
        let ramp = GammaRamp::from_channels(vec![1, 2], vec![3, 4], vec![5, 6]).unwrap();
        let mut buf = [0u16; 6];
        ramp.fill_planar(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);

        let mut short = [0u16; 3];
        assert!(ramp.fill_planar(&mut short).is_err());
    }

    #[test]
    fn test_uneven_channels_rejected() {
        assert!(GammaRamp::from_channels(vec![1, 2], vec![3], vec![5, 6]).is_err());
    }
}
