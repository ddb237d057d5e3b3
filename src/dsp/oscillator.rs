//! Band-limited periodic waveform generator backing `OscillatorNode`.

use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Oscillator waveform, named like `OscillatorNode.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    #[default]
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn as_str(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            other => Err(format!("unknown waveform '{other}'")),
        }
    }
}

/// Phase-accumulating oscillator with PolyBLEP anti-aliasing on the
/// discontinuous shapes.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    /// A 440 Hz square wave, the `OscillatorNode` defaults apart from the shape.
    pub fn new(sample_rate: f64) -> Self {
        Oscillator {
            waveform: Waveform::Square,
            frequency: 440.0,
            phase: 0.0,
            sample_rate,
        }
    }

    fn phase_inc(&self) -> f64 {
        self.frequency / self.sample_rate
    }

    pub fn next_sample(&mut self) -> f64 {
        let inc = self.phase_inc();
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, inc),
            Waveform::Square => {
                let naive = if self.phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(self.phase, inc) - poly_blep((self.phase + 0.5) % 1.0, inc)
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }
}

/// PolyBLEP correction around a unit step at phase 0.
///
/// `t` is the phase in [0, 1), `dt` the phase increment per sample.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn osc(waveform: Waveform, frequency: f64) -> Oscillator {
        let mut osc = Oscillator::new(44100.0);
        osc.waveform = waveform;
        osc.frequency = frequency;
        osc
    }

    #[test]
    fn defaults_to_square() {
        assert_eq!(Oscillator::new(44100.0).waveform, Waveform::Square);
        assert_eq!(Waveform::default(), Waveform::Square);
    }

    #[test]
    fn sine_starts_at_zero() {
        let s = osc(Waveform::Sine, 440.0).next_sample();
        assert!(s.abs() < 1e-10, "Sine should start near 0, got {s}");
    }

    #[test]
    fn shapes_stay_in_range() {
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::Triangle,
        ] {
            let mut o = osc(waveform, 65.4);
            for _ in 0..44100 {
                let s = o.next_sample();
                assert!((-1.5..=1.5).contains(&s), "{waveform:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn square_period_matches_frequency() {
        // 100 Hz at 44.1 kHz: 441 samples per period, so the sign flips
        // twice per period.
        let mut o = osc(Waveform::Square, 100.0);
        let samples: Vec<f64> = (0..4410).map(|_| o.next_sample()).collect();
        let flips = samples
            .windows(2)
            .filter(|w| w[0].signum() != w[1].signum())
            .count();
        assert!((19..=21).contains(&flips), "expected ~20 sign flips, got {flips}");
    }

    #[test]
    fn parses_web_audio_type_names() {
        assert_eq!("square".parse::<Waveform>(), Ok(Waveform::Square));
        assert_eq!("saw".parse::<Waveform>(), Ok(Waveform::Sawtooth));
        assert!("custom".parse::<Waveform>().is_err());
        assert_eq!(Waveform::Triangle.as_str(), "triangle");
    }
}
