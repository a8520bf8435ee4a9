use serde::{Deserialize, Serialize};

/// How a frame is reduced to one amplitude value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmplitudeMode {
    /// Largest absolute sample
    Peak,
    /// Root mean square over all samples
    #[default]
    Rms,
}

/// Normalized magnitude (0.0..=1.0) of interleaved 16-bit samples
pub fn measure(mode: AmplitudeMode, samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let full_scale = -(i16::MIN as f64);
    let value = match mode {
        AmplitudeMode::Peak => {
            let peak = samples
                .iter()
                .map(|&s| (s as i32).unsigned_abs())
                .max()
                .unwrap_or(0);
            peak as f64 / full_scale
        }
        AmplitudeMode::Rms => {
            let sum_sq: f64 = samples
                .iter()
                .map(|&s| {
                    let v = s as f64 / full_scale;
                    v * v
                })
                .sum();
            (sum_sq / samples.len() as f64).sqrt()
        }
    };

    (value as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_zero() {
        assert_eq!(measure(AmplitudeMode::Rms, &[0; 64]), 0.0);
        assert_eq!(measure(AmplitudeMode::Peak, &[0; 64]), 0.0);
        assert_eq!(measure(AmplitudeMode::Rms, &[]), 0.0);
    }

    #[test]
    fn test_full_scale_is_one() {
        let samples = vec![i16::MIN; 100];
        assert_eq!(measure(AmplitudeMode::Peak, &samples), 1.0);
        assert_eq!(measure(AmplitudeMode::Rms, &samples), 1.0);
    }

    #[test]
    fn test_peak_uses_absolute_value() {
        let samples = [100, -16384, 200];
        assert!((measure(AmplitudeMode::Peak, &samples) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rms_of_constant() {
        let samples = [8192i16; 32];
        assert!((measure(AmplitudeMode::Rms, &samples) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rms_below_peak_for_sine() {
        let samples: Vec<i16> = (0..1600)
            .map(|i| ((i as f32 * 0.05).sin() * 16000.0) as i16)
            .collect();
        let peak = measure(AmplitudeMode::Peak, &samples);
        let rms = measure(AmplitudeMode::Rms, &samples);
        assert!(rms < peak);
        assert!((rms / peak - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.02);
    }
}
