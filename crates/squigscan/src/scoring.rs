//! RMS deviation of a measurement from a target curve.

use crate::types::{Measurement, ScoredResult, TargetCurve};

/// Target amplitude at `frequency`, linearly interpolated between the
/// bracketing samples. Frequencies outside the curve clamp to the nearest
/// end sample; there is no extrapolation.
pub fn interpolate(frequency: f64, target: &TargetCurve) -> f64 {
    let freqs = &target.frequencies;
    let amps = &target.amplitudes;
    let n = freqs.len().min(amps.len());
    if n == 0 {
        return 0.0;
    }
    if frequency.is_nan() || frequency <= freqs[0] {
        return amps[0];
    }
    if frequency >= freqs[n - 1] {
        return amps[n - 1];
    }

    // First sample at or above `frequency`; in 1..n-1 given the checks above.
    let hi = freqs[..n].partition_point(|&f| f < frequency);
    let lo = hi - 1;
    let span = freqs[hi] - freqs[lo];
    if freqs[hi] == frequency || span <= 0.0 {
        return amps[hi];
    }
    let ratio = (frequency - freqs[lo]) / span;
    amps[lo] + ratio * (amps[hi] - amps[lo])
}

/// Population RMS of `measured - target` over samples inside
/// `[min_freq, max_freq]`. `f64::INFINITY` when no sample is in range.
pub fn score(measurement: &Measurement, target: &TargetCurve, min_freq: f64, max_freq: f64) -> f64 {
    score_series(
        measurement.frequencies(),
        measurement.amplitudes(),
        target,
        min_freq,
        max_freq,
    )
}

/// [`score`] over raw slices.
pub fn score_series(
    frequencies: &[f64],
    amplitudes: &[f64],
    target: &TargetCurve,
    min_freq: f64,
    max_freq: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;

    for (&f, &measured) in frequencies.iter().zip(amplitudes) {
        if f < min_freq || f > max_freq {
            continue;
        }
        let diff = measured - interpolate(f, target);
        sum += diff * diff;
        count += 1;
    }

    if count == 0 {
        f64::INFINITY
    } else {
        (sum / count as f64).sqrt()
    }
}

/// Score every measurement, in the order given.
pub fn score_all(
    measurements: &[Measurement],
    target: &TargetCurve,
    min_freq: f64,
    max_freq: f64,
) -> Vec<ScoredResult> {
    measurements
        .iter()
        .map(|m| ScoredResult {
            name: m.display_name().to_string(),
            deviation_db: score(m, target, min_freq, max_freq),
            source_id: m.id().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{generate, TargetKind};
    use crate::types::SourceTag;

    fn measurement(amplitudes: Vec<f64>) -> Measurement {
        Measurement::new(
            "inline:test",
            "Test",
            vec![100.0, 1000.0, 10000.0],
            amplitudes,
            SourceTag::Inline,
        )
        .unwrap()
    }

    fn ramp() -> TargetCurve {
        TargetCurve {
            frequencies: vec![100.0, 200.0, 400.0],
            amplitudes: vec![1.0, 3.0, -1.0],
        }
    }

    #[test]
    fn test_interpolate_clamps_at_boundaries() {
        let target = ramp();
        assert_eq!(interpolate(10.0, &target), 1.0);
        assert_eq!(interpolate(100.0, &target), 1.0);
        assert_eq!(interpolate(400.0, &target), -1.0);
        assert_eq!(interpolate(5_000.0, &target), -1.0);
    }

    #[test]
    fn test_interpolate_linear_between_samples() {
        let target = ramp();
        assert_eq!(interpolate(150.0, &target), 2.0);
        assert_eq!(interpolate(200.0, &target), 3.0);
        assert_eq!(interpolate(300.0, &target), 1.0);
    }

    #[test]
    fn test_interpolate_empty_target() {
        let empty = TargetCurve {
            frequencies: vec![],
            amplitudes: vec![],
        };
        assert_eq!(interpolate(1000.0, &empty), 0.0);
    }

    #[test]
    fn test_exact_match_scores_zero() {
        let target = generate(TargetKind::Flat);
        let d = score(&measurement(vec![0.0, 0.0, 0.0]), &target, 20.0, 20_000.0);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_constant_offset_scores_offset() {
        let target = generate(TargetKind::Flat);
        let d = score(&measurement(vec![3.0, 3.0, 3.0]), &target, 20.0, 20_000.0);
        assert_eq!(d, 3.0);
    }

    #[test]
    fn test_no_samples_in_window_is_infinite() {
        let target = generate(TargetKind::Flat);
        let d = score(&measurement(vec![0.0, 0.0, 0.0]), &target, 5.0, 10.0);
        assert!(d.is_infinite() && d > 0.0);
    }

    #[test]
    fn test_window_is_inclusive() {
        let target = generate(TargetKind::Flat);
        let d = score(&measurement(vec![4.0, 0.0, 0.0]), &target, 100.0, 100.0);
        assert_eq!(d, 4.0);
    }

    #[test]
    fn test_population_rms() {
        let target = generate(TargetKind::Flat);
        let d = score(&measurement(vec![3.0, -3.0, 0.0]), &target, 20.0, 20_000.0);
        assert!((d - 6.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_score_all_keeps_order() {
        let target = generate(TargetKind::Flat);
        let ms = vec![measurement(vec![1.0, 1.0, 1.0]), measurement(vec![2.0, 2.0, 2.0])];
        let scored = score_all(&ms, &target, 20.0, 20_000.0);
        assert_eq!(scored[0].deviation_db, 1.0);
        assert_eq!(scored[1].deviation_db, 2.0);
        assert_eq!(scored[0].source_id, "inline:test");
    }
}
