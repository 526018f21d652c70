use std::time::Duration;

/// Linear progress through an animation, clamped to `[0, 1]`. A zero duration
/// is already complete.
pub fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

/// `1 - (1 - t)^4`
pub fn ease_out_quart(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(4)
}

pub fn interpolate(start: i64, end: i64, progress: f64) -> i64 {
    let range = (end - start) as f64;
    (start as f64 + range * ease_out_quart(progress)).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact() {
        assert_eq!(ease_out_quart(0.0), 0.0);
        assert_eq!(ease_out_quart(1.0), 1.0);
        assert_eq!(interpolate(0, 96, 1.0), 96);
        assert_eq!(interpolate(12, 47, 0.0), 12);
    }

    #[test]
    fn curve_is_monotonic() {
        let mut last = 0.0;
        for step in 0..=1000 {
            let value = ease_out_quart(step as f64 / 1000.0);
            assert!(value >= last, "dropped at step {step}");
            last = value;
        }
    }

    #[test]
    fn progress_clamps() {
        let second = Duration::from_secs(1);
        assert_eq!(progress(Duration::from_millis(500), second), 0.5);
        assert_eq!(progress(Duration::from_secs(3), second), 1.0);
        assert_eq!(progress(Duration::from_millis(1), Duration::ZERO), 1.0);
    }

    #[test]
    fn ease_out_front_loads_the_count() {
        // Halfway through, the curve has covered 15/16 of the range.
        assert_eq!(interpolate(0, 1600, 0.5), 1500);
    }
}
