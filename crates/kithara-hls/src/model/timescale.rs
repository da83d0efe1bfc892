use std::time::Duration;

/// Microseconds per second; the unit of all unscaled times.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Ticks-per-second conversion between microseconds and scaled segment times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timescale(u64);

impl Default for Timescale {
    fn default() -> Self {
        Self(MICROS_PER_SEC)
    }
}

impl Timescale {
    /// A zero rate is coerced to one tick per second.
    pub const fn new(ticks_per_second: u64) -> Self {
        if ticks_per_second == 0 {
            Self(1)
        } else {
            Self(ticks_per_second)
        }
    }

    pub const fn ticks_per_second(self) -> u64 {
        self.0
    }

    pub fn to_scaled(self, micros: u64) -> u64 {
        let scaled = u128::from(micros) * u128::from(self.0) / u128::from(MICROS_PER_SEC);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn to_micros(self, scaled: u64) -> u64 {
        let micros = u128::from(scaled) * u128::from(MICROS_PER_SEC) / u128::from(self.0);
        u64::try_from(micros).unwrap_or(u64::MAX)
    }

    pub fn to_duration(self, scaled: u64) -> Duration {
        Duration::from_micros(self.to_micros(scaled))
    }
}

/// Seconds (as written in a playlist) to whole microseconds, clamped at zero.
pub fn secs_to_micros(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * MICROS_PER_SEC as f64).round() as u64
    } else {
        0
    }
}

/// Nearest whole microsecond of `duration`.
pub fn duration_to_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().saturating_add(500) / 1_000).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1_000_000, 9_500_000, 9_500_000)]
    #[case(90_000, 9_500_000, 855_000)]
    #[case(1_000, 4_004_000, 4_004)]
    fn scaling(#[case] rate: u64, #[case] micros: u64, #[case] scaled: u64) {
        let ts = Timescale::new(rate);
        assert_eq!(ts.to_scaled(micros), scaled);
        assert_eq!(ts.to_micros(scaled), micros);
    }

    #[test]
    fn duration_conversion() {
        let ts = Timescale::new(90_000);
        assert_eq!(ts.to_duration(180_000), Duration::from_secs(2));
    }

    #[rstest]
    #[case(9.5, 9_500_000)]
    #[case(0.333334, 333_334)]
    #[case(-1.0, 0)]
    #[case(f64::NAN, 0)]
    fn seconds_to_micros(#[case] secs: f64, #[case] micros: u64) {
        assert_eq!(secs_to_micros(secs), micros);
    }

    #[rstest]
    #[case(Duration::from_nanos(5_005_000_114), 5_005_000)]
    #[case(Duration::from_nanos(4_999_999_999), 5_000_000)]
    #[case(Duration::ZERO, 0)]
    fn duration_rounds_to_micros(#[case] duration: Duration, #[case] micros: u64) {
        assert_eq!(duration_to_micros(duration), micros);
    }
}
