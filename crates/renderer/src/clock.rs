//! Frame-rate accumulator.
//!
//! The reported average is an unweighted cumulative mean over every frame seen
//! so far, not an exponential moving average: the newest sample always has
//! weight `1/n`.

/// Instantaneous rate reported when two consecutive timestamps are equal (or
/// go backwards).
pub const ZERO_DELTA_RATE: f64 = 0.0;

/// Result of one [`FrameClock::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// 1-based frame counter.
    pub frame: u64,
    /// Seconds since the previous tick.
    pub delta: f64,
    /// `1 / delta`, or [`ZERO_DELTA_RATE`].
    pub rate: f64,
    /// Cumulative mean of every `rate` so far.
    pub average: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    previous: f64,
    current: f64,
    frame_count: u64,
    average_fps: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock to `now` (seconds on the same timeline as previous ticks).
    pub fn tick(&mut self, now: f64) -> FrameTick {
        self.previous = self.current;
        self.current = now;

        let delta = self.current - self.previous;
        let rate = if delta > 0.0 {
            1.0 / delta
        } else {
            ZERO_DELTA_RATE
        };

        self.frame_count = self.frame_count.saturating_add(1);
        let n = self.frame_count as f64;
        self.average_fps = self.average_fps * ((n - 1.0) / n) + rate / n;

        FrameTick {
            frame: self.frame_count,
            delta,
            rate,
            average: self.average_fps,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Timestamp passed to the latest tick.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Last computed cumulative mean, for end-of-run reporting.
    pub fn final_average(&self) -> f64 {
        self.average_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_rates(rates: &[f64]) -> FrameClock {
        let mut clock = FrameClock::new();
        let mut now = 0.0;
        for rate in rates {
            now += 1.0 / rate;
            clock.tick(now);
        }
        clock
    }

    #[test]
    fn three_rate_sequence_averages_to_sixty() {
        let clock = run_rates(&[60.0, 30.0, 90.0]);
        assert_eq!(clock.frame_count(), 3);
        assert!((clock.final_average() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn average_is_arithmetic_mean_for_any_length() {
        let rates = [144.0, 59.94, 30.0, 120.0, 75.0, 24.0, 240.0, 61.0];
        for n in 1..=rates.len() {
            let clock = run_rates(&rates[..n]);
            let mean = rates[..n].iter().sum::<f64>() / n as f64;
            assert!(
                (clock.final_average() - mean).abs() < 1e-6,
                "n={n}: {} vs {mean}",
                clock.final_average()
            );
        }
    }

    #[test]
    fn first_tick_measures_from_zero() {
        let mut clock = FrameClock::new();
        let tick = clock.tick(0.5);
        assert_eq!(tick.frame, 1);
        assert!((tick.delta - 0.5).abs() < f64::EPSILON);
        assert!((tick.rate - 2.0).abs() < 1e-12);
        assert!((tick.average - 2.0).abs() < 1e-12);
    }

    #[test]
    fn equal_timestamps_yield_sentinel_rate() {
        let mut clock = FrameClock::new();
        clock.tick(0.1);
        let tick = clock.tick(0.1);
        assert_eq!(tick.delta, 0.0);
        assert_eq!(tick.rate, ZERO_DELTA_RATE);
        assert!(tick.average.is_finite());
        // (10 + 0) / 2
        assert!((tick.average - 5.0).abs() < 1e-9);
    }

    #[test]
    fn backwards_time_is_treated_like_zero_delta() {
        let mut clock = FrameClock::new();
        clock.tick(1.0);
        let tick = clock.tick(0.5);
        assert_eq!(tick.rate, ZERO_DELTA_RATE);
        assert_eq!(clock.current(), 0.5);
    }

    #[test]
    fn fresh_clock_reports_zero() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);
        assert_eq!(clock.final_average(), 0.0);
    }
}
