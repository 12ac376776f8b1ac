use std::time::{Duration, Instant};

use crate::types::RendererConfig;

/// Snapshot of the time state fed to the frame clock and the compute uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f64,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f64, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f64(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that advances by a constant step every frame, independent of
/// how long frames actually take. Useful for deterministic captures.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepTimeSource {
    step: f64,
    frame: u64,
}

impl FixedStepTimeSource {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.as_secs_f64(),
            frame: 0,
        }
    }
}

impl TimeSource for FixedStepTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        // Frame n reports (n + 1) * step so the first delta is one step, not zero.
        self.frame = self.frame.saturating_add(1);
        TimeSample::new(self.step * self.frame as f64, self.frame - 1)
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Picks wall-clock time unless a fixed step was requested.
pub fn time_source_for(config: &RendererConfig) -> BoxedTimeSource {
    match config.fixed_step {
        Some(step) => Box::new(FixedStepTimeSource::new(step)),
        None => Box::new(SystemTimeSource::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FrameClock;

    #[test]
    fn fixed_step_advances_evenly() {
        let mut source = FixedStepTimeSource::new(Duration::from_millis(20));
        let samples: Vec<TimeSample> = (0..3).map(|_| source.sample()).collect();
        assert_eq!(samples[0].frame_index, 0);
        assert_eq!(samples[2].frame_index, 2);
        assert!((samples[0].seconds - 0.02).abs() < 1e-12);
        assert!((samples[2].seconds - 0.06).abs() < 1e-12);

        source.reset();
        assert_eq!(source.sample().frame_index, 0);
    }

    #[test]
    fn fixed_step_drives_clock_to_step_rate() {
        let mut source = FixedStepTimeSource::new(Duration::from_millis(25));
        let mut clock = FrameClock::new();
        for _ in 0..10 {
            clock.tick(source.sample().seconds);
        }
        assert!((clock.final_average() - 40.0).abs() < 1e-6);
    }

    #[test]
    fn system_time_is_monotonic() {
        let mut source = SystemTimeSource::new();
        let first = source.sample();
        let second = source.sample();
        assert!(second.seconds >= first.seconds);
        assert_eq!(second.frame_index, first.frame_index + 1);
    }

    #[test]
    fn reset_restarts_time_and_frame_index() {
        let mut source: BoxedTimeSource = Box::new(SystemTimeSource::new());
        std::thread::sleep(Duration::from_millis(20));
        source.sample();
        let before = source.sample();

        source.reset();
        let sample = source.sample();
        assert_eq!(sample.frame_index, 0);
        assert!(sample.seconds < before.seconds, "{} >= {}", sample.seconds, before.seconds);
    }

    #[test]
    fn config_selects_fixed_step() {
        let config = RendererConfig {
            fixed_step: Some(Duration::from_millis(10)),
            ..RendererConfig::default()
        };
        let mut source = time_source_for(&config);
        assert!((source.sample().seconds - 0.01).abs() < 1e-12);
    }
}
